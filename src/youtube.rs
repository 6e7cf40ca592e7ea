//! Minimal YouTube Data API v3 client for `videos.insert` over the resumable
//! upload protocol.

use std::io::SeekFrom;
use std::path::Path;

use bytes::BytesMut;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{GatewayError, Result};

const WATCH_URL_BASE: &str = "https://youtu.be";
const INSERT_PATH: &str = "/upload/youtube/v3/videos";
const UPLOAD_CONTENT_TYPE: &str = "video/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Public,
    Unlisted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_audio_language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: PrivacyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
}

/// Request body of `videos.insert` with `part=snippet,status`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub snippet: Snippet,
    pub status: Status,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedVideo {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    message: Option<String>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_BASE}/{video_id}")
}

/// Client bound to one caller-supplied access token. There is no refresh path.
pub struct YouTubeClient {
    http: Client,
    api_base: String,
    access_token: String,
    proxied: bool,
}

impl YouTubeClient {
    pub fn new(http: Client, api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            access_token: access_token.into(),
            proxied: false,
        }
    }

    /// Marks the underlying client as routed through a proxy so connect
    /// failures are reported as proxy failures.
    pub fn proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    pub async fn insert_video(
        &self,
        metadata: &VideoMetadata,
        path: &Path,
        chunk_size: usize,
    ) -> Result<UploadedVideo> {
        let mut file = File::open(path).await.map_err(|source| GatewayError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let total = file
            .metadata()
            .await
            .map_err(|source| GatewayError::File {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let session = self.start_session(metadata, total).await?;
        tracing::debug!(bytes = total, "resumable upload session opened");

        if total == 0 {
            let response = self
                .send(
                    self.http
                        .put(session.clone())
                        .header(CONTENT_LENGTH, 0)
                        .header(CONTENT_RANGE, "bytes */0"),
                )
                .await?;
            return finish(response).await;
        }

        let chunk_size = chunk_size.max(1) as u64;
        let mut offset = 0u64;
        loop {
            let len = chunk_size.min(total - offset);
            let chunk = read_chunk(&mut file, path, offset, len).await?;
            let end = offset + len - 1;

            let response = self
                .send(
                    self.http
                        .put(session.clone())
                        .header(CONTENT_LENGTH, len)
                        .header(CONTENT_RANGE, format!("bytes {offset}-{end}/{total}"))
                        .body(chunk.freeze()),
                )
                .await?;

            if response.status() != StatusCode::PERMANENT_REDIRECT {
                return finish(response).await;
            }

            let stored = next_offset(&response);
            if stored <= offset {
                return Err(GatewayError::upstream(format!(
                    "upload session made no progress at byte {offset} of {total}"
                )));
            }
            offset = stored;
            tracing::debug!(offset, total, "chunk accepted");
            if offset >= total {
                return Err(GatewayError::upstream(
                    "upload session reported all bytes received without returning a video",
                ));
            }
        }
    }

    async fn start_session(&self, metadata: &VideoMetadata, total: u64) -> Result<Url> {
        let url = Url::parse(&format!("{}{}", self.api_base, INSERT_PATH))
            .map_err(|e| GatewayError::upstream(format!("invalid API base URL: {e}")))?;
        let response = self
            .send(
                self.http
                    .post(url)
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
                    .header("X-Upload-Content-Length", total)
                    .json(metadata),
            )
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::upstream("upload session response had no Location header"))?;

        // A relative Location is resolved against the endpoint that issued it.
        response
            .url()
            .join(location)
            .map_err(|e| GatewayError::upstream(format!("invalid upload session URL: {e}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if self.proxied && response.status() == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            return Err(GatewayError::ProxyFailure {
                detail: response.status().to_string(),
            });
        }
        Ok(response)
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if self.proxied && err.is_connect() {
            return GatewayError::ProxyFailure {
                detail: error_chain(&err),
            };
        }
        GatewayError::upstream(error_chain(&err))
    }
}

async fn read_chunk(file: &mut File, path: &Path, offset: u64, len: u64) -> Result<BytesMut> {
    let io_err = |source: std::io::Error| GatewayError::File {
        path: path.to_path_buf(),
        source,
    };

    file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
    let mut buf = BytesMut::with_capacity(len as usize);
    let mut reader = (&mut *file).take(len);
    while (buf.len() as u64) < len {
        let n = reader.read_buf(&mut buf).await.map_err(io_err)?;
        if n == 0 {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "file shrank during upload",
            )));
        }
    }
    Ok(buf)
}

/// `Range: bytes=0-N` on a 308 means bytes up to N are stored.
fn next_offset(response: &Response) -> u64 {
    response
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('-').next())
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

async fn finish(response: Response) -> Result<UploadedVideo> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    response
        .json::<UploadedVideo>()
        .await
        .map_err(|e| GatewayError::upstream(format!("unexpected upload response: {e}")))
}

async fn api_error(response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GatewayError::upstream(api_error_message(status, &body))
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    let envelope: ApiErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    envelope
        .error
        .errors
        .into_iter()
        .find_map(|item| item.message)
        .or(envelope.error.message)
        .unwrap_or_else(|| format!("{status}: {}", body.trim()))
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
