use std::path::PathBuf;

use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::proxy::{PROXY_HEADER, ProxyTransport};
use crate::youtube::{PrivacyStatus, Snippet, Status, VideoMetadata, YouTubeClient, watch_url};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_path: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    pub publish_at: Option<String>,
    pub default_language: Option<String>,
    pub default_audio_language: Option<String>,
}

#[derive(Debug)]
pub struct ValidatedUpload {
    pub file_path: PathBuf,
    pub metadata: VideoMetadata,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub id: String,
    pub url: String,
}

impl UploadRequest {
    /// Parses a JSON body. An empty body is treated as `{}` so that field
    /// validation reports what is missing.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(UploadRequest::default());
        }
        serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody {
            detail: e.to_string(),
        })
    }

    pub fn validate(self) -> Result<ValidatedUpload> {
        let (Some(file_path), Some(title)) = (non_empty(self.file_path), non_empty(self.title))
        else {
            return Err(GatewayError::bad_request("filePath and title are required"));
        };

        Ok(ValidatedUpload {
            file_path: PathBuf::from(file_path),
            metadata: VideoMetadata {
                snippet: Snippet {
                    title,
                    description: self.description,
                    tags: self.tags,
                    default_language: non_empty(self.default_language),
                    default_audio_language: non_empty(self.default_audio_language),
                },
                status: Status {
                    privacy_status: self.privacy_status,
                    publish_at: non_empty(self.publish_at),
                },
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Access token from `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Result<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|rest| rest.split(' ').next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(GatewayError::Unauthorized)
}

fn proxy_header(req: &HttpRequest) -> Result<Option<&str>> {
    req.headers()
        .get(PROXY_HEADER)
        .map(|v| {
            v.to_str().map_err(|e| GatewayError::InvalidProxy {
                detail: e.to_string(),
            })
        })
        .transpose()
}

#[post("/upload")]
pub async fn upload_video(
    req: HttpRequest,
    payload: web::Payload,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let access_token = bearer_token(&req)?;

    let limit = config.json_body_limit;
    let body = payload
        .to_bytes_limited(limit)
        .await
        .map_err(|_| GatewayError::PayloadTooLarge { limit })?
        .map_err(|e| GatewayError::InvalidBody {
            detail: e.to_string(),
        })?;
    let upload = UploadRequest::from_body(&body)?.validate()?;
    let transport = ProxyTransport::from_header(proxy_header(&req)?)?;
    let http = transport.http_client()?;

    let upload_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "upload",
        %upload_id,
        file = %upload.file_path.display(),
        proxied = transport.is_proxied()
    );

    async move {
        tracing::info!(title = %upload.metadata.snippet.title, "starting upload");

        let client = YouTubeClient::new(http, config.youtube_api_base.as_str(), access_token)
            .proxied(transport.is_proxied());
        let video = client
            .insert_video(&upload.metadata, &upload.file_path, config.upload_chunk_size)
            .await?;

        tracing::info!(video_id = %video.id, "upload complete");
        Ok::<_, GatewayError>(HttpResponse::Ok().json(UploadResponse {
            success: true,
            url: watch_url(&video.id),
            id: video.id,
        }))
    }
    .instrument(span)
    .await
}
