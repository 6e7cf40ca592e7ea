use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_JSON_BODY_LIMIT: usize = 50 * 1024 * 1024;
const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com";

/// Resumable uploads must be sent in multiples of 256 KiB (except the last chunk).
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;
const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 32 * UPLOAD_CHUNK_GRANULARITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub json_body_limit: usize,
    pub youtube_api_base: String,
    pub upload_chunk_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chunk_size = parse_or(&lookup, "YOUTUBE_UPLOAD_CHUNK_SIZE", DEFAULT_UPLOAD_CHUNK_SIZE)?;

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            json_body_limit: parse_or(&lookup, "JSON_BODY_LIMIT", DEFAULT_JSON_BODY_LIMIT)?,
            youtube_api_base: lookup("YOUTUBE_API_BASE_URL")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string()),
            upload_chunk_size: align_chunk_size(chunk_size),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            json_body_limit: DEFAULT_JSON_BODY_LIMIT,
            youtube_api_base: DEFAULT_YOUTUBE_API_BASE.to_string(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

fn align_chunk_size(size: usize) -> usize {
    let aligned = size - size % UPLOAD_CHUNK_GRANULARITY;
    aligned.max(UPLOAD_CHUNK_GRANULARITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.json_body_limit, 50 * 1024 * 1024);
        assert_eq!(config.youtube_api_base, "https://www.googleapis.com");
        assert_eq!(config.upload_chunk_size, 8 * 1024 * 1024);
    }

    #[test]
    fn port_is_overridable() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "8081")])).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.bind_address(), ("0.0.0.0".to_string(), 8081));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn chunk_size_is_aligned_to_granularity() {
        let config =
            Config::from_lookup(lookup_from(&[("YOUTUBE_UPLOAD_CHUNK_SIZE", "600000")])).unwrap();
        assert_eq!(config.upload_chunk_size, 2 * UPLOAD_CHUNK_GRANULARITY);

        let tiny = Config::from_lookup(lookup_from(&[("YOUTUBE_UPLOAD_CHUNK_SIZE", "10")])).unwrap();
        assert_eq!(tiny.upload_chunk_size, UPLOAD_CHUNK_GRANULARITY);
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let config = Config::from_lookup(lookup_from(&[(
            "YOUTUBE_API_BASE_URL",
            "http://127.0.0.1:9000/",
        )]))
        .unwrap();
        assert_eq!(config.youtube_api_base, "http://127.0.0.1:9000");
    }
}
