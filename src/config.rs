//! Configuration management for the drawing annotator

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::document::ViewerRules;
use crate::geometry::ZoomRange;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upload body limit in bytes.
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped.
    pub session_idle_ttl_secs: u64,
    pub session_cleanup_interval_secs: u64,
}

impl ServerConfig {
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Base URL of the document-processing backend.
    pub base_url: String,
    /// Timeout for OCR, rasterization and detection calls.
    pub request_timeout_secs: u64,
    /// Per-annotation extraction timeout.
    pub extraction_timeout_secs: u64,
}

impl ServicesConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    /// Minimum width and height of a drawn annotation, in image pixels.
    pub min_annotation_size: f64,
    /// Handle size in canvas pixels.
    pub handle_size_px: f64,
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Encoded frames kept in the render cache.
    pub render_cache_capacity: usize,
    /// Largest accepted viewer container side, in screen pixels.
    pub max_viewport_px: u32,
}

impl ViewerConfig {
    pub fn rules(&self) -> ViewerRules {
        ViewerRules {
            min_annotation_size: self.min_annotation_size,
            handle_px: self.handle_size_px,
            zoom_range: ZoomRange {
                min: self.zoom_min,
                max: self.zoom_max,
            },
            max_viewport_px: f64::from(self.max_viewport_px),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_bytes: 50 * 1024 * 1024,
                session_idle_ttl_secs: 4 * 60 * 60,
                session_cleanup_interval_secs: 300,
            },
            services: ServicesConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_secs: 300,
                extraction_timeout_secs: 90,
            },
            viewer: ViewerConfig {
                min_annotation_size: 10.0,
                handle_size_px: 10.0,
                zoom_min: 0.5,
                zoom_max: 5.0,
                render_cache_capacity: 64,
                max_viewport_px: 8192,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Read `name`, falling back to `default` when unset and failing when unparsable.
fn var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: var("SERVER_PORT", defaults.server.port)?,
                max_upload_bytes: var("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
                session_idle_ttl_secs: var(
                    "SESSION_IDLE_TTL_SECS",
                    defaults.server.session_idle_ttl_secs,
                )?,
                session_cleanup_interval_secs: var(
                    "SESSION_CLEANUP_INTERVAL_SECS",
                    defaults.server.session_cleanup_interval_secs,
                )?,
            },
            services: ServicesConfig {
                base_url: env::var("SERVICES_BASE_URL").unwrap_or(defaults.services.base_url),
                request_timeout_secs: var(
                    "SERVICES_REQUEST_TIMEOUT_SECS",
                    defaults.services.request_timeout_secs,
                )?,
                extraction_timeout_secs: var(
                    "EXTRACTION_TIMEOUT_SECS",
                    defaults.services.extraction_timeout_secs,
                )?,
            },
            viewer: ViewerConfig {
                min_annotation_size: var("MIN_ANNOTATION_SIZE", defaults.viewer.min_annotation_size)?,
                handle_size_px: var("HANDLE_SIZE_PX", defaults.viewer.handle_size_px)?,
                zoom_min: var("ZOOM_MIN", defaults.viewer.zoom_min)?,
                zoom_max: var("ZOOM_MAX", defaults.viewer.zoom_max)?,
                render_cache_capacity: var(
                    "RENDER_CACHE_CAPACITY",
                    defaults.viewer.render_cache_capacity,
                )?,
                max_viewport_px: var("MAX_VIEWPORT_PX", defaults.viewer.max_viewport_px)?,
            },
        };

        if !(config.viewer.zoom_min > 0.0 && config.viewer.zoom_min <= config.viewer.zoom_max) {
            return Err(ConfigError::Invalid {
                name: "ZOOM_MIN",
                value: format!("{} (ZOOM_MAX {})", config.viewer.zoom_min, config.viewer.zoom_max),
            });
        }

        Ok(config)
    }
}
