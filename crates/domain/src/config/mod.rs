//! TOML configuration.
//!
//! Every section is optional: an empty file yields a fully defaulted config
//! suitable for local development.

mod server;
mod services;

pub use server::{CorsConfig, ServerConfig};
pub use services::{FileConfig, ModelConfig, SigningConfig, StorageConfig, StreamConfig};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub files: FileConfig,
    #[serde(default)]
    pub streams: StreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8040);
        assert_eq!(cfg.files.max_attachment_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.streams.max_buffer_age_secs, 300);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [streams]
            sweep_interval_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.streams.sweep_interval_secs, 15);
        assert_eq!(cfg.streams.max_buffer_age_secs, 300);
    }
}
