//! # Configuration Management
//!
//! This module handles loading and managing application configuration from
//! multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! ## Sections:
//! - `server`: bind address for the HTTP/WebSocket listener
//! - `auth`: accepted connection credentials
//! - `audio`: default and supported transcription parameters
//! - `limits`: admission ceiling for concurrent sessions
//! - `engine`: external engine selection and the startup timeout

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub audio: AudioConfig,
    pub limits: LimitsConfig,
    pub engine: EngineConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Authorization settings for incoming connections.
///
/// A connection's `token` query parameter must match one of `tokens`
/// exactly. The list is fixed at startup; there is no runtime rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub tokens: Vec<String>,
}

/// Transcription parameter defaults and the fixed supported sets.
///
/// ## Fields:
/// - `default_language` / `supported_languages`: BCP-47 locale tags
/// - `default_encoding` / `supported_encodings`: wire names understood by
///   the external engine (e.g. "LINEAR16")
/// - `default_sample_rate`: applied when the client omits `sampleRate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub default_encoding: String,
    pub supported_encodings: Vec<String>,
    pub default_sample_rate: u32,
}

/// Admission limits.
///
/// `max_sessions` is the hard ceiling on concurrently active transcription
/// sessions; the (K+1)-th connection is refused with a "server busy" close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_sessions: usize,
}

/// External engine selection and timing.
///
/// ## Fields:
/// - `provider`: which `SpeechEngine` backend to construct ("stub")
/// - `startup_timeout_secs`: how long the engine may take to accept a
///   streaming request before the session is abandoned with a normal closure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub provider: String,
    pub startup_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            auth: AuthConfig {
                // Placeholder credential; deployments override via config.toml
                // or APP_AUTH_TOKENS.
                tokens: vec!["change-me".to_string()],
            },
            audio: AudioConfig {
                default_language: "en-US".to_string(),
                supported_languages: vec![
                    "en-US".to_string(),
                    "en-GB".to_string(),
                    "es-ES".to_string(),
                    "fr-FR".to_string(),
                    "de-DE".to_string(),
                    "hi-IN".to_string(),
                ],
                default_encoding: "LINEAR16".to_string(),
                supported_encodings: vec![
                    "LINEAR16".to_string(),
                    "FLAC".to_string(),
                    "MULAW".to_string(),
                    "OGG_OPUS".to_string(),
                ],
                default_sample_rate: 16000,
            },
            limits: LimitsConfig { max_sessions: 10 },
            engine: EngineConfig {
                provider: "stub".to_string(),
                startup_timeout_secs: 30,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - At least one accepted credential is configured
    /// - The admission ceiling allows at least one session
    /// - The startup timeout is non-zero
    /// - Configured defaults are members of their supported sets
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.auth.tokens.is_empty() {
            return Err(anyhow::anyhow!("At least one auth token must be configured"));
        }

        if self.limits.max_sessions == 0 {
            return Err(anyhow::anyhow!("Max sessions must be greater than 0"));
        }

        if self.engine.startup_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Engine startup timeout must be greater than 0"));
        }

        if !self
            .audio
            .supported_languages
            .contains(&self.audio.default_language)
        {
            return Err(anyhow::anyhow!(
                "Default language '{}' is not in the supported set",
                self.audio.default_language
            ));
        }

        if !self
            .audio
            .supported_encodings
            .contains(&self.audio.default_encoding)
        {
            return Err(anyhow::anyhow!(
                "Default encoding '{}' is not in the supported set",
                self.audio.default_encoding
            ));
        }

        Ok(())
    }
}
