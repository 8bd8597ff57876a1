//! # Session Parameter Validation
//!
//! Parses and validates the query parameters a client supplies when opening
//! a connection, against a fixed schema with defaults. Validation rejects on
//! the first failure; a rejected connection is closed with a policy-violation
//! outcome before any audio is accepted.
//!
//! ## Schema:
//! | Key | Required | Default | Validation |
//! |---|---|---|---|
//! | `token` | yes | — | member of the configured token list |
//! | `language` | no | `audio.default_language` | member of the supported set |
//! | `encoding` | no | `audio.default_encoding` | member of the supported set |
//! | `sampleRate` | no | `audio.default_sample_rate` | integer in [8000, 48000] |
//! | `interimResults` | no | `true` | literal `"true"` / `"false"` |

use std::collections::HashMap;

use crate::config::AppConfig;
use crate::engine::StreamingRequest;
use crate::error::{AppError, AppResult};

/// Inclusive sample-rate bounds accepted from clients, in hertz.
pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 48000;

/// Validated per-connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub language: String,
    pub encoding: String,
    pub sample_rate: u32,

    /// Whether partial (interim) results are forwarded to this client
    pub interim_results: bool,
}

impl SessionParams {
    /// Parse and validate the connection query string.
    ///
    /// Checks run in schema order and stop at the first failure:
    /// credential, language, encoding, sample rate, interim-results flag.
    /// The returned error message is safe to echo to the client.
    pub fn from_query(
        query: &HashMap<String, String>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let token = query
            .get("token")
            .map(String::as_str)
            .unwrap_or_default();
        if token.is_empty() {
            return Err(AppError::Validation(
                "Missing required 'token' parameter".to_string(),
            ));
        }
        if !config.auth.tokens.iter().any(|accepted| accepted == token) {
            return Err(AppError::Validation("Invalid token".to_string()));
        }

        let language = match query.get("language") {
            Some(language) if config.audio.supported_languages.contains(language) => {
                language.clone()
            }
            Some(language) => {
                return Err(AppError::Validation(format!(
                    "Unsupported language '{}'",
                    language
                )));
            }
            None => config.audio.default_language.clone(),
        };

        let encoding = match query.get("encoding") {
            Some(encoding) if config.audio.supported_encodings.contains(encoding) => {
                encoding.clone()
            }
            Some(encoding) => {
                return Err(AppError::Validation(format!(
                    "Unsupported encoding '{}'",
                    encoding
                )));
            }
            None => config.audio.default_encoding.clone(),
        };

        let sample_rate = match query.get("sampleRate") {
            Some(raw) => {
                let rate: u32 = raw.parse().map_err(|_| {
                    AppError::Validation(format!("'sampleRate' must be an integer, got '{}'", raw))
                })?;
                if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
                    return Err(AppError::Validation(format!(
                        "'sampleRate' must be between {} and {}, got {}",
                        MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, rate
                    )));
                }
                rate
            }
            None => config.audio.default_sample_rate,
        };

        let interim_results = match query.get("interimResults").map(String::as_str) {
            Some("true") | None => true,
            Some("false") => false,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "'interimResults' must be \"true\" or \"false\", got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            language,
            encoding,
            sample_rate,
            interim_results,
        })
    }

    /// Wire form handed to the engine.
    pub fn to_streaming_request(&self) -> StreamingRequest {
        StreamingRequest {
            language: self.language.clone(),
            encoding: self.encoding.clone(),
            sample_rate: self.sample_rate,
            interim_results: self.interim_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.tokens = vec!["secret-a".to_string(), "secret-b".to_string()];
        config
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied_with_only_a_token() {
        let params =
            SessionParams::from_query(&query(&[("token", "secret-a")]), &config()).unwrap();
        assert_eq!(params.language, "en-US");
        assert_eq!(params.encoding, "LINEAR16");
        assert_eq!(params.sample_rate, 16000);
        assert!(params.interim_results);
    }

    #[test]
    fn test_all_parameters_accepted_when_valid() {
        let params = SessionParams::from_query(
            &query(&[
                ("token", "secret-b"),
                ("language", "de-DE"),
                ("encoding", "FLAC"),
                ("sampleRate", "44100"),
                ("interimResults", "false"),
            ]),
            &config(),
        )
        .unwrap();
        assert_eq!(params.language, "de-DE");
        assert_eq!(params.encoding, "FLAC");
        assert_eq!(params.sample_rate, 44100);
        assert!(!params.interim_results);
    }

    #[test]
    fn test_missing_token_rejected() {
        let err = SessionParams::from_query(&query(&[]), &config()).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err =
            SessionParams::from_query(&query(&[("token", "wrong")]), &config()).unwrap_err();
        assert!(err.to_string().contains("Invalid token"));
    }

    #[test]
    fn test_unsupported_language_rejected() {
        let err = SessionParams::from_query(
            &query(&[("token", "secret-a"), ("language", "xx-XX")]),
            &config(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn test_unsupported_encoding_rejected() {
        let err = SessionParams::from_query(
            &query(&[("token", "secret-a"), ("encoding", "AMR")]),
            &config(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("encoding"));
    }

    #[test]
    fn test_sample_rate_bounds_are_inclusive() {
        for rate in ["8000", "48000"] {
            assert!(SessionParams::from_query(
                &query(&[("token", "secret-a"), ("sampleRate", rate)]),
                &config(),
            )
            .is_ok());
        }

        for rate in ["7999", "48001", "0", "-1", "16k"] {
            assert!(SessionParams::from_query(
                &query(&[("token", "secret-a"), ("sampleRate", rate)]),
                &config(),
            )
            .is_err());
        }
    }

    #[test]
    fn test_interim_results_accepts_only_literal_booleans() {
        let params = SessionParams::from_query(
            &query(&[("token", "secret-a"), ("interimResults", "false")]),
            &config(),
        )
        .unwrap();
        assert!(!params.interim_results);

        for bad in ["TRUE", "1", "yes", ""] {
            assert!(SessionParams::from_query(
                &query(&[("token", "secret-a"), ("interimResults", bad)]),
                &config(),
            )
            .is_err());
        }
    }

    #[test]
    fn test_streaming_request_mirrors_params() {
        let params =
            SessionParams::from_query(&query(&[("token", "secret-a")]), &config()).unwrap();
        let request = params.to_streaming_request();
        assert_eq!(request.language, params.language);
        assert_eq!(request.sample_rate, params.sample_rate);
        assert!(request.interim_results);
    }
}
