//! Configuration module for the escrow order dashboard.
//!
//! This module provides structures and utilities for managing dashboard
//! configuration. It supports loading configuration from TOML files and
//! validates that the backend gateway, polling cadence and optional API
//! server are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use escrow_types::{MatchPolicy, OrderCategory};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// The TOML could not be parsed into a [`Config`].
	#[error("Parse error: {0}")]
	Parse(String),
	/// The configuration parsed but is not usable.
	#[error("Invalid configuration: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The Display form echoes the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the dashboard service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Configuration for the backend gateway.
	pub backend: BackendConfig,
	/// Polling and derivation settings.
	#[serde(default)]
	pub sync: SyncConfig,
	/// Optional HTTP API exposing the snapshots and operator actions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
	pub enabled: bool,
	pub host: String,
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			host: "127.0.0.1".to_string(),
			port: 3000,
		}
	}
}

/// Largest configuration text accepted for substitution.
const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// `${NAME}` or `${NAME:-fallback}`.
const ENV_REFERENCE: &str = r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}";

/// Substitutes environment references in configuration text.
///
/// A reference to an unset variable without a fallback is an error; every
/// such variable is named in it.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_BYTES {
		return Err(ConfigError::Validation(format!(
			"configuration is {} bytes, the limit is {}",
			input.len(),
			MAX_CONFIG_BYTES
		)));
	}

	let pattern = Regex::new(ENV_REFERENCE).map_err(|e| ConfigError::Parse(e.to_string()))?;

	let mut unset = Vec::new();
	let resolved = pattern.replace_all(input, |caps: &Captures<'_>| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(fallback)) => fallback.as_str().to_string(),
			(Err(_), None) => {
				unset.push(name.to_string());
				String::new()
			},
		}
	});

	if !unset.is_empty() {
		return Err(ConfigError::Validation(format!(
			"environment variables not set: {}",
			unset.join(", ")
		)));
	}
	Ok(resolved.into_owned())
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// Supports modular configuration through `include = [..]` directives.
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the configuration of the primary backend implementation.
	pub fn primary_backend(&self) -> Option<&toml::Value> {
		self.backend.implementations.get(&self.backend.primary)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Validate backend config
		if self.backend.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one backend implementation must be configured".into(),
			));
		}
		if self.backend.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Backend primary implementation cannot be empty".into(),
			));
		}
		if self.primary_backend().is_none() {
			return Err(ConfigError::Validation(format!(
				"Primary backend '{}' not found in implementations",
				self.backend.primary
			)));
		}

		// Validate sync config
		if self.sync.poll_interval_ms < 100 {
			return Err(ConfigError::Validation(
				"sync.poll_interval_ms must be at least 100".into(),
			));
		}
		if self.sync.poll_interval_ms > 3_600_000 {
			return Err(ConfigError::Validation(
				"sync.poll_interval_ms cannot exceed 3600000 (1 hour)".into(),
			));
		}
		if self.sync.event_capacity == 0 {
			return Err(ConfigError::Validation(
				"sync.event_capacity must be greater than 0".into(),
			));
		}

		// Validate API config if enabled
		if let Some(ref api) = self.api {
			if api.enabled && api.host.is_empty() {
				return Err(ConfigError::Validation(
					"API host cannot be empty when the API is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "merchant-dashboard"

[backend]
primary = "http"
[backend.implementations.http]
base_url = "http://localhost:8080"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ESCROW_TEST_HOST", "localhost");
		std::env::set_var("ESCROW_TEST_PORT", "8080");

		let input = "base_url = \"http://${ESCROW_TEST_HOST}:${ESCROW_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "base_url = \"http://localhost:8080\"");

		std::env::remove_var("ESCROW_TEST_HOST");
		std::env::remove_var("ESCROW_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${ESCROW_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${ESCROW_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("ESCROW_MISSING_VAR"));
	}

	#[test]
	fn test_every_unset_env_var_is_reported() {
		let input = "a = \"${ESCROW_UNSET_A}\"\nb = \"${ESCROW_UNSET_B}\"";
		let message = resolve_env_vars(input).unwrap_err().to_string();
		assert!(message.contains("ESCROW_UNSET_A, ESCROW_UNSET_B"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "merchant-dashboard");
		assert_eq!(config.service.initial_view, None);
		assert_eq!(config.sync.poll_interval(), Duration::from_millis(2000));
		assert!(config.sync.signing_queue);
		assert_eq!(config.sync.match_policy, MatchPolicy::FirstMatch);
		assert!(config.api.is_none());
		assert!(config.primary_backend().is_some());
	}

	#[test]
	fn test_full_config() {
		let config_str = r#"
[service]
id = "${ESCROW_TEST_SERVICE_ID:-ops}"
initial_view = "outstanding"

[backend]
primary = "memory"
[backend.implementations.memory]
[backend.implementations.http]
base_url = "http://localhost:8080"
timeout_seconds = 10

[sync]
poll_interval_ms = 5000
signing_queue = false
match_policy = "strict"

[api]
enabled = true
port = 4000
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "ops");
		assert_eq!(config.service.initial_view, Some(OrderCategory::Outstanding));
		assert_eq!(config.backend.primary, "memory");
		assert_eq!(config.sync.poll_interval_ms, 5000);
		assert!(!config.sync.signing_queue);
		assert_eq!(config.sync.match_policy, MatchPolicy::Strict);

		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 4000);
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = r#"
[service]
id = "ops"

[backend]
primary = "grpc"
[backend.implementations.http]
base_url = "http://localhost:8080"
"#;

		let err = Config::from_str(config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary backend 'grpc' not found"));
	}

	#[test]
	fn test_poll_interval_bounds() {
		let too_fast = format!("{}\n[sync]\npoll_interval_ms = 10\n", MINIMAL);
		let err = Config::from_str(&too_fast).unwrap_err();
		assert!(err.to_string().contains("at least 100"));

		let too_slow = format!("{}\n[sync]\npoll_interval_ms = 7200000\n", MINIMAL);
		assert!(Config::from_str(&too_slow).is_err());
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("merchant-dashboard", "");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Service ID cannot be empty"));
	}

	#[test]
	fn test_unknown_view_rejected() {
		let config_str = MINIMAL.replace(
			"id = \"merchant-dashboard\"",
			"id = \"ops\"\ninitial_view = \"archived\"",
		);
		assert!(matches!(
			Config::from_str(&config_str),
			Err(ConfigError::Parse(_))
		));
	}
}
