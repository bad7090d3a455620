//! Loader for configurations split across several files.
//!
//! A root file may name other files through `include`; every top-level section
//! must come from exactly one file so that merging never silently overrides.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a root configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, used to reject include cycles.
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section was first seen in.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root_path = self.resolve_path(config_path)?;
		let root_content = self.read_resolved(&root_path).await?;
		let mut root: toml::Value = toml::from_str(&root_content)?;

		let includes = Self::include_list(&root)?;
		if includes.is_empty() {
			return root_content.parse();
		}

		if let Some(table) = root.as_table_mut() {
			table.remove("include");
			for section in table.keys() {
				self.section_sources
					.insert(section.clone(), root_path.clone());
			}
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let content = self.read_resolved(&include_path).await?;
			let fragment: toml::Value = toml::from_str(&content)?;
			self.merge_fragment(&mut root, fragment, &include_path)?;
		}

		let merged = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		merged.parse()
	}

	/// Reads a file once and substitutes environment variables.
	async fn read_resolved(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Accepts `include = "a.toml"` as well as `include = ["a.toml", "b.toml"]`.
	fn include_list(root: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		match root.get("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.iter()
				.map(|item| {
					item.as_str().map(PathBuf::from).ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	fn merge_fragment(
		&mut self,
		root: &mut toml::Value,
		fragment: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let toml::Value::Table(sections) = fragment else {
			return Ok(());
		};

		for (section, value) in sections {
			if let Some(existing) = self.section_sources.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					section,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources
				.insert(section.clone(), source.to_path_buf());
			if let Some(table) = root.as_table_mut() {
				table.insert(section, value);
			}
		}

		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use escrow_types::OrderCategory;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");

		let config_content = r#"
[service]
id = "merchant-dashboard"
initial_view = "pending"

[backend]
primary = "memory"
[backend.implementations.memory]

[sync]
poll_interval_ms = 1000
"#;

		fs::write(&config_path, config_content).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "merchant-dashboard");
		assert_eq!(config.service.initial_view, Some(OrderCategory::Pending));
		assert_eq!(config.sync.poll_interval_ms, 1000);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["backend.toml", "api.toml"]

[service]
id = "merchant-dashboard"
"#;

		let backend_config = r#"
[backend]
primary = "http"
[backend.implementations.http]
base_url = "http://localhost:8080"
"#;

		let api_config = r#"
[api]
enabled = true
port = 3100
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("backend.toml"), backend_config).unwrap();
		fs::write(temp_dir.path().join("api.toml"), api_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.service.id, "merchant-dashboard");
		assert_eq!(config.backend.primary, "http");
		assert_eq!(config.api.map(|api| api.port), Some(3100));
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();

		fs::write(
			temp_dir.path().join("main.toml"),
			"include = \"backend.toml\"\n[service]\nid = \"ops\"\n",
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("backend.toml"),
			"[backend]\nprimary = \"memory\"\n[backend.implementations.memory]\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		assert_eq!(config.backend.primary, "memory");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["duplicate.toml"]

[service]
id = "merchant-dashboard"
"#;

		let duplicate_config = r#"
[service]
id = "another-dashboard"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = r#"
include = ["self.toml"]

[service]
id = "merchant-dashboard"
"#;

		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"absent.toml\"]\n[service]\nid = \"ops\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[tokio::test]
	async fn test_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("dashboard.toml");
		fs::write(
			&config_path,
			"[service]\nid = \"ops\"\n[backend]\nprimary = \"memory\"\n[backend.implementations.memory]\n",
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.service.id, "ops");
	}
}
