//! Builder for constructing escrow engines.
//!
//! Selects the backend gateway named in the configuration from a set of
//! factory functions and wires the engine around it.

use crate::engine::{event_bus::EventBus, EscrowEngine};
use escrow_config::Config;
use escrow_gateway::{GatewayError, GatewayInterface, GatewayService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct EscrowFactories<GF> {
	pub gateway_factories: HashMap<String, GF>,
}

/// Builder for an [`EscrowEngine`] with a pluggable backend gateway.
pub struct EscrowBuilder {
	config: Config,
}

impl EscrowBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates every configured gateway implementation and builds the engine
	/// around the primary one.
	pub fn build<GF>(self, factories: EscrowFactories<GF>) -> Result<EscrowEngine, BuilderError>
	where
		GF: Fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>,
	{
		let mut gateway_impls = HashMap::new();
		for (name, config) in &self.config.backend.implementations {
			let Some(factory) = factories.gateway_factories.get(name) else {
				tracing::warn!(component = "backend", implementation = %name, "No factory registered");
				continue;
			};

			match factory(config) {
				Ok(implementation) => {
					gateway_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.backend.primary == name;
					tracing::info!(component = "backend", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "backend",
						implementation = %name,
						error = %e,
						"Failed to create backend implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create backend implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if gateway_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid backend implementations available".into(),
			));
		}

		let primary = &self.config.backend.primary;
		let backend = gateway_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary backend '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let gateway = Arc::new(GatewayService::new(backend));
		let event_bus = EventBus::new(self.config.sync.event_capacity);

		Ok(EscrowEngine::new(self.config, gateway, event_bus))
	}
}
