//! HTTP gateway for the escrow backend.
//!
//! Reads are JSON `GET`s against a fixed base URL. Transitions are
//! form-encoded `POST`s carrying the order id. A client error on a transition
//! means the backend refused it; server errors and connection failures are
//! transport errors the caller may retry.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use escrow_types::{
	truncate_id, ImplementationRegistry, MultiSigUtxo, Order, OrderCategory,
	PartiallySignedTransaction, Transition,
};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const MULTI_SIG_UTXO_PATH: &str = "/multi-sig-utxo";
const PARTIALLY_SIGNED_PATH: &str = "/transaction/partially-signed";

/// Settings read from `[backend.implementations.http]`.
#[derive(Debug, Deserialize)]
struct HttpGatewayConfig {
	base_url: String,
	#[serde(default = "default_timeout_seconds")]
	timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	30
}

/// Gateway speaking the escrow backend's JSON-over-HTTP API.
pub struct HttpGateway {
	client: Client,
	/// Base URL without a trailing slash.
	base_url: String,
}

impl HttpGateway {
	/// Creates a gateway for `base_url` with the given request timeout.
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
		let parsed = Url::parse(base_url)
			.map_err(|e| GatewayError::Configuration(format!("Invalid base_url: {}", e)))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(GatewayError::Configuration(format!(
				"base_url must use http or https, got '{}'",
				parsed.scheme()
			)));
		}

		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
		let response = self
			.client
			.get(self.url(path))
			.send()
			.await
			.map_err(|e| GatewayError::Transport(format!("GET {} failed: {}", path, e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(GatewayError::Transport(format!(
				"GET {} returned {}",
				path, status
			)));
		}

		let body = response
			.bytes()
			.await
			.map_err(|e| GatewayError::Transport(format!("GET {} body: {}", path, e)))?;

		serde_json::from_slice(&body).map_err(|e| GatewayError::MalformedResponse {
			endpoint: path.to_string(),
			reason: e.to_string(),
		})
	}
}

/// Interprets a successful transition body.
///
/// An empty body or anything other than a literal JSON `false` counts as an
/// acknowledgement.
fn acknowledged(body: &str) -> bool {
	!matches!(
		serde_json::from_str::<serde_json::Value>(body),
		Ok(serde_json::Value::Bool(false))
	)
}

#[async_trait]
impl GatewayInterface for HttpGateway {
	async fn fetch_orders(&self, category: OrderCategory) -> Result<Vec<Order>, GatewayError> {
		self.get_json(category.path()).await
	}

	async fn fetch_multi_sig_utxos(&self) -> Result<Vec<MultiSigUtxo>, GatewayError> {
		self.get_json(MULTI_SIG_UTXO_PATH).await
	}

	async fn fetch_partially_signed_transactions(
		&self,
	) -> Result<Vec<PartiallySignedTransaction>, GatewayError> {
		self.get_json(PARTIALLY_SIGNED_PATH).await
	}

	async fn submit_transition(
		&self,
		order_id: &str,
		transition: Transition,
	) -> Result<(), GatewayError> {
		let path = transition.path();
		let response = self
			.client
			.post(self.url(path))
			.form(&[("order_id", order_id)])
			.send()
			.await
			.map_err(|e| GatewayError::Transport(format!("POST {} failed: {}", path, e)))?;

		let status = response.status();
		let body = match response.text().await {
			Ok(body) => body,
			// A refusal stands on its status alone
			Err(_) if status.is_client_error() => String::new(),
			Err(e) => {
				return Err(GatewayError::Transport(format!("POST {} body: {}", path, e)));
			},
		};

		if status.is_client_error() {
			tracing::debug!(
				order_id = %truncate_id(order_id),
				status = %status,
				"Backend refused transition"
			);
			return Err(GatewayError::RejectedTransition {
				order_id: order_id.to_string(),
				reason: rejection_reason(status, &body),
			});
		}
		if !status.is_success() {
			return Err(GatewayError::Transport(format!(
				"POST {} returned {}",
				path, status
			)));
		}
		if !acknowledged(&body) {
			return Err(GatewayError::RejectedTransition {
				order_id: order_id.to_string(),
				reason: format!("backend did not acknowledge {}", transition),
			});
		}

		Ok(())
	}
}

fn rejection_reason(status: StatusCode, body: &str) -> String {
	let body = body.trim();
	if body.is_empty() {
		status.to_string()
	} else {
		format!("{}: {}", status, body)
	}
}

/// Factory function to create an HTTP gateway from configuration.
///
/// Configuration parameters:
/// - `base_url`: backend root URL (required)
/// - `timeout_seconds`: per-request timeout (default: 30)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	let config: HttpGatewayConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid http gateway config: {}", e)))?;

	if config.timeout_seconds == 0 {
		return Err(GatewayError::Configuration(
			"timeout_seconds must be greater than 0".into(),
		));
	}

	let gateway = HttpGateway::new(
		&config.base_url,
		Duration::from_secs(config.timeout_seconds),
	)?;
	Ok(Box::new(gateway))
}

/// Registry for the HTTP gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}
