//! HTTP handlers of the escrow dashboard API.
//!
//! Every handler is a thin adapter over the engine: reads come straight from
//! the snapshot channels, writes go through the view selector or the action
//! dispatcher.

pub mod orders;
pub mod view;

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use escrow_core::ActionError;
use escrow_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// Body returned with every non-success response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Errors surfaced by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("Unknown order category: {0}")]
	UnknownCategory(String),
	#[error("{0}")]
	Action(#[from] ActionError),
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::UnknownCategory(_) => StatusCode::NOT_FOUND,
			ApiError::Action(ActionError::EmptyOrderId) => StatusCode::BAD_REQUEST,
			ApiError::Action(ActionError::Gateway(e)) => match e {
				GatewayError::RejectedTransition { .. } => StatusCode::CONFLICT,
				GatewayError::Transport(_) | GatewayError::MalformedResponse { .. } => {
					StatusCode::BAD_GATEWAY
				},
				GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
			},
		}
	}

	fn error_code(&self) -> &'static str {
		match self {
			ApiError::UnknownCategory(_) => "UNKNOWN_CATEGORY",
			ApiError::Action(ActionError::EmptyOrderId) => "INVALID_ORDER_ID",
			ApiError::Action(ActionError::Gateway(e)) => match e {
				GatewayError::RejectedTransition { .. } => "TRANSITION_REJECTED",
				GatewayError::Transport(_) => "BACKEND_UNAVAILABLE",
				GatewayError::MalformedResponse { .. } => "BACKEND_MALFORMED",
				GatewayError::Configuration(_) => "INTERNAL_ERROR",
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorResponse {
			error: self.error_code().to_string(),
			message: self.to_string(),
		};
		(self.status_code(), Json(body)).into_response()
	}
}
