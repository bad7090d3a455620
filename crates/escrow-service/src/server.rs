//! HTTP server for the escrow dashboard API.
//!
//! Exposes the engine's snapshot channels for display and accepts the two
//! operator transitions plus navigation of the active view.

use crate::apis::{self, view::NavigateRequest, ApiError};
use axum::{
	extract::{Path, State},
	response::Json,
	routing::{get, post},
	Router,
};
use escrow_config::ApiConfig;
use escrow_core::EscrowEngine;
use escrow_types::{DerivedOrderRequest, Order, Transition};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<EscrowEngine>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<EscrowEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Escrow API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with every endpoint nested under `/api`.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders/current", get(handle_current_orders))
				.route("/orders/{id}", get(handle_category_orders))
				.route("/orders/{id}/delivering", post(handle_mark_delivering))
				.route("/orders/{id}/refunding", post(handle_mark_refunding))
				.route("/signing-queue", get(handle_signing_queue))
				.route("/view", get(handle_get_view).post(handle_navigate)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Handles GET /api/orders/current requests.
async fn handle_current_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
	Json(apis::orders::current_orders(&state.engine))
}

/// Handles GET /api/orders/{category} requests.
///
/// Shares the `{id}` segment with the transition routes.
async fn handle_category_orders(
	Path(category): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, ApiError> {
	apis::orders::category_orders(&state.engine, &category).map(Json)
}

/// Handles GET /api/signing-queue requests.
async fn handle_signing_queue(State(state): State<AppState>) -> Json<Vec<DerivedOrderRequest>> {
	Json(apis::orders::signing_queue(&state.engine))
}

async fn handle_get_view(State(state): State<AppState>) -> Json<apis::view::ViewResponse> {
	Json(apis::view::active_view(&state.engine))
}

/// Handles POST /api/view requests.
async fn handle_navigate(
	State(state): State<AppState>,
	Json(request): Json<NavigateRequest>,
) -> Json<apis::view::ViewResponse> {
	Json(apis::view::navigate(&state.engine, &request))
}

/// Handles POST /api/orders/{id}/delivering requests.
async fn handle_mark_delivering(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<apis::orders::TransitionResponse>, ApiError> {
	transition(&state, &id, Transition::Deliver).await
}

/// Handles POST /api/orders/{id}/refunding requests.
async fn handle_mark_refunding(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<apis::orders::TransitionResponse>, ApiError> {
	transition(&state, &id, Transition::Refund).await
}

async fn transition(
	state: &AppState,
	order_id: &str,
	transition: Transition,
) -> Result<Json<apis::orders::TransitionResponse>, ApiError> {
	match apis::orders::apply_transition(&state.engine, order_id, transition).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Transition request failed: {}", e);
			Err(e)
		},
	}
}
