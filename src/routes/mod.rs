use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer};
use crate::handlers::{health_check, payments};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/payments", post(payments::create_payment))
        .route("/payments/webhook", post(payments::process_webhook))
        .route(
            "/payments/:transaction_id",
            get(payments::get_transaction_status),
        )
        .route("/tickets/my", get(payments::get_my_tickets))
        .route("/tickets/:ticket_id", get(payments::get_ticket))
        .route("/tickets/:ticket_id/refund", post(payments::refund_ticket))
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api);

    apply_security_headers(router)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
}
