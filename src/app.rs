use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/refresh", post(handlers::refresh_page))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/kpis", get(handlers::get_kpis))
        .route("/api/top-clients", get(handlers::get_top_clients))
        .route("/api/revenue/daily", get(handlers::get_revenue_by_day))
        .route("/api/revenue/contacts", get(handlers::get_revenue_by_contact))
        .route("/api/clients/status", get(handlers::get_status_breakdown))
        .route("/api/churn/classification", get(handlers::get_classification_breakdown))
        .route("/api/refresh", post(handlers::refresh))
        .with_state(state)
}
