use crate::aggregator::{
    build_dashboard, classification_breakdown, compute_kpis, parse_limit, parse_window_days,
    revenue_by_contact, revenue_by_day, status_breakdown, top_clients_by_revenue,
    TOP_CLIENTS_LIMIT, TOP_CONTACTS_LIMIT,
};
use crate::errors::AppError;
use crate::models::{
    ClassificationSummary, ContactRevenue, DashboardResponse, DayRevenue, Kpis, RefreshResponse,
    StatusShare, TopClient, WindowQuery,
};
use crate::state::AppState;
use crate::storage::read_snapshot;
use crate::ui::render_dashboard;
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Html<String> {
    let snapshot = state.snapshot().await;
    let dashboard = build_dashboard(&snapshot, window_days(&query));
    Html(render_dashboard(&dashboard))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let snapshot = state.snapshot().await;
    Ok(Json(build_dashboard(&snapshot, window_days(&query))))
}

pub async fn get_kpis(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Kpis>, AppError> {
    let snapshot = state.snapshot().await;
    Ok(Json(compute_kpis(
        Utc::now(),
        &snapshot.movements,
        &snapshot.churn,
        &snapshot.stats,
        window_days(&query),
    )))
}

pub async fn get_top_clients(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<TopClient>>, AppError> {
    let snapshot = state.snapshot().await;
    let limit = parse_limit(query.limit.as_deref(), TOP_CLIENTS_LIMIT);
    Ok(Json(top_clients_by_revenue(
        Utc::now(),
        &snapshot.churn,
        window_days(&query),
        limit,
    )))
}

pub async fn get_revenue_by_day(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<DayRevenue>>, AppError> {
    let snapshot = state.snapshot().await;
    Ok(Json(revenue_by_day(
        Utc::now(),
        &snapshot.movements,
        window_days(&query),
    )))
}

pub async fn get_revenue_by_contact(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<ContactRevenue>>, AppError> {
    let snapshot = state.snapshot().await;
    let limit = parse_limit(query.limit.as_deref(), TOP_CONTACTS_LIMIT);
    Ok(Json(revenue_by_contact(&snapshot.movements, limit)))
}

pub async fn get_status_breakdown(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusShare>>, AppError> {
    let snapshot = state.snapshot().await;
    Ok(Json(status_breakdown(&snapshot.clients)))
}

pub async fn get_classification_breakdown(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassificationSummary>>, AppError> {
    let snapshot = state.snapshot().await;
    Ok(Json(classification_breakdown(&snapshot.churn)))
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let response = reload_snapshot(&state).await?;
    Ok(Json(response))
}

pub async fn refresh_page(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Redirect, AppError> {
    reload_snapshot(&state).await?;
    Ok(Redirect::to(&format!("/?days={}", window_days(&query))))
}

async fn reload_snapshot(state: &AppState) -> Result<RefreshResponse, AppError> {
    let Some(_gate) = state.try_begin_refresh() else {
        warn!("refresh rejected: another refresh is in flight");
        return Err(AppError::conflict("a refresh is already in progress"));
    };

    let snapshot = read_snapshot(&state.data_path).await?;
    let response = RefreshResponse {
        clients: snapshot.clients.len(),
        movements: snapshot.movements.len(),
        churn: snapshot.churn.len(),
    };
    state.replace_snapshot(snapshot).await;

    info!(path = %state.data_path.display(), "snapshot refreshed");
    Ok(response)
}

fn window_days(query: &WindowQuery) -> i64 {
    parse_window_days(query.days.as_deref())
}
