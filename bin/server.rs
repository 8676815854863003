// Family Expenses - Read-only REST API
// Serves the same ledgers, reports and charts the TUI shows

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use family_expenses::{
    format_colones, init_tracing, render_report, AppConfig, ChartBoard, ChartSpec, Expense, Report,
    Session, UserEntry,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
}

impl AppState {
    fn new(session: Session) -> Self {
        AppState {
            session: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, ApiError> {
        self.session.lock().map_err(|_| {
            error!("session lock poisoned");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, "session unavailable".into())
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.1),
        };
        (self.0, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct UserResponse {
    #[serde(flatten)]
    user: UserEntry,
    expenses_url: String,
}

impl From<UserEntry> for UserResponse {
    fn from(user: UserEntry) -> Self {
        let expenses_url = format!("/api/users/{}/expenses", urlencoding::encode(&user.username));
        Self { user, expenses_url }
    }
}

#[derive(Serialize)]
struct LedgerResponse {
    username: String,
    expenses: Vec<Expense>,
    total: f64,
    total_display: String,
}

#[derive(Deserialize)]
struct ReportQuery {
    /// Anchor day for the month windows; defaults to today (UTC)
    today: Option<NaiveDate>,
}

impl ReportQuery {
    fn anchor(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/users - Local accounts plus cloud profiles
async fn get_users(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let session = state.lock()?;
    let users = session.users().into_iter().map(UserResponse::from).collect();
    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/users/:username/expenses - One user's local ledger
async fn get_user_expenses(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<LedgerResponse>>, ApiError> {
    let session = state.lock()?;
    let mut ledger = session.store().load_expenses();

    let expenses = ledger
        .remove(&username)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("no ledger for user {}", username)))?;
    let total = family_expenses::reports::total(&expenses);

    Ok(Json(ApiResponse::ok(LedgerResponse {
        username,
        expenses,
        total,
        total_display: format_colones(total),
    })))
}

/// GET /api/report - Combined report across all users
async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Report>>, ApiError> {
    let session = state.lock()?;
    Ok(Json(ApiResponse::ok(session.report(query.anchor()))))
}

/// GET /api/charts - Chart descriptors for the combined report
async fn get_charts(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Vec<ChartSpec>>>, ApiError> {
    let report = state.lock()?.report(query.anchor());

    let mut board = ChartBoard::default();
    render_report(&report, &mut board);
    Ok(Json(ApiResponse::ok(board.charts().to_vec())))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/users", get(get_users))
        .route("/users/:username/expenses", get(get_user_expenses))
        .route("/report", get(get_report))
        .route("/charts", get(get_charts))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info,tower_http=debug");

    let config = AppConfig::from_env()?;
    let session = Session::from_config(&config)?;
    info!(db = %config.db_path.display(), cloud = config.cloud_enabled(), "store opened");

    let app = router(AppState::new(session));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "🚀 server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
