// Partner Discount Engine - Web Server
// JSON API over the SQLite store with Axum

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use partner_discount::logging::init_logger;
use partner_discount::{
    open_database, partner_discounts, tier_for, total_sales, AppConfig, DiscountError,
    DiscountTier, PartnerStore, SqliteStore, STANDARD_TIERS, VERSION,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "discount-server")]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, short, help = "Enable verbose output")]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
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

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

/// HTTP status for an engine error; faults in stored sales data are 422
fn discount_error_response(err: DiscountError) -> Response {
    if err.is_data_fault() {
        warn!("{}", err);
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string());
    }

    match &err {
        DiscountError::InvalidArgument { .. } => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        _ => {
            error!("storage failure: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Discount response for a single partner
#[derive(Serialize)]
struct PartnerDiscountResponse {
    partner_id: i64,
    name: String,
    total_sales: i64,
    discount_percent: u8,
    tier: DiscountTier,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/tiers - The discount bands
async fn get_tiers() -> Response {
    ApiResponse::ok(STANDARD_TIERS.to_vec())
}

/// GET /api/partners - Every partner with its current discount
async fn get_partners(State(state): State<AppState>) -> Response {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned".into())
        }
    };

    match partner_discounts(&SqliteStore::new(&conn)) {
        Ok(rows) => ApiResponse::ok(rows),
        Err(e) => discount_error_response(e),
    }
}

/// GET /api/partners/:id/discount - Discount for one partner
async fn get_partner_discount(
    State(state): State<AppState>,
    Path(partner_id): Path<i64>,
) -> Response {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned".into())
        }
    };
    let store = SqliteStore::new(&conn);

    let partner = match store.find_partner(partner_id) {
        Ok(Some(partner)) => partner,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Partner {} not found", partner_id),
            )
        }
        Err(e) => return discount_error_response(e.into()),
    };

    let result = total_sales(&store, partner_id)
        .and_then(|total| tier_for(total).map(|tier| (total, *tier)));

    match result {
        Ok((total, tier)) => ApiResponse::ok(PartnerDiscountResponse {
            partner_id: partner.id,
            name: partner.name,
            total_sales: total,
            discount_percent: tier.percent,
            tier,
        }),
        Err(e) => discount_error_response(e),
    }
}

/// GET /api/partners/:id/sales - Sales history with product names
async fn get_partner_sales(
    State(state): State<AppState>,
    Path(partner_id): Path<i64>,
) -> Response {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned".into())
        }
    };
    let store = SqliteStore::new(&conn);

    match store.find_partner(partner_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Partner {} not found", partner_id),
            )
        }
        Err(e) => return discount_error_response(e.into()),
    }

    match store.sales_history_view(Some(partner_id)) {
        Ok(entries) => ApiResponse::ok(entries),
        Err(e) => discount_error_response(e.into()),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/tiers", get(get_tiers))
        .route("/partners", get(get_partners))
        .route("/partners/:id/discount", get(get_partner_discount))
        .route("/partners/:id/sales", get(get_partner_sales))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;
    init_logger(&config.logging, args.verbose);

    let conn = open_database(&config.database.path)?;
    info!(path = ?config.database.path, "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("discount-server {} running on http://{}", VERSION, config.server.bind);
    info!("API: http://{}/api/partners", config.server.bind);

    axum::serve(listener, router(state)).await?;

    Ok(())
}
