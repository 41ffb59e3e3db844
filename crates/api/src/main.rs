use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use robotadvisor_core::domain::filter::FilterSelection;
use robotadvisor_core::domain::portfolio::Portfolio;
use robotadvisor_core::domain::recommendation::RecommendationResult;
use robotadvisor_core::domain::stock::StockMetrics;
use robotadvisor_core::service::{AdvisorService, StockDetails};
use robotadvisor_core::storage::PgStore;
use robotadvisor_core::CoreError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = robotadvisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match robotadvisor_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let service = pool.map(|pool| {
        let store = Arc::new(PgStore::new(pool));
        AdvisorService::new(store.clone(), store)
    });
    let state = AppState { service };

    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/screener", post(screen))
        .route("/stocks/:symbol", get(get_stock))
        .route("/owners/:owner/portfolios", get(list_portfolios))
        .route("/portfolios", post(create_portfolio))
        .route(
            "/portfolios/:portfolio_id",
            get(get_portfolio).delete(delete_portfolio),
        )
        .route(
            "/portfolios/:portfolio_id/recommendations",
            get(get_recommendations),
        )
        .route("/portfolios/:portfolio_id/stocks", post(add_stock))
        .route(
            "/portfolios/:portfolio_id/stocks/:symbol",
            get(get_stock_details).delete(remove_stock),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    service: Option<AdvisorService>,
}

impl AppState {
    fn service(&self) -> Result<&AdvisorService, StatusCode> {
        self.service.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn status_for(err: CoreError) -> StatusCode {
    match err {
        CoreError::InvalidFilterValue { .. } => StatusCode::BAD_REQUEST,
        CoreError::StockNotFound(_) | CoreError::PortfolioNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Storage(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn screen(
    State(state): State<AppState>,
    Json(selection): Json<FilterSelection>,
) -> Result<Json<Vec<StockMetrics>>, StatusCode> {
    let stocks = state
        .service()?
        .screen(&selection)
        .await
        .map_err(status_for)?;
    Ok(Json(stocks))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockMetrics>, StatusCode> {
    let stock = state.service()?.stock(&symbol).await.map_err(status_for)?;
    Ok(Json(stock))
}

async fn list_portfolios(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<Portfolio>>, StatusCode> {
    let portfolios = state
        .service()?
        .list_portfolios(&owner)
        .await
        .map_err(status_for)?;
    Ok(Json(portfolios))
}

#[derive(Debug, Deserialize)]
struct NewPortfolio {
    owner: String,
    name: String,
}

async fn create_portfolio(
    State(state): State<AppState>,
    Json(body): Json<NewPortfolio>,
) -> Result<(StatusCode, Json<Portfolio>), StatusCode> {
    if body.owner.trim().is_empty() || body.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let portfolio = state
        .service()?
        .add_portfolio(&body.owner, &body.name)
        .await
        .map_err(status_for)?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<Json<Portfolio>, StatusCode> {
    let portfolio = state
        .service()?
        .portfolio(portfolio_id)
        .await
        .map_err(status_for)?;
    Ok(Json(portfolio))
}

async fn delete_portfolio(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    state
        .service()?
        .delete_portfolio(portfolio_id)
        .await
        .map_err(status_for)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    limit: Option<usize>,
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResult>, StatusCode> {
    let mut result = state
        .service()?
        .recommend(portfolio_id)
        .await
        .map_err(status_for)?;
    if let Some(limit) = query.limit {
        result = result.top(limit);
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct AddStock {
    symbol: String,
}

#[derive(Debug, Serialize)]
struct AddStockResponse {
    added: bool,
}

/// A symbol missing from the catalog is reported as `{"added": false}`, not an HTTP error.
async fn add_stock(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
    Json(body): Json<AddStock>,
) -> Result<Json<AddStockResponse>, StatusCode> {
    let added = state
        .service()?
        .add_stock_to_portfolio(portfolio_id, &body.symbol)
        .await
        .map_err(status_for)?;
    Ok(Json(AddStockResponse { added }))
}

async fn get_stock_details(
    State(state): State<AppState>,
    Path((portfolio_id, symbol)): Path<(Uuid, String)>,
) -> Result<Json<StockDetails>, StatusCode> {
    let details = state
        .service()?
        .stock_details(portfolio_id, &symbol)
        .await
        .map_err(status_for)?;
    Ok(Json(details))
}

async fn remove_stock(
    State(state): State<AppState>,
    Path((portfolio_id, symbol)): Path<(Uuid, String)>,
) -> Result<StatusCode, StatusCode> {
    state
        .service()?
        .remove_stock_from_portfolio(portfolio_id, &symbol)
        .await
        .map_err(status_for)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &robotadvisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use robotadvisor_core::domain::stock::StockRow;
    use robotadvisor_core::storage::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn row(symbol: &str, market_cap: i64, ps: f64) -> StockRow {
        StockRow {
            symbol: symbol.to_string(),
            market_cap,
            sma200: 0.02,
            ps,
            gross_margin: 0.35,
            profit_margin: 0.1,
            operating_margin: 0.1,
        }
    }

    fn app() -> Router {
        let store = Arc::new(MemoryStore::with_rows(vec![
            row("AAPL", 2_500_000_000_000, 25.0),
            row("XOM", 400_000_000_000, 1.2),
        ]));
        router(AppState {
            service: Some(AdvisorService::new(store.clone(), store)),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn screener_applies_filters() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/screener",
            Some(json!({"market_cap": "Large(>$10bln)", "ps": "High(>10)"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn screener_rejects_unknown_bucket() {
        let (status, _) = send(&app(), "POST", "/screener", Some(json!({"ps": "Cheap"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn portfolio_flow() {
        let app = app();
        let (status, created) = send(
            &app,
            "POST",
            "/portfolios",
            Some(json!({"owner": "u1", "name": "Energy"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let uri = format!("/portfolios/{id}/stocks");
        let (_, added) = send(&app, "POST", &uri, Some(json!({"symbol": "xom"}))).await;
        assert_eq!(added["added"], true);
        let (_, missing) = send(&app, "POST", &uri, Some(json!({"symbol": "NOPE"}))).await;
        assert_eq!(missing["added"], false);

        let (status, recs) =
            send(&app, "GET", &format!("/portfolios/{id}/recommendations?limit=5"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recs["results"][0]["symbol"], "AAPL");
        assert_eq!(recs["results"].as_array().unwrap().len(), 1);

        let (status, details) = send(&app, "GET", &format!("/portfolios/{id}/stocks/XOM"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["in_portfolio"], true);

        let (status, _) = send(&app, "DELETE", &format!("/portfolios/{id}/stocks/MSFT"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "DELETE", &format!("/portfolios/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/portfolios/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn degraded_mode_answers_503() {
        let app = router(AppState { service: None });
        let (status, _) = send(&app, "GET", "/stocks/AAPL", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
