use std::net::SocketAddr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::generator::{self, GeneratorConfig};
use crate::models::{
    DashboardStats, JobFilters, JobRecord, JobRequest, PageResponse, PlaceholderMetrics,
};
use crate::stats;

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub placeholders: PlaceholderMetrics,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/admin/jobs", post(create_job))
        .route(
            "/api/admin/jobs/{id}",
            get(get_job).put(update_job).delete(delete_job),
        )
        .route("/api/admin/dashboard/stats", get(dashboard_stats))
        .route("/livez", get(livez))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves until ctrl-c, running the mock generator alongside when configured.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    generator: Option<GeneratorConfig>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let generator = generator.map(|config| generator::spawn(state.pool.clone(), config));

    tokio::select! {
        r = axum::serve(listener, router(state)) => {
            tracing::warn!("server ended unexpectedly: {:?}", &r)
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl+c, shutting down");
        }
    }

    if let Some(handle) = generator {
        handle.abort();
    }
    Ok(())
}

async fn list_jobs(
    State(state): State<AppState>,
    filters: Result<Query<JobFilters>, QueryRejection>,
) -> Result<Json<PageResponse<JobRecord>>, ApiError> {
    let Query(filters) = filters?;
    let query = filters.into_query()?;
    let page = db::list_jobs(&state.pool, &query).await?;
    Ok(Json(page))
}

async fn create_job(
    State(state): State<AppState>,
    request: Result<Json<JobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    let Json(request) = request?;
    request.validate()?;
    let job = db::insert_job(&state.pool, &request.normalized()).await?;
    tracing::info!("created job {}: {} at {}", job.id, job.title, job.company);
    Ok((StatusCode::CREATED, Json(job)))
}

async fn get_job(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobRecord>, ApiError> {
    let Path(id) = id?;
    db::get_job(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::job_not_found(id))
}

async fn update_job(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<JobRecord>, ApiError> {
    let Path(id) = id?;
    let Json(request) = request?;
    request.validate()?;
    let job = db::update_job(&state.pool, id, &request.normalized())
        .await?
        .ok_or_else(|| ApiError::job_not_found(id))?;
    tracing::info!("updated job {}: {}", job.id, job.title);
    Ok(Json(job))
}

async fn delete_job(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    if !db::delete_job(&state.pool, id).await? {
        return Err(ApiError::job_not_found(id));
    }
    tracing::info!("deleted job {id}");
    Ok(StatusCode::NO_CONTENT)
}

async fn dashboard_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let jobs = db::fetch_all_jobs(&state.pool).await?;
    let stats = stats::compute_stats(&jobs, Utc::now(), &state.placeholders);
    tracing::debug!("dashboard computed over {} jobs", stats.total_jobs);
    Ok(Json(stats))
}

async fn livez() -> StatusCode {
    tracing::debug!("service is live");
    StatusCode::OK
}

async fn healthz(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    sqlx::query("select 1").execute(&state.pool).await?;
    tracing::debug!("service is healthy");
    Ok(StatusCode::OK)
}
