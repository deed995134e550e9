use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::LatencyStats;
use crate::db::SqliteEventStore;
use crate::error::AppError;
use crate::state::MemoryEventCache;
use crate::types::{EventCard, EventId, EventSummary};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SqliteEventStore>,
    pub cache: Arc<MemoryEventCache>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/events", get(get_events))
        .route("/events/:id", get(get_event))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub monitor: HealthSnapshot,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        monitor: state.health.snapshot(),
    })
}

async fn get_events(State(state): State<ApiState>) -> Result<Json<Vec<EventSummary>>, AppError> {
    if let Some(events) = state.cache.get_events_list() {
        return Ok(Json(events));
    }
    let generation = state.cache.events_list_generation();
    let events = state.store.list_events().await?;
    state.cache.put_events_list(events.clone(), generation);
    Ok(Json(events))
}

async fn get_event(
    State(state): State<ApiState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<EventCard>, AppError> {
    if let Some(card) = state.cache.get_event_card(event_id) {
        return Ok(Json(card));
    }
    let generation = state.cache.event_card_generation(event_id);
    let card = state.store.event_card(event_id).await?;
    state.cache.put_event_card(card.clone(), generation);
    Ok(Json(card))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms: p50,
        p95_ms: p95,
        p99_ms: p99,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::live::ports::{BoutStore, EventCache, TrackedEventSource};
    use crate::types::{BoutOutcome, EventStatus};

    async fn state() -> ApiState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO events (id, name, status, starts_at, venue, external_url) \
             VALUES (1, 'UFC 326', 'live', 1771855200, 'T-Mobile Arena', 'https://feed/1')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO bouts (id, event_id, sequence_no, red_fighter_id, blue_fighter_id) \
             VALUES (10, 1, 0, 20, 21)",
        )
        .execute(&pool)
        .await
        .unwrap();
        ApiState {
            store: Arc::new(SqliteEventStore::new(pool)),
            cache: Arc::new(MemoryEventCache::new()),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    async fn serve(state: &ApiState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    async fn get(state: &ApiState, path: &str) -> reqwest::Response {
        let base = serve(state).await;
        reqwest::get(format!("{base}{path}")).await.unwrap()
    }

    async fn get_json(state: &ApiState, path: &str) -> (StatusCode, serde_json::Value) {
        let resp = get(state, path).await;
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn event_card_is_served_and_cached() {
        let state = state().await;

        let (status, body) = get_json(&state, "/events/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "UFC 326");
        assert_eq!(body["status"], "live");
        assert_eq!(body["bouts"][0]["bout_id"], 10);
        assert!(state.cache.get_event_card(1).is_some());
    }

    #[tokio::test]
    async fn invalidation_exposes_fresh_outcome() {
        let state = state().await;
        get_json(&state, "/events/1").await;

        let outcome = BoutOutcome {
            winner_id: Some(20),
            method: "KO/TKO".to_string(),
            ..Default::default()
        };
        state.store.upsert_bout_outcome(1, 10, &outcome).await.unwrap();
        state.store.set_status(1, EventStatus::Completed).await.unwrap();

        let (_, stale) = get_json(&state, "/events/1").await;
        assert_eq!(stale["status"], "live");

        state.cache.invalidate(1).await.unwrap();
        let (_, fresh) = get_json(&state, "/events/1").await;
        assert_eq!(fresh["status"], "completed");
        assert_eq!(fresh["bouts"][0]["winner_id"], 20);
    }

    #[tokio::test]
    async fn unknown_event_is_404() {
        let state = state().await;
        let resp = get(&state, "/events/99").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.text().await.unwrap().contains("99"));
    }

    #[tokio::test]
    async fn events_list_and_stats_endpoints() {
        let state = state().await;
        state.latency.record(std::time::Duration::from_millis(120));
        state.health.inc_completed();

        let (_, events) = get_json(&state, "/events").await;
        assert_eq!(events.as_array().unwrap().len(), 1);

        let (_, latency) = get_json(&state, "/stats/latency").await;
        assert_eq!(latency["samples"], 1);
        assert!(latency["p50_ms"].as_u64().unwrap() >= 120);

        let (_, health) = get_json(&state, "/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["completed_events"], 1);
    }
}
