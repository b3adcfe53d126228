//! # REST API
//!
//! Builds the axum router for the election server. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path             | Description                               |
//! |--------|------------------|-------------------------------------------|
//! | GET    | `/health`        | Liveness probe                            |
//! | POST   | `/api/vote`      | Cast a vote (rate-limited, fraud-gated)   |
//! | GET    | `/api/results`   | Full tallies, winners, and statistics     |
//! | GET    | `/api/stats`     | Lightweight statistics subset             |
//! | POST   | `/api/house`     | Register a voting household               |
//! | POST   | `/api/candidate` | Register a candidate for a position       |
//! | POST   | `/api/positions` | Create or update an elective position     |
//!
//! The vote path layers its gates strictly: transport rate limit, then the
//! fraud block check, then the acceptance procedure. Requests stopped by
//! either gate never become attempt records.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ballot_core::ballot::{BallotBox, VoteError, VoteRequest};
use ballot_core::config::ElectionConfig;
use ballot_core::fraud::{FraudConfig, FraudTracker};
use ballot_core::model::{Candidate, House};
use ballot_core::origin::{ForwardedHeaderResolver, OriginResolver};
use ballot_core::results::{self, ElectionStats, PositionResult, QuickStats};
use ballot_core::store::{MemoryStore, Registry, VoteLedger};

use crate::limit::RateLimiter;
use crate::metrics::{ServerMetrics, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The vote acceptance procedure, wired to the store and fraud tracker.
    pub ballot: BallotBox<MemoryStore>,
    /// Master data and ledger, also read directly by the results handlers.
    pub store: Arc<MemoryStore>,
    /// Transport-layer request counter for the vote endpoint.
    pub limiter: Arc<RateLimiter>,
    /// Turns transport facts into a fraud-tracking key. Swappable for
    /// deployments behind a verified proxy chain.
    pub resolver: Arc<dyn OriginResolver>,
    /// Prometheus metric handles.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Wires up a fresh state from configuration: empty store, fraud
    /// tracker, rate limiter, and metrics registry.
    pub fn from_config(config: &ElectionConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let fraud = Arc::new(FraudTracker::new(FraudConfig::from(config)));
        Self {
            ballot: BallotBox::new(Arc::clone(&store), fraud),
            store,
            limiter: Arc::new(RateLimiter::from_config(config)),
            resolver: Arc::new(ForwardedHeaderResolver),
            metrics: Arc::new(ServerMetrics::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/vote", post(vote_handler))
        .route("/api/results", get(results_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/house", post(register_house_handler))
        .route("/api/candidate", post(register_candidate_handler))
        .route("/api/positions", post(register_position_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// The uniform `{ok, message}` envelope for acknowledgements and
/// rejections.
#[derive(Debug, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    pub message: String,
}

impl Reply {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: true,
            message: message.into(),
        })
    }

    fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: false,
            message: message.into(),
        })
    }
}

/// Request body for `POST /api/house`.
#[derive(Debug, Default, Deserialize)]
pub struct HouseBody {
    #[serde(default)]
    pub house: Option<HousePayload>,
}

/// A house registration as it arrives off the wire; validation happens in
/// the handler, not the deserializer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousePayload {
    pub id: Option<String>,
    pub house_number: Option<String>,
    pub house_owner: Option<String>,
}

/// Request body for `POST /api/candidate`.
#[derive(Debug, Default, Deserialize)]
pub struct CandidateBody {
    #[serde(default)]
    pub candidate: Option<CandidatePayload>,
}

/// A candidate registration as it arrives off the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub motto: Option<String>,
    pub description: Option<String>,
    pub position_id: Option<String>,
}

/// Request body for `POST /api/positions`.
#[derive(Debug, Default, Deserialize)]
pub struct PositionBody {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub candidates: Option<Vec<Candidate>>,
}

/// Response payload for `POST /api/house`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HouseResponse {
    pub ok: bool,
    pub house: House,
}

/// Response payload for `POST /api/candidate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub ok: bool,
    pub candidate: Candidate,
}

/// Response payload for `GET /api/results`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub ok: bool,
    pub stats: ElectionStats,
    pub results: std::collections::BTreeMap<String, PositionResult>,
}

/// Response payload for `GET /api/stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub stats: QuickStats,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the server is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `POST /api/vote` — the voting endpoint.
///
/// Gate order matters: the rate limiter sees every request, the fraud
/// check sees everything under the cap, and only clean traffic reaches
/// the acceptance procedure. Neither gate writes an attempt record.
async fn vote_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<VoteRequest>,
) -> impl IntoResponse {
    let timer = state.metrics.vote_latency_seconds.start_timer();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok());
    let peer = connect.map(|ConnectInfo(addr)| addr.ip());
    let origin = state.resolver.resolve(forwarded, peer);

    if !state.limiter.allow(&origin) {
        state.metrics.rate_limited_total.inc();
        tracing::debug!(%origin, "vote request rate limited");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Reply::err("Too many requests, please try later."),
        );
    }

    if state.ballot.fraud().is_blocked(&origin) {
        state.metrics.origins_blocked_total.inc();
        tracing::info!(%origin, "vote request refused, origin blocked");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Reply::err("IP blocked due to suspicious activity"),
        );
    }

    let response = match state.ballot.submit(&request, &origin) {
        Ok(_) => {
            state.metrics.votes_accepted_total.inc();
            (StatusCode::OK, Reply::ok("Vote recorded"))
        }
        Err(VoteError::Store(e)) => {
            tracing::error!(%e, "storage failure during vote submission");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Reply::err("Something went wrong"),
            )
        }
        Err(rejection) => {
            state.metrics.votes_rejected_total.inc();
            (StatusCode::BAD_REQUEST, Reply::err(rejection.to_string()))
        }
    };

    drop(timer);
    response
}

/// `GET /api/results` — full tallies, winners, percentages, and the
/// suspicious-activity report.
async fn results_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = (
        state.store.positions(),
        state.store.votes(),
        state.store.attempts(),
    );
    match snapshot {
        (Ok(positions), Ok(votes), Ok(attempts)) => {
            let report = results::aggregate(&positions, &votes, &attempts);
            (
                StatusCode::OK,
                Json(ResultsResponse {
                    ok: true,
                    stats: report.stats,
                    results: report.results,
                }),
            )
                .into_response()
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Reply::err("Something went wrong"),
        )
            .into_response(),
    }
}

/// `GET /api/stats` — the lightweight statistics subset.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    match (state.store.votes(), state.store.attempts()) {
        (Ok(votes), Ok(attempts)) => (
            StatusCode::OK,
            Json(StatsResponse {
                ok: true,
                stats: results::quick_stats(&votes, &attempts),
            }),
        )
            .into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Reply::err("Something went wrong"),
        )
            .into_response(),
    }
}

/// `POST /api/house` — registers a voting household.
async fn register_house_handler(
    State(state): State<AppState>,
    Json(body): Json<HouseBody>,
) -> impl IntoResponse {
    let payload = body.house.unwrap_or_default();
    let (Some(id), Some(house_number), Some(house_owner)) = (
        non_empty(payload.id),
        non_empty(payload.house_number),
        non_empty(payload.house_owner),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Reply::err("house.id, houseNumber, houseOwner required"),
        )
            .into_response();
    };

    match state.store.register_house(House {
        id,
        house_number,
        house_owner,
    }) {
        Ok(house) => {
            state.metrics.registered_houses.inc();
            (StatusCode::OK, Json(HouseResponse { ok: true, house })).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Reply::err(e.to_string())).into_response(),
    }
}

/// `POST /api/candidate` — registers a candidate for a position.
async fn register_candidate_handler(
    State(state): State<AppState>,
    Json(body): Json<CandidateBody>,
) -> impl IntoResponse {
    let payload = body.candidate.unwrap_or_default();
    let (Some(id), Some(name), Some(position_id)) = (
        non_empty(payload.id),
        non_empty(payload.name),
        non_empty(payload.position_id),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Reply::err("candidate and positionId required"),
        )
            .into_response();
    };

    let candidate = Candidate {
        id,
        name,
        photo: payload.photo,
        motto: payload.motto,
        description: payload.description,
        position_id,
    };
    match state.store.register_candidate(candidate) {
        Ok(candidate) => (
            StatusCode::OK,
            Json(CandidateResponse {
                ok: true,
                candidate,
            }),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Reply::err(e.to_string())).into_response(),
    }
}

/// `POST /api/positions` — creates or updates an elective position.
///
/// On update, title and description are replaced; the candidate slate is
/// replaced only when supplied.
async fn register_position_handler(
    State(state): State<AppState>,
    Json(body): Json<PositionBody>,
) -> impl IntoResponse {
    let (Some(id), Some(title)) = (non_empty(body.id), non_empty(body.title)) else {
        return (StatusCode::BAD_REQUEST, Reply::err("id and title required")).into_response();
    };

    match state
        .store
        .upsert_position(id, title, body.description, body.candidates)
    {
        Ok((_, true)) => (StatusCode::OK, Reply::ok("Updated")).into_response(),
        Ok((position, false)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "position": position })),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Reply::err(e.to_string())).into_response(),
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
