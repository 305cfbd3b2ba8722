use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::engine::{
    ai::AiGrader,
    bank::ChallengeBank,
    error::EngineError,
    grader::ExecutionGrader,
    ledger::{BadgeDecision, HINT_CAP, HINT_LIMIT_MESSAGE, Ledger},
    metrics::MetricsRegistry,
    models::{
        BadgeEarnedRecord, Challenge, ChallengeKind, ChallengeView, CompleteRequest,
        CompleteResponse, DifficultyLevel, GradeRequest, GradeResponse, HintRequest, HintResponse,
        LevelInfo, PlayerId, Verdict,
    },
    structural::StructuralGrader,
};

#[derive(Clone)]
pub struct AppState {
    bank: Arc<ChallengeBank>,
    ledger: Arc<Ledger>,
    metrics: Arc<MetricsRegistry>,
    grader: Arc<ExecutionGrader>,
    ai: Option<AiGrader>,
}

pub fn routes(
    bank: Arc<ChallengeBank>,
    ledger: Arc<Ledger>,
    metrics: Arc<MetricsRegistry>,
    grader: Arc<ExecutionGrader>,
    ai: Option<AiGrader>,
) -> Router {
    let state = AppState {
        bank,
        ledger,
        metrics,
        grader,
        ai,
    };
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/v1/levels", get(levels))
        .route("/v1/challenges/random", get(random_challenge))
        .route("/v1/grade", post(grade))
        .route("/v1/hints", post(hint))
        .route("/v1/complete", post(complete))
        .route("/v1/players/{player_id}/progress", get(progress))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics.render_prometheus())
}

#[derive(Serialize)]
struct LevelsResponse {
    success: bool,
    levels: Vec<LevelInfo>,
}

async fn levels() -> Json<LevelsResponse> {
    let levels = DifficultyLevel::ALL
        .into_iter()
        .map(|level| LevelInfo {
            level,
            label: level.label(),
            focus: level.focus(),
            badge: level.badge_name(),
        })
        .collect();
    Json(LevelsResponse {
        success: true,
        levels,
    })
}

#[derive(Deserialize)]
struct RandomQuery {
    level: String,
}

#[derive(Serialize)]
struct RandomChallengeResponse {
    success: bool,
    challenge: ChallengeView,
}

async fn random_challenge(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
) -> Result<Json<RandomChallengeResponse>, EngineError> {
    let level = parse_level(&query.level)?;
    let challenge = state
        .bank
        .random_for_level(level)
        .ok_or(EngineError::ChallengeNotFound)?;
    Ok(Json(RandomChallengeResponse {
        success: true,
        challenge: ChallengeView::from(&challenge),
    }))
}

async fn grade(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> Result<Json<GradeResponse>, EngineError> {
    if request.source_text.trim().is_empty() {
        return Err(EngineError::InvalidRequest("source_text is empty".to_string()));
    }
    if request.source_text.len() > 250_000 {
        return Err(EngineError::InvalidRequest("source_text too large".to_string()));
    }

    let challenge = state
        .bank
        .get(&request.challenge_id)
        .ok_or(EngineError::ChallengeNotFound)?;

    let verdict = grade_submission(&state, &challenge, &request.source_text).await;
    state.metrics.graded(verdict.passed);
    if let Some(player_id) = request.player_id {
        state
            .ledger
            .record_attempt(player_id, challenge.level, verdict.passed);
    }

    tracing::info!(
        challenge_id = %challenge.id,
        level = %challenge.level,
        passed = verdict.passed,
        missing = verdict.missing.len(),
        "submission graded"
    );

    Ok(Json(GradeResponse {
        success: true,
        challenge_id: challenge.id.clone(),
        level: challenge.level,
        passed: verdict.passed,
        missing: verdict.missing,
        hints: verdict.hints,
        notes: verdict.notes,
    }))
}

/// AI adapter first when configured; any unavailability falls through to the
/// deterministic grader matching the challenge kind.
async fn grade_submission(state: &AppState, challenge: &Challenge, source: &str) -> Verdict {
    if let Some(ai) = &state.ai {
        if let Some(verdict) = ai.try_grade(&challenge.prompt, source).await {
            state.metrics.ai_verdict();
            return verdict;
        }
        state.metrics.ai_fallback();
        tracing::warn!(challenge_id = %challenge.id, "AI grading unavailable, falling back");
    }

    match challenge.kind {
        ChallengeKind::Python => state.grader.grade(challenge, source).await,
        ChallengeKind::Pseudocode => StructuralGrader::grade(
            &challenge.prompt,
            source,
            challenge.required_constructs.as_deref(),
        ),
    }
}

async fn hint(
    State(state): State<AppState>,
    Json(request): Json<HintRequest>,
) -> Result<Json<HintResponse>, EngineError> {
    let level = parse_level(&request.level)?;
    let challenge = state
        .bank
        .get(&request.challenge_id)
        .ok_or(EngineError::ChallengeNotFound)?;

    let (mut hint, remaining) =
        state
            .ledger
            .consume_hint(request.player_id, level, &request.challenge_id);

    if hint != HINT_LIMIT_MESSAGE {
        state.metrics.hint_served();
        // A consumed hint may be upgraded to a generated one; the ledger
        // count is authoritative either way.
        if let Some(ai) = &state.ai {
            if let Some(generated) = ai.suggest_hints(&challenge.prompt).await {
                let index = (HINT_CAP - remaining - 1) as usize;
                if let Some(text) = generated.get(index) {
                    hint = text.clone();
                }
            }
        }
    }

    Ok(Json(HintResponse {
        success: true,
        hint,
        remaining_hints: remaining,
    }))
}

async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, EngineError> {
    let level = parse_level(&request.level)?;

    if !request.passed {
        return Ok(Json(CompleteResponse {
            success: true,
            message: "Attempt recorded.".to_string(),
            badge: None,
        }));
    }

    match state
        .ledger
        .award_badge(request.player_id, level, request.attempts)
        .await
    {
        BadgeDecision::Vetoed => Ok(Json(CompleteResponse {
            success: true,
            message: "Correct, but badge not awarded because all 3 hints were used.".to_string(),
            badge: None,
        })),
        BadgeDecision::Awarded { record, first_time } => {
            state.metrics.badge_awarded();
            tracing::info!(
                player_id = request.player_id,
                badge = %record.badge_name,
                first_time,
                "badge persisted"
            );
            Ok(Json(CompleteResponse {
                success: true,
                message: format!("Badge '{}' saved.", record.badge_name),
                badge: Some(record),
            }))
        }
    }
}

#[derive(Serialize)]
struct ProgressResponse {
    success: bool,
    player_id: PlayerId,
    badges: Vec<BadgeEarnedRecord>,
}

async fn progress(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        success: true,
        player_id,
        badges: state.ledger.progress(player_id),
    })
}

fn parse_level(raw: &str) -> Result<DifficultyLevel, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::UnknownLevel(raw.to_string()))
}
