//! HTTP handler functions for the Nightwatch read API.

use actix_web::{HttpResponse, web};
use nightwatch_database::queries;
use nightwatch_server_models::{
    ApiHealth, ApiIncident, ApiReviewDecision, ApiReviewQueueItem, ApiRollupResponse, ApiRollupWeek, IncidentQueryParams,
    ReviewAction, ReviewQueueQueryParams, RollupQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth { healthy: true, version: env!("CARGO_PKG_VERSION").to_string() })
}

/// `GET /api/incidents`
///
/// Queries published incidents (`auto_published`, `unverified`, or
/// `approved`) with region/category/city/urgency/time filters.
pub async fn incidents(state: web::Data<AppState>, params: web::Query<IncidentQueryParams>) -> HttpResponse {
    let query = params.into_inner().into();

    match queries::query_incidents(state.db.as_ref(), &query).await {
        Ok(rows) => {
            let api_incidents: Vec<ApiIncident> = rows.into_iter().map(ApiIncident::from).collect();
            HttpResponse::Ok().json(api_incidents)
        }
        Err(e) => {
            log::error!("category=query_incidents failed to query incidents: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "failed to query incidents" }))
        }
    }
}

/// `GET /api/review-queue`
///
/// Lists `needs_review` incidents alongside the reports behind their
/// confidence score, oldest-updated first.
pub async fn review_queue_get(state: web::Data<AppState>, params: web::Query<ReviewQueueQueryParams>) -> HttpResponse {
    let query = params.into_inner().into();

    match queries::query_review_queue(state.db.as_ref(), &query).await {
        Ok(rows) => {
            let items: Vec<ApiReviewQueueItem> = rows.into_iter().map(ApiReviewQueueItem::from).collect();
            HttpResponse::Ok().json(items)
        }
        Err(e) => {
            log::error!("category=query_review_queue failed to query review queue: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "failed to query review queue" }))
        }
    }
}

/// `POST /api/review-queue`
///
/// Applies an operator's `approve`/`reject` decision. A `reject`
/// cascades to every currently linked report (§4.6); `approve` and
/// `reject` are both terminal per the override-preservation invariant.
pub async fn review_queue_post(state: web::Data<AppState>, decision: web::Json<ApiReviewDecision>) -> HttpResponse {
    let decision = decision.into_inner();

    let reviewed_by = decision.reviewed_by();

    if let Some(notes) = &decision.notes {
        log::info!(
            "category=review_decision incident_id={} reviewed_by={reviewed_by} notes={notes}",
            decision.incident_id
        );
    }

    let outcome = match decision.action {
        ReviewAction::Approve => nightwatch_workflow::approve(state.db.as_ref(), decision.incident_id, reviewed_by).await,
        ReviewAction::Reject => nightwatch_workflow::reject(state.db.as_ref(), decision.incident_id, reviewed_by).await,
    };

    match outcome {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            log::error!("category=review_decision failed to apply review decision: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "failed to apply review decision" }))
        }
    }
}

/// `GET /api/rollup`
///
/// Returns up to `weeks` of weekly aggregate history for `municipality`
/// (region-wide when omitted) plus the live last-24h/last-7d counts.
pub async fn rollup(state: web::Data<AppState>, params: web::Query<RollupQueryParams>) -> HttpResponse {
    let params = params.into_inner();
    let municipality = params.municipality.clone();
    let query = params.into();

    let history = queries::query_rollups(state.db.as_ref(), &query).await;
    let live = nightwatch_rollup::live_counts(state.db.as_ref(), municipality.as_deref()).await;

    match (history, live) {
        (Ok(rows), Ok(live)) => {
            let weeks: Vec<ApiRollupWeek> = rows.into_iter().map(ApiRollupWeek::from).collect();
            HttpResponse::Ok().json(ApiRollupResponse { weeks, last_24h: live.last_24h, last_7d: live.last_7d })
        }
        (Err(e), _) => {
            log::error!("category=query_rollups failed to query rollup history: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "failed to query rollup history" }))
        }
        (_, Err(e)) => {
            log::error!("category=live_counts failed to query live counts: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "failed to query live counts" }))
        }
    }
}
