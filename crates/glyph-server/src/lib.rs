//! Glyph Server - the pipeline's HTTP surface
//!
//! Three routes:
//! - `POST /render` accepts `{tokenId, event}` and acknowledges job
//!   acceptance with 202; rendering is asynchronous and downstream failures
//!   never surface here, only malformed input fails.
//! - `GET /status/{tokenId}` answers the freshness protocol.
//! - `GET /artifact/{tokenId}/{kind}` streams a stored representation with
//!   the three-way cache-control contract; an unready artifact is a 404
//!   with a retry hint (indistinguishable, by design, from a permanently
//!   failed job).

#![warn(unreachable_pub)]

pub mod cache;

use cache::CachePolicy;
use glyph_pipeline::{PipelineError, RegenerationCoordinator, TriggerEvent};
use glyph_storage::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Trigger request body
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TriggerRequest {
    /// Token to regenerate
    pub token_id: u64,
    /// What prompted the trigger
    pub event: TriggerEvent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ArtifactQuery {
    /// Mutation count the request is scoped to; makes the response
    /// content-addressed and cacheable forever
    state: Option<u64>,
    /// Explicit manual refresh; bypasses every cache
    refresh: Option<String>,
}

/// Build the complete route tree over a running coordinator
pub fn routes(
    coordinator: Arc<RegenerationCoordinator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let trigger = warp::path("render")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_coordinator(Arc::clone(&coordinator)))
        .and_then(handle_trigger);

    let status = warp::path!("status" / u64)
        .and(warp::get())
        .and(with_coordinator(Arc::clone(&coordinator)))
        .and_then(handle_status);

    let artifact = warp::path!("artifact" / u64 / String)
        .and(warp::get())
        .and(warp::query::<ArtifactQuery>())
        .and(with_coordinator(coordinator))
        .and_then(handle_artifact);

    trigger.or(status).or(artifact)
}

fn with_coordinator(
    coordinator: Arc<RegenerationCoordinator>,
) -> impl Filter<Extract = (Arc<RegenerationCoordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&coordinator))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    retry_after_seconds: Option<u64>,
) -> warp::reply::Response {
    json_response(
        status,
        &ErrorBody {
            error: message.into(),
            retry_after_seconds,
        },
    )
}

async fn handle_trigger(
    request: TriggerRequest,
    coordinator: Arc<RegenerationCoordinator>,
) -> Result<warp::reply::Response, Rejection> {
    match coordinator.trigger(request.token_id, request.event) {
        Ok(ticket) => Ok(json_response(StatusCode::ACCEPTED, &ticket)),
        Err(err @ (PipelineError::Saturated | PipelineError::ShutDown)) => Ok(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            err.to_string(),
            Some(5),
        )),
        Err(err) => Ok(error_response(
            StatusCode::BAD_REQUEST,
            err.to_string(),
            None,
        )),
    }
}

async fn handle_status(
    token_id: u64,
    coordinator: Arc<RegenerationCoordinator>,
) -> Result<warp::reply::Response, Rejection> {
    match coordinator.status(token_id).await {
        Ok(status) => Ok(json_response(StatusCode::OK, &status)),
        Err(err) => {
            tracing::error!(token_id, %err, "status read failed");
            Ok(error_response(
                StatusCode::BAD_GATEWAY,
                "status backend unavailable",
                Some(5),
            ))
        }
    }
}

async fn handle_artifact(
    token_id: u64,
    kind: String,
    query: ArtifactQuery,
    coordinator: Arc<RegenerationCoordinator>,
) -> Result<warp::reply::Response, Rejection> {
    let Ok(kind) = kind.parse::<ArtifactKind>() else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown artifact kind: {kind}"),
            None,
        ));
    };

    let policy = CachePolicy::select(query.state.is_some(), query.refresh.is_some());

    match coordinator
        .pipeline()
        .publisher()
        .read_artifact(token_id, kind)
        .await
    {
        Ok(Some((bytes, content_type))) => {
            let response = warp::http::Response::builder()
                .status(StatusCode::OK)
                .header("content-type", content_type)
                .header("cache-control", policy.header_value())
                .body(bytes);
            match response {
                Ok(response) => Ok(response.into_response()),
                Err(err) => {
                    tracing::error!(token_id, %err, "artifact response build failed");
                    Ok(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "response build failed",
                        None,
                    ))
                }
            }
        }
        // Not ready and permanently failed are deliberately the same
        // answer; no persisted failure state exists.
        Ok(None) => Ok(error_response(
            StatusCode::NOT_FOUND,
            "artifact not ready",
            Some(5),
        )),
        Err(err) => {
            tracing::error!(token_id, %err, "artifact read failed");
            Ok(error_response(
                StatusCode::BAD_GATEWAY,
                "storage backend unavailable",
                Some(5),
            ))
        }
    }
}
