use super::error::ApiError;
use crate::models::Poll;
use crate::registry::Registry;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

type Payload<T> = Result<Json<T>, JsonRejection>;

#[derive(Debug, Deserialize)]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CastVote {
    pub option: String,
}

// Body of the legacy `/vote` route, which carries the poll id inline
#[derive(Debug, Deserialize)]
pub struct CastVoteFor {
    pub poll_id: String,
    pub option: String,
}

#[derive(Debug, Deserialize)]
pub struct PollRef {
    pub poll_id: String,
}

pub async fn create_poll(
    State(registry): State<Registry>,
    payload: Payload<CreatePoll>,
) -> Result<(StatusCode, Json<Poll>), ApiError> {
    let Json(req) = payload?;
    let poll = registry.create(req.question, req.options).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

pub async fn list_polls(State(registry): State<Registry>) -> Result<Json<Vec<Poll>>, ApiError> {
    Ok(Json(registry.list().await?))
}

pub async fn get_poll(
    State(registry): State<Registry>,
    Path(poll_id): Path<String>,
) -> Result<Json<Poll>, ApiError> {
    Ok(Json(registry.get(&poll_id).await?))
}

pub async fn vote(
    State(registry): State<Registry>,
    Path(poll_id): Path<String>,
    payload: Payload<CastVote>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    record_vote(&registry, &poll_id, &req.option).await
}

pub async fn vote_by_body(
    State(registry): State<Registry>,
    payload: Payload<CastVoteFor>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    record_vote(&registry, &req.poll_id, &req.option).await
}

async fn record_vote(registry: &Registry, poll_id: &str, option: &str) -> Result<Json<Value>, ApiError> {
    registry.vote(poll_id, option).await?;
    Ok(Json(json!({ "message": "vote recorded" })))
}

pub async fn delete_poll(
    State(registry): State<Registry>,
    Path(poll_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    registry.delete(&poll_id).await?;
    Ok(Json(json!({ "message": "poll deleted" })))
}

pub async fn delete_poll_by_body(
    State(registry): State<Registry>,
    payload: Payload<PollRef>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    registry.delete(&req.poll_id).await?;
    Ok(Json(json!({ "message": "poll deleted" })))
}
