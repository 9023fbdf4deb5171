use actix_web::{web, HttpResponse};
use chat_metrics::{ConversationView, StatsSnapshot};
use serde::Serialize;

use super::success;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsResponse {
    pub active_conversations: Vec<ConversationView>,
    pub stats: StatsSnapshot,
}

pub async fn conversations(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(success(&ConversationsResponse {
        active_conversations: state.metrics.active_conversations(),
        stats: state.metrics.stats_snapshot(),
    }))
}

pub async fn conversation(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    match state.metrics.conversation(&id) {
        Some(view) => Ok(success(&view)),
        None => Err(AppError::NotFound(format!("Conversation '{}' not found", id))),
    }
}

pub async fn errors(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(success(&state.metrics.error_metrics()))
}

pub async fn intents(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(success(&state.metrics.breakdown()))
}
