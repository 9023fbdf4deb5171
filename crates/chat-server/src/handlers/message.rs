use actix_web::{web, HttpRequest, HttpResponse};
use chat_metrics::Metadata;
use serde::Deserialize;
use serde_json::json;

use super::{caller_id, non_empty, success};
use crate::error::{AppError, Result};
use crate::logging::Timer;
use crate::middleware::extract_request_id;
use crate::state::AppState;

pub const ROUTE: &str = "/api/message";

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: Option<String>,
    pub sender: Option<String>,
}

/// Forwards a chat message to the bot backend and tracks both turns.
pub async fn handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<MessageRequest>,
) -> Result<HttpResponse> {
    let MessageRequest { message, sender } = body.into_inner();
    let message =
        non_empty(message).ok_or_else(|| AppError::BadRequest("Message is required".to_string()))?;
    let sender = non_empty(sender).unwrap_or_else(|| caller_id(&req));

    let mut metadata = Metadata::new();
    metadata.insert("type".into(), json!("message"));
    state.metrics.record(&sender, &message, true, metadata);

    let timer = Timer::new(format!("bot reply for {}", sender));
    match state.bot.send(&sender, &message).await {
        Ok(replies) => {
            let mut metadata = Metadata::new();
            metadata.insert("type".into(), json!("bot_response"));
            metadata.insert("replyCount".into(), json!(replies.len()));
            metadata.insert("processingTimeMs".into(), json!(timer.elapsed_ms() as u64));
            if let Some(intent) = replies.first().and_then(|reply| reply.intent()) {
                metadata.insert("intent".into(), json!(intent));
            }
            state.metrics.record(&sender, &replies, false, metadata);

            Ok(success(&replies))
        }
        Err(error) => {
            log::error!("[{}] bot backend failed: {}", sender, error);

            let mut context = Metadata::new();
            context.insert("route".into(), json!(ROUTE));
            context.insert("message".into(), json!(message));
            context.insert("sender".into(), json!(sender));
            if let Some(request_id) = extract_request_id(&req) {
                context.insert("requestId".into(), json!(request_id));
            }
            state.metrics.record_error(&error, context);

            Ok(HttpResponse::InternalServerError().json(json!({
                "status": "error",
                "message": "Failed to process message",
                "error": error.to_string(),
            })))
        }
    }
}
