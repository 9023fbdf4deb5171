use actix_web::{web, HttpRequest, HttpResponse};
use chat_metrics::Metadata;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{caller_id, non_empty};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Event name browser clients use to report their own failures.
pub const CLIENT_ERROR_EVENT: &str = "error";

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

pub async fn handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<TrackRequest>,
) -> Result<HttpResponse> {
    let TrackRequest { event, data } = body.into_inner();
    let event = non_empty(event)
        .ok_or_else(|| AppError::BadRequest("Event type is required".to_string()))?;
    let sender = caller_id(&req);

    if event == CLIENT_ERROR_EVENT {
        record_client_error(&state, &sender, data.as_ref());
    }

    let mut metadata = Metadata::new();
    metadata.insert("type".into(), json!("event"));
    match data {
        Some(Value::Object(fields)) => metadata.extend(fields),
        Some(Value::Null) | None => {}
        Some(other) => {
            metadata.insert("data".into(), other);
        }
    }

    state.metrics.record(&sender, &event, true, metadata);
    log::debug!("tracked '{}' from {}", event, sender);

    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

fn record_client_error(state: &AppState, sender: &str, data: Option<&Value>) {
    let field = |key: &str| data.and_then(|data| data.get(key));

    let message = field("error")
        .and_then(Value::as_str)
        .unwrap_or("Client reported an error");
    let stack = field("stack").and_then(Value::as_str).map(str::to_string);

    let mut context = match field("context") {
        Some(Value::Object(context)) => context.clone(),
        _ => Metadata::new(),
    };
    context.insert("event".into(), json!(CLIENT_ERROR_EVENT));
    context.insert("sender".into(), json!(sender));

    state.metrics.record_failure(message, stack, context);
}
