pub mod analytics;
pub mod health;
pub mod message;
pub mod metrics;
pub mod track;

use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

/// Used when the caller's address is not available.
pub const UNKNOWN_CALLER: &str = "unknown";

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    status: &'static str,
    data: &'a T,
}

/// `{status: "success", data}` response.
pub(crate) fn success<T: Serialize>(data: &T) -> HttpResponse {
    HttpResponse::Ok().json(SuccessEnvelope {
        status: "success",
        data,
    })
}

/// Conversation id derived from the caller's network identity.
pub(crate) fn caller_id(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
