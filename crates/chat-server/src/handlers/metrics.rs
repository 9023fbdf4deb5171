use actix_web::{web, HttpResponse};

use super::success;
use crate::error::Result;
use crate::state::AppState;

pub async fn system(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(success(&state.metrics.system_snapshot()))
}
