use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use chat_metrics::Metadata;
use futures_util::future::LocalBoxFuture;
use serde_json::json;
use std::future::{ready, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an id and funnels server errors into the
/// metrics error log.
///
/// A 5xx response that carries an actix `Error` is recorded with
/// `{route, method, requestId}` context and its body is replaced by
/// `{error, requestId}`. Responses a handler built itself pass through.
pub struct RequestTracking;

impl<S, B> Transform<S, ServiceRequest> for RequestTracking
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTrackingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTrackingService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestTrackingService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestTrackingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let method = req.method().to_string();
        let path = req.path().to_string();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            log::debug!("[{}] {} {}", request_id, method, path);

            let res = service.call(req).await?;

            let mut res = if res.status().is_server_error() && res.response().error().is_some() {
                funnel_server_error(res, &request_id, &method, &path)
            } else {
                res.map_into_left_body()
            };

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            log::debug!("[{}] completed with {}", request_id, res.status());
            Ok(res)
        })
    }
}

fn funnel_server_error<B>(
    res: ServiceResponse<B>,
    request_id: &str,
    method: &str,
    path: &str,
) -> ServiceResponse<EitherBody<B>> {
    let message = res
        .response()
        .error()
        .map(|error| error.to_string())
        .unwrap_or_default();
    log::error!("[{}] {} {} failed: {}", request_id, method, path, message);

    if let Some(state) = res.request().app_data::<web::Data<AppState>>() {
        let mut context = Metadata::new();
        context.insert("route".into(), json!(path));
        context.insert("method".into(), json!(method));
        context.insert("requestId".into(), json!(request_id));
        state.metrics.record_failure(message, None, context);
    }

    let (req, _) = res.into_parts();
    let response = HttpResponse::InternalServerError().json(json!({
        "error": "Internal Server Error",
        "requestId": request_id,
    }));
    ServiceResponse::new(req, response).map_into_right_body()
}

/// Request id stored in request extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

pub fn extract_request_id(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<RequestId>().map(|id| id.0.clone())
}
