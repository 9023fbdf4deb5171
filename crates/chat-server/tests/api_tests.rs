use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{test, web, App, HttpResponse};
use async_trait::async_trait;
use chat_metrics::MetricsAggregator;
use chat_server::middleware::RequestTracking;
use chat_server::{app_config, AppError, AppState, BotBackend, BotError, BotReply, RasaBotClient};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticBot(Vec<BotReply>);

#[async_trait]
impl BotBackend for StaticBot {
    async fn send(&self, _sender: &str, _message: &str) -> Result<Vec<BotReply>, BotError> {
        Ok(self.0.clone())
    }
}

fn state_with(bot: Arc<dyn BotBackend>) -> web::Data<AppState> {
    web::Data::new(AppState::new(Arc::new(MetricsAggregator::new()), bot))
}

fn silent_state() -> web::Data<AppState> {
    state_with(Arc::new(StaticBot(Vec::new())))
}

fn peer(ip: &str) -> SocketAddr {
    format!("{ip}:40000").parse().expect("socket address")
}

#[actix_web::test]
async fn health_reports_ok() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].as_f64().expect("uptime") >= 0.0);
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn track_without_event_is_rejected_without_recording() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/track")
        .peer_addr(peer("10.0.0.1"))
        .set_json(json!({"data": {"language": "en"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(state.metrics.stats().total_messages, 0);
    assert_eq!(state.metrics.error_count(), 0);
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/track")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(state.metrics.stats().total_messages, 0);
}

#[actix_web::test]
async fn track_records_event_under_caller_address() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/track")
        .peer_addr(peer("10.0.0.7"))
        .set_json(json!({
            "event": "session_start",
            "data": {"language": "en-US", "screenResolution": "1920x1080"}
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"status": "success"}));

    let req = test::TestRequest::get()
        .uri("/api/analytics/conversations")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "success");

    let conversation = &body["data"]["activeConversations"][0];
    assert_eq!(conversation["id"], "10.0.0.7");
    assert_eq!(conversation["userMessageCount"], 1);

    let message = &conversation["messages"][0];
    assert_eq!(message["text"], "session_start");
    assert_eq!(message["isUser"], true);
    assert_eq!(message["metadata"]["type"], "event");
    assert_eq!(message["metadata"]["language"], "en-US");

    let stats = &body["data"]["stats"];
    assert_eq!(stats["totalMessages"], 1);
    assert_eq!(stats["totalUsers"], 1);
    assert_eq!(stats["activeConversations"], 1);
}

#[actix_web::test]
async fn scalar_track_data_is_kept_under_data_key() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    for data in [json!("checkout"), json!([1, 2])] {
        let req = test::TestRequest::post()
            .uri("/api/track")
            .peer_addr(peer("10.0.0.8"))
            .set_json(json!({"event": "button_click", "data": data}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let conversation = state.metrics.conversation("10.0.0.8").expect("tracked");
    assert_eq!(conversation.messages.len(), 2);

    let first = &conversation.messages[0];
    assert_eq!(first.metadata_str("type"), Some("event"));
    assert_eq!(first.metadata_str("data"), Some("checkout"));
    assert_eq!(conversation.messages[1].metadata.get("data"), Some(&json!([1, 2])));
}

#[actix_web::test]
async fn client_error_events_feed_the_error_log() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/track")
        .peer_addr(peer("10.0.0.9"))
        .set_json(json!({
            "event": "error",
            "data": {
                "error": "Failed to fetch",
                "stack": "TypeError: Failed to fetch\n    at sendMessage",
                "context": {"context": "sendMessage"}
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/analytics/errors")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let data = &body["data"];
    assert_eq!(data["totalErrors"], 1);
    assert_eq!(data["errorRate"], 100.0);

    let recent = &data["recentErrors"][0];
    assert_eq!(recent["message"], "Failed to fetch");
    assert_eq!(recent["context"]["context"], "sendMessage");
    assert_eq!(recent["context"]["sender"], "10.0.0.9");
}

#[actix_web::test]
async fn message_is_proxied_and_both_turns_are_tracked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/rest/webhook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "recipient_id": "user_42",
                "text": "Your order is on its way",
                "custom": {"intent": "order_status"}
            }
        ])))
        .mount(&server)
        .await;

    let state = state_with(Arc::new(RasaBotClient::new(server.uri())));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/message")
        .set_json(json!({"message": "where is my order?", "sender": "user_42"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "success");
    assert_eq!(body["data"][0]["text"], "Your order is on its way");

    let conversation = state.metrics.conversation("user_42").expect("tracked");
    assert_eq!(conversation.user_message_count, 1);
    assert_eq!(conversation.bot_message_count, 1);
    assert_eq!(
        conversation.messages[1].metadata_str("intent"),
        Some("order_status")
    );
    assert_eq!(
        conversation.messages[1].metadata_str("type"),
        Some("bot_response")
    );
    assert_eq!(
        conversation.messages[1].metadata.get("replyCount"),
        Some(&json!(1))
    );

    let stats = state.metrics.stats();
    assert_eq!(stats.total_messages, 2);
    assert!(stats.avg_response_time >= 0.0);

    let req = test::TestRequest::get()
        .uri("/api/analytics/intents")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["intentDistribution"]["order_status"], 1);
    assert_eq!(body["data"]["userMessages"], 1);
    assert_eq!(body["data"]["botMessages"], 1);
}

#[actix_web::test]
async fn upstream_failure_is_recorded_and_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("rasa is restarting"))
        .mount(&server)
        .await;

    let state = state_with(Arc::new(RasaBotClient::new(server.uri())));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/message")
        .set_json(json!({"message": "hello", "sender": "u1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Failed to process message");
    assert!(body["error"].as_str().expect("error").contains("503"));

    let errors = state.metrics.error_metrics();
    assert_eq!(errors.total_errors, 1);
    assert_eq!(errors.error_rate, 100.0);
    assert_eq!(errors.recent_errors[0].context["route"], "/api/message");
    assert_eq!(errors.recent_errors[0].context["message"], "hello");
}

#[actix_web::test]
async fn empty_message_is_rejected() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/message")
        .set_json(json!({"message": "   "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(state.metrics.stats().total_messages, 0);
}

#[actix_web::test]
async fn recent_activity_moves_conversation_to_front() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
        let req = test::TestRequest::post()
            .uri("/api/track")
            .peer_addr(peer(ip))
            .set_json(json!({"event": "quick_reply"}))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    let req = test::TestRequest::get()
        .uri("/api/analytics/conversations")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order: Vec<&str> = body["data"]["activeConversations"]
        .as_array()
        .expect("listing")
        .iter()
        .map(|c| c["id"].as_str().expect("id"))
        .collect();
    assert_eq!(order, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(body["data"]["stats"]["totalUsers"], 2);
    assert_eq!(body["data"]["stats"]["avgMessagesPerUser"], 1.5);
}

#[actix_web::test]
async fn conversation_lookup_by_id() {
    let state = silent_state();
    state
        .metrics
        .record("known", "hi", true, chat_metrics::Metadata::new());
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/analytics/conversations/known")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["id"], "known");
    assert_eq!(body["data"]["messages"][0]["text"], "hi");

    let req = test::TestRequest::get()
        .uri("/api/analytics/conversations/missing")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(state.metrics.error_count(), 0);
}

#[actix_web::test]
async fn system_metrics_snapshot() {
    let state = silent_state();
    state
        .metrics
        .record("a", "hi", true, chat_metrics::Metadata::new());
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let data = &body["data"];

    assert_eq!(body["status"], "success");
    assert!(data["hostname"].is_string());
    assert!(data["platform"].is_string());
    assert!(data["cpu"]["cores"].as_u64().expect("cores") >= 1);
    assert!(data["memory"].get("rss").is_some());
    assert_eq!(data["stats"]["totalMessages"], 1);
    assert_eq!(data["stats"]["activeConversations"], 1);
}

async fn failing_route() -> Result<HttpResponse, AppError> {
    Err(AppError::Internal(anyhow::anyhow!("snapshot lock poisoned")))
}

#[actix_web::test]
async fn server_errors_are_funnelled_with_request_id() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .route("/api/broken", web::get().to(failing_route))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/broken")
        .insert_header(("X-Request-Id", "req-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-123")
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"error": "Internal Server Error", "requestId": "req-123"})
    );

    let errors = state.metrics.error_metrics();
    assert_eq!(errors.total_errors, 1);
    assert!(errors.recent_errors[0].message.contains("snapshot lock poisoned"));
    assert_eq!(errors.recent_errors[0].context["route"], "/api/broken");
    assert_eq!(errors.recent_errors[0].context["requestId"], "req-123");
}

#[actix_web::test]
async fn request_id_is_generated_when_absent() {
    let state = silent_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    let id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("request id header");
    assert_eq!(id.len(), 36);
}
