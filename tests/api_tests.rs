//! HTTP API tests
//!
//! Routes are registered through `AppServices::configure`, the same wiring the
//! server uses, on top of a temporary SQLite database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, http::header};
use anyhow::anyhow;
use chrono::Utc;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};
use serde_json::{Value, json};
use tempfile::TempDir;

use etuhinta::analytics::today;
use etuhinta::api::jwt::JwtService;
use etuhinta::config::{StaticConfig, init_config};
use etuhinta::runtime::AppServices;
use etuhinta::services::llm::{
    ChatMessage, ChatRequest, ChatResponse, Choice, FunctionCall, Role, ToolCall,
};
use etuhinta::services::offer_search::SEARCH_TOOL_NAME;
use etuhinta::services::prompts::unavailable_message;
use etuhinta::services::{ChatCompletionProvider, Language, LlmHandle, LlmRegistry};
use etuhinta::storage::SeaOrmStorage;
use migration::entities::{business, offer, user};

const SECRET: &str = "api-test-secret";
const PEER: &str = "127.0.0.1:40000";

// =============================================================================
// Test Setup
// =============================================================================

static INIT: Once = Once::new();

fn init_static_config() {
    INIT.call_once(|| {
        init_config();
    });
}

struct Fixture {
    services: AppServices,
    registry: Arc<LlmRegistry>,
    user_id: i64,
    business_id: i64,
    offer_id: i64,
    _td: TempDir,
}

impl Fixture {
    fn bearer(&self) -> (header::HeaderName, String) {
        bearer_for(self.user_id)
    }
}

fn bearer_for(user_id: i64) -> (header::HeaderName, String) {
    let token = JwtService::new(SECRET)
        .issue_access_token(user_id, 15)
        .unwrap();
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

async fn seed(db: &DatabaseConnection) -> (i64, i64, i64) {
    let user_id = user::Entity::insert(user::ActiveModel {
        email: Set("api@example.fi".to_string()),
        city: Set(Some("Espoo".to_string())),
        ai_chat_count: Set(0),
        ai_chat_date: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .exec(db)
    .await
    .unwrap()
    .last_insert_id;

    let business_id = business::Entity::insert(business::ActiveModel {
        business_name: Set("Kahvila Aalto".to_string()),
        phone: Set(None),
        email: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .exec(db)
    .await
    .unwrap()
    .last_insert_id;

    let offer_id = offer::Entity::insert(offer::ActiveModel {
        business_id: Set(Some(business_id)),
        title: Set("Kahvi -50%".to_string()),
        description: Set(None),
        keywords: Set(Some("kahvi".to_string())),
        category: Set(None),
        city: Set(Some("Espoo".to_string())),
        address: Set(None),
        status: Set(offer::STATUS_APPROVED.to_string()),
        is_premium: Set(false),
        is_nationwide: Set(false),
        offer_type: Set(None),
        cost: Set(None),
        image_url: Set(None),
        offer_url: Set(None),
        starts_at: Set(None),
        expires_at: Set(None),
        created_at: Set(Utc::now()),
        approved_at: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .unwrap()
    .last_insert_id;

    (user_id, business_id, offer_id)
}

async fn fixture() -> Fixture {
    init_static_config();
    let td = TempDir::new().unwrap();
    let p = td.path().join("api_test.db");
    let u = format!("sqlite://{}?mode=rwc", p.display());
    let config = StaticConfig::default();
    let storage = Arc::new(
        SeaOrmStorage::new(&u, "sqlite", &config.database)
            .await
            .unwrap(),
    );
    let (user_id, business_id, offer_id) = seed(storage.get_db()).await;

    let registry = Arc::new(LlmRegistry::new());
    let services =
        AppServices::new(storage, &config, registry.clone(), JwtService::new(SECRET)).unwrap();

    Fixture {
        services,
        registry,
        user_id,
        business_id,
        offer_id,
        _td: td,
    }
}

macro_rules! app {
    ($fx:expr) => {
        test::init_service(App::new().configure(|cfg| $fx.services.configure(cfg))).await
    };
}

// =============================================================================
// Test Doubles
// =============================================================================

/// Replays queued model turns in order, counting calls
struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn install(registry: &LlmRegistry, chat_limit: i32, replies: Vec<ChatResponse>) -> Arc<Self> {
        let provider = Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        });
        registry.install(LlmHandle {
            provider: provider.clone(),
            model: "gpt-4o-mini".to_string(),
            chat_limit,
        });
        provider
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ChatCompletionProvider for ScriptedProvider {
    async fn complete(&self, _request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no reply"))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![Choice {
            message: ChatMessage::assistant(content),
            finish_reason: Some("stop".to_string()),
        }],
    }
}

fn search_call(arguments: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![Choice {
            message: ChatMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: SEARCH_TOOL_NAME.to_string(),
                        arguments: arguments.to_string(),
                    },
                }]),
                tool_call_id: None,
            },
            finish_reason: Some("tool_calls".to_string()),
        }],
    }
}

// =============================================================================
// Event Tracking Tests
// =============================================================================

#[actix_rt::test]
async fn test_track_event_requires_auth() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/analytics/track")
        .set_json(json!({"eventType": "view"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    // 签名不匹配
    let foreign = JwtService::new("other-secret")
        .issue_access_token(fx.user_id, 15)
        .unwrap();
    let req = TestRequest::post()
        .uri("/api/analytics/track")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", foreign)))
        .set_json(json!({"eventType": "view"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_track_event_empty_body() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/analytics/track")
        .insert_header(fx.bearer())
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "No data provided");
}

#[actix_rt::test]
async fn test_track_event_rolls_up_view() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/analytics/track")
        .insert_header(fx.bearer())
        .insert_header(("x-session-id", "sess-1"))
        .set_json(json!({
            "eventType": "view",
            "tarjousId": fx.offer_id.to_string(),
            "data": {"source": "search"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Analytics event tracked successfully");

    let counters = fx
        .services
        .analytics
        .rollup()
        .offer_counters(fx.offer_id, today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counters.views, 1);
    assert_eq!(counters.user_id, Some(fx.user_id));
    assert_eq!(counters.user_city.as_deref(), Some("Espoo"));
}

#[actix_rt::test]
async fn test_track_batch_accepted_and_drained() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/analytics/track/batch")
        .insert_header(fx.bearer())
        .set_json(json!({
            "events": [
                {"event_type": "view", "offer_id": fx.offer_id},
                {"event_type": "click", "offer_id": fx.offer_id},
                {"event_type": "search", "metadata": {"q": "kahvi"}}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["accepted"], 3);

    fx.services.analytics.shutdown().await;
    let counters = fx
        .services
        .analytics
        .rollup()
        .offer_counters(fx.offer_id, today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counters.views, 1);
    assert_eq!(counters.clicks, 1);
}

#[actix_rt::test]
async fn test_track_batch_requires_events_array() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/analytics/track/batch")
        .insert_header(fx.bearer())
        .set_json(json!({"events": "view"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "events array is required");
}

// =============================================================================
// Offer Interaction Tests
// =============================================================================

#[actix_rt::test]
async fn test_click_unknown_offer_is_not_found() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/tarjoukset/9999/click")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Offer not found");
}

#[actix_rt::test]
async fn test_click_counted_once_per_user() {
    let fx = fixture().await;
    let app = app!(fx);

    for expected in [true, false] {
        let req = TestRequest::post()
            .uri(&format!("/api/tarjoukset/{}/click", fx.offer_id))
            .insert_header(fx.bearer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Click tracked successfully");
        assert_eq!(body["counted"], expected);
    }

    // 匿名请求不去重
    for _ in 0..2 {
        let req = TestRequest::post()
            .uri(&format!("/api/tarjoukset/{}/view", fx.offer_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let counters = fx
        .services
        .analytics
        .rollup()
        .offer_counters(fx.offer_id, today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counters.clicks, 1);
    assert_eq!(counters.views, 2);
}

#[actix_rt::test]
async fn test_conversion_types() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri(&format!("/api/tarjoukset/{}/conversion/email", fx.offer_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Unknown conversion type: email");

    let req = TestRequest::post()
        .uri(&format!("/api/tarjoukset/{}/conversion/call", fx.offer_id))
        .insert_header(fx.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Conversion tracked successfully");

    let counters = fx
        .services
        .analytics
        .rollup()
        .offer_counters(fx.offer_id, today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counters.conversions, 1);
    assert_eq!(counters.conversion_calls, 1);
}

// =============================================================================
// Report Tests
// =============================================================================

#[actix_rt::test]
async fn test_reports() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri(&format!("/api/tarjoukset/{}/view", fx.offer_id))
        .insert_header(fx.bearer())
        .to_request();
    test::call_service(&app, req).await;

    let req = TestRequest::get()
        .uri("/api/analytics/cities?days=7")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["city"], "Espoo");
    assert_eq!(body["data"][0]["total_views"], 1);

    let req = TestRequest::get()
        .uri(&format!("/api/analytics/offers/{}/cities", fx.offer_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = TestRequest::get()
        .uri(&format!("/api/analytics/businesses/{}", fx.business_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["business_id"], fx.business_id);
    assert_eq!(body["data"]["totals"]["total_views"], 1);
    assert_eq!(body["data"]["days"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn test_dashboard_and_location_reports() {
    let fx = fixture().await;
    let app = app!(fx);

    for (kind, session) in [("view", "s-1"), ("view", "s-2"), ("click", "s-1")] {
        let req = TestRequest::post()
            .uri("/api/analytics/track")
            .insert_header(fx.bearer())
            .insert_header(("x-session-id", session))
            .set_json(json!({
                "event_type": kind,
                "offer_id": fx.offer_id,
                "metadata": {
                    "userLocation": { "lat": 60.2, "lng": 24.66 },
                    "city": "Espoo",
                    "action": kind
                }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let req = TestRequest::post()
        .uri(&format!("/api/tarjoukset/{}/view", fx.offer_id))
        .insert_header(fx.bearer())
        .to_request();
    test::call_service(&app, req).await;

    let req = TestRequest::get()
        .uri("/api/analytics/dashboard?days=7")
        .insert_header(fx.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let data = &body["data"];
    // 同一用户当天的浏览只汇总一次，原始事件全部保留
    assert_eq!(data["summary"]["totalViews"], 1);
    assert_eq!(data["summary"]["totalClicks"], 1);
    assert_eq!(data["summary"]["clickThroughRate"], 100.0);
    assert_eq!(data["summary"]["conversionRate"], 0.0);
    assert_eq!(data["dailyStats"].as_array().unwrap().len(), 1);
    assert_eq!(data["eventSummary"][0]["event_type"], "view");
    assert_eq!(data["eventSummary"][0]["count"], 2);
    assert_eq!(data["eventSummary"][0]["unique_sessions"], 2);
    assert_eq!(data["topOffers"][0]["offer_id"], fx.offer_id);
    assert_eq!(data["topOffers"][0]["title"], "Kahvi -50%");
    assert!(data["dateRange"]["start"].is_string());

    let req = TestRequest::get()
        .uri("/api/analytics/location")
        .insert_header(fx.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["city"], "Espoo");
    assert_eq!(body["data"][0]["total_views"], 2);
    assert_eq!(body["data"][0]["total_clicks"], 1);
    assert_eq!(body["data"][0]["unique_sessions"], 2);

    let req = TestRequest::get()
        .uri(&format!("/api/analytics/offers/{}/location", fx.offer_id))
        .insert_header(fx.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["action_type"], "view");
    assert_eq!(rows[0]["event_count"], 2);
}

// =============================================================================
// Chat Tests
// =============================================================================

fn chat_request(fx: &Fixture, body: Value) -> TestRequest {
    TestRequest::post()
        .uri("/api/ai-chat")
        .peer_addr(PEER.parse().unwrap())
        .insert_header(fx.bearer())
        .set_json(body)
}

#[actix_rt::test]
async fn test_chat_requires_auth() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/ai-chat")
        .peer_addr(PEER.parse().unwrap())
        .set_json(json!({"message": "hei"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_chat_validation() {
    let fx = fixture().await;
    let app = app!(fx);

    let resp = test::call_service(&app, chat_request(&fx, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Message is required");

    let resp = test::call_service(&app, chat_request(&fx, json!({"message": "   "})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Message cannot be empty");

    let long = "a".repeat(151);
    let resp = test::call_service(&app, chat_request(&fx, json!({"message": long})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"],
        "Message too long. Maximum 150 characters allowed. Your message has 151 characters."
    );
}

#[actix_rt::test]
async fn test_chat_success_counts_usage() {
    let fx = fixture().await;
    let provider = ScriptedProvider::install(&fx.registry, 2, vec![text("Moi! Mitä etsit?")]);
    let app = app!(fx);

    let resp = test::call_service(
        &app,
        chat_request(&fx, json!({"message": "moi", "language": "fi"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Moi! Mitä etsit?");
    assert_eq!(body["currentUsage"], 1);
    assert_eq!(body["dailyLimit"], 2);
    assert_eq!(body["limitReached"], false);
    assert!(body["offers"].as_array().unwrap().is_empty());
    assert!(body["timestamp"].is_string());
    assert_eq!(provider.calls(), 1);

    let req = TestRequest::get()
        .uri("/api/chat/usage")
        .insert_header(fx.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["daily_usage"], 1);
    assert_eq!(body["data"]["daily_limit"], 2);
    assert_eq!(body["data"]["remaining_today"], 1);
    assert_eq!(body["data"]["limitReached"], false);
}

#[actix_rt::test]
async fn test_chat_with_tool_call_counts_usage_once() {
    let fx = fixture().await;
    let provider = ScriptedProvider::install(
        &fx.registry,
        3,
        vec![
            search_call(r#"{"keywords":"kahvi"}"#),
            text("Löysin kahvitarjouksen Espoosta!"),
        ],
    );
    let app = app!(fx);

    let resp = test::call_service(
        &app,
        chat_request(
            &fx,
            json!({"message": "kahvia?", "userCity": "Espoo", "language": "fi"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Löysin kahvitarjouksen Espoosta!");
    assert_eq!(body["currentUsage"], 1);
    assert_eq!(provider.calls(), 2);

    let offers = body["offers"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["id"], fx.offer_id);
    assert_eq!(offers[0]["title"], "Kahvi -50%");
    assert_eq!(offers[0]["businessName"], "Kahvila Aalto");

    let usage = fx.services.quota.get_usage(fx.user_id).await.unwrap();
    assert_eq!(usage.current_usage, 1);
}

#[actix_rt::test]
async fn test_chat_limit_reached() {
    let fx = fixture().await;
    let provider = ScriptedProvider::install(&fx.registry, 1, vec![text("Hei!"), text("Ei pitäisi näkyä")]);
    let app = app!(fx);

    let resp = test::call_service(&app, chat_request(&fx, json!({"message": "hei"})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["limitReached"], true);

    let resp = test::call_service(&app, chat_request(&fx, json!({"message": "hei taas"})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["dailyLimit"], 1);
    assert_eq!(body["limitReached"], true);
    assert_eq!(
        body["message"],
        "Daily chat limit exceeded (1 messages per day). Please try again tomorrow."
    );

    // 超限请求不调用模型
    assert_eq!(provider.calls(), 1);
}

#[actix_rt::test]
async fn test_chat_unavailable_does_not_count() {
    let fx = fixture().await;
    let app = app!(fx);

    let resp = test::call_service(&app, chat_request(&fx, json!({"message": "hei"})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    // 未指定语言时默认芬兰语
    assert_eq!(body["message"], unavailable_message(Language::Fi));

    let usage = fx.services.quota.get_usage(fx.user_id).await.unwrap();
    assert_eq!(usage.current_usage, 0);
}

#[actix_rt::test]
async fn test_chat_unknown_user_is_limited() {
    let fx = fixture().await;
    ScriptedProvider::install(&fx.registry, 5, vec![text("Hei!")]);
    let app = app!(fx);

    let req = TestRequest::post()
        .uri("/api/ai-chat")
        .peer_addr(PEER.parse().unwrap())
        .insert_header(bearer_for(777))
        .set_json(json!({"message": "hei"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// Health Tests
// =============================================================================

#[actix_rt::test]
async fn test_health_endpoints() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "healthy");
    assert_eq!(body["database"]["backend"], "sqlite");

    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
