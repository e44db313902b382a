pub mod analytics;
pub mod chat;
pub mod health;
pub mod helpers;

use actix_governor::Governor;
use actix_web::web;

use crate::api::middleware::ChatRateLimit;

pub use health::{AppStartTime, HealthService, health_routes};

/// `/api` 路由
///
/// 包含：
/// - 事件追踪：/analytics/track, /analytics/track/batch
/// - 优惠交互：/tarjoukset/{offer_id}/click|view|conversion/{type}
/// - 报表：/analytics/cities, /analytics/offers/{offer_id}/cities, /analytics/businesses/{business_id}
/// - 看板：/analytics/dashboard, /analytics/location, /analytics/offers/{offer_id}/location
/// - 聊天：/ai-chat（限流）, /chat/usage
pub fn api_routes(chat_rate_limit: &ChatRateLimit) -> actix_web::Scope {
    web::scope("/api")
        .service(
            web::scope("/analytics")
                .route("/track", web::post().to(analytics::track_event))
                .route("/track/batch", web::post().to(analytics::track_batch))
                .route("/cities", web::get().to(analytics::city_analytics))
                .route(
                    "/offers/{offer_id}/cities",
                    web::get().to(analytics::offer_city_analytics),
                )
                .route(
                    "/offers/{offer_id}/location",
                    web::get().to(analytics::offer_location_analytics),
                )
                .route(
                    "/businesses/{business_id}",
                    web::get().to(analytics::business_analytics),
                )
                .route("/dashboard", web::get().to(analytics::dashboard))
                .route("/location", web::get().to(analytics::location_analytics)),
        )
        .service(
            web::scope("/tarjoukset/{offer_id}")
                .route("/click", web::post().to(analytics::track_click))
                .route("/view", web::post().to(analytics::track_view))
                .route(
                    "/conversion/{kind}",
                    web::post().to(analytics::track_conversion),
                ),
        )
        .route(
            "/ai-chat",
            web::post()
                .to(chat::ai_chat)
                .wrap(Governor::new(chat_rate_limit)),
        )
        .route("/chat/usage", web::get().to(chat::chat_usage))
}
