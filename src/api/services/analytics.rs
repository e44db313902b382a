//! Analytics endpoints
//!
//! - `POST /api/analytics/track` single event
//! - `POST /api/analytics/track/batch` queued batch
//! - `POST /api/tarjoukset/{offer_id}/{click|view}` and `/conversion/{type}`
//! - `GET /api/analytics/cities`, `/offers/{id}/cities`, `/businesses/{id}`
//! - `GET /api/analytics/dashboard`, `/location`, `/offers/{id}/location`
//!
//! Tracking never surfaces storage failures; only malformed input and a full
//! ingest queue produce non-2xx responses.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header::USER_AGENT;
use actix_web::{HttpRequest, Responder, web};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::analytics::{
    AnalyticsReports, AnalyticsService, ConversionKind, DateRange, InteractionKind, NewEvent,
    RollupOutcome,
};
use crate::api::middleware::{AuthenticatedUser, OptionalUser};

use super::helpers::{data_response, error_response, json_response, message_response};

/// 报表默认时间窗口（天）
pub const DEFAULT_REPORT_DAYS: u32 = 30;
/// 未携带 `x-session-id` 时的会话标识
pub const UNKNOWN_SESSION: &str = "unknown";

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub days: Option<u32>,
}

impl ReportQuery {
    fn range(&self) -> DateRange {
        DateRange::last_days(self.days.unwrap_or(DEFAULT_REPORT_DAYS))
    }
}

/// 请求上下文中与事件相关的部分
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_request(req: &HttpRequest) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            session_id: header("x-session-id").unwrap_or_else(|| UNKNOWN_SESSION.to_string()),
            ip_address: req.connection_info().peer_addr().map(str::to_string),
            user_agent: header(USER_AGENT.as_str()),
        }
    }
}

/// 按别名读取第一个非空字段
fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Object(m) => !m.is_empty(),
            _ => true,
        })
}

/// offer id 可能是数字或数字字符串
fn parse_offer_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 把客户端载荷映射为事件
///
/// 字段别名：`event_type|eventType`，`offer_id|tarjousId|offerId`，`metadata|data`。
pub fn event_from_payload(
    payload: &Map<String, Value>,
    user_id: Option<i64>,
    meta: &RequestMeta,
) -> NewEvent {
    let event_type = first_present(payload, &["event_type", "eventType"])
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    NewEvent {
        event_type,
        session_id: Some(meta.session_id.clone()),
        user_id,
        offer_id: first_present(payload, &["offer_id", "tarjousId", "offerId"])
            .and_then(parse_offer_id),
        metadata: first_present(payload, &["metadata", "data"]).cloned(),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        created_at: None,
    }
}

fn parse_object(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

pub async fn track_event(
    req: HttpRequest,
    user: AuthenticatedUser,
    body: web::Bytes,
    analytics: web::Data<Arc<AnalyticsService>>,
) -> impl Responder {
    let Some(payload) = parse_object(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "No data provided");
    };

    let meta = RequestMeta::from_request(&req);
    let event = event_from_payload(&payload, Some(user.user_id), &meta);
    let event_id = analytics.track_event(event).await;
    debug!(
        "Analytics event from user {} stored: {}",
        user.user_id,
        event_id.is_some()
    );

    message_response("Analytics event tracked successfully")
}

pub async fn track_batch(
    req: HttpRequest,
    user: AuthenticatedUser,
    body: web::Bytes,
    analytics: web::Data<Arc<AnalyticsService>>,
) -> impl Responder {
    let items = match parse_object(&body).and_then(|mut p| p.remove("events")) {
        Some(Value::Array(items)) => items,
        _ => return error_response(StatusCode::BAD_REQUEST, "events array is required"),
    };

    let meta = RequestMeta::from_request(&req);
    let events: Vec<NewEvent> = items
        .iter()
        .filter_map(Value::as_object)
        .map(|p| event_from_payload(p, Some(user.user_id), &meta))
        .collect();
    let accepted = events.len();

    match analytics.submit_batch(events) {
        Ok(()) => json_response(
            StatusCode::ACCEPTED,
            true,
            Some("Batch accepted".to_string()),
            Some(json!({ "accepted": accepted })),
        ),
        Err(e) => {
            warn!("Batch of {} events rejected: {}", accepted, e);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Analytics queue is busy, please retry later",
            )
        }
    }
}

fn interaction_response(outcome: Option<RollupOutcome>, label: &str) -> actix_web::HttpResponse {
    match outcome {
        Some(RollupOutcome::OfferNotFound) => {
            error_response(StatusCode::NOT_FOUND, "Offer not found")
        }
        outcome => json_response(
            StatusCode::OK,
            true,
            Some(format!("{} tracked successfully", label)),
            Some(json!({ "counted": outcome == Some(RollupOutcome::Counted) })),
        ),
    }
}

pub async fn track_click(
    path: web::Path<i64>,
    user: OptionalUser,
    analytics: web::Data<Arc<AnalyticsService>>,
) -> impl Responder {
    let outcome = analytics
        .record_interaction(path.into_inner(), user.user_id(), InteractionKind::Click)
        .await;
    interaction_response(outcome, "Click")
}

pub async fn track_view(
    path: web::Path<i64>,
    user: OptionalUser,
    analytics: web::Data<Arc<AnalyticsService>>,
) -> impl Responder {
    let outcome = analytics
        .record_interaction(path.into_inner(), user.user_id(), InteractionKind::View)
        .await;
    interaction_response(outcome, "View")
}

pub async fn track_conversion(
    path: web::Path<(i64, String)>,
    user: OptionalUser,
    analytics: web::Data<Arc<AnalyticsService>>,
) -> impl Responder {
    let (offer_id, kind) = path.into_inner();
    let Ok(kind) = kind.parse::<ConversionKind>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown conversion type: {}", kind),
        );
    };

    let outcome = analytics
        .record_conversion(offer_id, user.user_id(), kind)
        .await;
    interaction_response(outcome, "Conversion")
}

pub async fn city_analytics(
    _user: AuthenticatedUser,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    match reports.city_analytics(query.range()).await {
        Ok(rows) => data_response(rows),
        Err(e) => {
            error!("Failed to get city analytics: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get city analytics",
            )
        }
    }
}

pub async fn offer_city_analytics(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    let offer_id = path.into_inner();
    match reports.offer_city_breakdown(offer_id, query.range()).await {
        Ok(rows) => data_response(rows),
        Err(e) => {
            error!("Failed to get city analytics for offer {}: {}", offer_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get offer location analytics",
            )
        }
    }
}

pub async fn business_analytics(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    let business_id = path.into_inner();
    match reports.business_daily(business_id, query.range()).await {
        Ok(report) => data_response(report),
        Err(e) => {
            error!("Failed to get analytics for business {}: {}", business_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get business analytics",
            )
        }
    }
}

pub async fn dashboard(
    _user: AuthenticatedUser,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    match reports.dashboard(query.range()).await {
        Ok(report) => data_response(report),
        Err(e) => {
            error!("Failed to get dashboard analytics: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get dashboard analytics",
            )
        }
    }
}

pub async fn location_analytics(
    _user: AuthenticatedUser,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    match reports.location_breakdown(query.range()).await {
        Ok(rows) => data_response(rows),
        Err(e) => {
            error!("Failed to get location analytics: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get location analytics",
            )
        }
    }
}

pub async fn offer_location_analytics(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<ReportQuery>,
    reports: web::Data<Arc<AnalyticsReports>>,
) -> impl Responder {
    let offer_id = path.into_inner();
    match reports
        .offer_location_breakdown(offer_id, query.range())
        .await
    {
        Ok(rows) => data_response(rows),
        Err(e) => {
            error!("Failed to get location analytics for offer {}: {}", offer_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get offer location analytics",
            )
        }
    }
}
