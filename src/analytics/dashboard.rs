//! 原始事件上的看板查询
//!
//! - `dashboard`: 按事件类型汇总、热门优惠、按日合计与转化率/点击率
//! - `location_breakdown` / `offer_location_breakdown`: 按事件 metadata 中的
//!   `userLocation` 与 `city` 分组
//!
//! metadata 以 JSON 文本保存，位置分组在内存中解析，不依赖数据库的 JSON 函数。

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
    sea_query::Expr,
};
use serde::Serialize;
use serde_json::Value;

use migration::entities::{analytics_event, offer, offer_analytics};

use super::reports::{AnalyticsReports, DateRange, UNKNOWN_CITY, conversion_rate};

/// 热门优惠条数
pub const TOP_OFFERS_LIMIT: u64 = 10;
/// 全站位置分组最多返回的条数
pub const LOCATION_LIMIT: usize = 50;

// ============ 结果类型 ============

/// 某类事件的次数与去重会话/用户数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct EventTypeSummary {
    pub event_type: String,
    pub count: i64,
    pub unique_sessions: i64,
    pub unique_users: i64,
}

#[derive(Debug, FromQueryResult)]
struct OfferEventRow {
    offer_id: i64,
    event_type: String,
    event_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopOffer {
    pub offer_id: i64,
    pub title: String,
    pub category: Option<String>,
    pub event_type: String,
    pub event_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    /// 无浏览时为 0
    pub conversion_rate: f64,
    pub click_through_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub summary: DashboardSummary,
    pub daily_stats: Vec<DailyTotals>,
    pub event_summary: Vec<EventTypeSummary>,
    pub top_offers: Vec<TopOffer>,
    pub date_range: DateRange,
}

/// 一个位置（坐标 + 城市，可选再按 action 细分）的事件统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationStats {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    pub event_count: i64,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub unique_sessions: usize,
    pub unique_users: usize,
    pub last_interaction: Option<DateTime<Utc>>,
}

impl DateRange {
    /// `[start 00:00, end + 1 天 00:00)`，UTC
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start.and_time(NaiveTime::MIN).and_utc();
        let end = self
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN)
            .and_utc();
        (start, end)
    }
}

// ============ 查询 ============

impl AnalyticsReports {
    pub async fn dashboard(&self, range: DateRange) -> Result<DashboardReport, DbErr> {
        let daily_stats = self.daily_totals(range).await?;
        let event_summary = self.event_summary(range).await?;
        let top_offers = self.top_offers(range).await?;

        Ok(DashboardReport {
            summary: summarize(&daily_stats),
            daily_stats,
            event_summary,
            top_offers,
            date_range: range,
        })
    }

    /// 全部带位置的事件按位置分组，浏览数降序，最多 50 条
    pub async fn location_breakdown(&self, range: DateRange) -> Result<Vec<LocationStats>, DbErr> {
        let events = self.located_events(range, None).await?;
        let mut stats = group_by_location(&events, false);
        stats.truncate(LOCATION_LIMIT);
        Ok(stats)
    }

    /// 单个优惠按位置与 action 分组，事件数降序
    pub async fn offer_location_breakdown(
        &self,
        offer_id: i64,
        range: DateRange,
    ) -> Result<Vec<LocationStats>, DbErr> {
        let events = self.located_events(range, Some(offer_id)).await?;
        Ok(group_by_location(&events, true))
    }

    async fn daily_totals(&self, range: DateRange) -> Result<Vec<DailyTotals>, DbErr> {
        let rows = offer_analytics::Entity::find()
            .filter(offer_analytics::Column::Date.between(range.start, range.end))
            .all(&self.db)
            .await?;

        let mut days: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();
        for row in rows {
            let day = days.entry(row.date).or_insert_with(|| DailyTotals {
                date: row.date,
                ..Default::default()
            });
            day.total_views += row.views;
            day.total_clicks += row.clicks;
            day.total_conversions += row.conversions;
        }
        Ok(days.into_values().collect())
    }

    async fn event_summary(&self, range: DateRange) -> Result<Vec<EventTypeSummary>, DbErr> {
        let (start, end) = range.bounds();
        analytics_event::Entity::find()
            .select_only()
            .column(analytics_event::Column::EventType)
            .column_as(analytics_event::Column::Id.count(), "count")
            .column_as(Expr::cust("COUNT(DISTINCT session_id)"), "unique_sessions")
            .column_as(Expr::cust("COUNT(DISTINCT user_id)"), "unique_users")
            .filter(analytics_event::Column::CreatedAt.gte(start))
            .filter(analytics_event::Column::CreatedAt.lt(end))
            .group_by(analytics_event::Column::EventType)
            .order_by_desc(Expr::cust("count"))
            .into_model::<EventTypeSummary>()
            .all(&self.db)
            .await
    }

    /// view/click 事件最多的 (优惠, 类型) 组合；已删除的优惠不出现
    async fn top_offers(&self, range: DateRange) -> Result<Vec<TopOffer>, DbErr> {
        let (start, end) = range.bounds();
        let rows = analytics_event::Entity::find()
            .select_only()
            .column(analytics_event::Column::OfferId)
            .column(analytics_event::Column::EventType)
            .column_as(analytics_event::Column::Id.count(), "event_count")
            .filter(analytics_event::Column::OfferId.is_not_null())
            .filter(analytics_event::Column::EventType.is_in(["view", "click"]))
            .filter(analytics_event::Column::CreatedAt.gte(start))
            .filter(analytics_event::Column::CreatedAt.lt(end))
            .group_by(analytics_event::Column::OfferId)
            .group_by(analytics_event::Column::EventType)
            .order_by_desc(Expr::cust("event_count"))
            .limit(TOP_OFFERS_LIMIT)
            .into_model::<OfferEventRow>()
            .all(&self.db)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.offer_id).collect();
        let offers: HashMap<i64, offer::Model> = offer::Entity::find()
            .filter(offer::Column::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let offer = offers.get(&row.offer_id)?;
                Some(TopOffer {
                    offer_id: row.offer_id,
                    title: offer.title.clone(),
                    category: offer.category.clone(),
                    event_type: row.event_type,
                    event_count: row.event_count,
                })
            })
            .collect())
    }

    async fn located_events(
        &self,
        range: DateRange,
        offer_id: Option<i64>,
    ) -> Result<Vec<analytics_event::Model>, DbErr> {
        let (start, end) = range.bounds();
        let mut query = analytics_event::Entity::find()
            .filter(analytics_event::Column::Metadata.is_not_null())
            .filter(analytics_event::Column::CreatedAt.gte(start))
            .filter(analytics_event::Column::CreatedAt.lt(end));
        if let Some(offer_id) = offer_id {
            query = query.filter(analytics_event::Column::OfferId.eq(offer_id));
        }
        query.all(&self.db).await
    }
}

// ============ 内存聚合 ============

pub fn summarize(days: &[DailyTotals]) -> DashboardSummary {
    let mut summary = DashboardSummary::default();
    for day in days {
        summary.total_views += day.total_views;
        summary.total_clicks += day.total_clicks;
        summary.total_conversions += day.total_conversions;
    }
    summary.conversion_rate =
        conversion_rate(summary.total_conversions, summary.total_views).unwrap_or(0.0);
    summary.click_through_rate =
        conversion_rate(summary.total_clicks, summary.total_views).unwrap_or(0.0);
    summary
}

/// 坐标保留原始文本作为分组键，数值与字符串写法都接受
fn coordinate(location: &Value, key: &str) -> Option<String> {
    match location.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn text_field(metadata: &Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

type LocationKey = (Option<String>, Option<String>, String, Option<String>);

#[derive(Default)]
struct LocationAcc {
    stats: LocationStats,
    sessions: HashSet<String>,
    users: HashSet<i64>,
}

/// 只统计 metadata 含非空 `userLocation` 的事件
///
/// `by_action` 为 true 时按 metadata `action` 再细分并按事件数排序，
/// 否则按浏览数排序。
pub fn group_by_location(events: &[analytics_event::Model], by_action: bool) -> Vec<LocationStats> {
    let mut groups: HashMap<LocationKey, LocationAcc> = HashMap::new();

    for event in events {
        let Some(metadata) = event
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str::<Value>(m).ok())
        else {
            continue;
        };
        let location = match metadata.get("userLocation") {
            Some(Value::Null) | None => continue,
            Some(location) => location,
        };

        let lat = coordinate(location, "lat");
        let lng = coordinate(location, "lng");
        let city = text_field(&metadata, "city").unwrap_or_else(|| UNKNOWN_CITY.to_string());
        let action = if by_action {
            text_field(&metadata, "action")
        } else {
            None
        };

        let key = (lat, lng, city, action);
        let acc = groups.entry(key.clone()).or_insert_with(|| LocationAcc {
            stats: LocationStats {
                latitude: key.0.as_deref().and_then(|v| v.parse().ok()),
                longitude: key.1.as_deref().and_then(|v| v.parse().ok()),
                city: key.2.clone(),
                action_type: key.3.clone(),
                ..Default::default()
            },
            ..Default::default()
        });

        let stats = &mut acc.stats;
        stats.event_count += 1;
        match event.event_type.as_str() {
            "view" => stats.total_views += 1,
            "click" => stats.total_clicks += 1,
            "conversion" => stats.total_conversions += 1,
            _ => {}
        }
        stats.last_interaction = stats.last_interaction.max(Some(event.created_at));
        if let Some(session) = &event.session_id {
            acc.sessions.insert(session.clone());
        }
        if let Some(user_id) = event.user_id {
            acc.users.insert(user_id);
        }
    }

    let mut result: Vec<LocationStats> = groups
        .into_values()
        .map(|acc| LocationStats {
            unique_sessions: acc.sessions.len(),
            unique_users: acc.users.len(),
            ..acc.stats
        })
        .collect();

    if by_action {
        result.sort_by(|a, b| b.event_count.cmp(&a.event_count).then_with(|| a.city.cmp(&b.city)));
    } else {
        result.sort_by(|a, b| b.total_views.cmp(&a.total_views).then_with(|| a.city.cmp(&b.city)));
    }
    result
}
