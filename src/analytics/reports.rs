//! 汇总表读取：城市维度与商家维度
//!
//! 分组在内存中完成，避免依赖各数据库方言的 ROUND/NULLIF 语义。

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;

use migration::entities::{business_analytics, offer_analytics};

use super::today;

/// 无城市信息时的分组名
pub const UNKNOWN_CITY: &str = "Unknown";

/// 闭区间日期范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 截止今天、向前 `days` 天
    pub fn last_days(days: u32) -> Self {
        let end = today();
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityStats {
    pub city: String,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub total_calls: i64,
    pub total_directions: i64,
    pub total_website: i64,
    pub unique_offers: usize,
    /// conversions / views * 100，保留两位小数；无浏览时为 None
    pub conversion_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusinessTotals {
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessDay {
    pub date: NaiveDate,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub total_spent: i64,
    pub active_offers: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
}

impl From<business_analytics::Model> for BusinessDay {
    fn from(m: business_analytics::Model) -> Self {
        Self {
            date: m.date,
            total_views: m.total_views,
            total_clicks: m.total_clicks,
            total_conversions: m.total_conversions,
            total_spent: m.total_spent,
            active_offers: m.active_offers,
            conversion_calls: m.conversion_calls,
            conversion_directions: m.conversion_directions,
            conversion_website: m.conversion_website,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessReport {
    pub business_id: i64,
    pub range: DateRange,
    pub days: Vec<BusinessDay>,
    pub totals: BusinessTotals,
}

pub struct AnalyticsReports {
    pub(super) db: DatabaseConnection,
}

impl AnalyticsReports {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 全部优惠按用户城市分组
    pub async fn city_analytics(&self, range: DateRange) -> Result<Vec<CityStats>, DbErr> {
        let rows = offer_analytics::Entity::find()
            .filter(offer_analytics::Column::Date.between(range.start, range.end))
            .all(&self.db)
            .await?;
        Ok(group_by_city(&rows))
    }

    /// 单个优惠按用户城市分组
    pub async fn offer_city_breakdown(
        &self,
        offer_id: i64,
        range: DateRange,
    ) -> Result<Vec<CityStats>, DbErr> {
        let rows = offer_analytics::Entity::find()
            .filter(offer_analytics::Column::OfferId.eq(offer_id))
            .filter(offer_analytics::Column::Date.between(range.start, range.end))
            .all(&self.db)
            .await?;
        Ok(group_by_city(&rows))
    }

    /// 商家日序列与区间合计
    pub async fn business_daily(
        &self,
        business_id: i64,
        range: DateRange,
    ) -> Result<BusinessReport, DbErr> {
        let rows = business_analytics::Entity::find()
            .filter(business_analytics::Column::BusinessId.eq(business_id))
            .filter(business_analytics::Column::Date.between(range.start, range.end))
            .order_by_asc(business_analytics::Column::Date)
            .all(&self.db)
            .await?;

        let mut totals = BusinessTotals::default();
        for row in &rows {
            totals.total_views += row.total_views;
            totals.total_clicks += row.total_clicks;
            totals.total_conversions += row.total_conversions;
            totals.conversion_calls += row.conversion_calls;
            totals.conversion_directions += row.conversion_directions;
            totals.conversion_website += row.conversion_website;
        }

        Ok(BusinessReport {
            business_id,
            range,
            days: rows.into_iter().map(BusinessDay::from).collect(),
            totals,
        })
    }
}

/// 按 `user_city` 分组求和，结果按浏览数降序
pub fn group_by_city(rows: &[offer_analytics::Model]) -> Vec<CityStats> {
    let mut groups: BTreeMap<String, (CityStats, Vec<i64>)> = BTreeMap::new();

    for row in rows {
        let city = row
            .user_city
            .clone()
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());
        let (stats, offers) = groups.entry(city.clone()).or_insert_with(|| {
            (
                CityStats {
                    city,
                    ..Default::default()
                },
                Vec::new(),
            )
        });
        stats.total_views += row.views;
        stats.total_clicks += row.clicks;
        stats.total_conversions += row.conversions;
        stats.total_calls += row.conversion_calls;
        stats.total_directions += row.conversion_directions;
        stats.total_website += row.conversion_website;
        offers.push(row.offer_id);
    }

    let mut result: Vec<CityStats> = groups
        .into_values()
        .map(|(mut stats, mut offers)| {
            offers.sort_unstable();
            offers.dedup();
            stats.unique_offers = offers.len();
            stats.conversion_rate = conversion_rate(stats.total_conversions, stats.total_views);
            stats
        })
        .collect();

    result.sort_by(|a, b| b.total_views.cmp(&a.total_views));
    result
}

pub fn conversion_rate(conversions: i64, views: i64) -> Option<f64> {
    if views == 0 {
        return None;
    }
    let rate = conversions as f64 / views as f64 * 100.0;
    Some((rate * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(offer_id: i64, city: Option<&str>, views: i64, conversions: i64) -> offer_analytics::Model {
        offer_analytics::Model {
            id: 0,
            offer_id,
            date: today(),
            views,
            clicks: 0,
            conversions,
            conversion_calls: 0,
            conversion_directions: 0,
            conversion_website: 0,
            user_id: None,
            user_city: city.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_conversion_rate_rounding() {
        assert_eq!(conversion_rate(1, 3), Some(33.33));
        assert_eq!(conversion_rate(2, 3), Some(66.67));
        assert_eq!(conversion_rate(5, 0), None);
    }

    #[test]
    fn test_group_by_city() {
        let rows = vec![
            row(1, Some("Helsinki"), 10, 1),
            row(2, Some("Helsinki"), 5, 0),
            row(1, Some("Helsinki"), 1, 0),
            row(3, None, 20, 2),
            row(4, Some("Espoo"), 0, 0),
        ];
        let stats = group_by_city(&rows);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].city, UNKNOWN_CITY);
        assert_eq!(stats[0].conversion_rate, Some(10.0));
        assert_eq!(stats[1].city, "Helsinki");
        assert_eq!(stats[1].total_views, 16);
        assert_eq!(stats[1].unique_offers, 2);
        assert_eq!(stats[2].city, "Espoo");
        assert_eq!(stats[2].conversion_rate, None);
    }

    #[test]
    fn test_last_days_range() {
        let range = DateRange::last_days(30);
        assert_eq!(range.end, today());
        assert_eq!((range.end - range.start).num_days(), 30);
    }
}
