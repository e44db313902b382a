//! 单事件汇总
//!
//! 每次被接受的交互在一个事务内完成：去重登记、优惠日汇总 upsert、
//! 商家日汇总 upsert、活跃优惠数重算。
//!
//! ## 原子累加
//!
//! 计数列使用 `INSERT ... ON CONFLICT (key) DO UPDATE SET col = col + excluded.col`，
//! 首个事件建行与后续累加是同一条语句，不存在并发建行竞争。
//! `user_id` / `user_city` 使用 `COALESCE(col, excluded.col)`，先写者保留。

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, ExprTrait,
    PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait,
    sea_query::{Expr, Func, OnConflict, SimpleExpr},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics_core::{MetricsRecorder, db_failure_reason};
use crate::storage::backend::retry::{self, RetryConfig};
use migration::entities::{business_analytics, offer, offer_analytics, user};

use super::{ConversionKind, DedupGuard, DedupKind, InteractionKind, incoming_value, today};

/// 单次汇总结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupOutcome {
    Counted,
    /// 同一用户当天已计入
    Duplicate,
    /// 优惠不存在，未写入任何数据
    OfferNotFound,
}

impl RollupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollupOutcome::Counted => "counted",
            RollupOutcome::Duplicate => "duplicate",
            RollupOutcome::OfferNotFound => "offer_not_found",
        }
    }
}

/// 计数增量（同时用于优惠行与商家行）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
}

impl CounterDelta {
    pub fn interaction(kind: InteractionKind) -> Self {
        let mut delta = Self::default();
        match kind {
            InteractionKind::View => delta.views = 1,
            InteractionKind::Click => delta.clicks = 1,
            InteractionKind::Conversion => delta.conversions = 1,
        }
        delta
    }

    /// 细分转化同时计入总转化数
    pub fn conversion(kind: ConversionKind) -> Self {
        let mut delta = Self {
            conversions: 1,
            ..Self::default()
        };
        match kind {
            ConversionKind::Call => delta.conversion_calls = 1,
            ConversionKind::Directions => delta.conversion_directions = 1,
            ConversionKind::Website => delta.conversion_website = 1,
        }
        delta
    }

    pub fn merge(&mut self, other: &CounterDelta) {
        self.views += other.views;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
        self.conversion_calls += other.conversion_calls;
        self.conversion_directions += other.conversion_directions;
        self.conversion_website += other.conversion_website;
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// 优惠某天的计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OfferDailyCounters {
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
    pub user_id: Option<i64>,
    pub user_city: Option<String>,
}

impl OfferDailyCounters {
    /// 通过通用 `conversion` 事件计入、没有细分类型的转化数
    ///
    /// `conversions` 总是不小于三个细分计数之和。
    pub fn untyped_conversions(&self) -> i64 {
        self.conversions
            - (self.conversion_calls + self.conversion_directions + self.conversion_website)
    }
}

impl From<offer_analytics::Model> for OfferDailyCounters {
    fn from(m: offer_analytics::Model) -> Self {
        Self {
            views: m.views,
            clicks: m.clicks,
            conversions: m.conversions,
            conversion_calls: m.conversion_calls,
            conversion_directions: m.conversion_directions,
            conversion_website: m.conversion_website,
            user_id: m.user_id,
            user_city: m.user_city,
        }
    }
}

/// 优惠行的一次累加
#[derive(Debug, Clone)]
pub(crate) struct OfferRowDelta {
    pub offer_id: i64,
    pub delta: CounterDelta,
    pub user_id: Option<i64>,
    pub user_city: Option<String>,
}

pub struct AggregateRollup {
    db: DatabaseConnection,
    retry_config: RetryConfig,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AggregateRollup {
    pub fn new(
        db: DatabaseConnection,
        retry_config: RetryConfig,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            db,
            retry_config,
            metrics,
        }
    }

    /// 计入 view/click/conversion；任何错误都被吸收，返回是否被接受
    pub async fn apply_interaction(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: InteractionKind,
    ) -> bool {
        is_accepted(self.record_interaction(offer_id, user_id, kind).await)
    }

    /// 计入细分转化；任何错误都被吸收，返回是否被接受
    pub async fn apply_conversion(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: ConversionKind,
    ) -> bool {
        is_accepted(self.record_conversion(offer_id, user_id, kind).await)
    }

    /// 同 `apply_interaction`，但保留结果（错误时为 None）
    pub async fn record_interaction(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: InteractionKind,
    ) -> Option<RollupOutcome> {
        let result = self.try_apply_interaction(offer_id, user_id, kind).await;
        self.absorb("interaction", offer_id, result)
    }

    pub async fn record_conversion(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: ConversionKind,
    ) -> Option<RollupOutcome> {
        let result = self.try_apply_conversion(offer_id, user_id, kind).await;
        self.absorb("conversion", offer_id, result)
    }

    pub async fn try_apply_interaction(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: InteractionKind,
    ) -> Result<RollupOutcome, DbErr> {
        self.try_apply_on(
            today(),
            offer_id,
            user_id,
            kind.into(),
            CounterDelta::interaction(kind),
        )
        .await
    }

    pub async fn try_apply_conversion(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: ConversionKind,
    ) -> Result<RollupOutcome, DbErr> {
        self.try_apply_on(
            today(),
            offer_id,
            user_id,
            kind.into(),
            CounterDelta::conversion(kind),
        )
        .await
    }

    /// 在指定日期桶上执行汇总
    pub async fn try_apply_on(
        &self,
        date: NaiveDate,
        offer_id: i64,
        user_id: Option<i64>,
        kind: DedupKind,
        delta: CounterDelta,
    ) -> Result<RollupOutcome, DbErr> {
        let Some(business_id) = resolve_business(&self.db, offer_id).await? else {
            debug!("Offer {} not found, skipping {}", offer_id, kind.as_str());
            return Ok(RollupOutcome::OfferNotFound);
        };

        let user_city = match user_id {
            Some(uid) => lookup_user_city(&self.db, uid).await?,
            None => None,
        };

        let op_name = format!("rollup_{}", kind.as_str());
        let outcome = retry::with_retry(&op_name, self.retry_config, || {
            let row = OfferRowDelta {
                offer_id,
                delta,
                user_id,
                user_city: user_city.clone(),
            };
            async move {
                let txn = self.db.begin().await?;

                if !DedupGuard::claim(&txn, offer_id, user_id, date, kind).await? {
                    txn.rollback().await?;
                    return Ok(RollupOutcome::Duplicate);
                }

                upsert_offer_rows(&txn, date, std::slice::from_ref(&row)).await?;
                if let Some(business_id) = business_id {
                    upsert_business_rows(&txn, date, &[(business_id, delta)]).await?;
                    refresh_active_offers(&txn, business_id, date).await?;
                }

                txn.commit().await?;
                Ok(RollupOutcome::Counted)
            }
        })
        .await?;

        debug!(
            "Rollup {} for offer {} (user {:?}, city {:?}): {}",
            kind.as_str(),
            offer_id,
            user_id,
            user_city,
            outcome.as_str()
        );
        Ok(outcome)
    }

    fn absorb(
        &self,
        stage: &str,
        offer_id: i64,
        result: Result<RollupOutcome, DbErr>,
    ) -> Option<RollupOutcome> {
        match result {
            Ok(outcome) => {
                self.metrics.inc_analytics_event(outcome.as_str());
                Some(outcome)
            }
            Err(e) => {
                warn!("Failed to roll up {} for offer {}: {}", stage, offer_id, e);
                self.metrics
                    .inc_analytics_failure("rollup", db_failure_reason(&e));
                None
            }
        }
    }

    /// 读取优惠某天的计数
    pub async fn offer_counters(
        &self,
        offer_id: i64,
        date: NaiveDate,
    ) -> Result<Option<OfferDailyCounters>, DbErr> {
        let row = offer_analytics::Entity::find()
            .filter(offer_analytics::Column::OfferId.eq(offer_id))
            .filter(offer_analytics::Column::Date.eq(date))
            .one(&self.db)
            .await?;
        Ok(row.map(OfferDailyCounters::from))
    }

    /// 读取商家某天的汇总行
    pub async fn business_row(
        &self,
        business_id: i64,
        date: NaiveDate,
    ) -> Result<Option<business_analytics::Model>, DbErr> {
        business_analytics::Entity::find()
            .filter(business_analytics::Column::BusinessId.eq(business_id))
            .filter(business_analytics::Column::Date.eq(date))
            .one(&self.db)
            .await
    }
}

/// 计入或去重命中都算接受；优惠不存在与错误不算
fn is_accepted(outcome: Option<RollupOutcome>) -> bool {
    matches!(
        outcome,
        Some(RollupOutcome::Counted | RollupOutcome::Duplicate)
    )
}

/// offer → business；外层 None 表示优惠不存在
pub(crate) async fn resolve_business<C: ConnectionTrait>(
    db: &C,
    offer_id: i64,
) -> Result<Option<Option<i64>>, DbErr> {
    offer::Entity::find_by_id(offer_id)
        .select_only()
        .column(offer::Column::BusinessId)
        .into_tuple::<Option<i64>>()
        .one(db)
        .await
}

async fn lookup_user_city<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<Option<String>, DbErr> {
    let city = user::Entity::find_by_id(user_id)
        .select_only()
        .column(user::Column::City)
        .into_tuple::<Option<String>>()
        .one(db)
        .await?;
    Ok(city.flatten().filter(|c| !c.trim().is_empty()))
}

/// `col = col + <incoming>`
fn additive(backend: sea_orm::DatabaseBackend, column: &str) -> SimpleExpr {
    Expr::col(sea_orm::sea_query::Alias::new(column)).add(Expr::cust(incoming_value(backend, column)))
}

/// `COALESCE(col, <incoming>)`
fn keep_first(backend: sea_orm::DatabaseBackend, column: &str) -> SimpleExpr {
    let existing: SimpleExpr = Expr::col(sea_orm::sea_query::Alias::new(column)).into();
    Func::coalesce([existing, Expr::cust(incoming_value(backend, column))]).into()
}

/// 批量 upsert 优惠日汇总行
pub(crate) async fn upsert_offer_rows<C: ConnectionTrait>(
    db: &C,
    date: NaiveDate,
    rows: &[OfferRowDelta],
) -> Result<(), DbErr> {
    if rows.is_empty() {
        return Ok(());
    }

    let backend = db.get_database_backend();
    let now = Utc::now();

    let models: Vec<offer_analytics::ActiveModel> = rows
        .iter()
        .map(|row| offer_analytics::ActiveModel {
            offer_id: Set(row.offer_id),
            date: Set(date),
            views: Set(row.delta.views),
            clicks: Set(row.delta.clicks),
            conversions: Set(row.delta.conversions),
            conversion_calls: Set(row.delta.conversion_calls),
            conversion_directions: Set(row.delta.conversion_directions),
            conversion_website: Set(row.delta.conversion_website),
            user_id: Set(row.user_id),
            user_city: Set(row.user_city.clone()),
            created_at: Set(now),
            ..Default::default()
        })
        .collect();

    let mut on_conflict = OnConflict::columns([
        offer_analytics::Column::OfferId,
        offer_analytics::Column::Date,
    ]);
    for (column, name) in [
        (offer_analytics::Column::Views, "views"),
        (offer_analytics::Column::Clicks, "clicks"),
        (offer_analytics::Column::Conversions, "conversions"),
        (offer_analytics::Column::ConversionCalls, "conversion_calls"),
        (
            offer_analytics::Column::ConversionDirections,
            "conversion_directions",
        ),
        (offer_analytics::Column::ConversionWebsite, "conversion_website"),
    ] {
        on_conflict.value(column, additive(backend, name));
    }
    on_conflict.value(offer_analytics::Column::UserId, keep_first(backend, "user_id"));
    on_conflict.value(
        offer_analytics::Column::UserCity,
        keep_first(backend, "user_city"),
    );

    offer_analytics::Entity::insert_many(models)
        .on_conflict(on_conflict.to_owned())
        .exec(db)
        .await?;

    Ok(())
}

/// 批量 upsert 商家日汇总行（active_offers 由 `refresh_active_offers` 负责）
pub(crate) async fn upsert_business_rows<C: ConnectionTrait>(
    db: &C,
    date: NaiveDate,
    rows: &[(i64, CounterDelta)],
) -> Result<(), DbErr> {
    if rows.is_empty() {
        return Ok(());
    }

    let backend = db.get_database_backend();
    let now = Utc::now();

    let models: Vec<business_analytics::ActiveModel> = rows
        .iter()
        .map(|(business_id, delta)| business_analytics::ActiveModel {
            business_id: Set(*business_id),
            date: Set(date),
            total_views: Set(delta.views),
            total_clicks: Set(delta.clicks),
            total_conversions: Set(delta.conversions),
            total_spent: Set(0),
            active_offers: Set(0),
            conversion_calls: Set(delta.conversion_calls),
            conversion_directions: Set(delta.conversion_directions),
            conversion_website: Set(delta.conversion_website),
            created_at: Set(now),
            ..Default::default()
        })
        .collect();

    let mut on_conflict = OnConflict::columns([
        business_analytics::Column::BusinessId,
        business_analytics::Column::Date,
    ]);
    for (column, name) in [
        (business_analytics::Column::TotalViews, "total_views"),
        (business_analytics::Column::TotalClicks, "total_clicks"),
        (business_analytics::Column::TotalConversions, "total_conversions"),
        (business_analytics::Column::ConversionCalls, "conversion_calls"),
        (
            business_analytics::Column::ConversionDirections,
            "conversion_directions",
        ),
        (
            business_analytics::Column::ConversionWebsite,
            "conversion_website",
        ),
    ] {
        on_conflict.value(column, additive(backend, name));
    }

    business_analytics::Entity::insert_many(models)
        .on_conflict(on_conflict.to_owned())
        .exec(db)
        .await?;

    Ok(())
}

/// 重算商家当前活跃优惠数（已审核且未过期）
pub(crate) async fn refresh_active_offers<C: ConnectionTrait>(
    db: &C,
    business_id: i64,
    date: NaiveDate,
) -> Result<i64, DbErr> {
    let now = Utc::now();
    let active = offer::Entity::find()
        .filter(offer::Column::BusinessId.eq(business_id))
        .filter(offer::Column::Status.eq(offer::STATUS_APPROVED))
        .filter(
            Condition::any()
                .add(offer::Column::ExpiresAt.is_null())
                .add(offer::Column::ExpiresAt.gt(now)),
        )
        .count(db)
        .await? as i64;

    business_analytics::Entity::update_many()
        .col_expr(business_analytics::Column::ActiveOffers, Expr::value(active))
        .filter(business_analytics::Column::BusinessId.eq(business_id))
        .filter(business_analytics::Column::Date.eq(date))
        .exec(db)
        .await?;

    Ok(active)
}
