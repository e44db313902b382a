//! 批量写入路径
//!
//! 与逐条调用的汇总结果一致（不做去重），只是把 N 次往返压缩为：
//! 一次事件批量插入、一次优惠解析查询、两条多行 upsert。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::metrics_core::MetricsRecorder;
use crate::storage::backend::retry::{self, RetryConfig};
use migration::entities::offer;

use super::event_store::EventStore;
use super::rollup::{
    CounterDelta, OfferRowDelta, refresh_active_offers, upsert_business_rows, upsert_offer_rows,
};
use super::{InteractionKind, NewEvent, today};

/// 单个优惠在一批事件中的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InteractionTally {
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
}

impl InteractionTally {
    pub fn record(&mut self, kind: InteractionKind) {
        match kind {
            InteractionKind::View => self.views += 1,
            InteractionKind::Click => self.clicks += 1,
            InteractionKind::Conversion => self.conversions += 1,
        }
    }

    pub fn merge(&mut self, other: &InteractionTally) {
        self.views += other.views;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
    }

    pub fn total(&self) -> i64 {
        self.views + self.clicks + self.conversions
    }
}

impl From<InteractionTally> for CounterDelta {
    fn from(t: InteractionTally) -> Self {
        CounterDelta {
            views: t.views,
            clicks: t.clicks,
            conversions: t.conversions,
            ..Default::default()
        }
    }
}

/// 按 offer_id 分组计数
///
/// 没有 offer_id 或类型不可汇总的事件不参与计数。
pub fn tally_by_offer(events: &[NewEvent]) -> BTreeMap<i64, InteractionTally> {
    let mut tallies: BTreeMap<i64, InteractionTally> = BTreeMap::new();
    for event in events {
        let (Some(offer_id), Some(kind)) = (event.offer_id, event.interaction_kind()) else {
            continue;
        };
        tallies.entry(offer_id).or_default().record(kind);
    }
    tallies
}

/// 把优惠计数折叠到商家；`owners` 中不存在的优惠被丢弃
pub fn fold_by_business(
    tallies: &BTreeMap<i64, InteractionTally>,
    owners: &HashMap<i64, Option<i64>>,
) -> BTreeMap<i64, InteractionTally> {
    let mut by_business: BTreeMap<i64, InteractionTally> = BTreeMap::new();
    for (offer_id, tally) in tallies {
        if let Some(Some(business_id)) = owners.get(offer_id) {
            by_business.entry(*business_id).or_default().merge(tally);
        }
    }
    by_business
}

/// 一次批量写入的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub events_stored: usize,
    pub offers_touched: usize,
    pub businesses_touched: usize,
}

pub struct BatchIngestor {
    db: DatabaseConnection,
    retry_config: RetryConfig,
    metrics: Arc<dyn MetricsRecorder>,
}

impl BatchIngestor {
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

    pub async fn ingest_batch(&self, events: &[NewEvent]) -> Result<BatchReport, DbErr> {
        self.ingest_batch_on(today(), events).await
    }

    /// 在指定日期桶上写入一批事件（整批一个事务）
    pub async fn ingest_batch_on(
        &self,
        date: NaiveDate,
        events: &[NewEvent],
    ) -> Result<BatchReport, DbErr> {
        if events.is_empty() {
            return Ok(BatchReport::default());
        }

        let tallies = &tally_by_offer(events);

        let report = retry::with_retry("ingest_batch", self.retry_config, || async move {
            let txn = self.db.begin().await?;

            let events_stored = EventStore::append_batch(&txn, events).await?;

            let owners = resolve_owners(&txn, tallies.keys().copied().collect()).await?;
            let offer_rows: Vec<OfferRowDelta> = tallies
                .iter()
                .filter(|(offer_id, tally)| owners.contains_key(*offer_id) && tally.total() > 0)
                .map(|(offer_id, tally)| OfferRowDelta {
                    offer_id: *offer_id,
                    delta: (*tally).into(),
                    user_id: None,
                    user_city: None,
                })
                .collect();
            upsert_offer_rows(&txn, date, &offer_rows).await?;

            let business_rows: Vec<(i64, CounterDelta)> = fold_by_business(tallies, &owners)
                .into_iter()
                .filter(|(_, tally)| tally.total() > 0)
                .map(|(business_id, tally)| (business_id, tally.into()))
                .collect();
            upsert_business_rows(&txn, date, &business_rows).await?;
            for (business_id, _) in &business_rows {
                refresh_active_offers(&txn, *business_id, date).await?;
            }

            txn.commit().await?;

            Ok(BatchReport {
                events_stored,
                offers_touched: offer_rows.len(),
                businesses_touched: business_rows.len(),
            })
        })
        .await;

        match &report {
            Ok(r) => {
                self.metrics.inc_ingest_batch("ok");
                info!(
                    "Ingested batch: {} events, {} offers, {} businesses",
                    r.events_stored, r.offers_touched, r.businesses_touched
                );
            }
            Err(e) => {
                self.metrics.inc_ingest_batch("error");
                debug!("Batch ingest of {} events failed: {}", events.len(), e);
            }
        }
        report
    }
}

/// 一次查询解析 offer → business
async fn resolve_owners<C: ConnectionTrait>(
    db: &C,
    offer_ids: Vec<i64>,
) -> Result<HashMap<i64, Option<i64>>, DbErr> {
    if offer_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, Option<i64>)> = offer::Entity::find()
        .select_only()
        .column(offer::Column::Id)
        .column(offer::Column::BusinessId)
        .filter(offer::Column::Id.is_in(offer_ids))
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows.into_iter().collect())
}
