//! Redis-backed [`Broker`] implementation.
//!
//! Ready jobs live in a plain list (`LPUSH`/`RPOPLPUSH`); delayed jobs
//! live in a sorted set scored by their ready-at unix timestamp,
//! promoted into the ready list by [`RedisBroker::promote_due_ingest`],
//! which every worker calls once per poll cycle. Dequeue moves a job
//! atomically into an "active" list so a worker crash leaves visible
//! evidence instead of silently losing the job; `ack`/`requeue`/
//! `dead_letter` all remove the job from that active list. Dead-lettered
//! jobs land in their own list for operator inspection, never
//! automatically retried.

use super::{Broker, IngestMessageJob, QueueDepth, QueueStats, WorkItemCreateJob};
use crate::error::QueueError;
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const READY_INGEST_KEY: &str = "fip:queue:ingest:ready";
const ACTIVE_INGEST_KEY: &str = "fip:queue:ingest:active";
const DELAYED_INGEST_KEY: &str = "fip:queue:ingest:delayed";
const DEAD_INGEST_KEY: &str = "fip:queue:ingest:dead";
const READY_WORK_ITEM_KEY: &str = "fip:queue:work_item:ready";
const ACTIVE_WORK_ITEM_KEY: &str = "fip:queue:work_item:active";

pub struct RedisBroker {
    pool: Pool,
}

impl RedisBroker {
    pub fn connect(url: &str) -> Result<Self, QueueError> {
        let cfg = PoolConfig::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn encode<T: serde::Serialize>(job: &T) -> Result<String, QueueError> {
    serde_json::to_string(job).map_err(|e| QueueError::Payload(e.to_string()))
}

#[async_trait]
impl Broker for RedisBroker {
    async fn enqueue_ingest(&self, job: IngestMessageJob) -> Result<(), QueueError> {
        let payload = encode(&job)?;
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(READY_INGEST_KEY, payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn dequeue_ingest(&self) -> Result<Option<IngestMessageJob>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .rpoplpush(READY_INGEST_KEY, ACTIVE_INGEST_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        raw.map(|s| serde_json::from_str(&s).map_err(|e| QueueError::Payload(e.to_string())))
            .transpose()
    }

    async fn ack_ingest(&self, job: &IngestMessageJob) -> Result<(), QueueError> {
        let payload = encode(job)?;
        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(ACTIVE_INGEST_KEY, 1, payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn requeue_ingest_delayed(&self, job: &IngestMessageJob, delay: Duration) -> Result<(), QueueError> {
        let original_payload = encode(job)?;
        let mut next = job.clone();
        next.attempt += 1;
        let next_payload = encode(&next)?;
        let ready_at = now_unix() + delay.as_secs_f64();

        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(ACTIVE_INGEST_KEY, 1, original_payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        conn.zadd::<_, _, _, ()>(DELAYED_INGEST_KEY, next_payload, ready_at)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn dead_letter_ingest(&self, job: &IngestMessageJob, reason: &str) -> Result<(), QueueError> {
        let original_payload = encode(job)?;
        let record = serde_json::json!({ "job": job, "reason": reason, "dead_lettered_at": now_unix() });
        let record_payload = encode(&record)?;

        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(ACTIVE_INGEST_KEY, 1, original_payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        conn.lpush::<_, _, ()>(DEAD_INGEST_KEY, record_payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn promote_due_ingest(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn().await?;
        let due: Vec<String> = conn
            .zrangebyscore(DELAYED_INGEST_KEY, "-inf", now_unix())
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        for payload in &due {
            let _: i64 = conn
                .zrem(DELAYED_INGEST_KEY, payload)
                .await
                .map_err(|e| QueueError::Operation(e.to_string()))?;
            conn.lpush::<_, _, ()>(READY_INGEST_KEY, payload)
                .await
                .map_err(|e| QueueError::Operation(e.to_string()))?;
        }

        Ok(due.len())
    }

    async fn enqueue_work_item(&self, job: WorkItemCreateJob) -> Result<(), QueueError> {
        let payload = encode(&job)?;
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(READY_WORK_ITEM_KEY, payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn dequeue_work_item(&self) -> Result<Option<WorkItemCreateJob>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .rpoplpush(READY_WORK_ITEM_KEY, ACTIVE_WORK_ITEM_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        raw.map(|s| serde_json::from_str(&s).map_err(|e| QueueError::Payload(e.to_string())))
            .transpose()
    }

    async fn ack_work_item(&self, job: &WorkItemCreateJob) -> Result<(), QueueError> {
        let payload = encode(job)?;
        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(ACTIVE_WORK_ITEM_KEY, 1, payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn queue_stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.conn().await?;

        let ingest_ready: u64 = conn
            .llen(READY_INGEST_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let ingest_delayed: u64 = conn
            .zcard(DELAYED_INGEST_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let ingest_active: u64 = conn
            .llen(ACTIVE_INGEST_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let ingest_dead: u64 = conn
            .llen(DEAD_INGEST_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let work_item_ready: u64 = conn
            .llen(READY_WORK_ITEM_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let work_item_active: u64 = conn
            .llen(ACTIVE_WORK_ITEM_KEY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        Ok(QueueStats {
            ingest: QueueDepth {
                waiting: ingest_ready + ingest_delayed,
                active: ingest_active,
            },
            work_item: QueueDepth {
                waiting: work_item_ready,
                active: work_item_active,
            },
            ingest_dead_letter: ingest_dead,
        })
    }
}
