// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Rank index and cache operations.
//!
//! The rank store is derived state, never authoritative: a Redis sorted set
//! maps user id to best score for O(log N) rank and range queries, next to a
//! small keyspace of TTL'd strings used for the hot-page cache, token
//! cooldown markers, and rate-limit counters. Everything here is rebuildable
//! from the relational store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Sorted set holding user id -> best score.
const RANK_KEY: &str = "leaderboard";

/// Rank store errors
#[derive(Debug, Error)]
pub enum RankError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Rank index plus the generic expiring key-value cache.
///
/// Rank positions are 0-based and descending by score; callers add 1 for
/// display.
#[async_trait]
pub trait RankStore: Send + Sync {
    /// Insert or update a user's best score in the rank index.
    async fn upsert_score(&self, user_id: Uuid, score: i32) -> Result<(), RankError>;

    /// 0-based descending rank of a user, `None` if they have no entry.
    async fn rank_of(&self, user_id: Uuid) -> Result<Option<u64>, RankError>;

    /// A user's indexed best score, `None` if they have no entry.
    async fn score_of(&self, user_id: Uuid) -> Result<Option<i32>, RankError>;

    /// Entries between two 0-based ranks, inclusive, best first.
    async fn range_by_rank(&self, start: u64, stop: u64) -> Result<Vec<(Uuid, i32)>, RankError>;

    /// Number of entries in the rank index.
    async fn count(&self) -> Result<u64, RankError>;

    /// Batch (score, rank) lookup in one pipelined round trip.
    ///
    /// The result is positionally aligned with `user_ids`; users with no
    /// entry yield `None`.
    async fn scores_and_ranks(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<Option<(i32, u64)>>, RankError>;

    /// Read a cached value.
    async fn cache_get(&self, key: &str) -> Result<Option<String>, RankError>;

    /// Write a cached value with an expiry.
    async fn cache_set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RankError>;

    /// Atomically set a marker key unless one is already live.
    ///
    /// Returns `true` when the marker was acquired, `false` when a live
    /// marker already existed.
    async fn try_acquire_marker(&self, key: &str, ttl: Duration) -> Result<bool, RankError>;

    /// Increment a windowed counter, arming the expiry on first touch.
    ///
    /// Returns the count after the increment. The window is approximate by
    /// design; "roughly N per window" is all the rate limiter needs.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<i64, RankError>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<bool, RankError>;
}

/// Redis-backed rank store.
#[derive(Clone)]
pub struct RedisRankStore {
    manager: ConnectionManager,
}

impl RedisRankStore {
    /// Wrap an established connection manager.
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Connect to Redis and build the store.
    pub async fn connect(redis_url: &str) -> Result<Self, RankError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager))
    }
}

fn parse_member(member: &str) -> Option<Uuid> {
    match Uuid::parse_str(member) {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(member, "Skipping unparseable rank index member");
            None
        }
    }
}

#[async_trait]
impl RankStore for RedisRankStore {
    async fn upsert_score(&self, user_id: Uuid, score: i32) -> Result<(), RankError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.zadd(RANK_KEY, user_id.to_string(), score).await?;
        Ok(())
    }

    async fn rank_of(&self, user_id: Uuid) -> Result<Option<u64>, RankError> {
        let mut conn = self.manager.clone();
        let rank: Option<u64> = conn.zrevrank(RANK_KEY, user_id.to_string()).await?;
        Ok(rank)
    }

    async fn score_of(&self, user_id: Uuid) -> Result<Option<i32>, RankError> {
        let mut conn = self.manager.clone();
        let score: Option<f64> = conn.zscore(RANK_KEY, user_id.to_string()).await?;
        Ok(score.map(|s| s as i32))
    }

    async fn range_by_rank(&self, start: u64, stop: u64) -> Result<Vec<(Uuid, i32)>, RankError> {
        let mut conn = self.manager.clone();
        let entries: Vec<(String, i64)> = conn
            .zrevrange_withscores(RANK_KEY, start as isize, stop as isize)
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|(member, score)| parse_member(&member).map(|id| (id, score as i32)))
            .collect())
    }

    async fn count(&self) -> Result<u64, RankError> {
        let mut conn = self.manager.clone();
        let count: u64 = conn.zcard(RANK_KEY).await?;
        Ok(count)
    }

    async fn scores_and_ranks(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<Option<(i32, u64)>>, RankError> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        for user_id in user_ids {
            let member = user_id.to_string();
            pipe.zscore(RANK_KEY, member.clone());
            pipe.zrevrank(RANK_KEY, member);
        }

        // Alternating [score, rank, score, rank, ...]; both reply types
        // parse losslessly through f64.
        let raw: Vec<Option<f64>> = pipe.query_async(&mut conn).await?;

        Ok(raw
            .chunks(2)
            .map(|pair| match pair {
                [Some(score), Some(rank)] => Some((*score as i32, *rank as u64)),
                _ => None,
            })
            .collect())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<String>, RankError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn cache_set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RankError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn try_acquire_marker(&self, key: &str, ttl: Duration) -> Result<bool, RankError> {
        let mut conn = self.manager.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<i64, RankError> {
        let mut conn = self.manager.clone();
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: bool = conn.expire(key, window.as_secs() as i64).await?;
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<bool, RankError> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
