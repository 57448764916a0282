//! In-memory fakes for hermetic service tests.
//!
//! Both fakes mirror the contracts of their production counterparts: the
//! persistence fake keeps the guarded token consume and the strictly-greater
//! best-score replace, the rank fake keeps descending-score ordering and
//! positional batch lookups. Tests drive the real services against them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use skydash_core::error::CoreError;
use skydash_core::persistence::{
    AcceptedRun, CommitOutcome, DisplayRow, Persistence, RejectedRun, RunTokenRecord, UserRecord,
};

use crate::rank::{RankError, RankStore};
use crate::services::leaderboard::LeaderboardService;
use crate::services::submission::SubmissionCoordinator;
use crate::services::tokens::TokenIssuer;

// ============================================================================
// Persistence fake
// ============================================================================

/// A run row as stored by the fake.
#[derive(Debug, Clone)]
pub(crate) struct StoredRun {
    pub user_id: Uuid,
    pub score: i32,
    pub duration_ms: i64,
    pub token: String,
    pub ip_hash: String,
    pub flagged: bool,
    pub flag_reason: Option<String>,
}

#[derive(Debug, Clone)]
struct LedgerRow {
    user_id: Uuid,
    delta: i64,
    reason: String,
    #[allow(dead_code)]
    reference: Option<String>,
}

#[derive(Default)]
struct PersistenceInner {
    users: HashMap<Uuid, UserRecord>,
    tokens: HashMap<String, RunTokenRecord>,
    runs: Vec<StoredRun>,
    bests: HashMap<Uuid, i32>,
    ledger: Vec<LedgerRow>,
    token_seq: u64,
}

/// In-memory stand-in for [`PostgresPersistence`](skydash_core::persistence::PostgresPersistence).
#[derive(Default)]
pub(crate) struct InMemoryPersistence {
    inner: Mutex<PersistenceInner>,
}

impl InMemoryPersistence {
    pub fn add_user(&self, display_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        inner.users.insert(
            id,
            UserRecord {
                id,
                display_name: display_name.to_string(),
                points: 0,
                is_guest: false,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Insert an unused token expiring `minutes` from now (negative for an
    /// already-expired token).
    pub fn mint_token(&self, user_id: Uuid, minutes: i64) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.token_seq += 1;
        let token = format!("tok-{:04}", inner.token_seq);
        inner.tokens.insert(
            token.clone(),
            RunTokenRecord {
                token: token.clone(),
                user_id,
                expires_at: Utc::now() + TimeDelta::minutes(minutes),
                used: false,
                created_at: Utc::now(),
            },
        );
        token
    }

    pub fn token_record(&self, token: &str) -> Option<RunTokenRecord> {
        self.inner.lock().unwrap().tokens.get(token).cloned()
    }

    pub fn points(&self, user_id: Uuid) -> i64 {
        self.inner.lock().unwrap().users[&user_id].points
    }

    pub fn runs_of(&self, user_id: Uuid) -> Vec<StoredRun> {
        self.inner
            .lock()
            .unwrap()
            .runs
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn set_best(&self, user_id: Uuid, best_score: i32) {
        self.inner.lock().unwrap().bests.insert(user_id, best_score);
    }

    pub fn clear_best(&self, user_id: Uuid) {
        self.inner.lock().unwrap().bests.remove(&user_id);
    }

    /// Sum of ledger deltas for one user and reason.
    pub fn ledger_total(&self, user_id: Uuid, reason: &str) -> i64 {
        self.inner
            .lock()
            .unwrap()
            .ledger
            .iter()
            .filter(|row| row.user_id == user_id && row.reason == reason)
            .map(|row| row.delta)
            .sum()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn create_run_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.insert(
            token.to_string(),
            RunTokenRecord {
                token: token.to_string(),
                user_id,
                expires_at,
                used: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_run_token(&self, token: &str) -> Result<Option<RunTokenRecord>, CoreError> {
        Ok(self.inner.lock().unwrap().tokens.get(token).cloned())
    }

    async fn commit_accepted_run(&self, run: &AcceptedRun) -> Result<CommitOutcome, CoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Guarded consume, same as the SQL `WHERE used = FALSE`.
        match inner.tokens.get_mut(&run.token) {
            Some(record) if !record.used => record.used = true,
            _ => {
                return Err(CoreError::TokenAlreadyUsed {
                    token: run.token.clone(),
                });
            }
        }

        inner.runs.push(StoredRun {
            user_id: run.user_id,
            score: run.score,
            duration_ms: run.duration_ms,
            token: run.token.clone(),
            ip_hash: run.ip_hash.clone(),
            flagged: run.flagged,
            flag_reason: run.flag_reason.map(|r| r.as_str().to_string()),
        });
        let run_id = inner.runs.len() as i64;

        let points_balance = match inner.users.get_mut(&run.user_id) {
            Some(user) => {
                user.points += run.score as i64;
                user.points
            }
            None => {
                return Err(CoreError::UserNotFound {
                    user_id: run.user_id.to_string(),
                });
            }
        };

        inner.ledger.push(LedgerRow {
            user_id: run.user_id,
            delta: run.score as i64,
            reason: "run".to_string(),
            reference: Some(run_id.to_string()),
        });

        // Strictly-greater replace, same as the conditional upsert.
        let (is_new_best, best_score) = match inner.bests.entry(run.user_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if run.score > *entry.get() {
                    *entry.get_mut() = run.score;
                    (true, run.score)
                } else {
                    (false, *entry.get())
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(run.score);
                (true, run.score)
            }
        };

        Ok(CommitOutcome {
            run_id,
            is_new_best,
            best_score,
            points_balance,
        })
    }

    async fn record_rejected_run(&self, run: &RejectedRun) -> Result<i64, CoreError> {
        let mut inner = self.inner.lock().unwrap();

        match inner.tokens.get_mut(&run.token) {
            Some(record) if !record.used => record.used = true,
            _ => {
                return Err(CoreError::TokenAlreadyUsed {
                    token: run.token.clone(),
                });
            }
        }

        inner.runs.push(StoredRun {
            user_id: run.user_id,
            score: run.score,
            duration_ms: run.duration_ms,
            token: run.token.clone(),
            ip_hash: run.ip_hash.clone(),
            flagged: true,
            flag_reason: Some(run.flag_reason.as_str().to_string()),
        });

        Ok(inner.runs.len() as i64)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, CoreError> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn display_rows(&self, user_ids: &[Uuid]) -> Result<Vec<DisplayRow>, CoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .map(|user| DisplayRow {
                user_id: user.id,
                display_name: user.display_name.clone(),
                is_guest: user.is_guest,
            })
            .collect())
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<DisplayRow>, CoreError> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<DisplayRow> = inner
            .users
            .values()
            .filter(|user| user.display_name.to_lowercase().contains(&needle))
            .map(|user| DisplayRow {
                user_id: user.id,
                display_name: user.display_name.clone(),
                is_guest: user.is_guest,
            })
            .collect();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}

// ============================================================================
// Rank store fake
// ============================================================================

#[derive(Default)]
struct RankInner {
    scores: HashMap<Uuid, i32>,
    counters: HashMap<String, i64>,
    markers: HashSet<String>,
}

/// In-memory stand-in for [`RedisRankStore`](crate::rank::RedisRankStore).
#[derive(Default)]
pub(crate) struct InMemoryRankStore {
    inner: Mutex<RankInner>,
    /// Exposed so tests can assert on cache population directly.
    pub cache: Mutex<HashMap<String, String>>,
    upserts_fail: AtomicBool,
}

impl InMemoryRankStore {
    pub fn set_score(&self, user_id: Uuid, score: i32) {
        self.inner.lock().unwrap().scores.insert(user_id, score);
    }

    pub fn remove_score(&self, user_id: Uuid) {
        self.inner.lock().unwrap().scores.remove(&user_id);
    }

    pub fn score(&self, user_id: Uuid) -> Option<i32> {
        self.inner.lock().unwrap().scores.get(&user_id).copied()
    }

    pub fn set_counter(&self, key: &str, value: i64) {
        self.inner
            .lock()
            .unwrap()
            .counters
            .insert(key.to_string(), value);
    }

    /// Simulate every cooldown marker reaching its TTL.
    pub fn expire_markers(&self) {
        self.inner.lock().unwrap().markers.clear();
    }

    /// Toggle injected failures on [`RankStore::upsert_score`].
    pub fn fail_upserts(&self, fail: bool) {
        self.upserts_fail.store(fail, Ordering::SeqCst);
    }

    /// Entries best first, ties broken like the sorted set (reverse
    /// lexicographic on the member).
    fn ordered(&self) -> Vec<(Uuid, i32)> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(Uuid, i32)> = inner.scores.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
        entries
    }
}

fn injected_error() -> RankError {
    RankError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "injected failure",
    )))
}

#[async_trait]
impl RankStore for InMemoryRankStore {
    async fn upsert_score(&self, user_id: Uuid, score: i32) -> Result<(), RankError> {
        if self.upserts_fail.load(Ordering::SeqCst) {
            return Err(injected_error());
        }
        self.set_score(user_id, score);
        Ok(())
    }

    async fn rank_of(&self, user_id: Uuid) -> Result<Option<u64>, RankError> {
        Ok(self
            .ordered()
            .iter()
            .position(|(id, _)| *id == user_id)
            .map(|pos| pos as u64))
    }

    async fn score_of(&self, user_id: Uuid) -> Result<Option<i32>, RankError> {
        Ok(self.score(user_id))
    }

    async fn range_by_rank(&self, start: u64, stop: u64) -> Result<Vec<(Uuid, i32)>, RankError> {
        let ordered = self.ordered();
        if start as usize >= ordered.len() {
            return Ok(vec![]);
        }
        let end = ((stop + 1) as usize).min(ordered.len());
        Ok(ordered[start as usize..end].to_vec())
    }

    async fn count(&self) -> Result<u64, RankError> {
        Ok(self.inner.lock().unwrap().scores.len() as u64)
    }

    async fn scores_and_ranks(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<Option<(i32, u64)>>, RankError> {
        let ordered = self.ordered();
        Ok(user_ids
            .iter()
            .map(|id| {
                ordered
                    .iter()
                    .position(|(entry, _)| entry == id)
                    .map(|pos| (ordered[pos].1, pos as u64))
            })
            .collect())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<String>, RankError> {
        Ok(self.cache.lock().unwrap().get(key).cloned())
    }

    async fn cache_set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), RankError> {
        self.cache
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn try_acquire_marker(&self, key: &str, _ttl: Duration) -> Result<bool, RankError> {
        Ok(self.inner.lock().unwrap().markers.insert(key.to_string()))
    }

    async fn incr_window(&self, key: &str, _window: Duration) -> Result<i64, RankError> {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn ping(&self) -> Result<bool, RankError> {
        Ok(true)
    }
}

// ============================================================================
// Seeded harness
// ============================================================================

/// Real services wired to the in-memory fakes.
pub(crate) struct TestStore {
    pub persistence: Arc<InMemoryPersistence>,
    pub rank: Arc<InMemoryRankStore>,
    pub tokens: TokenIssuer,
    pub submissions: SubmissionCoordinator,
    pub leaderboard: LeaderboardService,
    names: HashMap<String, Uuid>,
}

impl TestStore {
    pub fn user_id(&self, name: &str) -> Uuid {
        self.names[name]
    }

    /// Add a user row with no best score and no rank entry.
    pub fn add_user_without_score(&mut self, name: &str) -> Uuid {
        let id = self.persistence.add_user(name);
        self.names.insert(name.to_string(), id);
        id
    }
}

/// Build a store seeded with `(display_name, best_score)` players.
pub(crate) fn seeded_state(players: &[(&str, i32)]) -> TestStore {
    let persistence = Arc::new(InMemoryPersistence::default());
    let rank = Arc::new(InMemoryRankStore::default());
    let mut names = HashMap::new();

    for (name, best) in players {
        let id = persistence.add_user(name);
        persistence.set_best(id, *best);
        rank.set_score(id, *best);
        names.insert(name.to_string(), id);
    }

    let p: Arc<dyn Persistence> = persistence.clone();
    let r: Arc<dyn RankStore> = rank.clone();

    TestStore {
        tokens: TokenIssuer::new(p.clone(), r.clone()),
        submissions: SubmissionCoordinator::new(p.clone(), r.clone()),
        leaderboard: LeaderboardService::new(p, r),
        persistence,
        rank,
        names,
    }
}
