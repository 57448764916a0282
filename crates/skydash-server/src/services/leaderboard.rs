// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leaderboard query service.
//!
//! Serves ranked pages, per-user neighborhoods, and search-by-name views by
//! blending rank-index lookups with display-name joins from the relational
//! store. The hottest read path, the top page, sits behind a short-lived
//! cache; everything else is read live.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use skydash_core::persistence::Persistence;

use crate::error::ApiError;
use crate::rank::RankStore;

/// Cache key for the rendered top page.
const TOP_PAGE_CACHE_KEY: &str = "leaderboard:top";

/// How long the cached top page may trail the rank index.
const TOP_PAGE_CACHE_TTL: Duration = Duration::from_secs(10);

/// Number of entries held by the cached top-page snapshot.
pub const TOP_PAGE_SPAN: u64 = 100;

/// Maximum candidates considered by a name search.
pub const SEARCH_CANDIDATE_CAP: i64 = 50;

/// Entries fetched on each side of the focal rank in a neighborhood view.
pub const NEIGHBORHOOD_SPAN: u64 = 2;

/// One rendered leaderboard row.
///
/// Serialized camelCase: this struct is both the wire shape and the cached
/// top-page blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: u64,
    /// User id.
    pub user_id: Uuid,
    /// Display name, `"anonymous"` when the user row is missing.
    pub display_name: String,
    /// Best score backing the rank.
    pub best_score: i32,
    /// Whether the entry belongs to a guest account.
    pub is_guest: bool,
}

/// A page of the leaderboard plus the live total.
#[derive(Debug, Clone)]
pub struct TopPage {
    /// Rendered entries, best first.
    pub entries: Vec<LeaderboardEntry>,
    /// Live entry count of the whole rank index, never cached.
    pub total: u64,
}

/// A window of the leaderboard centered on one player.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    /// The caller's own 1-based rank, `None` if they haven't played yet.
    pub rank: Option<u64>,
    /// The caller's own best score, `None` if they haven't played yet.
    pub best_score: Option<i32>,
    /// Entries ranked better than the focal rank.
    pub above: Vec<LeaderboardEntry>,
    /// The entry at the focal rank itself.
    pub focus: Option<LeaderboardEntry>,
    /// Entries ranked worse than the focal rank.
    pub below: Vec<LeaderboardEntry>,
    /// Live entry count of the whole rank index.
    pub total: u64,
}

/// Join display attributes onto scored rank entries.
///
/// `first_rank` is the 1-based rank of `scored[0]`; the entries are assumed
/// contiguous. Users whose relational row has gone missing render as
/// `"anonymous"` rather than failing the page.
pub(crate) async fn render_entries(
    persistence: &dyn Persistence,
    scored: &[(Uuid, i32)],
    first_rank: u64,
) -> Result<Vec<LeaderboardEntry>, ApiError> {
    let ids: Vec<Uuid> = scored.iter().map(|(id, _)| *id).collect();
    let rows = persistence.display_rows(&ids).await?;
    let by_id: HashMap<Uuid, (String, bool)> = rows
        .into_iter()
        .map(|r| (r.user_id, (r.display_name, r.is_guest)))
        .collect();

    Ok(scored
        .iter()
        .enumerate()
        .map(|(i, (user_id, best_score))| {
            let (display_name, is_guest) = by_id
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| ("anonymous".to_string(), false));
            LeaderboardEntry {
                rank: first_rank + i as u64,
                user_id: *user_id,
                display_name,
                best_score: *best_score,
                is_guest,
            }
        })
        .collect())
}

/// Leaderboard query service.
#[derive(Clone)]
pub struct LeaderboardService {
    persistence: Arc<dyn Persistence>,
    rank: Arc<dyn RankStore>,
}

impl LeaderboardService {
    /// Create the service.
    pub fn new(persistence: Arc<dyn Persistence>, rank: Arc<dyn RankStore>) -> Self {
        Self { persistence, rank }
    }

    /// Serve one page of the leaderboard.
    ///
    /// `offset` is 0-based; `limit` must already be validated into
    /// `[1, TOP_PAGE_SPAN]`. The first page is served from a 10-second cache
    /// when possible; the total is always read live so pagination stays
    /// accurate while the page itself may briefly trail.
    pub async fn top_page(&self, offset: u64, limit: u64) -> Result<TopPage, ApiError> {
        let total = self.rank.count().await?;

        if offset == 0 {
            if let Some(entries) = self.read_cached_top().await {
                return Ok(TopPage {
                    entries: entries.into_iter().take(limit as usize).collect(),
                    total,
                });
            }
        }

        let scored = self
            .rank
            .range_by_rank(offset, offset + limit - 1)
            .await?;
        let entries = render_entries(self.persistence.as_ref(), &scored, offset + 1).await?;

        // Only a fetch covering the full top window repopulates the cache;
        // a short page must never become the shared snapshot.
        if offset == 0 && limit >= TOP_PAGE_SPAN {
            self.write_cached_top(&entries).await;
        }

        Ok(TopPage { entries, total })
    }

    /// Serve the window around one player.
    ///
    /// With `center_rank` (1-based) the window recenters on that rank and
    /// `focus` is whoever holds it; otherwise the window centers on the
    /// caller. `rank` and `best_score` always describe the caller, and both
    /// are `None` when the caller has no recorded score, which is a valid
    /// state rather than an error.
    pub async fn neighborhood(
        &self,
        user_id: Uuid,
        center_rank: Option<u64>,
    ) -> Result<Neighborhood, ApiError> {
        let total = self.rank.count().await?;

        let own_rank = self.rank.rank_of(user_id).await?;
        let own_score = self.rank.score_of(user_id).await?;

        let center0 = match center_rank {
            Some(rank) => rank - 1,
            None => match own_rank {
                Some(rank) => rank,
                None => {
                    return Ok(Neighborhood {
                        rank: None,
                        best_score: None,
                        above: vec![],
                        focus: None,
                        below: vec![],
                        total,
                    });
                }
            },
        };

        let start = center0.saturating_sub(NEIGHBORHOOD_SPAN);
        let stop = center0 + NEIGHBORHOOD_SPAN;
        let scored = self.rank.range_by_rank(start, stop).await?;
        let entries = render_entries(self.persistence.as_ref(), &scored, start + 1).await?;

        let focal_rank = center0 + 1;
        let mut above = vec![];
        let mut focus = None;
        let mut below = vec![];
        for entry in entries {
            match entry.rank.cmp(&focal_rank) {
                std::cmp::Ordering::Less => above.push(entry),
                std::cmp::Ordering::Equal => focus = Some(entry),
                std::cmp::Ordering::Greater => below.push(entry),
            }
        }

        Ok(Neighborhood {
            rank: own_rank.map(|r| r + 1),
            best_score: own_score,
            above,
            focus,
            below,
            total,
        })
    }

    /// Case-insensitive name search.
    ///
    /// Candidates come from the relational store (capped), scores and ranks
    /// from one pipelined rank-store round trip. Users with no recorded
    /// score are dropped; results sort best score first. Never cached.
    pub async fn search(&self, query: &str) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let candidates = self
            .persistence
            .search_users(query, SEARCH_CANDIDATE_CAP)
            .await?;
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = candidates.iter().map(|r| r.user_id).collect();
        let standings = self.rank.scores_and_ranks(&ids).await?;

        let mut entries: Vec<LeaderboardEntry> = candidates
            .into_iter()
            .zip(standings)
            .filter_map(|(row, standing)| {
                standing.map(|(best_score, rank)| LeaderboardEntry {
                    rank: rank + 1,
                    user_id: row.user_id,
                    display_name: row.display_name,
                    best_score,
                    is_guest: row.is_guest,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.best_score.cmp(&a.best_score).then(a.rank.cmp(&b.rank)));

        Ok(entries)
    }

    async fn read_cached_top(&self) -> Option<Vec<LeaderboardEntry>> {
        match self.rank.cache_get(TOP_PAGE_CACHE_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!(error = %e, "Discarding undecodable top-page cache blob");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                // A cache failure is a miss, not an outage.
                warn!(error = %e, "Top-page cache read failed");
                None
            }
        }
    }

    async fn write_cached_top(&self, entries: &[LeaderboardEntry]) {
        let blob = match serde_json::to_string(entries) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to encode top-page cache blob");
                return;
            }
        };
        if let Err(e) = self
            .rank
            .cache_set(TOP_PAGE_CACHE_KEY, &blob, TOP_PAGE_CACHE_TTL)
            .await
        {
            warn!(error = %e, "Top-page cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TestStore, seeded_state};

    #[tokio::test]
    async fn test_empty_rank_store_returns_empty_page() {
        let TestStore {
            leaderboard: service,
            ..
        } = seeded_state(&[]);

        let page = service.top_page(0, 10).await.unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_top_page_orders_best_first() {
        let store = seeded_state(&[("Alice", 40), ("Bob", 90), ("Carol", 70)]);

        let page = store.leaderboard.top_page(0, 10).await.unwrap();
        assert_eq!(page.total, 3);
        let names: Vec<&str> = page
            .entries
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Bob", "Carol", "Alice"]);
        assert_eq!(page.entries[0].rank, 1);
        assert_eq!(page.entries[2].rank, 3);
    }

    #[tokio::test]
    async fn test_top_page_offset_window() {
        let store = seeded_state(&[("Alice", 40), ("Bob", 90), ("Carol", 70), ("Dave", 60)]);

        let page = store.leaderboard.top_page(1, 2).await.unwrap();
        assert_eq!(page.total, 4);
        let names: Vec<&str> = page
            .entries
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Carol", "Dave"]);
        assert_eq!(page.entries[0].rank, 2);
    }

    #[tokio::test]
    async fn test_short_page_does_not_populate_cache() {
        let store = seeded_state(&[("Alice", 40), ("Bob", 90)]);

        store.leaderboard.top_page(0, 10).await.unwrap();
        assert!(store.rank.cache.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_span_request_populates_cache_and_serves_hits() {
        let store = seeded_state(&[("Alice", 40), ("Bob", 90)]);

        store.leaderboard.top_page(0, TOP_PAGE_SPAN).await.unwrap();
        assert!(
            store
                .rank
                .cache
                .lock()
                .unwrap()
                .contains_key("leaderboard:top")
        );

        // A later, better score lands in the index but the cached page
        // still serves, trimmed to the requested limit...
        store.rank.set_score(store.user_id("Alice"), 95);
        let page = store.leaderboard.top_page(0, 1).await.unwrap();
        assert_eq!(page.entries[0].display_name, "Bob");
        assert_eq!(page.entries.len(), 1);

        // ...while the total stays live.
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_neighborhood_centers_on_caller() {
        let store = seeded_state(&[
            ("P1", 100),
            ("P2", 90),
            ("P3", 80),
            ("P4", 70),
            ("P5", 60),
            ("P6", 50),
            ("P7", 40),
        ]);

        let hood = store
            .leaderboard
            .neighborhood(store.user_id("P4"), None)
            .await
            .unwrap();

        assert_eq!(hood.rank, Some(4));
        assert_eq!(hood.best_score, Some(70));
        assert_eq!(hood.total, 7);

        let above: Vec<&str> = hood.above.iter().map(|e| e.display_name.as_str()).collect();
        let below: Vec<&str> = hood.below.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(above, vec!["P2", "P3"]);
        assert_eq!(hood.focus.as_ref().unwrap().display_name, "P4");
        assert_eq!(below, vec!["P5", "P6"]);
    }

    #[tokio::test]
    async fn test_neighborhood_clips_at_the_top() {
        let store = seeded_state(&[("P1", 100), ("P2", 90), ("P3", 80)]);

        let hood = store
            .leaderboard
            .neighborhood(store.user_id("P1"), None)
            .await
            .unwrap();

        assert!(hood.above.is_empty());
        assert_eq!(hood.focus.as_ref().unwrap().display_name, "P1");
        assert_eq!(hood.below.len(), 2);
    }

    #[tokio::test]
    async fn test_neighborhood_for_unranked_user_is_nulls_not_error() {
        let store = seeded_state(&[("P1", 100)]);
        let stranger = Uuid::new_v4();

        let hood = store.leaderboard.neighborhood(stranger, None).await.unwrap();

        assert_eq!(hood.rank, None);
        assert_eq!(hood.best_score, None);
        assert!(hood.above.is_empty());
        assert!(hood.focus.is_none());
        assert!(hood.below.is_empty());
        assert_eq!(hood.total, 1);
    }

    #[tokio::test]
    async fn test_neighborhood_recenters_on_explicit_rank() {
        let store = seeded_state(&[
            ("P1", 100),
            ("P2", 90),
            ("P3", 80),
            ("P4", 70),
            ("P5", 60),
        ]);

        let hood = store
            .leaderboard
            .neighborhood(store.user_id("P1"), Some(4))
            .await
            .unwrap();

        // The window moves; the caller's own standing does not.
        assert_eq!(hood.rank, Some(1));
        assert_eq!(hood.focus.as_ref().unwrap().display_name, "P4");
        assert_eq!(hood.above.len(), 2);
        assert_eq!(hood.below.len(), 1);
    }

    #[tokio::test]
    async fn test_search_excludes_users_without_scores() {
        let mut store = seeded_state(&[("Alice", 40)]);
        store.add_user_without_score("newAli99");

        let results = store.leaderboard.search("ali").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "Alice");
        assert_eq!(results[0].best_score, 40);
        assert_eq!(results[0].rank, 1);
    }

    #[tokio::test]
    async fn test_search_sorts_descending_by_score() {
        let store = seeded_state(&[("anna", 10), ("annabel", 70), ("hannah", 30)]);

        let results = store.leaderboard.search("ann").await.unwrap();

        let names: Vec<&str> = results.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, vec!["annabel", "hannah", "anna"]);
    }

    #[tokio::test]
    async fn test_search_no_match_is_empty_not_error() {
        let store = seeded_state(&[("Alice", 40)]);
        let results = store.leaderboard.search("zzz").await.unwrap();
        assert!(results.is_empty());
    }
}
