// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Data Transfer Objects for API requests and responses.
//!
//! The browser client speaks camelCase; every body here carries
//! `rename_all = "camelCase"`. "Nothing found" responses stay well-formed
//! (empty arrays, null ranks) rather than becoming error shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::leaderboard::LeaderboardEntry;

// ============ Run DTOs ============

/// Issued run token response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    /// Opaque single-use token.
    pub token: String,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
}

/// Run submission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRunRequest {
    /// The run token issued before the session started.
    pub run_token: String,
    /// Claimed score.
    pub score: i32,
    /// Claimed run duration in milliseconds.
    pub duration_ms: i64,
}

/// The caller's standing inside a submission response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YouResponse {
    /// 1-based rank, null while the rank index has no entry.
    pub rank: Option<u64>,
    pub best_score: i32,
    pub is_new_best: bool,
}

/// Run submission response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRunResponse {
    pub top10: Vec<LeaderboardEntry>,
    pub you: YouResponse,
    pub points_earned: i64,
    pub points_balance: i64,
}

// ============ Leaderboard DTOs ============

/// Query parameters for the leaderboard endpoint
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// 0-based page offset.
    pub offset: Option<i64>,
    /// Page size, 1 to 100.
    pub limit: Option<i64>,
    /// Switches the endpoint into name-search mode.
    pub search: Option<String>,
}

/// Leaderboard page or search response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Live total, accurate even when the page itself came from cache.
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Query parameters for the neighborhood endpoint
#[derive(Debug, Deserialize)]
pub struct NeighborhoodQuery {
    /// Optional 1-based rank to recenter the window on.
    pub rank: Option<i64>,
}

/// One row of a neighborhood view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPlayer {
    pub rank: u64,
    pub user_id: Uuid,
    pub display_name: String,
    pub best_score: i32,
    pub is_guest: bool,
    /// Whether this row is the caller themselves.
    pub is_you: bool,
}

impl NearbyPlayer {
    /// Mark up a leaderboard entry for a neighborhood view.
    pub fn from_entry(entry: LeaderboardEntry, caller: Uuid) -> Self {
        Self {
            rank: entry.rank,
            is_you: entry.user_id == caller,
            user_id: entry.user_id,
            display_name: entry.display_name,
            best_score: entry.best_score,
            is_guest: entry.is_guest,
        }
    }
}

/// Neighborhood response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodResponse {
    /// The caller's own rank, null if they haven't played yet.
    pub rank: Option<u64>,
    /// The caller's own best score, null if they haven't played yet.
    pub best_score: Option<i32>,
    /// The window rows, best first.
    pub nearby_players: Vec<NearbyPlayer>,
    pub total_players: u64,
}

// ============ Health DTOs ============

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
    pub redis: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_wire_shape() {
        let req: SubmitRunRequest =
            serde_json::from_str(r#"{"runToken":"abc","score":12,"durationMs":34000}"#).unwrap();
        assert_eq!(req.run_token, "abc");
        assert_eq!(req.score, 12);
        assert_eq!(req.duration_ms, 34_000);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LeaderboardEntry {
            rank: 3,
            user_id: Uuid::nil(),
            display_name: "Alice".to_string(),
            best_score: 42,
            is_guest: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["displayName"], "Alice");
        assert_eq!(json["bestScore"], 42);
        assert_eq!(json["isGuest"], false);
    }

    #[test]
    fn test_empty_neighborhood_is_well_formed() {
        let body = NeighborhoodResponse {
            rank: None,
            best_score: None,
            nearby_players: vec![],
            total_players: 0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["rank"].is_null());
        assert!(json["bestScore"].is_null());
        assert_eq!(json["nearbyPlayers"].as_array().unwrap().len(), 0);
        assert_eq!(json["totalPlayers"], 0);
    }

    #[test]
    fn test_nearby_player_marks_the_caller() {
        let caller = Uuid::new_v4();
        let entry = LeaderboardEntry {
            rank: 1,
            user_id: caller,
            display_name: "me".to_string(),
            best_score: 10,
            is_guest: false,
        };
        assert!(NearbyPlayer::from_entry(entry.clone(), caller).is_you);
        assert!(!NearbyPlayer::from_entry(entry, Uuid::new_v4()).is_you);
    }
}
