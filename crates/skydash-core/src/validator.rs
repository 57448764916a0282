// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plausibility validation for claimed runs.
//!
//! The validator is the server-side mirror of the client's pacing rules: the
//! game spawns obstacles on a fixed cadence, so a claimed score implies a
//! minimum elapsed time. It is a pure function over `(score, duration_ms)`
//! with no I/O and no shared state, safe to call concurrently.

use serde::{Deserialize, Serialize};

/// Highest score a single run can legitimately reach.
pub const MAX_SCORE: i32 = 10_000;

/// Shortest run duration accepted, in milliseconds.
pub const MIN_DURATION_MS: i64 = 1;

/// Longest run duration accepted, in milliseconds (one hour).
pub const MAX_DURATION_MS: i64 = 3_600_000;

/// Minimum wall-clock time between two scoring events, in milliseconds.
///
/// Derived from the fastest obstacle cadence the client can produce. One
/// point per cleared obstacle means a run of N points takes at least
/// `N * MIN_EVENT_INTERVAL_MS` milliseconds.
pub const MIN_EVENT_INTERVAL_MS: i64 = 300;

/// Fraction of the theoretical maximum pace above which an accepted run is
/// flagged for review.
const SUSPICIOUS_PACE_RATIO: f64 = 0.95;

/// Why a run was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    /// Claimed score is outside `[0, MAX_SCORE]`.
    ScoreOutOfBounds,
    /// Claimed duration is outside `[MIN_DURATION_MS, MAX_DURATION_MS]`.
    DurationOutOfBounds,
    /// The duration is too short to have produced the claimed score.
    ImpossibleTiming,
    /// Within physical limits but faster than 95% of the theoretical
    /// maximum pace. Accepted, logged for review.
    SuspiciouslyFast,
}

impl FlagReason {
    /// Stable string form, as stored in the `runs.flag_reason` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoreOutOfBounds => "score_out_of_bounds",
            Self::DurationOutOfBounds => "duration_out_of_bounds",
            Self::ImpossibleTiming => "impossible_timing",
            Self::SuspiciouslyFast => "suspiciously_fast",
        }
    }

    /// Parse the stored string form back into a reason.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "score_out_of_bounds" => Some(Self::ScoreOutOfBounds),
            "duration_out_of_bounds" => Some(Self::DurationOutOfBounds),
            "impossible_timing" => Some(Self::ImpossibleTiming),
            "suspiciously_fast" => Some(Self::SuspiciouslyFast),
            _ => None,
        }
    }
}

/// Outcome of validating a claimed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the run is accepted for scoring.
    pub valid: bool,
    /// Whether the run is marked for review.
    pub flagged: bool,
    /// Why the run was flagged, when it was.
    pub flag_reason: Option<FlagReason>,
}

impl Verdict {
    /// The reject reason, when the run failed validation.
    ///
    /// `None` for accepted runs, including accepted-but-flagged ones.
    pub fn rejection(&self) -> Option<FlagReason> {
        if self.valid { None } else { self.flag_reason }
    }

    fn accepted() -> Self {
        Self {
            valid: true,
            flagged: false,
            flag_reason: None,
        }
    }

    fn rejected(reason: FlagReason) -> Self {
        Self {
            valid: false,
            flagged: true,
            flag_reason: Some(reason),
        }
    }

    fn accepted_flagged(reason: FlagReason) -> Self {
        Self {
            valid: true,
            flagged: true,
            flag_reason: Some(reason),
        }
    }
}

/// Validate a claimed `(score, duration_ms)` pair.
///
/// Rules are evaluated in order; the first failing rule decides the reject
/// reason:
///
/// 1. score outside `[0, MAX_SCORE]`
/// 2. duration outside `[MIN_DURATION_MS, MAX_DURATION_MS]`
/// 3. duration shorter than the minimum time required to score that many
///    points at the fastest obstacle cadence
///
/// A run that passes all three but exceeds 95% of the theoretical maximum
/// pace is accepted and flagged `suspiciously_fast`.
pub fn validate(score: i32, duration_ms: i64) -> Verdict {
    if !(0..=MAX_SCORE).contains(&score) {
        return Verdict::rejected(FlagReason::ScoreOutOfBounds);
    }

    if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&duration_ms) {
        return Verdict::rejected(FlagReason::DurationOutOfBounds);
    }

    // score <= MAX_SCORE here, so the product cannot overflow an i64.
    if duration_ms < score as i64 * MIN_EVENT_INTERVAL_MS {
        return Verdict::rejected(FlagReason::ImpossibleTiming);
    }

    let theoretical_max = duration_ms as f64 / MIN_EVENT_INTERVAL_MS as f64;
    if score as f64 > SUSPICIOUS_PACE_RATIO * theoretical_max {
        return Verdict::accepted_flagged(FlagReason::SuspiciouslyFast);
    }

    Verdict::accepted()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_score_is_valid_and_unflagged() {
        let verdict = validate(0, 1000);
        assert!(verdict.valid);
        assert!(!verdict.flagged);
        assert_eq!(verdict.flag_reason, None);
    }

    #[test]
    fn test_negative_score_rejected() {
        let verdict = validate(-1, 60_000);
        assert!(!verdict.valid);
        assert!(verdict.flagged);
        assert_eq!(verdict.flag_reason, Some(FlagReason::ScoreOutOfBounds));
    }

    #[test]
    fn test_score_above_max_rejected() {
        let verdict = validate(MAX_SCORE + 1, MAX_DURATION_MS);
        assert!(!verdict.valid);
        assert_eq!(verdict.flag_reason, Some(FlagReason::ScoreOutOfBounds));
    }

    #[test]
    fn test_score_at_max_is_not_out_of_bounds() {
        // MAX_SCORE itself is in range; in one minute it trips the
        // impossible-timing rule instead of the score bound.
        let verdict = validate(MAX_SCORE, 60_000);
        assert_eq!(verdict.flag_reason, Some(FlagReason::ImpossibleTiming));
    }

    #[test]
    fn test_duration_below_min_rejected() {
        let verdict = validate(10, 0);
        assert!(!verdict.valid);
        assert_eq!(verdict.flag_reason, Some(FlagReason::DurationOutOfBounds));
    }

    #[test]
    fn test_duration_above_max_rejected() {
        let verdict = validate(10, MAX_DURATION_MS + 1);
        assert!(!verdict.valid);
        assert_eq!(verdict.flag_reason, Some(FlagReason::DurationOutOfBounds));
    }

    #[test]
    fn test_impossible_timing() {
        // 1ms cannot fit 100 scoring events at 300ms cadence.
        let verdict = validate(100, 1);
        assert!(!verdict.valid);
        assert!(verdict.flagged);
        assert_eq!(verdict.flag_reason, Some(FlagReason::ImpossibleTiming));
    }

    #[test]
    fn test_score_bounds_checked_before_timing() {
        // Both rules would fire; score bounds win by evaluation order.
        let verdict = validate(-5, 1);
        assert_eq!(verdict.flag_reason, Some(FlagReason::ScoreOutOfBounds));
    }

    #[test]
    fn test_plausible_run_accepted() {
        let verdict = validate(50, 60_000);
        assert!(verdict.valid);
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_exact_minimum_pace_is_suspicious_not_impossible() {
        // 100 points in exactly 100 * 300ms: not impossible, but at 100% of
        // the theoretical maximum pace, so accepted and flagged.
        let verdict = validate(100, 100 * MIN_EVENT_INTERVAL_MS);
        assert!(verdict.valid);
        assert!(verdict.flagged);
        assert_eq!(verdict.flag_reason, Some(FlagReason::SuspiciouslyFast));
    }

    #[test]
    fn test_suspicious_pace_boundary() {
        // 60s of play allows at most 200 events; 95% of that is 190.
        let duration = 60_000;
        assert_eq!(validate(190, duration).flag_reason, None);
        assert_eq!(
            validate(191, duration).flag_reason,
            Some(FlagReason::SuspiciouslyFast)
        );
        assert!(validate(191, duration).valid);
    }

    #[test]
    fn test_flag_reason_round_trip() {
        for reason in [
            FlagReason::ScoreOutOfBounds,
            FlagReason::DurationOutOfBounds,
            FlagReason::ImpossibleTiming,
            FlagReason::SuspiciouslyFast,
        ] {
            assert_eq!(FlagReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(FlagReason::parse("bogus"), None);
    }

    #[test]
    fn test_flag_reason_serde_form() {
        let json = serde_json::to_string(&FlagReason::ImpossibleTiming).unwrap();
        assert_eq!(json, "\"impossible_timing\"");
    }
}
