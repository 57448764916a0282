// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skydash Core - Run Pipeline Engine
//!
//! This crate provides the server-side core of the skydash run pipeline: run
//! token lifecycle, anti-cheat validation of claimed runs, and the atomic
//! relational commit that keeps point balances, run history, and best-score
//! records consistent under concurrent submissions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Browser Client                         │
//! │            (canvas game, out of scope here)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTPS
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     skydash-server                          │
//! │   (HTTP API, token issuer, submission coordinator,          │
//! │    leaderboard queries, Redis rank index + cache)           │
//! └─────────────────────────────────────────────────────────────┘
//!           │                                   │
//!           │ Persistence trait                 │ best-effort mirror
//!           ▼                                   ▼
//! ┌───────────────────────┐        ┌───────────────────────────┐
//! │    skydash-core       │        │          Redis            │
//! │    (This Crate)       │        │  (rank index + caches,    │
//! │  Validator, Postgres  │        │   rebuildable, derived)   │
//! └───────────────────────┘        └───────────────────────────┘
//!           │
//!           ▼
//! ┌───────────────────────┐
//! │      PostgreSQL       │
//! │  (Source of Truth)    │
//! └───────────────────────┘
//! ```
//!
//! # Consistency Contract
//!
//! PostgreSQL is the single source of truth. The Redis rank index is derived
//! state: the submission coordinator mirrors new best scores into it after the
//! relational transaction commits. The mirror write is best-effort; a brief
//! window where rank queries trail the relational store is expected under
//! load, and the index self-heals on the next accepted run for that user.
//!
//! # Modules
//!
//! - [`error`]: Error types with stable error code mapping
//! - [`migrations`]: Embedded PostgreSQL migrations
//! - [`persistence`]: Storage records, the `Persistence` trait, and the
//!   PostgreSQL implementation
//! - [`validator`]: Pure plausibility policy for claimed score/duration pairs

#![deny(missing_docs)]

/// Error types for core operations with stable error code mapping.
pub mod error;

/// Embedded database migrations.
pub mod migrations;

/// Storage records, the persistence trait, and the PostgreSQL backend.
pub mod persistence;

/// Pure run plausibility validation.
pub mod validator;
