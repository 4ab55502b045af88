//! cardscore client library
//! # Overview
//!
//! Client for a prepaid card management API (fuel and payment cards). It
//! keeps a local view of each user's cards and records balance-affecting
//! actions against the server with optimistic balance updates.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Card, Operation, Recharge, User, errors)
//! - [`config`] - Runtime configuration from flags and environment
//! - [`core`] - View-models and the seams they depend on:
//!   - [`core::ledger`] - Card ledger with optimistic balance updates
//!   - [`core::dashboard`] - Dashboard totals and recent activity
//!   - [`core::directory`] - User directory CRUD and search
//!   - [`core::session`] - Session store
//! - [`io`] - HTTP gateway, session persistence and CSV output
//! - [`cli`] - CLI arguments parsing and command execution
//!
//! # Balance-affecting actions
//!
//! | Action             | Predicted delta            |
//! |--------------------|----------------------------|
//! | Recharge           | `+amount`                  |
//! | Edit recharge      | `+(new - old)`             |
//! | Delete recharge    | `-amount`                  |
//! | Add operation      | `-debit`                   |
//! | Edit operation     | `-(new - old)`             |
//! | Delete operation   | `+debit`                   |
//!
//! A failed request applies the inverse delta, leaving the balance exactly as
//! it was before the action.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use config::Config;
pub use core::{
    CardLedger, DashboardAggregator, DashboardSummary, MutationOutcome, Refresh, SessionStore,
    UserDirectory,
};
pub use io::{FileStorage, HttpGateway, MemoryStorage};
pub use types::{
    Amount, Card, CardId, CardType, LedgerError, LoadId, Operation, OperationId, Recharge, Role,
    Session, User, UserId,
};
