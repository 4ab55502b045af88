//! Core business logic module
//!
//! This module contains the view-models and the seams they depend on:
//! - `traits` - API and storage abstractions
//! - `session` - Session store (login, logout, restore)
//! - `card_guards` - Per-card serialization of balance-affecting actions
//! - `ledger` - Card ledger view-model with optimistic balance updates
//! - `dashboard` - Read-only dashboard aggregation
//! - `directory` - User directory CRUD and search

pub mod card_guards;
pub mod dashboard;
pub mod directory;
pub mod ledger;
pub mod session;
pub mod traits;

pub use card_guards::CardGuards;
pub use dashboard::{DashboardAggregator, DashboardSummary, UserDetails};
pub use directory::{PendingDeletion, UserDirectory, UserForm};
pub use ledger::{CardLedger, LedgerAction, LedgerState, MutationOutcome, Refresh};
pub use session::SessionStore;
pub use traits::{AuthApi, BalanceDelta, CardApi, OperationApi, SessionStorage, UserApi};
