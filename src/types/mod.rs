//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `amount`: Validated, strictly positive amounts
//! - `card`: Cards, operations, recharges and their request bodies
//! - `user`: Users, roles and the authenticated session
//! - `error`: Error type for the whole client

pub mod amount;
pub mod card;
pub mod error;
pub mod user;

pub use amount::Amount;
pub use card::{
    Card, CardId, CardType, LoadId, Operation, OperationId, OperationRequest, Recharge,
    RechargeRequest,
};
pub use error::LedgerError;
pub use user::{LoginResponse, NewUser, Role, Session, User, UserId, UserUpdate, UserWithCards};
