//! Core traits for the remote API and session persistence
//!
//! These traits are the seams between the view-models and the outside world.
//! The HTTP gateway implements the API traits against the real service; tests
//! implement them with in-memory fakes.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{
    Amount, Card, CardId, LedgerError, LoadId, LoginResponse, NewUser, Operation, OperationId,
    OperationRequest, Recharge, User, UserId, UserUpdate, UserWithCards,
};

/// Authentication endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a bearer token and the user record
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, LedgerError>;

    /// Create a user account
    async fn register(&self, user: &NewUser) -> Result<User, LedgerError>;

    /// Identity bound to the current bearer token
    async fn me(&self) -> Result<User, LedgerError>;
}

/// User management endpoints
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, LedgerError>;

    async fn get_user(&self, id: UserId) -> Result<User, LedgerError>;

    async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<User, LedgerError>;

    async fn delete_user(&self, id: UserId) -> Result<(), LedgerError>;

    /// Every user together with their cards and balances
    async fn users_with_balance(&self) -> Result<Vec<UserWithCards>, LedgerError>;
}

/// Card and recharge endpoints
#[async_trait]
pub trait CardApi: Send + Sync {
    async fn user_cards(&self, user_id: UserId) -> Result<Vec<Card>, LedgerError>;

    /// Credit a card
    async fn recharge(&self, card_id: CardId, amount: Amount) -> Result<Recharge, LedgerError>;

    async fn card_loads(&self, card_id: CardId) -> Result<Vec<Recharge>, LedgerError>;

    async fn card_load_count(&self, card_id: CardId) -> Result<u64, LedgerError>;

    async fn update_load(&self, load_id: LoadId, amount: Amount)
        -> Result<Recharge, LedgerError>;

    async fn delete_load(&self, load_id: LoadId) -> Result<(), LedgerError>;
}

/// Operation (debit) endpoints
#[async_trait]
pub trait OperationApi: Send + Sync {
    async fn card_operations(&self, card_id: CardId) -> Result<Vec<Operation>, LedgerError>;

    async fn add_operation(
        &self,
        card_id: CardId,
        request: &OperationRequest,
    ) -> Result<Operation, LedgerError>;

    async fn update_operation(
        &self,
        operation_id: OperationId,
        request: &OperationRequest,
    ) -> Result<Operation, LedgerError>;

    async fn delete_operation(&self, operation_id: OperationId) -> Result<(), LedgerError>;
}

/// Key/value persistence for the session
///
/// Keys are fixed names (`token`, `user`); values are opaque strings.
pub trait SessionStorage: Send + Sync {
    /// Read a key, `Ok(None)` when it was never written or was removed
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError>;

    /// Write a key, replacing any previous value
    fn save(&self, key: &str, value: &str) -> Result<(), LedgerError>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), LedgerError>;
}

/// Signed balance change applied to a card
///
/// Positive deltas credit the card, negative deltas debit it.
pub trait BalanceDelta {
    /// The delta to apply before the request is sent
    fn predicted(&self) -> Decimal;

    /// The delta that undoes the prediction
    fn rollback(&self) -> Decimal {
        -self.predicted()
    }
}
