//! Card ledger view-model
//!
//! This module provides `CardLedger`, which holds one user's cards, the
//! currently selected card and that card's operations, recharges and recharge
//! count, and performs balance-affecting actions with optimistic updates.
//!
//! # Optimistic protocol
//!
//! Every action runs the same three phases while holding the card's guard:
//!
//! 1. **Predict**: apply the signed delta to the selected card and to the
//!    matching entry of the card list before the request is sent.
//! 2. **Commit**: send the request. On success the prediction stands and the
//!    card's operations, recharges and recharge count are fetched again
//!    (concurrently, all three awaited together) to reconcile the lists.
//! 3. **Rollback**: on failure apply the inverse delta, leaving the balance
//!    exactly as it was before phase 1, and return `CommitFailed`.
//!
//! Only the balance is optimistic. Records are never inserted locally; they
//! appear once the post-commit re-fetch succeeds. A failed re-fetch is logged
//! and leaves the lists stale, it never undoes a committed action.
//!
//! # Concurrency
//!
//! Actions on the same card are serialized through `CardGuards`, so a second
//! action waits for the first to predict, commit and reconcile. Actions on
//! different cards run concurrently. The state mutex is only held for short
//! synchronous sections, never across a request.
//!
//! Selection is last-selection-wins: each `select_card` bumps an epoch and a
//! response is applied only if the epoch and the selected card are unchanged.

use futures::try_join;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::card_guards::CardGuards;
use super::traits::{BalanceDelta, CardApi, OperationApi};
use crate::types::{
    Amount, Card, CardId, LedgerError, LoadId, Operation, OperationId, OperationRequest, Recharge,
    UserId,
};

/// Locally held view of a user's cards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    pub cards: Vec<Card>,
    pub selected_card: Option<Card>,
    pub operations: Vec<Operation>,
    pub loads: Vec<Recharge>,
    pub load_count: u64,
}

/// Result of loading a card's lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Fresh lists replaced the local ones
    Applied,
    /// The selection changed while loading; the response was discarded
    Stale,
    /// A request failed; the local lists were kept
    Failed,
}

/// Outcome of a committed action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Card balance after the action
    pub balance: Decimal,
    /// What happened to the lists during reconciliation
    pub refresh: Refresh,
}

/// Balance-affecting action and the amounts it moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    Recharge { amount: Decimal },
    EditRecharge { old: Decimal, new: Decimal },
    DeleteRecharge { amount: Decimal },
    AddOperation { debit: Decimal },
    EditOperation { old: Decimal, new: Decimal },
    DeleteOperation { debit: Decimal },
}

impl LedgerAction {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerAction::Recharge { .. } => "recharge",
            LedgerAction::EditRecharge { .. } => "edit recharge",
            LedgerAction::DeleteRecharge { .. } => "delete recharge",
            LedgerAction::AddOperation { .. } => "add operation",
            LedgerAction::EditOperation { .. } => "edit operation",
            LedgerAction::DeleteOperation { .. } => "delete operation",
        }
    }
}

impl BalanceDelta for LedgerAction {
    fn predicted(&self) -> Decimal {
        match *self {
            LedgerAction::Recharge { amount } => amount,
            LedgerAction::EditRecharge { old, new } => new - old,
            LedgerAction::DeleteRecharge { amount } => -amount,
            LedgerAction::AddOperation { debit } => -debit,
            LedgerAction::EditOperation { old, new } => -(new - old),
            LedgerAction::DeleteOperation { debit } => debit,
        }
    }
}

/// View-model over one user's cards
pub struct CardLedger<G> {
    gateway: Arc<G>,
    user_id: UserId,
    state: Mutex<LedgerState>,
    guards: CardGuards,
    selection_epoch: AtomicU64,
}

impl<G> CardLedger<G>
where
    G: CardApi + OperationApi,
{
    /// Create an empty ledger for `user_id`; call `load_cards` to populate it
    pub fn new(gateway: Arc<G>, user_id: UserId) -> Self {
        Self {
            gateway,
            user_id,
            state: Mutex::new(LedgerState::default()),
            guards: CardGuards::new(),
            selection_epoch: AtomicU64::new(0),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Fetch the user's cards
    ///
    /// Balances are replaced by the server's, except for cards with an action
    /// in flight whose prediction must survive until it commits or rolls
    /// back. The selected card follows its server copy. When nothing is
    /// selected afterwards, the first card is selected and its lists loaded.
    pub async fn load_cards(&self) -> Result<Vec<Card>, LedgerError> {
        let fetched = self.gateway.user_cards(self.user_id).await.map_err(|e| {
            error!(user_id = self.user_id, "Error loading cards: {e}");
            e
        })?;

        let first = {
            let mut state = self.state.lock().await;
            let cards: Vec<Card> = fetched
                .into_iter()
                .map(|mut card| {
                    if self.guards.is_busy(card.id) {
                        if let Some(local) = state.cards.iter().find(|c| c.id == card.id) {
                            card.balance = local.balance;
                        }
                    }
                    card
                })
                .collect();

            let selected_id = state.selected_card.as_ref().map(|c| c.id);
            state.selected_card =
                selected_id.and_then(|id| cards.iter().find(|c| c.id == id).cloned());
            if selected_id.is_some() && state.selected_card.is_none() {
                debug!("selected card vanished from the card list");
                state.operations.clear();
                state.loads.clear();
                state.load_count = 0;
            }
            state.cards = cards;

            if state.selected_card.is_none() {
                state.cards.first().map(|c| c.id)
            } else {
                None
            }
        };

        if let Some(card_id) = first {
            self.select_card(card_id).await?;
        }

        Ok(self.state.lock().await.cards.clone())
    }

    /// Select a card and load its operations, recharges and recharge count
    ///
    /// Loading starts only once the selection is recorded. If another card is
    /// selected before the responses arrive they are discarded and
    /// `Refresh::Stale` is returned. Fetch failures are logged and reported
    /// as `Refresh::Failed` with empty lists.
    pub async fn select_card(&self, card_id: CardId) -> Result<Refresh, LedgerError> {
        let epoch = self.mark_selected(card_id).await?;
        Ok(self.load_card_data(card_id, epoch).await)
    }

    /// Select `card_id` and require its lists
    ///
    /// Same as `select_card`, except that a failed fetch is returned as the
    /// error itself instead of `Refresh::Failed`.
    pub async fn open_card(&self, card_id: CardId) -> Result<Refresh, LedgerError> {
        let epoch = self.mark_selected(card_id).await?;
        self.fetch_card_data(card_id, epoch).await
    }

    /// Re-fetch the selected card's lists
    pub async fn reload_selected(&self) -> Result<Refresh, LedgerError> {
        let card_id = self.selected_id().await?;
        let epoch = self.selection_epoch.load(Ordering::SeqCst);
        Ok(self.load_card_data(card_id, epoch).await)
    }

    /// Credit `card_id` with `amount`
    pub async fn recharge(
        &self,
        card_id: CardId,
        amount: &str,
    ) -> Result<MutationOutcome, LedgerError> {
        let amount = Amount::parse(amount)?;
        self.ensure_selection_and_card(card_id).await?;

        let _guard = self.guards.acquire(card_id).await;
        let action = LedgerAction::Recharge {
            amount: amount.value(),
        };
        self.run_optimistic(card_id, action, || self.gateway.recharge(card_id, amount))
            .await
    }

    /// Change the amount of a recharge of the selected card
    pub async fn edit_recharge(
        &self,
        load_id: LoadId,
        new_amount: &str,
    ) -> Result<MutationOutcome, LedgerError> {
        let new_amount = Amount::parse(new_amount)?;
        let card_id = self.selected_id().await?;

        let _guard = self.guards.acquire(card_id).await;
        let load = self.find_load(card_id, load_id).await?;
        let action = LedgerAction::EditRecharge {
            old: load.amount,
            new: new_amount.value(),
        };
        self.run_optimistic(card_id, action, || {
            self.gateway.update_load(load_id, new_amount)
        })
        .await
    }

    /// Cancel a recharge of the selected card
    pub async fn delete_recharge(&self, load_id: LoadId) -> Result<MutationOutcome, LedgerError> {
        let card_id = self.selected_id().await?;

        let _guard = self.guards.acquire(card_id).await;
        let load = self.find_load(card_id, load_id).await?;
        let action = LedgerAction::DeleteRecharge {
            amount: load.amount,
        };
        self.run_optimistic(card_id, action, || self.gateway.delete_load(load_id))
            .await
    }

    /// Debit `card_id` with a new operation
    pub async fn add_operation(
        &self,
        card_id: CardId,
        designation: &str,
        debit: &str,
    ) -> Result<MutationOutcome, LedgerError> {
        let debit = Amount::parse(debit)?;
        self.ensure_selection_and_card(card_id).await?;

        let _guard = self.guards.acquire(card_id).await;
        let request = OperationRequest {
            designation: designation.to_string(),
            debit: debit.value(),
        };
        let action = LedgerAction::AddOperation {
            debit: debit.value(),
        };
        self.run_optimistic(card_id, action, || {
            self.gateway.add_operation(card_id, &request)
        })
        .await
    }

    /// Change the debit of an operation of the selected card
    ///
    /// The label is replaced only when `designation` is given; otherwise the
    /// operation keeps its current one.
    pub async fn edit_operation(
        &self,
        operation_id: OperationId,
        designation: Option<&str>,
        new_debit: &str,
    ) -> Result<MutationOutcome, LedgerError> {
        let new_debit = Amount::parse(new_debit)?;
        let card_id = self.selected_id().await?;

        let _guard = self.guards.acquire(card_id).await;
        let operation = self.find_operation(card_id, operation_id).await?;
        let request = OperationRequest {
            designation: designation
                .map(str::to_string)
                .unwrap_or_else(|| operation.designation.clone()),
            debit: new_debit.value(),
        };
        let action = LedgerAction::EditOperation {
            old: operation.debit,
            new: new_debit.value(),
        };
        self.run_optimistic(card_id, action, || {
            self.gateway.update_operation(operation_id, &request)
        })
        .await
    }

    /// Delete an operation of the selected card
    pub async fn delete_operation(
        &self,
        operation_id: OperationId,
    ) -> Result<MutationOutcome, LedgerError> {
        let card_id = self.selected_id().await?;

        let _guard = self.guards.acquire(card_id).await;
        let operation = self.find_operation(card_id, operation_id).await?;
        let action = LedgerAction::DeleteOperation {
            debit: operation.debit,
        };
        self.run_optimistic(card_id, action, || {
            self.gateway.delete_operation(operation_id)
        })
        .await
    }

    /// Copy of the whole state
    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }

    pub async fn selected_card(&self) -> Option<Card> {
        self.state.lock().await.selected_card.clone()
    }

    /// Balance of a card as currently displayed
    pub async fn balance_of(&self, card_id: CardId) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| c.balance)
    }

    /// Predict, commit, then reconcile or roll back
    ///
    /// The caller holds the card's guard for the whole call.
    async fn run_optimistic<F, Fut, T>(
        &self,
        card_id: CardId,
        action: LedgerAction,
        commit: F,
    ) -> Result<MutationOutcome, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        self.adjust_balance(card_id, action.predicted()).await?;
        debug!(card_id, delta = %action.predicted(), "{} predicted", action.name());

        match commit().await {
            // A body that fails to decode still came with a success status
            Ok(_) | Err(LedgerError::Decode { .. }) => {
                info!(card_id, delta = %action.predicted(), "{} committed", action.name());
                let epoch = self.reload_epoch(card_id).await;
                let refresh = self.load_card_data(card_id, epoch).await;
                let balance = self.balance_of(card_id).await.unwrap_or_default();
                Ok(MutationOutcome { balance, refresh })
            }
            Err(e) => {
                if let Err(rollback) = self.adjust_balance(card_id, action.rollback()).await {
                    error!(card_id, "Rollback of {} failed: {rollback}", action.name());
                }
                warn!(card_id, "Error during {}, rolled back: {e}", action.name());
                Err(LedgerError::commit_failed(action.name(), card_id, e))
            }
        }
    }

    /// Add `delta` to the card in the list and to the selected card
    ///
    /// Both values are computed before either is written, so an overflow
    /// leaves the state untouched.
    async fn adjust_balance(&self, card_id: CardId, delta: Decimal) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let overflow = || LedgerError::ArithmeticOverflow {
            card: card_id,
            delta,
        };

        let index = state
            .cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(LedgerError::CardNotFound { card: card_id })?;
        let listed = state.cards[index]
            .balance
            .checked_add(delta)
            .ok_or_else(overflow)?;
        let selected = match state.selected_card.as_ref() {
            Some(card) if card.id == card_id => {
                Some(card.balance.checked_add(delta).ok_or_else(overflow)?)
            }
            _ => None,
        };

        state.cards[index].balance = listed;
        if let (Some(balance), Some(card)) = (selected, state.selected_card.as_mut()) {
            card.balance = balance;
        }
        Ok(())
    }

    /// Record `card_id` as selected with empty lists and start a new epoch
    async fn mark_selected(&self, card_id: CardId) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().await;
        let card = state
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .cloned()
            .ok_or(LedgerError::CardNotFound { card: card_id })?;
        state.selected_card = Some(card);
        state.operations.clear();
        state.loads.clear();
        state.load_count = 0;
        Ok(self.selection_epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Fetch the three lists of `card_id`, logging a failure as `Refresh::Failed`
    async fn load_card_data(&self, card_id: CardId, epoch: u64) -> Refresh {
        self.fetch_card_data(card_id, epoch)
            .await
            .unwrap_or_else(|e| {
                warn!(card_id, "Error loading card data: {e}");
                Refresh::Failed
            })
    }

    /// Fetch the three lists of `card_id` and apply them if still relevant
    async fn fetch_card_data(&self, card_id: CardId, epoch: u64) -> Result<Refresh, LedgerError> {
        let (operations, loads, load_count) = try_join!(
            self.gateway.card_operations(card_id),
            self.gateway.card_loads(card_id),
            self.gateway.card_load_count(card_id),
        )?;

        let mut state = self.state.lock().await;
        let still_selected = state.selected_card.as_ref().map(|c| c.id) == Some(card_id);
        if !still_selected || self.selection_epoch.load(Ordering::SeqCst) != epoch {
            debug!(card_id, "discarding lists of a card that is no longer selected");
            return Ok(Refresh::Stale);
        }

        state.operations = operations;
        state.loads = loads;
        state.load_count = load_count;
        Ok(Refresh::Applied)
    }

    /// Epoch for the reload that follows a commit on `card_id`
    ///
    /// Bumped when the card is selected, so a selection response fetched
    /// before the commit is discarded instead of replacing the newer lists.
    async fn reload_epoch(&self, card_id: CardId) -> u64 {
        let state = self.state.lock().await;
        if state.selected_card.as_ref().map(|c| c.id) == Some(card_id) {
            self.selection_epoch.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.selection_epoch.load(Ordering::SeqCst)
        }
    }

    async fn selected_id(&self) -> Result<CardId, LedgerError> {
        self.state
            .lock()
            .await
            .selected_card
            .as_ref()
            .map(|c| c.id)
            .ok_or(LedgerError::NoCardSelected)
    }

    async fn ensure_selection_and_card(&self, card_id: CardId) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        if state.selected_card.is_none() {
            return Err(LedgerError::NoCardSelected);
        }
        if !state.cards.iter().any(|c| c.id == card_id) {
            return Err(LedgerError::CardNotFound { card: card_id });
        }
        Ok(())
    }

    /// Recharge `load_id` of `card_id`, provided that card is still selected
    ///
    /// Called with the card's guard held. The selection may have moved while
    /// the guard was awaited, in which case the record is reported missing.
    async fn find_load(&self, card_id: CardId, load_id: LoadId) -> Result<Recharge, LedgerError> {
        let state = self.state.lock().await;
        if state.selected_card.as_ref().map(|c| c.id) != Some(card_id) {
            return Err(LedgerError::RechargeNotFound { load: load_id });
        }
        state
            .loads
            .iter()
            .find(|l| l.id == load_id && l.card_id == card_id)
            .cloned()
            .ok_or(LedgerError::RechargeNotFound { load: load_id })
    }

    async fn find_operation(
        &self,
        card_id: CardId,
        operation_id: OperationId,
    ) -> Result<Operation, LedgerError> {
        let missing = LedgerError::OperationNotFound {
            operation: operation_id,
        };
        let state = self.state.lock().await;
        if state.selected_card.as_ref().map(|c| c.id) != Some(card_id) {
            return Err(missing);
        }
        state
            .operations
            .iter()
            .find(|op| op.id == operation_id && op.card_id == card_id)
            .cloned()
            .ok_or(missing)
    }
}
