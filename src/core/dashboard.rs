//! Dashboard aggregation
//!
//! Read-only composition over the API: fetch cards and their histories, then
//! fold them into summary statistics. Fetching and folding are split so the
//! folds are pure functions over snapshots; folding the same snapshots twice
//! gives the same summary.
//!
//! A failed fetch for one card's operations or recharge count is logged and
//! counts as zero for that part; it never aborts the whole dashboard.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{CardApi, OperationApi, UserApi};
use crate::types::{Card, CardType, LedgerError, Operation, Recharge, User, UserId, UserWithCards};

/// Recent operations shown on a user's own dashboard
pub const USER_RECENT_LIMIT: usize = 5;

/// Recent operations shown on the administrator dashboard
pub const ADMIN_RECENT_LIMIT: usize = 10;

/// One card with what was fetched for it
#[derive(Debug, Clone, PartialEq)]
pub struct CardSnapshot {
    pub card: Card,
    /// Display name of the card's owner (admin aggregation only)
    pub owner: Option<String>,
    pub operations: Vec<Operation>,
    pub load_count: u64,
}

/// Operation attributed to its card and, for administrators, its owner
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub operation: Operation,
    pub card_type: CardType,
    pub user_name: Option<String>,
}

/// Dashboard statistics
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_balance: Decimal,
    pub total_cards: usize,
    pub total_operations: usize,
    pub total_recharges: u64,
    /// Only set on the administrator dashboard
    pub total_users: Option<usize>,
    /// Newest first
    pub recent_operations: Vec<ActivityEntry>,
}

/// Card with its complete history, for the per-user detail view
#[derive(Debug, Clone, PartialEq)]
pub struct CardHistory {
    pub card: Card,
    pub operations: Vec<Operation>,
    pub loads: Vec<Recharge>,
}

/// Per-card totals in the detail view
#[derive(Debug, Clone, PartialEq)]
pub struct CardStats {
    pub card: Card,
    pub total_spent: Decimal,
    pub total_recharged: Decimal,
    pub operations_count: usize,
    pub recharges_count: usize,
}

/// Detail view of one user's cards
#[derive(Debug, Clone, PartialEq)]
pub struct UserDetails {
    pub total_balance: Decimal,
    pub total_cards: usize,
    pub total_operations: usize,
    pub total_recharges: usize,
    pub total_recharged_amount: Decimal,
    pub total_spent_amount: Decimal,
    /// Newest first
    pub operations: Vec<ActivityEntry>,
    /// Newest first
    pub loads: Vec<Recharge>,
    pub cards: Vec<CardStats>,
}

/// Balance of a user per issuing brand
#[derive(Debug, Clone, PartialEq)]
pub struct BrandBalances {
    pub user: User,
    pub afriquia: Decimal,
    pub attijari: Decimal,
}

/// Fold card snapshots into dashboard statistics
pub fn fold_summary(
    snapshots: &[CardSnapshot],
    total_users: Option<usize>,
    recent_limit: usize,
) -> DashboardSummary {
    let total_balance = snapshots.iter().map(|s| s.card.balance).sum();
    let total_recharges = snapshots.iter().map(|s| s.load_count).sum();

    let mut activity: Vec<ActivityEntry> = snapshots
        .iter()
        .flat_map(|s| {
            s.operations.iter().map(move |op| ActivityEntry {
                operation: op.clone(),
                card_type: s.card.card_type.clone(),
                user_name: s.owner.clone(),
            })
        })
        .collect();
    let total_operations = activity.len();
    activity.sort_by(|a, b| b.operation.created_at.cmp(&a.operation.created_at));
    activity.truncate(recent_limit);

    DashboardSummary {
        total_balance,
        total_cards: snapshots.len(),
        total_operations,
        total_recharges,
        total_users,
        recent_operations: activity,
    }
}

/// Fold complete card histories into the detail view
pub fn fold_details(histories: &[CardHistory]) -> UserDetails {
    let cards: Vec<CardStats> = histories
        .iter()
        .map(|h| CardStats {
            card: h.card.clone(),
            total_spent: h.operations.iter().map(|op| op.debit).sum(),
            total_recharged: h.loads.iter().map(|l| l.amount).sum(),
            operations_count: h.operations.len(),
            recharges_count: h.loads.len(),
        })
        .collect();

    let mut operations: Vec<ActivityEntry> = histories
        .iter()
        .flat_map(|h| {
            h.operations.iter().map(move |op| ActivityEntry {
                operation: op.clone(),
                card_type: h.card.card_type.clone(),
                user_name: None,
            })
        })
        .collect();
    operations.sort_by(|a, b| b.operation.created_at.cmp(&a.operation.created_at));

    let mut loads: Vec<Recharge> = histories.iter().flat_map(|h| h.loads.clone()).collect();
    loads.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    UserDetails {
        total_balance: histories.iter().map(|h| h.card.balance).sum(),
        total_cards: histories.len(),
        total_operations: operations.len(),
        total_recharges: loads.len(),
        total_recharged_amount: cards.iter().map(|c| c.total_recharged).sum(),
        total_spent_amount: cards.iter().map(|c| c.total_spent).sum(),
        operations,
        loads,
        cards,
    }
}

/// Sum each user's Afriquia and Attijari balances
pub fn fold_brand_balances(users: &[UserWithCards]) -> Vec<BrandBalances> {
    users
        .iter()
        .map(|entry| {
            let brand_total = |brand: &CardType| -> Decimal {
                entry
                    .cards
                    .iter()
                    .filter(|card| &card.card_type == brand)
                    .map(|card| card.balance)
                    .sum()
            };
            BrandBalances {
                user: entry.user.clone(),
                afriquia: brand_total(&CardType::Afriquia),
                attijari: brand_total(&CardType::Attijari),
            }
        })
        .collect()
}

/// Fetches what the dashboards need and folds it
pub struct DashboardAggregator<G> {
    gateway: Arc<G>,
}

impl<G> DashboardAggregator<G>
where
    G: UserApi + CardApi + OperationApi,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Dashboard of a single user
    ///
    /// Fails only if the user's card list cannot be fetched.
    pub async fn for_user(&self, user_id: UserId) -> Result<DashboardSummary, LedgerError> {
        let cards = self.gateway.user_cards(user_id).await?;
        let snapshots = join_all(cards.into_iter().map(|card| self.snapshot(card, None))).await;
        Ok(fold_summary(&snapshots, None, USER_RECENT_LIMIT))
    }

    /// Dashboard over every user, operations attributed to their owner
    ///
    /// Fails only if the user list cannot be fetched. A user whose cards
    /// cannot be fetched contributes no cards.
    pub async fn for_admin(&self) -> Result<DashboardSummary, LedgerError> {
        let users = self.gateway.list_users().await?;
        let per_user = join_all(users.iter().map(|user| self.snapshot_user(user))).await;
        let snapshots: Vec<CardSnapshot> = per_user.into_iter().flatten().collect();
        debug!(
            users = users.len(),
            cards = snapshots.len(),
            "aggregated admin dashboard"
        );
        Ok(fold_summary(
            &snapshots,
            Some(users.len()),
            ADMIN_RECENT_LIMIT,
        ))
    }

    /// Per-card statistics and full history of one user
    pub async fn user_details(&self, user_id: UserId) -> Result<UserDetails, LedgerError> {
        let cards = self.gateway.user_cards(user_id).await?;
        let histories = join_all(cards.into_iter().map(|card| self.history(card))).await;
        Ok(fold_details(&histories))
    }

    /// Afriquia and Attijari balance of every user
    pub async fn brand_balances(&self) -> Result<Vec<BrandBalances>, LedgerError> {
        let users = self.gateway.users_with_balance().await?;
        Ok(fold_brand_balances(&users))
    }

    async fn snapshot_user(&self, user: &User) -> Vec<CardSnapshot> {
        let cards = match self.gateway.user_cards(user.id).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!(user_id = user.id, "Error loading cards: {e}");
                return Vec::new();
            }
        };
        let owner = user.display_name().to_string();
        join_all(
            cards
                .into_iter()
                .map(|card| self.snapshot(card, Some(owner.clone()))),
        )
        .await
    }

    async fn snapshot(&self, card: Card, owner: Option<String>) -> CardSnapshot {
        let (operations, load_count) = futures::join!(
            self.gateway.card_operations(card.id),
            self.gateway.card_load_count(card.id),
        );

        let operations = operations.unwrap_or_else(|e| {
            warn!(card_id = card.id, "Error loading operations: {e}");
            Vec::new()
        });
        let load_count = load_count.unwrap_or_else(|e| {
            warn!(card_id = card.id, "Error loading recharge count: {e}");
            0
        });

        CardSnapshot {
            card,
            owner,
            operations,
            load_count,
        }
    }

    async fn history(&self, card: Card) -> CardHistory {
        let (operations, loads) = futures::join!(
            self.gateway.card_operations(card.id),
            self.gateway.card_loads(card.id),
        );

        CardHistory {
            operations: operations.unwrap_or_else(|e| {
                warn!(card_id = card.id, "Error loading operations: {e}");
                Vec::new()
            }),
            loads: loads.unwrap_or_else(|e| {
                warn!(card_id = card.id, "Error loading recharges: {e}");
                Vec::new()
            }),
            card,
        }
    }
}
