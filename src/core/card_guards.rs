//! Per-card mutation serialization
//!
//! A balance-affecting action predicts, commits and possibly rolls back a
//! delta on one card. Two such actions on the same card must not interleave,
//! otherwise a rollback can be applied on top of the other action's
//! prediction and the displayed balance drifts. `CardGuards` hands out one
//! async mutex per card.
//!
//! # Design
//!
//! Guards live in a `DashMap` keyed by card ID, so looking up the guard of
//! one card never blocks actions on other cards. The map entry is only held
//! long enough to clone the `Arc`; waiting happens on the tokio mutex, which
//! is safe to hold across `.await`.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::CardId;

/// Registry of per-card action locks
#[derive(Debug, Default)]
pub struct CardGuards {
    guards: DashMap<CardId, Arc<Mutex<()>>>,
}

impl CardGuards {
    pub fn new() -> Self {
        Self {
            guards: DashMap::new(),
        }
    }

    /// Wait until no other action holds `card_id`, then hold it
    ///
    /// The card stays locked until the returned guard is dropped.
    pub async fn acquire(&self, card_id: CardId) -> OwnedMutexGuard<()> {
        let guard = self
            .guards
            .entry(card_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        guard.lock_owned().await
    }

    /// Whether an action currently holds `card_id`
    pub fn is_busy(&self, card_id: CardId) -> bool {
        self.guards
            .get(&card_id)
            .map(|guard| guard.try_lock().is_err())
            .unwrap_or(false)
    }
}
