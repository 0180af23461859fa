//! Per-account state store.
//!
//! One [`AccountHandle`] per account inside a `DashMap`. The handle's
//! `parking_lot::Mutex` serialises every mutation of that account; the
//! separate async `settle` lock serialises settlements, which span
//! collaborator calls and therefore cannot hold the sync lock.
//!
//! Every mutation goes through [`AccountRecord::touch`], which bumps the
//! record version and drops the cached rate.

use std::collections::VecDeque;
use std::sync::Arc;

use accrue_core::effects::EffectStack;
use accrue_core::error::AccrueError;
use accrue_core::fingerprint::DeviceFingerprint;
use accrue_core::progression::ProgressionState;
use accrue_core::trust::TrustAssessment;
use accrue_core::types::{Account, AccountId, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::breakdown::RateBreakdown;

#[derive(Debug, Clone)]
pub struct CachedRate {
    pub breakdown: RateBreakdown,
    pub valid_until: Timestamp,
}

#[derive(Debug)]
pub struct AccountRecord {
    pub account: Account,
    pub progression: ProgressionState,
    pub effects: EffectStack,
    /// Device the account was last seen on; handed to the behaviour model.
    pub session: Option<DeviceFingerprint>,
    pub trust: Option<TrustAssessment>,
    pub cached_rate: Option<CachedRate>,
    /// Settled `(to, micro-tokens)` pairs, oldest first.
    settled: VecDeque<(Timestamp, u64)>,
    pub version: u64,
}

impl AccountRecord {
    fn new(account: Account) -> Self {
        let effects = EffectStack::new(account.id);
        Self {
            account,
            progression: ProgressionState::new(),
            effects,
            session: None,
            trust: None,
            cached_rate: None,
            settled: VecDeque::new(),
            version: 0,
        }
    }

    /// Record a mutation: new version, cached rate dropped.
    pub fn touch(&mut self) {
        self.version += 1;
        self.cached_rate = None;
    }

    /// Micro-tokens settled in the `window_secs` ending at `now`.
    pub fn settled_within(&self, now: Timestamp, window_secs: u64) -> u64 {
        self.settled
            .iter()
            .filter(|(at, _)| at.saturating_add(window_secs) > now)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Remember a settlement, dropping entries older than `window_secs`.
    pub fn record_settlement(&mut self, at: Timestamp, amount: u64, window_secs: u64) {
        while self.settled.front().is_some_and(|(t, _)| t.saturating_add(window_secs) <= at) {
            self.settled.pop_front();
        }
        self.settled.push_back((at, amount));
    }

    /// Cached rate still usable at `now`.
    pub fn cached(&self, now: Timestamp) -> Option<&RateBreakdown> {
        self.cached_rate
            .as_ref()
            .filter(|c| now >= c.breakdown.computed_at && now < c.valid_until)
            .map(|c| &c.breakdown)
    }
}

#[derive(Debug)]
pub struct AccountHandle {
    pub record: Mutex<AccountRecord>,
    pub settle: tokio::sync::Mutex<()>,
}

#[derive(Default)]
pub struct AccountRegistry {
    accounts: DashMap<AccountId, Arc<AccountHandle>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) -> Result<(), AccrueError> {
        match self.accounts.entry(account.id) {
            Entry::Occupied(_) => Err(AccrueError::DuplicateAccount(account.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(AccountHandle {
                    record: Mutex::new(AccountRecord::new(account)),
                    settle: tokio::sync::Mutex::new(()),
                }));
                Ok(())
            }
        }
    }

    pub fn get(&self, id: AccountId) -> Result<Arc<AccountHandle>, AccrueError> {
        self.accounts
            .get(&id)
            .map(|h| Arc::clone(h.value()))
            .ok_or(AccrueError::UnknownAccount(id))
    }

    /// Run `f` under the account's lock.
    pub fn with_record<R>(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut AccountRecord) -> R,
    ) -> Result<R, AccrueError> {
        let handle = self.get(id)?;
        let mut record = handle.record.lock();
        Ok(f(&mut record))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// All handles, collected so no shard lock is held while callers lock records.
    pub fn handles(&self) -> Vec<Arc<AccountHandle>> {
        self.accounts.iter().map(|e| Arc::clone(e.value())).collect()
    }
}
