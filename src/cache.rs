//! Per-owner view state: the lists a signed-in user's pages render from,
//! plus memoized figures derived from them.
//!
//! Each owner has an epoch. Auth events for the owner bump it and drop the
//! cached lists, which forces the next page to reload from the backend. A
//! load started before the bump still renders for the request that issued
//! it, but its result is never stored.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, warn};

use crate::gateway::{BudgetQuery, DataGateway, TransactionQuery};
use crate::models::{Budget, Identity, Transaction};
use crate::session::{AuthEvent, AuthEventKind};

/// A snapshot of one owner's rows, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    /// 0 for snapshots that were never stored.
    pub version: u64,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
}

impl Ledger {
    pub fn recent_transactions(&self, limit: usize) -> &[Transaction] {
        &self.transactions[..limit.min(self.transactions.len())]
    }

    pub fn recent_budgets(&self, limit: usize) -> &[Budget] {
        &self.budgets[..limit.min(self.budgets.len())]
    }
}

/// Proof of which epoch a load started in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    owner: String,
    epoch: u64,
}

type Derived = Arc<dyn Any + Send + Sync>;

struct OwnerEntry {
    epoch: u64,
    ledger: Option<Arc<Ledger>>,
    derived: HashMap<String, Derived>,
    display_name: Option<String>,
}

impl OwnerEntry {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            ledger: None,
            derived: HashMap::new(),
            display_name: None,
        }
    }

    fn reset(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.ledger = None;
        self.derived.clear();
        self.display_name = None;
    }

    /// Apply `edit` to the cached lists, if any, under a fresh version.
    fn mutate(&mut self, version: u64, edit: impl FnOnce(&mut Ledger)) -> bool {
        let Some(ledger) = self.ledger.as_mut() else {
            return false;
        };
        let ledger = Arc::make_mut(ledger);
        edit(ledger);
        ledger.version = version;
        self.derived.clear();
        true
    }
}

pub struct ViewCache {
    next_version: AtomicU64,
    owners: RwLock<HashMap<String, OwnerEntry>>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCache {
    pub fn new() -> Self {
        Self {
            next_version: AtomicU64::new(1),
            owners: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, OwnerEntry>> {
        self.owners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, OwnerEntry>> {
        self.owners.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Epochs come from the version counter so a removed and re-created
    /// entry never reuses one an older ticket still holds.
    fn entry_mut<'a>(
        &self,
        owners: &'a mut HashMap<String, OwnerEntry>,
        owner: &str,
    ) -> &'a mut OwnerEntry {
        owners
            .entry(owner.to_string())
            .or_insert_with(|| OwnerEntry::new(self.bump_version()))
    }

    pub fn ledger(&self, owner: &str) -> Option<Arc<Ledger>> {
        self.read().get(owner).and_then(|e| e.ledger.clone())
    }

    pub fn begin_load(&self, owner: &str) -> LoadTicket {
        let mut owners = self.write();
        let epoch = self.entry_mut(&mut owners, owner).epoch;
        LoadTicket {
            owner: owner.to_string(),
            epoch,
        }
    }

    /// Store freshly loaded lists unless the owner's epoch moved on since
    /// `ticket` was taken. Either way the snapshot is returned for rendering.
    pub fn store(
        &self,
        ticket: LoadTicket,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
    ) -> Arc<Ledger> {
        let mut owners = self.write();
        let entry = owners
            .get_mut(&ticket.owner)
            .filter(|entry| entry.epoch == ticket.epoch);

        let Some(entry) = entry else {
            warn!(owner = %ticket.owner, "Discarding load that finished after an auth change");
            return Arc::new(Ledger {
                version: 0,
                transactions,
                budgets,
            });
        };

        let ledger = Arc::new(Ledger {
            version: self.bump_version(),
            transactions,
            budgets,
        });
        entry.ledger = Some(ledger.clone());
        entry.derived.clear();
        ledger
    }

    /// Cached lists for `identity`, loading both tables concurrently on a miss.
    ///
    /// A failed read is logged and rendered as an empty list; partial results
    /// are not cached so the next page view asks the backend again.
    pub async fn load_or_fetch(&self, data: &dyn DataGateway, identity: &Identity) -> Arc<Ledger> {
        if let Some(ledger) = self.ledger(&identity.user_id) {
            debug!(owner = %identity.user_id, version = ledger.version, "Ledger cache hit");
            return ledger;
        }

        let ticket = self.begin_load(&identity.user_id);
        let (transactions, budgets) = tokio::join!(
            data.list_transactions(identity, TransactionQuery::default()),
            data.list_budgets(identity, BudgetQuery::default()),
        );

        let mut complete = true;
        let transactions = match transactions {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to load transactions: {}", e);
                complete = false;
                Vec::new()
            }
        };
        let budgets = match budgets {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to load budgets: {}", e);
                complete = false;
                Vec::new()
            }
        };

        debug!(
            owner = %identity.user_id,
            transactions = transactions.len(),
            budgets = budgets.len(),
            complete,
            "Ledger loaded"
        );

        if complete {
            self.store(ticket, transactions, budgets)
        } else {
            Arc::new(Ledger {
                version: 0,
                transactions,
                budgets,
            })
        }
    }

    /// Drop everything cached for `owner` and invalidate in-flight loads.
    /// Owners with nothing cached are left out of the map.
    pub fn evict(&self, owner: &str) {
        let epoch = self.bump_version();
        if let Some(entry) = self.write().get_mut(owner) {
            entry.reset(epoch);
        }
    }

    /// A sign-out removes the owner outright; a load still in flight finds
    /// no entry and is discarded.
    pub fn handle_auth_event(&self, event: &AuthEvent) {
        debug!(owner = %event.user_id, kind = ?event.kind, "Auth change, evicting view cache");
        match event.kind {
            AuthEventKind::SignedOut => {
                self.write().remove(&event.user_id);
            }
            _ => self.evict(&event.user_id),
        }
    }

    /// Insert a freshly saved row where a reload would put it: ahead of every
    /// row on the same or an earlier date, behind every later-dated row.
    pub fn insert_transaction(&self, owner: &str, transaction: Transaction) -> bool {
        let version = self.bump_version();
        let mut owners = self.write();
        owners.get_mut(owner).is_some_and(|entry| {
            entry.mutate(version, |ledger| {
                let at = ledger
                    .transactions
                    .iter()
                    .position(|t| t.date <= transaction.date)
                    .unwrap_or(ledger.transactions.len());
                ledger.transactions.insert(at, transaction)
            })
        })
    }

    pub fn prepend_budget(&self, owner: &str, budget: Budget) -> bool {
        let version = self.bump_version();
        let mut owners = self.write();
        owners.get_mut(owner).is_some_and(|entry| {
            entry.mutate(version, |ledger| ledger.budgets.insert(0, budget))
        })
    }

    pub fn set_budget_amount(&self, owner: &str, id: &str, limit_cents: i64) -> bool {
        let version = self.bump_version();
        let mut owners = self.write();
        owners.get_mut(owner).is_some_and(|entry| {
            entry.mutate(version, |ledger| {
                ledger
                    .budgets
                    .iter_mut()
                    .filter(|b| b.id == id)
                    .for_each(|b| b.limit_cents = limit_cents)
            })
        })
    }

    pub fn remove_budget(&self, owner: &str, id: &str) -> bool {
        let version = self.bump_version();
        let mut owners = self.write();
        owners.get_mut(owner).is_some_and(|entry| {
            entry.mutate(version, |ledger| ledger.budgets.retain(|b| b.id != id))
        })
    }

    /// Compute `key` from `ledger` once per ledger version.
    ///
    /// Snapshots that are not the owner's current cached ledger are computed
    /// every time.
    pub fn memoize<T, F>(&self, owner: &str, ledger: &Ledger, key: &str, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let is_current = |entry: &OwnerEntry| {
            ledger.version != 0
                && entry
                    .ledger
                    .as_ref()
                    .is_some_and(|l| l.version == ledger.version)
        };

        {
            let owners = self.read();
            if let Some(entry) = owners.get(owner).filter(|e| is_current(e)) {
                if let Some(hit) = entry.derived.get(key).and_then(|d| d.downcast_ref::<T>()) {
                    return hit.clone();
                }
            }
        }

        let value = compute();

        let mut owners = self.write();
        if let Some(entry) = owners.get_mut(owner).filter(|e| is_current(e)) {
            entry
                .derived
                .insert(key.to_string(), Arc::new(value.clone()) as Derived);
        }
        value
    }

    pub fn display_name(&self, owner: &str) -> Option<String> {
        self.read().get(owner).and_then(|e| e.display_name.clone())
    }

    pub fn set_display_name(&self, owner: &str, name: String) {
        let mut owners = self.write();
        self.entry_mut(&mut owners, owner).display_name = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            title: id.into(),
            category: "Groceries".into(),
            amount_cents: 100,
            kind: TransactionKind::Expense,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            notes: String::new(),
            user_id: "u-1".into(),
            created_at: None,
        }
    }

    fn budget(id: &str, limit_cents: i64) -> Budget {
        Budget {
            id: id.into(),
            category: "Groceries".into(),
            limit_cents,
            user_id: "u-1".into(),
            created_at: None,
        }
    }

    #[test]
    fn store_then_hit() {
        let cache = ViewCache::new();
        assert!(cache.ledger("u-1").is_none());
        let ticket = cache.begin_load("u-1");
        let stored = cache.store(ticket, vec![tx("a")], vec![]);
        assert!(stored.version > 0);
        assert_eq!(cache.ledger("u-1").unwrap().transactions.len(), 1);
    }

    #[test]
    fn load_finishing_after_eviction_is_not_stored() {
        let cache = ViewCache::new();
        let ticket = cache.begin_load("u-1");
        cache.evict("u-1");
        let ledger = cache.store(ticket, vec![tx("late")], vec![]);
        assert_eq!(ledger.version, 0);
        assert_eq!(ledger.transactions.len(), 1);
        assert!(cache.ledger("u-1").is_none());
    }

    #[test]
    fn mutations_mirror_into_cached_lists() {
        let cache = ViewCache::new();
        let ticket = cache.begin_load("u-1");
        let first = cache.store(ticket, vec![tx("old")], vec![budget("b1", 100)]);

        assert!(cache.insert_transaction("u-1", tx("new")));
        assert!(cache.prepend_budget("u-1", budget("b2", 200)));
        assert!(cache.set_budget_amount("u-1", "b1", 500));
        assert!(cache.remove_budget("u-1", "b2"));

        let ledger = cache.ledger("u-1").unwrap();
        assert!(ledger.version > first.version);
        assert_eq!(ledger.transactions[0].id, "new");
        assert_eq!(ledger.budgets, vec![budget("b1", 500)]);
        // The snapshot handed out earlier is unchanged.
        assert_eq!(first.transactions.len(), 1);
    }

    #[test]
    fn inserted_transactions_keep_date_order() {
        let on = |id: &str, day: u32| Transaction {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            ..tx(id)
        };
        let cache = ViewCache::new();
        let ticket = cache.begin_load("u-1");
        cache.store(ticket, vec![on("d10", 10), on("d5", 5)], vec![]);

        cache.insert_transaction("u-1", on("d1", 1));
        cache.insert_transaction("u-1", on("d7", 7));
        cache.insert_transaction("u-1", on("d10-later", 10));
        cache.insert_transaction("u-1", on("d20", 20));

        let ids: Vec<_> = cache
            .ledger("u-1")
            .unwrap()
            .transactions
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids, vec!["d20", "d10-later", "d10", "d7", "d5", "d1"]);
    }

    #[test]
    fn mutations_without_cached_lists_are_ignored() {
        let cache = ViewCache::new();
        assert!(!cache.insert_transaction("u-1", tx("new")));
        assert!(cache.ledger("u-1").is_none());
    }

    #[test]
    fn memoize_computes_once_per_version() {
        let cache = ViewCache::new();
        let ticket = cache.begin_load("u-1");
        let ledger = cache.store(ticket, vec![tx("a")], vec![]);
        let calls = Cell::new(0);

        let compute = || {
            calls.set(calls.get() + 1);
            42_i64
        };
        assert_eq!(cache.memoize("u-1", &ledger, "answer", compute), 42);
        assert_eq!(cache.memoize("u-1", &ledger, "answer", compute), 42);
        assert_eq!(calls.get(), 1);

        cache.insert_transaction("u-1", tx("b"));
        let ledger = cache.ledger("u-1").unwrap();
        cache.memoize("u-1", &ledger, "answer", compute);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unstored_snapshots_are_not_memoized() {
        let cache = ViewCache::new();
        let snapshot = Ledger::default();
        let calls = Cell::new(0);
        for _ in 0..2 {
            cache.memoize("u-1", &snapshot, "k", || {
                calls.set(calls.get() + 1);
                1_u8
            });
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn auth_event_clears_lists_and_display_name() {
        let cache = ViewCache::new();
        let ticket = cache.begin_load("u-1");
        cache.store(ticket, vec![tx("a")], vec![]);
        cache.set_display_name("u-1", "Jane".into());

        cache.handle_auth_event(&AuthEvent {
            kind: AuthEventKind::SignedOut,
            user_id: "u-1".into(),
            session: None,
        });

        assert!(cache.ledger("u-1").is_none());
        assert!(cache.display_name("u-1").is_none());
        assert!(cache.read().is_empty());
    }

    #[test]
    fn auth_events_for_unknown_owners_add_no_entries() {
        let cache = ViewCache::new();
        for i in 0..50 {
            let kind = if i % 2 == 0 {
                AuthEventKind::TokenRefreshed
            } else {
                AuthEventKind::SignedOut
            };
            cache.handle_auth_event(&AuthEvent {
                kind,
                user_id: format!("ghost-{}", i),
                session: None,
            });
        }
        assert!(cache.read().is_empty());
    }

    #[test]
    fn load_in_flight_across_sign_out_and_back_in_is_discarded() {
        let cache = ViewCache::new();
        let stale = cache.begin_load("u-1");
        cache.handle_auth_event(&AuthEvent {
            kind: AuthEventKind::SignedOut,
            user_id: "u-1".into(),
            session: None,
        });
        let fresh = cache.begin_load("u-1");

        let ledger = cache.store(stale, vec![tx("stale")], vec![]);
        assert_eq!(ledger.version, 0);
        assert!(cache.ledger("u-1").is_none());

        cache.store(fresh, vec![tx("fresh")], vec![]);
        assert_eq!(cache.ledger("u-1").unwrap().transactions[0].id, "fresh");
    }

    #[test]
    fn slices_clamp_to_length() {
        let ledger = Ledger {
            version: 1,
            transactions: vec![tx("a"), tx("b")],
            budgets: vec![],
        };
        assert_eq!(ledger.recent_transactions(12).len(), 2);
        assert_eq!(ledger.recent_transactions(1)[0].id, "a");
        assert!(ledger.recent_budgets(6).is_empty());
    }
}
