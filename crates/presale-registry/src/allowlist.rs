//! # Allowlist Registry
//!
//! Owner-curated set of addresses approved to purchase. Implements
//! [`AccessOracle`] for the sale engine.
//!
//! Both mutations are idempotent over repeated addresses and always raise
//! a change notification, even when the membership did not change. The
//! notification is returned to the caller, appended to the update log,
//! and emitted as a `tracing` event. Notifications are stamped by the
//! allowlist's [`Clock`], the same time input the sale engine reads.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use presale_core::{Address, Clock, SystemClock, Timestamp};

use crate::error::RegistryError;
use crate::traits::AccessOracle;

/// Direction of an allowlist change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowlistAction {
    /// Addresses were approved.
    Added,
    /// Addresses were removed.
    Removed,
}

/// Change notification for one allowlist mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistUpdate {
    /// Whether addresses were added or removed.
    pub action: AllowlistAction,
    /// Addresses named in the request, in request order.
    pub addresses: Vec<Address>,
    /// When the update was applied.
    pub timestamp: Timestamp,
}

/// Owner-curated set of approved purchasers.
#[derive(Debug)]
pub struct Allowlist {
    owner: Address,
    clock: Arc<dyn Clock>,
    members: RwLock<BTreeSet<Address>>,
    updates: RwLock<Vec<AllowlistUpdate>>,
}

impl Allowlist {
    /// Create an empty allowlist administered by `owner`, stamped by wall-clock time.
    pub fn new(owner: Address) -> Self {
        Self::with_clock(owner, Arc::new(SystemClock))
    }

    /// Create an empty allowlist whose notifications read `clock`.
    pub fn with_clock(owner: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            owner,
            clock,
            members: RwLock::new(BTreeSet::new()),
            updates: RwLock::new(Vec::new()),
        }
    }

    /// The administering identity.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Approve `addresses`. Owner only.
    pub fn add_approved(
        &self,
        caller: &Address,
        addresses: &[Address],
    ) -> Result<AllowlistUpdate, RegistryError> {
        self.ensure_owner(caller)?;
        self.members.write().extend(addresses.iter().copied());
        Ok(self.notify(AllowlistAction::Added, addresses))
    }

    /// Remove `addresses`. Owner only. Absent addresses are ignored.
    pub fn remove_approved(
        &self,
        caller: &Address,
        addresses: &[Address],
    ) -> Result<AllowlistUpdate, RegistryError> {
        self.ensure_owner(caller)?;
        {
            let mut members = self.members.write();
            for address in addresses {
                members.remove(address);
            }
        }
        Ok(self.notify(AllowlistAction::Removed, addresses))
    }

    /// Number of approved addresses.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether no address is approved.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// All change notifications raised so far, oldest first.
    pub fn updates(&self) -> Vec<AllowlistUpdate> {
        self.updates.read().clone()
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), RegistryError> {
        if *caller != self.owner {
            return Err(RegistryError::NotOwner {
                caller: *caller,
                owner: self.owner,
            });
        }
        Ok(())
    }

    fn notify(&self, action: AllowlistAction, addresses: &[Address]) -> AllowlistUpdate {
        let update = AllowlistUpdate {
            action,
            addresses: addresses.to_vec(),
            timestamp: self.clock.now(),
        };
        tracing::info!(action = ?action, count = addresses.len(), "allowlist updated");
        self.updates.write().push(update.clone());
        update
    }
}

impl AccessOracle for Allowlist {
    fn is_approved(&self, account: &Address) -> bool {
        self.members.read().contains(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presale_core::ManualClock;

    fn owner() -> Address {
        Address::with_last_byte(0xa1)
    }

    fn buyer() -> Address {
        Address::with_last_byte(0x01)
    }

    fn buyer2() -> Address {
        Address::with_last_byte(0x02)
    }

    #[test]
    fn test_only_owner_adds() {
        let list = Allowlist::new(owner());
        let err = list.add_approved(&buyer(), &[buyer(), buyer2()]).unwrap_err();
        assert!(matches!(err, RegistryError::NotOwner { .. }));
        assert!(!list.is_approved(&buyer()));

        list.add_approved(&owner(), &[buyer(), buyer2()]).unwrap();
        assert!(list.is_approved(&buyer()));
        assert!(list.is_approved(&buyer2()));
    }

    #[test]
    fn test_only_owner_removes() {
        let list = Allowlist::new(owner());
        list.add_approved(&owner(), &[buyer(), buyer2()]).unwrap();

        assert!(list.remove_approved(&buyer2(), &[buyer()]).is_err());
        assert!(list.is_approved(&buyer()));

        list.remove_approved(&owner(), &[buyer()]).unwrap();
        assert!(!list.is_approved(&buyer()));
        assert!(list.is_approved(&buyer2()));
    }

    #[test]
    fn test_idempotent_over_repeats() {
        let list = Allowlist::new(owner());
        list.add_approved(&owner(), &[buyer(), buyer(), buyer()]).unwrap();
        list.add_approved(&owner(), &[buyer()]).unwrap();
        assert_eq!(list.len(), 1);

        list.remove_approved(&owner(), &[buyer2(), buyer2()]).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_every_mutation_notifies() {
        let list = Allowlist::new(owner());
        let update = list.add_approved(&owner(), &[buyer(), buyer2()]).unwrap();
        assert_eq!(update.action, AllowlistAction::Added);
        assert_eq!(update.addresses, vec![buyer(), buyer2()]);

        list.add_approved(&owner(), &[buyer()]).unwrap();
        list.remove_approved(&owner(), &[buyer()]).unwrap();

        let log = list.updates();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].action, AllowlistAction::Removed);
    }

    #[test]
    fn test_failed_mutation_does_not_notify() {
        let list = Allowlist::new(owner());
        let _ = list.add_approved(&buyer(), &[buyer()]);
        assert!(list.updates().is_empty());
    }

    #[test]
    fn test_update_serialization() {
        let list = Allowlist::new(owner());
        let update = list.add_approved(&owner(), &[buyer()]).unwrap();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["action"], "ADDED");
        let parsed: AllowlistUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, update);
    }

    #[test]
    fn test_updates_stamped_by_injected_clock() {
        let start = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        let clock = ManualClock::new(start);
        let list = Allowlist::with_clock(owner(), Arc::new(clock.clone()));
        assert_eq!(list.add_approved(&owner(), &[buyer()]).unwrap().timestamp, start);

        let later = clock.advance(3_600).unwrap();
        assert_eq!(list.remove_approved(&owner(), &[buyer()]).unwrap().timestamp, later);
    }
}
