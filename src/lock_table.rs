// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::{
    Error, Hierarchy, LockManager, LockType, NodeID, ResourceHierarchy, Telemetry, TransactionID,
};
use scc::HashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, trace};

/// [`LockTable`] keeps track of the locks that transactions hold on the resources of a
/// [`Hierarchy`].
///
/// Lock requests that conflict with locks held by other transactions are queued in arrival
/// order; promotions and escalations are put at the front of the queue. The locking protocol is
/// enforced on every request: a transaction cannot hold a lock on a resource unless it holds a
/// permitting lock on the parent.
#[derive(Debug)]
pub struct LockTable {
    /// The resources being locked.
    hierarchy: Arc<Hierarchy>,

    /// Granted and pending locks of each resource.
    resources: HashMap<NodeID, Resource>,

    /// Operation counters.
    telemetry: Telemetry,
}

/// Lock state of a single resource.
#[derive(Debug, Default)]
struct Resource {
    /// Transactions holding a lock on the resource, each at most once.
    granted: Vec<(TransactionID, LockType)>,

    /// Lock requests waiting for conflicting locks to be released.
    waiting: VecDeque<Waiter>,

    /// The ticket that the next [`Waiter`] will be assigned.
    next_ticket: u64,
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    waker: Waker,
}

/// [`LockRequest`] resolves when the lock is granted.
///
/// Dropping a pending [`LockRequest`] withdraws it from the queue.
#[derive(Debug)]
struct LockRequest<'l> {
    lock_table: &'l LockTable,
    transaction: TransactionID,
    node: NodeID,
    lock_type: LockType,

    /// Promotions and escalations jump the queue.
    urgent: bool,

    /// Set while the request is queued.
    ticket: Option<u64>,
}

impl LockTable {
    /// Creates a new [`LockTable`] for the [`Hierarchy`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::{Hierarchy, LockTable};
    /// use std::sync::Arc;
    ///
    /// let mut hierarchy = Hierarchy::new();
    /// let database = hierarchy.add_root("database");
    /// let lock_table = LockTable::new(Arc::new(hierarchy));
    /// assert!(lock_table.locks(1).is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new(hierarchy: Arc<Hierarchy>) -> LockTable {
        LockTable {
            hierarchy,
            resources: HashMap::default(),
            telemetry: Telemetry::default(),
        }
    }

    /// Returns a reference to the [`Hierarchy`].
    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Returns a reference to the [`Telemetry`].
    #[inline]
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Returns all the locks held by the transaction ordered by [`NodeID`].
    #[inline]
    #[must_use]
    pub fn locks(&self, transaction: TransactionID) -> Vec<(NodeID, LockType)> {
        let mut locks = Vec::new();
        self.resources.scan(|node, resource| {
            let lock_type = resource.lock_of(transaction);
            if lock_type != LockType::NoLock {
                locks.push((*node, lock_type));
            }
        });
        locks.sort_unstable_by_key(|(node, _)| *node);
        locks
    }

    /// Returns the number of lock requests waiting on the resource.
    #[inline]
    #[must_use]
    pub fn num_waiting(&self, node: NodeID) -> usize {
        self.resources
            .read(&node, |_, resource| resource.waiting.len())
            .unwrap_or(0)
    }

    /// Releases the lock held on the resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLockHeld`] if the transaction holds no lock on the resource, or
    /// [`Error::InvalidLock`] if it still holds locks on descendants of the resource.
    #[inline]
    pub fn release(&self, transaction: TransactionID, node: NodeID) -> Result<(), Error> {
        self.check_node(node)?;
        if self.explicit_lock(transaction, node) == LockType::NoLock {
            return Err(Error::NoLockHeld);
        }
        if self
            .locks(transaction)
            .iter()
            .any(|(n, _)| self.hierarchy.is_descendant(*n, node))
        {
            return Err(Error::InvalidLock);
        }
        self.revoke(transaction, node);
        self.telemetry.record_releases(1);
        debug!(transaction, node = %self.hierarchy.path(node), "released");
        Ok(())
    }

    /// Releases every lock held by the transaction, and returns the number of released locks.
    ///
    /// This is supposed to be called when the transaction is committed or rolled back.
    #[inline]
    pub fn release_all(&self, transaction: TransactionID) -> usize {
        let locks = self.locks(transaction);
        for (node, _) in &locks {
            self.revoke(transaction, *node);
        }
        self.telemetry.record_releases(locks.len());
        debug!(transaction, released = locks.len(), "released all");
        locks.len()
    }

    fn check_node(&self, node: NodeID) -> Result<(), Error> {
        if self.hierarchy.contains(node) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Removes the lock without any checks, and wakes up the first waiting request.
    fn revoke(&self, transaction: TransactionID, node: NodeID) {
        if let Some(Some(waker)) = self
            .resources
            .update(&node, |_, resource| resource.revoke(transaction))
        {
            waker.wake();
        }
    }

    async fn explicit_lock_async(&self, transaction: TransactionID, node: NodeID) -> LockType {
        self.resources
            .read_async(&node, |_, resource| resource.lock_of(transaction))
            .await
            .unwrap_or_default()
    }

    /// Checks if the lock held on the parent permits the transaction to hold `lock_type`.
    async fn check_parent(
        &self,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
    ) -> Result<(), Error> {
        let Some(parent) = self.hierarchy.parent(node) else {
            return Ok(());
        };
        if self
            .explicit_lock_async(transaction, parent)
            .await
            .can_be_parent_lock(lock_type)
        {
            Ok(())
        } else {
            Err(Error::InvalidLock)
        }
    }

    async fn has_six_ancestor(&self, transaction: TransactionID, node: NodeID) -> bool {
        for ancestor in self.hierarchy.ancestors(node) {
            if self.explicit_lock_async(transaction, ancestor).await
                == LockType::SharedIntentExclusive
            {
                return true;
            }
        }
        false
    }

    /// Returns the locks held on strict descendants of the resource.
    async fn descendant_locks(
        &self,
        transaction: TransactionID,
        node: NodeID,
    ) -> Vec<(NodeID, LockType)> {
        let mut locks = Vec::new();
        self.resources
            .scan_async(|n, resource| {
                let lock_type = resource.lock_of(transaction);
                if lock_type != LockType::NoLock && self.hierarchy.is_descendant(*n, node) {
                    locks.push((*n, lock_type));
                }
            })
            .await;
        locks.sort_unstable_by_key(|(n, _)| *n);
        locks
    }

    /// Replaces the lock with a less permissive one, and wakes up the first waiting request.
    async fn demote(&self, transaction: TransactionID, node: NodeID, lock_type: LockType) {
        if let Some(Some(waker)) = self
            .resources
            .update_async(&node, |_, resource| {
                resource.grant(transaction, lock_type);
                resource.head_waker()
            })
            .await
        {
            waker.wake();
        }
        debug!(transaction, node = %self.hierarchy.path(node), %lock_type, "demoted");
    }

    /// Releases the given locks, and returns the number of released locks.
    async fn revoke_all(&self, transaction: TransactionID, locks: &[(NodeID, LockType)]) -> usize {
        for (node, _) in locks {
            if let Some(Some(waker)) = self
                .resources
                .update_async(node, |_, resource| resource.revoke(transaction))
                .await
            {
                waker.wake();
            }
        }
        self.telemetry.record_releases(locks.len());
        locks.len()
    }
}

impl ResourceHierarchy for LockTable {
    #[inline]
    fn parent(&self, node: NodeID) -> Option<NodeID> {
        self.hierarchy.parent(node)
    }

    #[inline]
    fn name(&self, node: NodeID) -> Option<&str> {
        self.hierarchy.name(node)
    }

    #[inline]
    fn explicit_lock(&self, transaction: TransactionID, node: NodeID) -> LockType {
        self.resources
            .read(&node, |_, resource| resource.lock_of(transaction))
            .unwrap_or_default()
    }

    #[inline]
    fn effective_lock(&self, transaction: TransactionID, node: NodeID) -> LockType {
        // Read access granted by ancestors flows down to descendants; intent locks do not.
        let inherited = self
            .hierarchy
            .ancestors(node)
            .map(|a| match self.explicit_lock(transaction, a) {
                LockType::Exclusive => LockType::Exclusive,
                LockType::Shared | LockType::SharedIntentExclusive => LockType::Shared,
                _ => LockType::NoLock,
            })
            .fold(LockType::NoLock, LockType::merge);
        self.explicit_lock(transaction, node).merge(inherited)
    }
}

impl LockManager for LockTable {
    async fn acquire(
        &self,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
    ) -> Result<(), Error> {
        self.check_node(node)?;
        if lock_type == LockType::NoLock {
            return Err(Error::InvalidLock);
        }
        if self.explicit_lock_async(transaction, node).await != LockType::NoLock {
            return Err(Error::DuplicateLock);
        }
        self.check_parent(transaction, node, lock_type).await?;
        if matches!(lock_type, LockType::IntentShared | LockType::Shared)
            && self.has_six_ancestor(transaction, node).await
        {
            // Redundant since the ancestor already grants read access.
            return Err(Error::InvalidLock);
        }

        LockRequest::new(self, transaction, node, lock_type, false).await;
        self.telemetry.record_acquisition();
        debug!(transaction, node = %self.hierarchy.path(node), %lock_type, "acquired");
        Ok(())
    }

    async fn promote(
        &self,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
    ) -> Result<(), Error> {
        self.check_node(node)?;
        let held = self.explicit_lock_async(transaction, node).await;
        if held == LockType::NoLock {
            return Err(Error::NoLockHeld);
        }
        if held == lock_type {
            return Err(Error::DuplicateLock);
        }
        if !lock_type.substitutable(held) {
            return Err(Error::InvalidLock);
        }
        self.check_parent(transaction, node, lock_type).await?;
        let six = lock_type == LockType::SharedIntentExclusive;
        if six && self.has_six_ancestor(transaction, node).await {
            return Err(Error::InvalidLock);
        }

        LockRequest::new(self, transaction, node, lock_type, true).await;
        if six {
            // Read access on descendants is now implied by the resource lock.
            let descendants = self.descendant_locks(transaction, node).await;
            let redundant: Vec<(NodeID, LockType)> = descendants
                .iter()
                .filter(|(_, l)| matches!(l, LockType::IntentShared | LockType::Shared))
                .copied()
                .collect();
            self.revoke_all(transaction, &redundant).await;
            for (descendant, _) in descendants
                .iter()
                .filter(|(_, l)| *l == LockType::SharedIntentExclusive)
            {
                self.demote(transaction, *descendant, LockType::IntentExclusive)
                    .await;
            }
        }
        self.telemetry.record_promotion();
        debug!(
            transaction,
            node = %self.hierarchy.path(node),
            from = %held,
            to = %lock_type,
            "promoted"
        );
        Ok(())
    }

    async fn escalate(
        &self,
        transaction: TransactionID,
        node: NodeID,
        at_least: LockType,
    ) -> Result<(), Error> {
        self.check_node(node)?;
        let held = self.explicit_lock_async(transaction, node).await;
        if held == LockType::NoLock {
            return Err(Error::NoLockHeld);
        }
        let descendants = self.descendant_locks(transaction, node).await;
        let write = [held, at_least]
            .into_iter()
            .chain(descendants.iter().map(|(_, l)| *l))
            .any(|l| {
                matches!(
                    l,
                    LockType::IntentExclusive
                        | LockType::SharedIntentExclusive
                        | LockType::Exclusive
                )
            });
        let lock_type = if write {
            LockType::Exclusive
        } else {
            LockType::Shared
        };
        if lock_type == held && descendants.is_empty() {
            return Ok(());
        }

        if lock_type != held {
            self.check_parent(transaction, node, lock_type).await?;
            LockRequest::new(self, transaction, node, lock_type, true).await;
        }
        let released = self.revoke_all(transaction, &descendants).await;
        self.telemetry.record_escalation();
        debug!(
            transaction,
            node = %self.hierarchy.path(node),
            from = %held,
            to = %lock_type,
            released,
            "escalated"
        );
        Ok(())
    }
}

impl Resource {
    fn lock_of(&self, transaction: TransactionID) -> LockType {
        self.granted
            .iter()
            .find_map(|(t, l)| (*t == transaction).then_some(*l))
            .unwrap_or_default()
    }

    /// Checks if the lock is compatible with every lock held by other transactions.
    fn grantable(&self, transaction: TransactionID, lock_type: LockType) -> bool {
        self.granted
            .iter()
            .all(|(t, l)| *t == transaction || l.compatible(lock_type))
    }

    fn grant(&mut self, transaction: TransactionID, lock_type: LockType) {
        if let Some(entry) = self.granted.iter_mut().find(|(t, _)| *t == transaction) {
            entry.1 = lock_type;
        } else {
            self.granted.push((transaction, lock_type));
        }
    }

    /// Removes the lock, and returns the [`Waker`] of the first waiting request.
    fn revoke(&mut self, transaction: TransactionID) -> Option<Waker> {
        let len = self.granted.len();
        self.granted.retain(|(t, _)| *t != transaction);
        if self.granted.len() == len {
            return None;
        }
        self.head_waker()
    }

    fn head_waker(&self) -> Option<Waker> {
        self.waiting.front().map(|w| w.waker.clone())
    }
}

impl<'l> LockRequest<'l> {
    fn new(
        lock_table: &'l LockTable,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
        urgent: bool,
    ) -> LockRequest<'l> {
        LockRequest {
            lock_table,
            transaction,
            node,
            lock_type,
            urgent,
            ticket: None,
        }
    }
}

impl<'l> Future for LockRequest<'l> {
    type Output = ();

    #[inline]
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut entry = this.lock_table.resources.entry(this.node).or_default();
        let resource = entry.get_mut();
        let turn = match this.ticket {
            Some(ticket) => resource.waiting.front().map(|w| w.ticket) == Some(ticket),
            None => this.urgent || resource.waiting.is_empty(),
        };
        if turn && resource.grantable(this.transaction, this.lock_type) {
            if this.ticket.take().is_some() {
                resource.waiting.pop_front();
            }
            resource.grant(this.transaction, this.lock_type);
            let next = resource.head_waker();
            drop(entry);
            if let Some(waker) = next {
                // The next request may be compatible with the granted lock.
                waker.wake();
            }
            return Poll::Ready(());
        }

        if let Some(ticket) = this.ticket {
            if let Some(waiter) = resource.waiting.iter_mut().find(|w| w.ticket == ticket) {
                waiter.waker.clone_from(cx.waker());
            }
        } else {
            let ticket = resource.next_ticket;
            resource.next_ticket += 1;
            let waiter = Waiter {
                ticket,
                waker: cx.waker().clone(),
            };
            if this.urgent {
                resource.waiting.push_front(waiter);
            } else {
                resource.waiting.push_back(waiter);
            }
            this.ticket = Some(ticket);
            drop(entry);
            this.lock_table.telemetry.record_wait();
            trace!(
                transaction = this.transaction,
                node = %this.node,
                lock_type = %this.lock_type,
                "waiting"
            );
        }
        Poll::Pending
    }
}

impl<'l> Drop for LockRequest<'l> {
    #[inline]
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let next = self.lock_table.resources.update(&self.node, |_, resource| {
            let was_head = resource.waiting.front().map(|w| w.ticket) == Some(ticket);
            resource.waiting.retain(|w| w.ticket != ticket);
            if was_head {
                resource.head_waker()
            } else {
                None
            }
        });
        if let Some(Some(waker)) = next {
            waker.wake();
        }
    }
}
