// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Interfaces between the lock policy and the components that own lock state.

use super::{Error, LockType, NodeID};
use std::future::Future;

/// The type of transaction identifiers.
///
/// A transaction identifier is always passed explicitly; there is no notion of the current
/// transaction of a thread or task.
pub type TransactionID = usize;

/// [`ResourceHierarchy`] is a read-only view of resources and the locks held on them.
pub trait ResourceHierarchy {
    /// Returns the parent of the resource.
    fn parent(&self, node: NodeID) -> Option<NodeID>;

    /// Returns the name of the resource.
    fn name(&self, node: NodeID) -> Option<&str>;

    /// Returns the lock that the transaction directly holds on the resource.
    fn explicit_lock(&self, transaction: TransactionID, node: NodeID) -> LockType;

    /// Returns the lock that the transaction is entitled to exercise on the resource, taking
    /// locks held on ancestors into account.
    fn effective_lock(&self, transaction: TransactionID, node: NodeID) -> LockType;
}

/// [`LockManager`] grants, strengthens, and collapses locks.
///
/// Each operation is atomic with respect to other transactions, and the returned future does
/// not resolve while the request conflicts with locks held by other transactions.
pub trait LockManager {
    /// Acquires a new lock on the resource.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the transaction already holds a lock on the resource, or the lock
    /// is not permitted by the locks held on its ancestors.
    fn acquire(
        &self,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Replaces the lock held on the resource with a more permissive one.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if no lock is held, or the new lock is not substitutable for the held
    /// one.
    fn promote(
        &self,
        transaction: TransactionID,
        node: NodeID,
        lock_type: LockType,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Collapses all the locks held on the resource and its descendants into a single lock on
    /// the resource that is at least as permissive as `at_least`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if no lock is held on the resource.
    fn escalate(
        &self,
        transaction: TransactionID,
        node: NodeID,
        at_least: LockType,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}
