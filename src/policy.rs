// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Declarative multigranularity lock acquisition.

use super::{Error, LockManager, LockType, NodeID, ResourceHierarchy, TransactionID};
use tracing::debug;

/// Makes sure that the transaction can perform actions requiring `requested` on the resource.
///
/// The least permissive set of locks is acquired, promoted, or escalated: locks on ancestors are
/// first adjusted from the root down to the parent of the resource so that they permit the lock
/// on the resource, and then a single operation is performed on the resource itself. Nothing is
/// done if the transaction is entitled to `requested` already, or if either `transaction` or
/// `node` is `None`.
///
/// The returned future does not resolve while the necessary locks conflict with locks held by
/// other transactions.
///
/// # Errors
///
/// Returns [`Error::WrongParameter`] if `requested` is none of [`LockType::NoLock`],
/// [`LockType::Shared`], and [`LockType::Exclusive`]. Errors of the [`LockManager`] are
/// propagated as they are, and locks granted before the failure stay granted.
///
/// # Examples
///
/// ```
/// use sap_mgl::{ensure_sufficient_lock_held, Hierarchy, LockTable, LockType, ResourceHierarchy};
/// use std::sync::Arc;
///
/// let mut hierarchy = Hierarchy::new();
/// let database = hierarchy.add_root("database");
/// let table = hierarchy.add_child(database, "table").unwrap();
/// let lock_table = LockTable::new(Arc::new(hierarchy));
/// async {
///     let shared = LockType::Shared;
///     let result = ensure_sufficient_lock_held(&lock_table, Some(1), Some(table), shared);
///     assert!(result.await.is_ok());
///     assert_eq!(lock_table.explicit_lock(1, database), LockType::IntentShared);
///     assert_eq!(lock_table.explicit_lock(1, table), LockType::Shared);
/// };
/// ```
pub async fn ensure_sufficient_lock_held<C: ResourceHierarchy + LockManager>(
    context: &C,
    transaction: Option<TransactionID>,
    node: Option<NodeID>,
    requested: LockType,
) -> Result<(), Error> {
    if !matches!(
        requested,
        LockType::NoLock | LockType::Shared | LockType::Exclusive
    ) {
        return Err(Error::WrongParameter);
    }
    let (Some(transaction), Some(node)) = (transaction, node) else {
        return Ok(());
    };

    let effective = context.effective_lock(transaction, node);
    if effective.substitutable(requested) {
        return Ok(());
    }

    if effective == LockType::IntentExclusive && requested == LockType::Shared {
        // Ancestors holding IX already permit SIX.
        let lock_type = effective.merge(requested);
        debug!(
            transaction,
            node = context.name(node).unwrap_or_default(),
            %effective,
            %lock_type,
            "promoting intent lock"
        );
        context.promote(transaction, node, lock_type).await
    } else if effective.is_intent() {
        debug!(
            transaction,
            node = context.name(node).unwrap_or_default(),
            %effective,
            %requested,
            "escalating"
        );
        fix_ancestors(context, transaction, node, requested).await?;
        context.escalate(transaction, node, requested).await
    } else {
        fix_ancestors(context, transaction, node, requested).await?;
        let explicit = context.explicit_lock(transaction, node);
        debug!(
            transaction,
            node = context.name(node).unwrap_or_default(),
            %explicit,
            %requested,
            "locking"
        );
        if explicit == LockType::NoLock {
            context.acquire(transaction, node, requested).await
        } else {
            context.promote(transaction, node, requested).await
        }
    }
}

/// Makes every ancestor of the resource permit `requested` on the resource.
///
/// Ancestors are visited from the root, so that each ancestor is adjusted only after its own
/// ancestors permit the adjustment.
async fn fix_ancestors<C: ResourceHierarchy + LockManager>(
    context: &C,
    transaction: TransactionID,
    node: NodeID,
    requested: LockType,
) -> Result<(), Error> {
    let mut ancestors = Vec::new();
    let mut current = context.parent(node);
    while let Some(ancestor) = current {
        ancestors.push(ancestor);
        current = context.parent(ancestor);
    }

    let required = requested.parent_lock();
    for ancestor in ancestors.into_iter().rev() {
        let held = context.explicit_lock(transaction, ancestor);
        if held == LockType::NoLock {
            debug!(
                transaction,
                node = context.name(ancestor).unwrap_or_default(),
                %required,
                "acquiring ancestor lock"
            );
            context.acquire(transaction, ancestor, required).await?;
        } else if !held.can_be_parent_lock(requested) {
            // S and IX collapse into SIX.
            let lock_type = held.merge(required);
            debug!(
                transaction,
                node = context.name(ancestor).unwrap_or_default(),
                %held,
                %lock_type,
                "promoting ancestor lock"
            );
            context.promote(transaction, ancestor, lock_type).await?;
        }
    }
    Ok(())
}
