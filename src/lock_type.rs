// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// [`LockType`] is the access mode of a lock held by a transaction on a resource.
///
/// Lock types do not form a total order; they are related to each other through
/// [`LockType::substitutable`], [`LockType::compatible`], and [`LockType::can_be_parent_lock`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum LockType {
    /// No lock.
    #[default]
    NoLock,

    /// Intent to acquire shared locks on descendants.
    IntentShared,

    /// Intent to acquire exclusive locks on descendants.
    IntentExclusive,

    /// Read access to the resource and all its descendants.
    Shared,

    /// Read access to the resource and all its descendants, with the intent to acquire exclusive
    /// locks on descendants.
    SharedIntentExclusive,

    /// Read and write access to the resource and all its descendants.
    Exclusive,
}

impl LockType {
    /// All the lock types.
    pub const ALL: [LockType; 6] = [
        LockType::NoLock,
        LockType::IntentShared,
        LockType::IntentExclusive,
        LockType::Shared,
        LockType::SharedIntentExclusive,
        LockType::Exclusive,
    ];

    /// Returns `true` if two different transactions can hold `self` and `other` on the same
    /// resource at the same time.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::LockType;
    ///
    /// assert!(LockType::IntentShared.compatible(LockType::IntentExclusive));
    /// assert!(!LockType::Shared.compatible(LockType::IntentExclusive));
    /// ```
    #[inline]
    #[must_use]
    pub const fn compatible(self, other: LockType) -> bool {
        use LockType::{
            Exclusive, IntentExclusive, IntentShared, NoLock, Shared, SharedIntentExclusive,
        };
        match (self, other) {
            (NoLock, _) | (_, NoLock) => true,
            (Exclusive, _) | (_, Exclusive) => false,
            (IntentShared, _) | (_, IntentShared) => true,
            (IntentExclusive, IntentExclusive) | (Shared, Shared) => true,
            _ => false,
        }
    }

    /// Returns `true` if a transaction holding `self` already has every permission that
    /// `requested` would grant.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::LockType;
    ///
    /// assert!(LockType::SharedIntentExclusive.substitutable(LockType::Shared));
    /// assert!(!LockType::IntentExclusive.substitutable(LockType::Shared));
    /// ```
    #[inline]
    #[must_use]
    pub const fn substitutable(self, requested: LockType) -> bool {
        use LockType::{
            Exclusive, IntentExclusive, IntentShared, NoLock, Shared, SharedIntentExclusive,
        };
        match (self, requested) {
            (_, NoLock) | (Exclusive, _) => true,
            (SharedIntentExclusive, IntentShared | IntentExclusive | Shared) => true,
            (IntentExclusive | Shared, IntentShared) => true,
            (IntentShared, IntentShared)
            | (IntentExclusive, IntentExclusive)
            | (Shared, Shared)
            | (SharedIntentExclusive, SharedIntentExclusive) => true,
            _ => false,
        }
    }

    /// Returns `true` if the lock only signals the existence of finer-grained locks on
    /// descendants.
    ///
    /// [`LockType::SharedIntentExclusive`] is an intent lock that also grants read access to the
    /// resource.
    #[inline]
    #[must_use]
    pub const fn is_intent(self) -> bool {
        matches!(
            self,
            LockType::IntentShared | LockType::IntentExclusive | LockType::SharedIntentExclusive
        )
    }

    /// Returns the least permissive lock that every ancestor must hold in order for a descendant
    /// to hold `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::LockType;
    ///
    /// assert_eq!(LockType::Shared.parent_lock(), LockType::IntentShared);
    /// assert_eq!(LockType::Exclusive.parent_lock(), LockType::IntentExclusive);
    /// assert_eq!(LockType::NoLock.parent_lock(), LockType::NoLock);
    /// ```
    #[inline]
    #[must_use]
    pub const fn parent_lock(self) -> LockType {
        match self {
            LockType::NoLock => LockType::NoLock,
            LockType::IntentShared | LockType::Shared => LockType::IntentShared,
            LockType::IntentExclusive | LockType::SharedIntentExclusive | LockType::Exclusive => {
                LockType::IntentExclusive
            }
        }
    }

    /// Returns `true` if an ancestor holding `self` permits a descendant to hold `child`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::LockType;
    ///
    /// assert!(LockType::IntentShared.can_be_parent_lock(LockType::Shared));
    /// assert!(!LockType::IntentShared.can_be_parent_lock(LockType::Exclusive));
    /// assert!(!LockType::SharedIntentExclusive.can_be_parent_lock(LockType::Shared));
    /// ```
    #[inline]
    #[must_use]
    pub const fn can_be_parent_lock(self, child: LockType) -> bool {
        use LockType::{
            Exclusive, IntentExclusive, IntentShared, NoLock, Shared, SharedIntentExclusive,
        };
        match (self, child) {
            (_, NoLock) | (IntentExclusive, _) => true,
            (IntentShared, IntentShared | Shared) => true,
            (SharedIntentExclusive, IntentExclusive | Exclusive) => true,
            _ => false,
        }
    }

    /// Returns the least permissive lock that is substitutable for both `self` and `other`.
    ///
    /// [`LockType::Shared`] and [`LockType::IntentExclusive`] are the only pair where neither
    /// substitutes the other, and they collapse into [`LockType::SharedIntentExclusive`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::LockType;
    ///
    /// assert_eq!(
    ///     LockType::Shared.merge(LockType::IntentExclusive),
    ///     LockType::SharedIntentExclusive
    /// );
    /// assert_eq!(LockType::IntentShared.merge(LockType::Exclusive), LockType::Exclusive);
    /// ```
    #[inline]
    #[must_use]
    pub const fn merge(self, other: LockType) -> LockType {
        if self.substitutable(other) {
            self
        } else if other.substitutable(self) {
            other
        } else {
            LockType::SharedIntentExclusive
        }
    }
}

impl fmt::Display for LockType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abbreviation = match self {
            LockType::NoLock => "NL",
            LockType::IntentShared => "IS",
            LockType::IntentExclusive => "IX",
            LockType::Shared => "S",
            LockType::SharedIntentExclusive => "SIX",
            LockType::Exclusive => "X",
        };
        f.write_str(abbreviation)
    }
}
