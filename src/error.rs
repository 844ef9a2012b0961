// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// [`Error`] defines all the error codes used by the locking system.
///
/// Apart from [`Error::WrongParameter`], every error code indicates that a lock request would
/// have violated the multigranularity locking protocol; the lock policy never triggers them as
/// long as the lock manager behaves correctly, therefore callers should treat them as fatal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The transaction already holds the lock.
    DuplicateLock,

    /// A child resource of the same name already exists.
    DuplicateName,

    /// The lock request is not permitted in the current state of the transaction.
    InvalidLock,

    /// The transaction holds no lock on the resource.
    NoLockHeld,

    /// The resource could not be found in the hierarchy.
    NotFound,

    /// The supplied parameter value is wrong.
    WrongParameter,
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Error::DuplicateLock => "lock already held",
            Error::DuplicateName => "resource name already in use",
            Error::InvalidLock => "lock request violates the locking protocol",
            Error::NoLockHeld => "no lock held",
            Error::NotFound => "resource not found",
            Error::WrongParameter => "wrong parameter",
        };
        f.write_str(message)
    }
}

impl std::error::Error for Error {}
