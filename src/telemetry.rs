// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// [`Telemetry`] counts the operations processed by a [`LockTable`](super::LockTable).
#[derive(Debug, Default)]
pub struct Telemetry {
    acquisitions: AtomicU64,
    promotions: AtomicU64,
    escalations: AtomicU64,
    releases: AtomicU64,
    waits: AtomicU64,
}

/// [`Statistics`] is a point-in-time copy of [`Telemetry`] counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    /// The number of granted lock acquisitions.
    pub acquisitions: u64,

    /// The number of granted lock promotions.
    pub promotions: u64,

    /// The number of completed lock escalations.
    pub escalations: u64,

    /// The number of released locks, including locks released by promotions and escalations.
    pub releases: u64,

    /// The number of lock requests that had to wait for other transactions.
    pub waits: u64,
}

impl Telemetry {
    /// Captures the current counter values.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::Telemetry;
    ///
    /// let telemetry = Telemetry::default();
    /// assert_eq!(telemetry.statistics().operations(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            acquisitions: self.acquisitions.load(Relaxed),
            promotions: self.promotions.load(Relaxed),
            escalations: self.escalations.load(Relaxed),
            releases: self.releases.load(Relaxed),
            waits: self.waits.load(Relaxed),
        }
    }

    pub(super) fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Relaxed);
    }

    pub(super) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Relaxed);
    }

    pub(super) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Relaxed);
    }

    pub(super) fn record_releases(&self, count: usize) {
        self.releases.fetch_add(count as u64, Relaxed);
    }

    pub(super) fn record_wait(&self) {
        self.waits.fetch_add(1, Relaxed);
    }
}

impl Statistics {
    /// Returns the number of acquisitions, promotions, and escalations.
    #[inline]
    #[must_use]
    pub fn operations(&self) -> u64 {
        self.acquisitions + self.promotions + self.escalations
    }
}
