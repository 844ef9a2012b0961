// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs, clippy::all)]

//! Multigranularity lock acquisition over a hierarchy of database resources.

mod error;
pub use error::Error;

mod hierarchy;
pub use hierarchy::{Hierarchy, NodeID};

mod lock_manager;
pub use lock_manager::{LockManager, ResourceHierarchy, TransactionID};

mod lock_table;
pub use lock_table::LockTable;

mod lock_type;
pub use lock_type::LockType;

mod policy;
pub use policy::ensure_sufficient_lock_held;

mod telemetry;
pub use telemetry::{Statistics, Telemetry};
