// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use crate::LockType::{
    Exclusive, IntentExclusive, IntentShared, NoLock, Shared, SharedIntentExclusive,
};
use crate::{
    ensure_sufficient_lock_held, Hierarchy, LockManager, LockTable, NodeID, ResourceHierarchy,
    Statistics,
};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;
use tokio::sync::Barrier;

/// database > table > record.
fn database() -> (Arc<LockTable>, NodeID, NodeID, NodeID) {
    let mut hierarchy = Hierarchy::new();
    let database = hierarchy.add_root("database");
    let table = hierarchy.add_child(database, "table").unwrap();
    let record = hierarchy.add_child(table, "1").unwrap();
    (
        Arc::new(LockTable::new(Arc::new(hierarchy))),
        database,
        table,
        record,
    )
}

#[tokio::test]
async fn shared_record() {
    let (lock_table, database, table, record) = database();
    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(1), Some(record), Shared)
            .await
            .is_ok()
    );
    assert_eq!(
        lock_table.locks(1),
        vec![(database, IntentShared), (table, IntentShared), (record, Shared)]
    );
    assert_eq!(lock_table.telemetry().statistics().acquisitions, 3);
}

#[tokio::test]
async fn intent_exclusive_then_shared() {
    let (lock_table, database, table, _) = database();
    assert!(lock_table.acquire(1, database, IntentExclusive).await.is_ok());
    assert!(lock_table.acquire(1, table, IntentExclusive).await.is_ok());
    let before = lock_table.telemetry().statistics();

    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(1), Some(table), Shared)
            .await
            .is_ok()
    );
    assert_eq!(
        lock_table.locks(1),
        vec![(database, IntentExclusive), (table, SharedIntentExclusive)]
    );
    let after = lock_table.telemetry().statistics();
    assert_eq!(after.promotions - before.promotions, 1);
    assert_eq!(after.operations() - before.operations(), 1);
}

#[tokio::test]
async fn intent_shared_then_exclusive() {
    let (lock_table, database, table, record) = database();
    assert!(lock_table.acquire(1, database, IntentShared).await.is_ok());
    assert!(lock_table.acquire(1, table, IntentShared).await.is_ok());
    assert!(lock_table.acquire(1, record, Shared).await.is_ok());

    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(1), Some(table), Exclusive)
            .await
            .is_ok()
    );
    assert_eq!(
        lock_table.locks(1),
        vec![(database, IntentExclusive), (table, Exclusive)]
    );
    assert_eq!(lock_table.effective_lock(1, record), Exclusive);
    let statistics = lock_table.telemetry().statistics();
    assert_eq!(statistics.promotions, 1);
    assert_eq!(statistics.escalations, 1);
    assert_eq!(statistics.releases, 1);
}

#[tokio::test]
async fn shared_then_exclusive() {
    let (lock_table, database, table, _) = database();
    assert!(lock_table.acquire(1, database, IntentShared).await.is_ok());
    assert!(lock_table.acquire(1, table, Shared).await.is_ok());

    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(1), Some(table), Exclusive)
            .await
            .is_ok()
    );
    assert_eq!(
        lock_table.locks(1),
        vec![(database, IntentExclusive), (table, Exclusive)]
    );
    let statistics = lock_table.telemetry().statistics();
    assert_eq!(statistics.acquisitions, 2);
    assert_eq!(statistics.promotions, 2);
}

#[tokio::test]
async fn no_lock() {
    let (lock_table, database, table, record) = database();
    for node in [database, table, record] {
        assert!(
            ensure_sufficient_lock_held(&*lock_table, Some(1), Some(node), NoLock)
                .await
                .is_ok()
        );
    }
    assert!(lock_table.acquire(1, database, IntentShared).await.is_ok());
    assert!(lock_table.acquire(1, table, Shared).await.is_ok());
    let before = lock_table.telemetry().statistics();
    for node in [database, table, record] {
        assert!(
            ensure_sufficient_lock_held(&*lock_table, Some(1), Some(node), NoLock)
                .await
                .is_ok()
        );
    }
    assert_eq!(lock_table.telemetry().statistics(), before);
    assert_eq!(before.operations(), 2);
}

#[tokio::test]
async fn idempotence() {
    let (lock_table, _, table, record) = database();
    for (node, requested) in [
        (record, Shared),
        (table, Shared),
        (record, Exclusive),
        (table, Exclusive),
    ] {
        assert!(
            ensure_sufficient_lock_held(&*lock_table, Some(1), Some(node), requested)
                .await
                .is_ok()
        );
        let statistics = lock_table.telemetry().statistics();
        assert!(
            ensure_sufficient_lock_held(&*lock_table, Some(1), Some(node), requested)
                .await
                .is_ok()
        );
        assert_eq!(lock_table.telemetry().statistics(), statistics);
    }
}

#[tokio::test]
async fn transactions_are_independent() {
    let (lock_table, database, table, record) = database();
    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(1), Some(record), Shared)
            .await
            .is_ok()
    );
    assert!(
        ensure_sufficient_lock_held(&*lock_table, Some(2), Some(table), Shared)
            .await
            .is_ok()
    );
    assert_eq!(lock_table.explicit_lock(1, table), IntentShared);
    assert_eq!(lock_table.explicit_lock(2, table), Shared);
    assert_eq!(lock_table.explicit_lock(2, database), IntentShared);
    assert_eq!(lock_table.effective_lock(2, record), Shared);
    assert_eq!(lock_table.effective_lock(1, record), Shared);
    assert_eq!(lock_table.release_all(1), 3);
    assert_eq!(lock_table.release_all(2), 2);
    assert_eq!(
        lock_table.telemetry().statistics(),
        Statistics {
            acquisitions: 5,
            releases: 5,
            ..Statistics::default()
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 16)]
async fn readers_and_writers() {
    let num_tables = 2;
    let num_records = 4;
    let num_tasks = 16;
    let mut hierarchy = Hierarchy::new();
    let database = hierarchy.add_root("database");
    let mut tables = Vec::with_capacity(num_tables);
    for t in 0..num_tables {
        let table = hierarchy.add_child(database, format!("table{t}")).unwrap();
        let records: Vec<NodeID> = (0..num_records)
            .map(|r| hierarchy.add_child(table, r.to_string()).unwrap())
            .collect();
        tables.push((table, records));
    }
    let lock_table = Arc::new(LockTable::new(Arc::new(hierarchy)));
    let tables = Arc::new(tables);

    // Writers announce themselves in the counter of the record while holding the lock.
    let writers: Arc<Vec<AtomicUsize>> =
        Arc::new((0..num_tables * num_records).map(|_| AtomicUsize::new(0)).collect());
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut task_handles = Vec::with_capacity(num_tasks);
    for task in 0..num_tasks {
        let lock_table = lock_table.clone();
        let tables = tables.clone();
        let writers = writers.clone();
        let barrier = barrier.clone();
        task_handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for round in 0..16 {
                let transaction = task * 1024 + round + 1;
                let t = (task + round) % num_tables;
                let r = (task * 7 + round) % num_records;
                let (table, records) = &tables[t];
                if (task + round) % 3 == 0 {
                    // Read the whole table.
                    assert!(ensure_sufficient_lock_held(
                        &*lock_table,
                        Some(transaction),
                        Some(*table),
                        Shared
                    )
                    .await
                    .is_ok());
                    for i in 0..num_records {
                        assert_eq!(writers[t * num_records + i].load(Acquire), 0);
                    }
                } else {
                    assert!(ensure_sufficient_lock_held(
                        &*lock_table,
                        Some(transaction),
                        Some(records[r]),
                        Exclusive
                    )
                    .await
                    .is_ok());
                    let counter = &writers[t * num_records + r];
                    assert_eq!(counter.fetch_add(1, Release), 0);
                    tokio::task::yield_now().await;
                    assert_eq!(counter.fetch_sub(1, Release), 1);
                }
                assert!(lock_table.release_all(transaction) > 0);
            }
        }));
    }
    for r in futures::future::join_all(task_handles).await {
        assert!(r.is_ok());
    }
    assert_eq!(lock_table.num_waiting(database), 0);
    let statistics = lock_table.telemetry().statistics();
    assert_eq!(statistics.releases, statistics.acquisitions);
}
