mod support;

use std::time::Duration;

use connpool::{Client, PoolConfig};
use support::MockBackend;

/// S3 — transaction commits on drop.
#[tokio::test]
async fn transaction_commits_on_drop() {
    let (world, info) = support::world("tx-commit-on-drop");
    let pool = Client::<MockBackend>::connect(info, PoolConfig::new().pool_size(1));

    {
        let tx = pool.begin().await.unwrap();
        tx.exec_sql("INSERT x", 0, vec![]).await.unwrap();
    }

    // the actor processes `CommitOnDrop` asynchronously after the handle is
    // gone; give it a moment, then check the recorded wire sequence.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.log(), vec!["BEGIN", "INSERT x", "COMMIT"]);

    // the connection must have been released back to the pool.
    pool.exec_sql("SELECT 1", 0, vec![]).await.unwrap();
}

/// S4 — transaction rollback on error: a failing statement auto-rolls back
/// and every later statement in the same transaction is rejected without
/// reaching the connection.
#[tokio::test]
async fn transaction_rolls_back_on_statement_error() {
    let (world, info) = support::world("tx-rollback-on-error");
    let pool = Client::<MockBackend>::connect(info, PoolConfig::new().pool_size(1));
    world.fail_once("INSERT bad");

    let tx = pool.begin().await.unwrap();
    tx.exec_sql("INSERT ok", 0, vec![]).await.unwrap();

    let bad = tx.exec_sql("INSERT bad", 0, vec![]).await;
    assert!(bad.is_err());

    let never = tx.exec_sql("INSERT never", 0, vec![]).await;
    assert!(never.unwrap_err().to_string().contains("rolled back"));

    drop(tx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(world.log(), vec!["BEGIN", "INSERT ok", "INSERT bad", "ROLLBACK"]);
}

/// S5 — rollback jumps the queue: statements submitted after `rollback()`
/// is called never reach the wire.
#[tokio::test]
async fn rollback_jumps_the_queue() {
    let (world, info) = support::world("tx-rollback-jumps-queue");
    let pool = Client::<MockBackend>::connect(info, PoolConfig::new().pool_size(1));

    let tx = pool.begin().await.unwrap();

    let q1 = tx.exec_sql("Q1", 0, vec![]);
    let q2 = tx.exec_sql("Q2", 0, vec![]);
    let q3 = tx.exec_sql("Q3", 0, vec![]);
    let rollback = tx.rollback();

    let (r1, r2, r3, rb) = tokio::join!(q1, q2, q3, rollback);
    r1.unwrap();
    assert!(r2.unwrap_err().to_string().contains("rolled back"));
    assert!(r3.unwrap_err().to_string().contains("rolled back"));
    rb.unwrap();

    assert_eq!(world.log(), vec!["BEGIN", "Q1", "ROLLBACK"]);
}

/// `begin_nested` shares the same connection and the same eventual outcome.
#[tokio::test]
async fn begin_nested_shares_the_same_session() {
    let (world, info) = support::world("tx-nested");
    let pool = Client::<MockBackend>::connect(info, PoolConfig::new().pool_size(1));

    let tx = pool.begin().await.unwrap();
    let nested = tx.begin_nested();

    tx.exec_sql("A", 0, vec![]).await.unwrap();
    nested.exec_sql("B", 0, vec![]).await.unwrap();

    drop(tx);
    drop(nested);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(world.log(), vec!["BEGIN", "A", "B", "COMMIT"]);
}

/// Dropping one handle must not commit while a sibling clone from
/// `begin_nested` is still outstanding — the pair shares one lifetime,
/// so only the *last* drop may trigger the commit.
#[tokio::test]
async fn begin_nested_outlives_the_handle_it_was_cloned_from() {
    let (world, info) = support::world("tx-nested-outlives-parent");
    let pool = Client::<MockBackend>::connect(info, PoolConfig::new().pool_size(1));

    let tx = pool.begin().await.unwrap();
    let nested = tx.begin_nested();

    drop(tx);
    // give the actor a chance to run ahead if it (incorrectly) queued a
    // commit already; the statement below must still land before COMMIT.
    tokio::time::sleep(Duration::from_millis(50)).await;
    nested.exec_sql("B", 0, vec![]).await.unwrap();

    drop(nested);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(world.log(), vec!["BEGIN", "B", "COMMIT"]);
}
