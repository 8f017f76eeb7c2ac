//! Concurrency tests for the shared connection pool
//!
//! Many threads racing on first use must end up sharing one pool.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use kvspace::{
    ConnectionManager, CrudEngine, ManagerState, MemoryPoolFactory, MemoryStore, StoreConfig,
    Value,
};

const THREADS: usize = 16;

fn slow_manager() -> Arc<ConnectionManager<Arc<MemoryPoolFactory>>> {
    let factory = MemoryPoolFactory::new(MemoryStore::new())
        .with_creation_delay(Duration::from_millis(50));
    Arc::new(ConnectionManager::new(
        Arc::new(factory),
        StoreConfig::default(),
    ))
}

#[test]
fn test_concurrent_first_use_creates_one_pool() {
    let manager = slow_manager();
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let engine = CrudEngine::new(manager.as_ref(), format!("worker-{}", i))
                    .expect("handle should be acquired");
                assert!(engine.create("id", i as i64, None));
                engine.read("id", true)
            })
        })
        .collect();

    for (i, worker) in workers.into_iter().enumerate() {
        let value = worker.join().expect("worker panicked");
        assert_eq!(value, Some(Value::Integer(i as i64)));
    }

    assert_eq!(manager.factory().pools_created(), 1);
    assert_eq!(manager.state(), ManagerState::Active);
}

#[test]
fn test_engines_share_writes_through_one_pool() {
    let manager = slow_manager();

    let writer = CrudEngine::new(manager.as_ref(), "shared").unwrap();
    let reader = CrudEngine::new(manager.as_ref(), "shared").unwrap();

    assert!(writer.create("greeting", "hello", None));
    assert_eq!(reader.read("greeting", true), Some(Value::from("hello")));
    assert_eq!(manager.factory().pools_created(), 1);
}

#[test]
fn test_shutdown_under_concurrent_use_recreates_lazily() {
    let manager = slow_manager();
    CrudEngine::new(manager.as_ref(), "warmup").unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..10 {
                    manager.shutdown();
                    // Either a fresh pool or the failure value; never a panic
                    if let Ok(engine) = CrudEngine::new(manager.as_ref(), "churn") {
                        let _ = engine.exists("k");
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    manager.shutdown();
    assert_eq!(manager.state(), ManagerState::Uninitialized);
    assert!(manager.factory().pools_created() >= 2);
}
