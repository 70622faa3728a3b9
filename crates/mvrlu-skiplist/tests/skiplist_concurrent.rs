//! Skip List Concurrency Tests - Racing Writers
//!
//! These tests run inserters and removers on interleaved key ranges so
//! that every splice races with its neighbours:
//! - No insert or removal is lost
//! - Adjacent splices never cut each other out of the list
//! - Readers always see a sorted, well-formed structure

mod common;

use common::{assert_completed_within_timeout, assert_well_formed, ListFixture, TEST_TIMEOUT};
use mvrlu_skiplist::{KeyDistribution, Zipf};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

/// Interleaved inserts then removals of every third key
///
/// **Bug this finds:** Lost splices when neighbouring keys change together
/// **Invariant verified:** Final contents equal the sequential result
#[test]
fn test_interleaved_insert_remove() {
    const THREADS: i64 = 4;
    const KEYS: i64 = 400;

    let fixture = ListFixture::with_defaults();
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let workers: Vec<_> = (0..THREADS)
        .map(|id| {
            let list = Arc::clone(&fixture.list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut handle = list.register().expect("register worker");
                barrier.wait();
                let mine: Vec<i64> = (1..=KEYS).filter(|k| k % THREADS == id).collect();
                for &key in &mine {
                    assert!(list.insert(&mut handle, key).expect("insert should commit"));
                }
                for &key in mine.iter().filter(|k| *k % 3 == 0) {
                    assert!(list.remove(&mut handle, key).expect("remove should commit"));
                }
            })
        })
        .collect();

    assert_completed_within_timeout(
        || {
            for worker in workers {
                worker.join().expect("worker should not panic");
            }
        },
        TEST_TIMEOUT,
        "interleaved writers",
    );

    let handle = fixture.thread();
    let expected: Vec<i64> = (1..=KEYS).filter(|k| k % 3 != 0).collect();
    assert_eq!(fixture.list.keys(&handle), expected);
    assert_eq!(fixture.list.len(&handle), expected.len());
    assert_well_formed(&fixture.list.inspect(&handle), "after interleaved writers");
}

/// Skewed churn on a small key space, audited by concurrent readers
///
/// **Bug this finds:** Insert racing removal of its successor (dangling link)
/// **Invariant verified:** Final contents match the per-key outcome of
/// every successful operation
#[test]
fn test_skewed_churn_with_readers() {
    const WRITERS: usize = 4;
    const OPS: usize = 400;
    const KEY_SPACE: u64 = 64;

    let fixture = ListFixture::with_defaults();
    let zipf = Arc::new(Zipf::new(0.8, KEY_SPACE).unwrap());
    let start = Arc::new(Barrier::new(WRITERS + 2));
    let stop = Arc::new(AtomicBool::new(false));
    // Net effect per key: +1 per successful insert, -1 per successful removal.
    let net = Arc::new(Mutex::new(vec![0i64; KEY_SPACE as usize + 1]));

    let reader = {
        let list = Arc::clone(&fixture.list);
        let start = Arc::clone(&start);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let handle = list.register().expect("register reader");
            start.wait();
            while !stop.load(Ordering::Acquire) {
                let views = list.inspect(&handle);
                assert_well_formed(&views, "during churn");
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|id| {
            let list = Arc::clone(&fixture.list);
            let zipf = Arc::clone(&zipf);
            let start = Arc::clone(&start);
            let net = Arc::clone(&net);
            thread::spawn(move || {
                let mut handle = list.register().expect("register writer");
                let mut rng = StdRng::seed_from_u64(id as u64);
                start.wait();
                for op in 0..OPS {
                    let key = zipf.sample(&mut rng);
                    let changed = if op % 2 == 0 {
                        list.insert(&mut handle, key).expect("insert should commit")
                    } else {
                        list.remove(&mut handle, key).expect("remove should commit")
                    };
                    if changed {
                        let delta = if op % 2 == 0 { 1 } else { -1 };
                        net.lock().expect("net lock")[key as usize] += delta;
                    }
                }
            })
        })
        .collect();

    start.wait();
    assert_completed_within_timeout(
        || {
            for writer in writers {
                writer.join().expect("writer should not panic");
            }
        },
        TEST_TIMEOUT,
        "skewed churn",
    );
    stop.store(true, Ordering::Release);
    reader.join().expect("reader should not panic");

    let net = net.lock().expect("net lock");
    let expected: BTreeSet<i64> = (1..=KEY_SPACE as i64)
        .filter(|&k| {
            let n = net[k as usize];
            assert!(n == 0 || n == 1, "key {} has net count {}", k, n);
            n == 1
        })
        .collect();

    let handle = fixture.thread();
    let actual: BTreeSet<i64> = fixture.list.keys(&handle).into_iter().collect();
    assert_eq!(actual, expected);
}
