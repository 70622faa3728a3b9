//! Test Utilities for the Skip List Test Suite
//!
//! A fixture owning one list plus structural assertions that walk node
//! views taken from a single snapshot.

#![allow(dead_code)]

use mvrlu::{Address, MvrluConfig, ThreadHandle};
use mvrlu_skiplist::{Node, NodeView, SkipList, HEAD_KEY, TAIL_KEY};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maximum test duration before a hang is assumed
pub const TEST_TIMEOUT: Duration = Duration::from_secs(60);

/// ============================================================================
/// LIST FIXTURE
/// ============================================================================

pub struct ListFixture {
    pub list: Arc<SkipList>,
}

impl ListFixture {
    /// Create fixture with a retry budget large enough for heavy contention
    ///
    /// **Bug this finds:** Initialization failures of the sentinels
    pub fn with_defaults() -> Self {
        Self::with_config(MvrluConfig {
            max_threads: 16,
            log_capacity: 512,
            max_retries: 1_000_000,
            ..Default::default()
        })
    }

    pub fn with_config(config: MvrluConfig) -> Self {
        let list = SkipList::new(config).expect("list initialization should succeed");
        Self {
            list: Arc::new(list),
        }
    }

    pub fn thread(&self) -> ThreadHandle<Node> {
        self.list
            .register()
            .unwrap_or_else(|e| panic!("thread registration failed: {:?}", e))
    }

    pub fn insert_all(&self, thread: &mut ThreadHandle<Node>, keys: impl IntoIterator<Item = i64>) {
        for key in keys {
            self.list
                .insert(thread, key)
                .unwrap_or_else(|e| panic!("insert {} failed: {:?}", key, e));
        }
    }
}

/// ============================================================================
/// STRUCTURAL ASSERTIONS
/// ============================================================================

/// Keys linked at `level`, walking the views from the head
///
/// Panics if a link names a node missing from level 0 of the same snapshot.
#[track_caller]
pub fn level_keys(views: &[NodeView], level: usize) -> Vec<i64> {
    let by_address: HashMap<Address, &NodeView> = views.iter().map(|v| (v.address, v)).collect();
    let head = views
        .first()
        .filter(|v| v.key == HEAD_KEY)
        .expect("views start at the head");

    let mut keys = Vec::new();
    let mut cursor = head.next[level];
    loop {
        let view = by_address
            .get(&cursor)
            .unwrap_or_else(|| panic!("level {} links {} which level 0 does not reach", level, cursor));
        if view.key == TAIL_KEY {
            break;
        }
        keys.push(view.key);
        cursor = view.next[level];
    }
    keys
}

/// Assert sorted levels, each a subset of the level below
///
/// **Bug this finds:** Half-spliced nodes, unlinked upper levels
/// **Tolerance:** ZERO
#[track_caller]
pub fn assert_well_formed(views: &[NodeView], context: &str) {
    for view in views {
        assert_eq!(
            view.next.len(),
            view.height,
            "{}: node {} lists {} links for height {}",
            context,
            view.key,
            view.next.len(),
            view.height
        );
    }

    let mut below = level_keys(views, 0);
    assert!(
        below.windows(2).all(|w| w[0] < w[1]),
        "{}: level 0 out of order: {:?}",
        context,
        below
    );

    for level in 1..mvrlu_skiplist::MAX_HEIGHT {
        let keys = level_keys(views, level);
        assert!(
            keys.iter().all(|k| below.contains(k)),
            "{}: level {} has keys {:?} missing below",
            context,
            level,
            keys
        );
        for key in &keys {
            let view = views.iter().find(|v| v.key == *key).expect("key present");
            assert!(
                view.height > level,
                "{}: node {} of height {} linked at level {}",
                context,
                key,
                view.height,
                level
            );
        }
        below = keys;
    }
}

/// Assert that operation completed within timeout
///
/// **Bug this finds:** Livelock between writers that keep conflicting
#[track_caller]
pub fn assert_completed_within_timeout<F, R>(operation: F, timeout: Duration, context: &str) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = operation();
    let elapsed = start.elapsed();

    assert!(
        elapsed < timeout,
        "{}: operation took {:?}, exceeded timeout of {:?} - possible livelock",
        context,
        elapsed,
        timeout
    );

    result
}
