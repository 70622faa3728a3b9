//! Versioned Skip List
//!
//! Ordered set of `i64` keys on top of an MV-RLU domain.
//!
//! - Lookups run in one read section and see one snapshot of the whole
//!   list: a node is either linked at all its levels or at none.
//! - `insert` locks every predecessor (copy) and successor (const) of the
//!   new node and splices all levels in one transaction.
//! - `remove` const-locks the victim, locks every predecessor, unsplices
//!   all levels and retires the victim in one transaction.

use crate::node::{Node, NodeView, HEAD_KEY, MAX_HEIGHT, TAIL_KEY};
use mvrlu::{Mvrlu, MvrluConfig, MvrluError, Obj, Result, ThreadHandle, VersionedRead};
use rand::Rng;
use std::sync::Arc;

/// Per-level predecessors and successors of a key
struct Position {
    preds: Vec<Obj<Node>>,
    succs: Vec<Obj<Node>>,
}

/// Concurrent skip list
///
/// # Examples
///
/// ```rust
/// use mvrlu_skiplist::SkipList;
///
/// let list = SkipList::with_defaults().unwrap();
/// let mut thread = list.register().unwrap();
///
/// assert!(list.insert(&mut thread, 42).unwrap());
/// assert!(!list.insert(&mut thread, 42).unwrap());
/// assert!(list.contains(&thread, 42));
/// assert!(list.remove(&mut thread, 42).unwrap());
/// assert!(!list.contains(&thread, 42));
/// ```
pub struct SkipList {
    rlu: Arc<Mvrlu<Node>>,
    head: Obj<Node>,
    tail: Obj<Node>,
}

impl SkipList {
    /// Create an empty list in a new domain
    pub fn new(config: MvrluConfig) -> Result<Self> {
        let rlu = Mvrlu::new(config)?;
        let tail = rlu.alloc(Node::tail())?;
        let head = rlu.alloc(Node::new(HEAD_KEY, vec![Some(tail.clone()); MAX_HEIGHT]))?;
        Ok(Self { rlu, head, tail })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(MvrluConfig::default())
    }

    #[inline]
    pub fn domain(&self) -> &Arc<Mvrlu<Node>> {
        &self.rlu
    }

    /// Register the calling thread with the list's domain
    pub fn register(&self) -> Result<ThreadHandle<Node>> {
        self.rlu.register_thread()
    }

    /// Random height: geometric with p = 0.5, capped at `MAX_HEIGHT`
    pub fn random_height<R: Rng + ?Sized>(rng: &mut R) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_bool(0.5) {
            height += 1;
        }
        height
    }

    fn check_key(key: i64) -> Result<()> {
        if key == HEAD_KEY || key == TAIL_KEY {
            return Err(MvrluError::InvalidArgument(format!(
                "key {} is reserved for a sentinel",
                key
            )));
        }
        Ok(())
    }

    /// Descend from the head, recording the last node before `key` and the
    /// first node at or after it on every level
    fn find<R: VersionedRead<Node>>(&self, reader: &R, key: i64) -> Position {
        let mut preds = Vec::with_capacity(MAX_HEIGHT);
        let mut succs = Vec::with_capacity(MAX_HEIGHT);
        let mut pred = self.head.clone();

        for level in (0..MAX_HEIGHT).rev() {
            let mut curr = reader
                .read(&pred)
                .next(level)
                .cloned()
                .unwrap_or_else(|| self.tail.clone());
            loop {
                let node = reader.read(&curr);
                if node.key >= key {
                    break;
                }
                let next = node.next(level).cloned().unwrap_or_else(|| self.tail.clone());
                pred = curr;
                curr = next;
            }
            preds.push(pred.clone());
            succs.push(curr);
        }

        preds.reverse();
        succs.reverse();
        Position { preds, succs }
    }

    // === Reads ===

    pub fn contains(&self, thread: &ThreadHandle<Node>, key: i64) -> bool {
        if Self::check_key(key).is_err() {
            return false;
        }
        thread.read(|section| {
            let position = self.find(section, key);
            section.read(&position.succs[0]).key == key
        })
    }

    /// Keys in `[lo, hi)`, ascending, from one snapshot
    pub fn range(&self, thread: &ThreadHandle<Node>, lo: i64, hi: i64) -> Vec<i64> {
        let mut keys = Vec::new();
        if lo >= hi {
            return keys;
        }
        thread.read(|section| {
            let start = self.find(section, lo.max(HEAD_KEY + 1));
            let mut curr = start.succs[0].clone();
            loop {
                let node = section.read(&curr);
                if node.key >= hi || node.key == TAIL_KEY {
                    break;
                }
                keys.push(node.key);
                match node.next(0) {
                    Some(next) => curr = next.clone(),
                    None => break,
                }
            }
        });
        keys
    }

    /// All keys, ascending, from one snapshot
    pub fn keys(&self, thread: &ThreadHandle<Node>) -> Vec<i64> {
        self.range(thread, HEAD_KEY + 1, TAIL_KEY)
    }

    pub fn len(&self, thread: &ThreadHandle<Node>) -> usize {
        self.keys(thread).len()
    }

    pub fn is_empty(&self, thread: &ThreadHandle<Node>) -> bool {
        thread.read(|section| {
            let head = section.read(&self.head);
            head.next(0).map_or(true, |first| first.ptr_eq(&self.tail))
        })
    }

    /// Views of every node in level-0 order, sentinels included
    pub fn inspect(&self, thread: &ThreadHandle<Node>) -> Vec<NodeView> {
        thread.read(|section| {
            let mut views = Vec::new();
            let mut curr = Some(self.head.clone());
            while let Some(obj) = curr {
                let node = section.read(&obj);
                views.push(NodeView::of(&obj, node));
                curr = node.next(0).cloned();
            }
            views
        })
    }

    /// One line per non-empty level, top level first
    pub fn render(&self, thread: &ThreadHandle<Node>) -> String {
        thread.read(|section| {
            let mut out = String::new();
            for level in (0..MAX_HEIGHT).rev() {
                let first = section.read(&self.head).next(level).cloned();
                if first.as_ref().map_or(true, |f| f.ptr_eq(&self.tail)) && level > 0 {
                    continue;
                }
                out.push_str(&format!("L{:<2} head", level));
                let mut curr = first;
                while let Some(obj) = curr {
                    let node = section.read(&obj);
                    if node.key == TAIL_KEY {
                        out.push_str(" -> tail");
                        break;
                    }
                    out.push_str(&format!(" -> {}", node.key));
                    curr = node.next(level).cloned();
                }
                out.push('\n');
            }
            out
        })
    }

    // === Writes ===

    /// Insert `key` at a random height; `false` if already present
    pub fn insert(&self, thread: &mut ThreadHandle<Node>, key: i64) -> Result<bool> {
        let height = Self::random_height(&mut rand::thread_rng());
        self.insert_with_height(thread, key, height)
    }

    /// Insert `key` linked at levels `0..height`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for sentinel keys or a height outside `1..=MAX_HEIGHT`
    /// - `Contention` / `ResourceExhausted` from the transaction
    pub fn insert_with_height(
        &self,
        thread: &mut ThreadHandle<Node>,
        key: i64,
        height: usize,
    ) -> Result<bool> {
        Self::check_key(key)?;
        if height == 0 || height > MAX_HEIGHT {
            return Err(MvrluError::InvalidArgument(format!(
                "height {} outside 1..={}",
                height, MAX_HEIGHT
            )));
        }

        thread.write(|txn| {
            let Position { preds, succs } = self.find(&*txn, key);
            if txn.read(&succs[0]).key == key {
                return Ok(false);
            }

            for level in 0..height {
                let pred = txn.try_lock(&preds[level])?;
                if !pred.next(level).is_some_and(|n| n.ptr_eq(&succs[level])) {
                    return Err(MvrluError::LockConflict {
                        address: preds[level].address(),
                    });
                }
                if !succs[level].ptr_eq(&self.tail) {
                    txn.lock_const(&succs[level])?;
                }
            }

            let node = txn.alloc(Node::new(
                key,
                succs[..height].iter().cloned().map(Some).collect(),
            ))?;
            for (level, pred) in preds[..height].iter().enumerate() {
                txn.try_lock(pred)?.next[level] = Some(node.clone());
            }

            log::trace!("inserted {} at height {}", key, height);
            Ok(true)
        })
    }

    /// Remove `key`; `false` if absent
    pub fn remove(&self, thread: &mut ThreadHandle<Node>, key: i64) -> Result<bool> {
        Self::check_key(key)?;

        thread.write(|txn| {
            let Position { preds, succs } = self.find(&*txn, key);
            let victim = succs[0].clone();
            if txn.read(&victim).key != key {
                return Ok(false);
            }

            txn.lock_const(&victim)?;
            let links = txn.read(&victim).next.clone();

            for (level, link) in links.into_iter().enumerate() {
                let pred = txn.try_lock(&preds[level])?;
                if !pred.next(level).is_some_and(|n| n.ptr_eq(&victim)) {
                    return Err(MvrluError::LockConflict {
                        address: preds[level].address(),
                    });
                }
                pred.next[level] = link;
            }
            txn.free(&victim)?;

            log::trace!("removed {}", key);
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> SkipList {
        SkipList::new(MvrluConfig {
            max_threads: 8,
            log_capacity: 256,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_empty_list() {
        let list = list();
        let thread = list.register().unwrap();

        assert!(list.is_empty(&thread));
        assert_eq!(list.len(&thread), 0);
        assert!(!list.contains(&thread, 0));
        assert_eq!(list.inspect(&thread).len(), 2);
    }

    #[test]
    fn test_insert_contains_remove() {
        let list = list();
        let mut thread = list.register().unwrap();

        for key in [5, 1, 9, 3, 7] {
            assert!(list.insert(&mut thread, key).unwrap());
        }
        assert!(!list.insert(&mut thread, 3).unwrap());
        assert_eq!(list.keys(&thread), vec![1, 3, 5, 7, 9]);

        assert!(list.remove(&mut thread, 5).unwrap());
        assert!(!list.remove(&mut thread, 5).unwrap());
        assert!(!list.contains(&thread, 5));
        assert_eq!(list.len(&thread), 4);
    }

    #[test]
    fn test_range_bounds() {
        let list = list();
        let mut thread = list.register().unwrap();
        for key in 0..10 {
            list.insert(&mut thread, key).unwrap();
        }

        assert_eq!(list.range(&thread, 3, 6), vec![3, 4, 5]);
        assert_eq!(list.range(&thread, -5, 2), vec![0, 1]);
        assert!(list.range(&thread, 6, 3).is_empty());
    }

    #[test]
    fn test_sentinel_keys_rejected() {
        let list = list();
        let mut thread = list.register().unwrap();

        assert!(matches!(
            list.insert(&mut thread, i64::MIN),
            Err(MvrluError::InvalidArgument(_))
        ));
        assert!(matches!(
            list.remove(&mut thread, i64::MAX),
            Err(MvrluError::InvalidArgument(_))
        ));
        assert!(matches!(
            list.insert_with_height(&mut thread, 1, MAX_HEIGHT + 1),
            Err(MvrluError::InvalidArgument(_))
        ));
        assert!(!list.contains(&thread, i64::MAX));
    }

    #[test]
    fn test_inspect_reports_height_links() {
        let list = list();
        let mut thread = list.register().unwrap();
        list.insert_with_height(&mut thread, 10, 3).unwrap();
        list.insert_with_height(&mut thread, 20, 1).unwrap();

        let views = list.inspect(&thread);
        let keys: Vec<_> = views.iter().map(|v| v.key).collect();
        assert_eq!(keys, vec![HEAD_KEY, 10, 20, TAIL_KEY]);

        let ten = &views[1];
        assert_eq!(ten.height, 3);
        assert_eq!(ten.next.len(), 3);
        assert_eq!(ten.next[0], views[2].address);
        assert_eq!(ten.next[1], views[3].address);
        assert_eq!(views[2].next, vec![views[3].address]);
        assert!(views[3].next.iter().all(|a| a.is_null()));
    }

    #[test]
    fn test_render_levels() {
        let list = list();
        let mut thread = list.register().unwrap();
        list.insert_with_height(&mut thread, 1, 2).unwrap();
        list.insert_with_height(&mut thread, 2, 1).unwrap();

        let rendered = list.render(&thread);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines, vec!["L1  head -> 1 -> tail", "L0  head -> 1 -> 2 -> tail"]);
    }

    #[test]
    fn test_random_height_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let height = SkipList::random_height(&mut rng);
            assert!((1..=MAX_HEIGHT).contains(&height));
        }
    }
}
