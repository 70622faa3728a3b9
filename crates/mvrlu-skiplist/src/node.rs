//! Skip List Nodes
//!
//! A node is an ordinary versioned payload: its key and one forward link
//! per level. Writers change links by locking the node and editing their
//! copy, so every link of a node changes at one commit clock.

use mvrlu::{Address, Obj};
use serde::Serialize;

/// Number of levels of the list, sentinels included
pub const MAX_HEIGHT: usize = 17;

/// Key of the head sentinel
pub const HEAD_KEY: i64 = i64::MIN;

/// Key of the tail sentinel
pub const TAIL_KEY: i64 = i64::MAX;

/// Skip list node payload
#[derive(Clone)]
pub struct Node {
    pub(crate) key: i64,
    /// Forward links; `next.len()` is the node's height. Only the tail
    /// sentinel has `None` links.
    pub(crate) next: Vec<Option<Obj<Node>>>,
}

impl Node {
    pub(crate) fn new(key: i64, next: Vec<Option<Obj<Node>>>) -> Self {
        debug_assert!(!next.is_empty() && next.len() <= MAX_HEIGHT);
        Self { key, next }
    }

    pub(crate) fn tail() -> Self {
        Self::new(TAIL_KEY, vec![None; MAX_HEIGHT])
    }

    #[inline]
    pub fn key(&self) -> i64 {
        self.key
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.next.len()
    }

    /// Successor at `level`, `None` past the tail or above the node's height
    #[inline]
    pub fn next(&self, level: usize) -> Option<&Obj<Node>> {
        self.next.get(level).and_then(Option::as_ref)
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.key == HEAD_KEY || self.key == TAIL_KEY
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("height", &self.height())
            .finish()
    }
}

/// Structural view of one node, for depth-first visualisation
///
/// `next` holds exactly `height` entries; links of the tail are null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub key: i64,
    pub height: usize,
    pub address: Address,
    pub next: Vec<Address>,
}

impl NodeView {
    pub(crate) fn of(obj: &Obj<Node>, node: &Node) -> Self {
        Self {
            key: node.key,
            height: node.height(),
            address: obj.address(),
            next: node
                .next
                .iter()
                .map(|link| link.as_ref().map(Obj::address).unwrap_or(Address::NULL))
                .collect(),
        }
    }
}
