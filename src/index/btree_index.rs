use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{EngineError, PageId, Result};

use super::btree_page::{max_keys_for_page, BTreeNode, BTreeNodeRef};

/// BTreeIndex maintains an ordered key index over pages reachable from a
/// root page reference. All page access goes through the buffer pool; node
/// bytes are mutated in place under write guards.
///
/// Splits propagate: a promoted key is inserted into the actual parent node
/// (tracked through the on-page parent reference), a full internal node
/// splits with its middle key moving up, and promotion recurses until a node
/// with spare capacity or a new root.
pub struct BTreeIndex {
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    max_keys: usize,
}

impl BTreeIndex {
    /// Creates an empty tree: one page, initialized as a parentless leaf,
    /// recorded as the root.
    pub fn new(bpm: Arc<BufferPoolManager>, max_keys: usize) -> Result<Self> {
        if max_keys == 0 || max_keys > max_keys_for_page() {
            return Err(EngineError::Config(format!(
                "max_keys must be between 1 and {}",
                max_keys_for_page()
            )));
        }

        let root_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.checked_write_page(root_page_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), max_keys);
            node.init(true);
        }

        Ok(Self {
            root_page_id,
            bpm,
            max_keys,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Inserts a key. Duplicate keys are allowed and land to the right of
    /// equal stored keys.
    pub fn insert(&mut self, key: u32) -> Result<()> {
        let leaf_id = self.find_leaf(key)?;

        let has_room = {
            let guard = self.bpm.checked_read_page(leaf_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.max_keys);
            (node.num_keys() as usize) < self.max_keys
        };

        if has_room {
            let mut guard = self.bpm.checked_write_page(leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.insert_key(key);
            debug!(key, page = leaf_id.as_u32(), "inserted into leaf");
            Ok(())
        } else {
            self.split_and_insert_leaf(leaf_id, key)
        }
    }

    /// Descends from the root to the leaf that should hold `key`. At each
    /// internal node the child taken is the first whose separating key
    /// exceeds `key`, else the last child, so duplicates route rightward.
    fn find_leaf(&self, key: u32) -> Result<PageId> {
        let mut current = self.root_page_id;

        loop {
            let next = {
                let guard = self.bpm.checked_read_page(current)?;
                let node = BTreeNodeRef::new(guard.data(), self.max_keys);

                if node.is_leaf() {
                    return Ok(current);
                }

                node.child(node.upper_bound(key))
            };

            current = next;
        }
    }

    /// Splits a full leaf around `key`: the merged sorted set of
    /// `max_keys + 1` keys is divided at `mid = (max_keys + 1) / 2`, the old
    /// leaf keeps the first half, a new sibling takes the rest, and the
    /// sibling's first key is promoted to the parent. The next-leaf chain is
    /// stitched through the new sibling.
    fn split_and_insert_leaf(&mut self, leaf_id: PageId, key: u32) -> Result<()> {
        let (right_keys, parent, old_next) = {
            let mut guard = self.bpm.checked_write_page(leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);

            let mut merged = node.keys();
            let pos = merged.partition_point(|&k| k <= key);
            merged.insert(pos, key);

            let mid = (self.max_keys + 1) / 2;
            let right_keys = merged.split_off(mid);

            let parent = node.parent();
            let old_next = node.next_leaf();
            node.write_keys(&merged);

            (right_keys, parent, old_next)
        };

        let new_leaf_id = self.bpm.new_page()?;
        let separator = right_keys[0];
        debug!(
            page = leaf_id.as_u32(),
            sibling = new_leaf_id.as_u32(),
            separator,
            "leaf split"
        );

        {
            let mut guard = self.bpm.checked_write_page(new_leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.init(true);
            node.write_keys(&right_keys);
            node.set_parent(parent);
            node.set_next_leaf(old_next);
        }

        {
            let mut guard = self.bpm.checked_write_page(leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.set_next_leaf(Some(new_leaf_id));
        }

        match parent {
            Some(parent_id) => self.insert_into_parent(parent_id, separator, new_leaf_id),
            None => self.grow_root(leaf_id, separator, new_leaf_id),
        }
    }

    /// Inserts a promoted key and its right-hand child into an internal
    /// node, splitting it in turn if full.
    fn insert_into_parent(
        &mut self,
        parent_id: PageId,
        key: u32,
        right_child: PageId,
    ) -> Result<()> {
        let has_room = {
            let guard = self.bpm.checked_read_page(parent_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.max_keys);
            (node.num_keys() as usize) < self.max_keys
        };

        if has_room {
            let mut guard = self.bpm.checked_write_page(parent_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.insert_key_child(key, right_child);
            debug!(key, page = parent_id.as_u32(), "promoted into parent");
            Ok(())
        } else {
            self.split_and_insert_internal(parent_id, key, right_child)
        }
    }

    /// Splits a full internal node around a promoted key. Unlike a leaf
    /// split, the middle key moves up rather than being copied: the left
    /// node keeps keys below it, the new right node takes keys above it,
    /// and the right node's children get their parent references rewritten.
    fn split_and_insert_internal(
        &mut self,
        node_id: PageId,
        key: u32,
        right_child: PageId,
    ) -> Result<()> {
        let (separator, right_keys, right_children, parent) = {
            let mut guard = self.bpm.checked_write_page(node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);

            let mut keys = node.keys();
            let mut children = node.children();
            let pos = keys.partition_point(|&k| k <= key);
            keys.insert(pos, key);
            children.insert(pos + 1, right_child);

            let mid = (self.max_keys + 1) / 2;
            let separator = keys[mid];
            let right_keys = keys[mid + 1..].to_vec();
            let right_children = children[mid + 1..].to_vec();

            let parent = node.parent();
            node.write_keys_children(&keys[..mid], &children[..=mid]);

            (separator, right_keys, right_children, parent)
        };

        let new_node_id = self.bpm.new_page()?;
        debug!(
            page = node_id.as_u32(),
            sibling = new_node_id.as_u32(),
            separator,
            "internal split"
        );

        {
            let mut guard = self.bpm.checked_write_page(new_node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.init(false);
            node.write_keys_children(&right_keys, &right_children);
            node.set_parent(parent);
        }

        // Children moved to the new node point at it again
        for child_id in &right_children {
            let mut guard = self.bpm.checked_write_page(*child_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.set_parent(Some(new_node_id));
        }

        match parent {
            Some(parent_id) => self.insert_into_parent(parent_id, separator, new_node_id),
            None => self.grow_root(node_id, separator, new_node_id),
        }
    }

    /// Creates a new internal root over a freshly split pair and rewrites
    /// both halves' parent references.
    fn grow_root(&mut self, left: PageId, key: u32, right: PageId) -> Result<()> {
        let new_root_id = self.bpm.new_page()?;

        {
            let mut guard = self.bpm.checked_write_page(new_root_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.init(false);
            node.write_keys_children(&[key], &[left, right]);
        }

        for page_id in [left, right] {
            let mut guard = self.bpm.checked_write_page(page_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.max_keys);
            node.set_parent(Some(new_root_id));
        }

        self.root_page_id = new_root_id;
        debug!(page = new_root_id.as_u32(), "new root, tree height increased");
        Ok(())
    }
}
