//! Integration tests for the B+Tree index

use std::sync::Arc;

use pagedb::buffer::BufferPoolManager;
use pagedb::common::PageId;
use pagedb::index::{BTreeIndex, BTreeNodeRef};
use pagedb::storage::disk::DiskManager;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tempfile::NamedTempFile;

fn create_tree(
    capacity: usize,
    max_keys: usize,
) -> (BTreeIndex, Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(capacity, disk));
    let tree = BTreeIndex::new(Arc::clone(&bpm), max_keys).unwrap();
    (tree, bpm, temp_file)
}

/// Reads one node's interesting fields without holding a guard across
/// further pool calls.
fn read_node(
    bpm: &BufferPoolManager,
    page_id: PageId,
    max_keys: usize,
) -> (bool, Vec<u32>, Vec<PageId>, Option<PageId>) {
    let guard = bpm.checked_read_page(page_id).unwrap();
    let node = BTreeNodeRef::new(guard.data(), max_keys);
    let children = if node.is_leaf() {
        Vec::new()
    } else {
        node.children()
    };
    (node.is_leaf(), node.keys(), children, node.next_leaf())
}

/// Walks the whole tree depth-first, checking node invariants and
/// collecting every leaf key in order.
fn collect_leaf_keys(
    bpm: &BufferPoolManager,
    page_id: PageId,
    max_keys: usize,
    out: &mut Vec<u32>,
) {
    let (is_leaf, keys, children, _) = read_node(bpm, page_id, max_keys);

    assert!(keys.len() <= max_keys, "node over capacity");
    assert!(keys.windows(2).all(|w| w[0] <= w[1]), "keys out of order");

    if is_leaf {
        out.extend(keys);
    } else {
        assert_eq!(children.len(), keys.len() + 1);
        for child in children {
            collect_leaf_keys(bpm, child, max_keys, out);
        }
    }
}

/// Follows the next-leaf chain from the leftmost leaf, concatenating keys.
fn walk_leaf_chain(bpm: &BufferPoolManager, root: PageId, max_keys: usize) -> Vec<u32> {
    let mut current = root;
    loop {
        let (is_leaf, _, children, _) = read_node(bpm, current, max_keys);
        if is_leaf {
            break;
        }
        current = children[0];
    }

    let mut out = Vec::new();
    let mut next = Some(current);
    while let Some(page_id) = next {
        let (is_leaf, keys, _, next_leaf) = read_node(bpm, page_id, max_keys);
        assert!(is_leaf);
        out.extend(keys);
        next = next_leaf;
    }
    out
}

/// The reference scenario: capacity 3, max_keys 3, inserting 10..=50.
/// Page 0 fills, 40 splits it with a new root, 50 lands in the sibling,
/// and exactly three pages exist so nothing is ever evicted.
#[test]
fn test_reference_insert_sequence() {
    let (mut tree, bpm, _temp) = create_tree(3, 3);

    for key in [10, 20, 30] {
        tree.insert(key).unwrap();
    }
    assert_eq!(tree.root_page_id(), PageId::new(0));
    let (is_leaf, keys, _, _) = read_node(&bpm, PageId::new(0), 3);
    assert!(is_leaf);
    assert_eq!(keys, vec![10, 20, 30]);

    tree.insert(40).unwrap();
    assert_eq!(tree.root_page_id(), PageId::new(2));

    let (is_leaf, keys, children, _) = read_node(&bpm, PageId::new(2), 3);
    assert!(!is_leaf);
    assert_eq!(keys, vec![30]);
    assert_eq!(children, vec![PageId::new(0), PageId::new(1)]);

    let (_, keys, _, next) = read_node(&bpm, PageId::new(0), 3);
    assert_eq!(keys, vec![10, 20]);
    assert_eq!(next, Some(PageId::new(1)));
    let (_, keys, _, _) = read_node(&bpm, PageId::new(1), 3);
    assert_eq!(keys, vec![30, 40]);

    tree.insert(50).unwrap();

    let (_, keys, _, _) = read_node(&bpm, PageId::new(1), 3);
    assert_eq!(keys, vec![30, 40, 50]);
    let (_, keys, _, _) = read_node(&bpm, PageId::new(0), 3);
    assert_eq!(keys, vec![10, 20]);
    assert_eq!(tree.root_page_id(), PageId::new(2));

    // Three pages in three frames: no eviction ever happened
    assert_eq!(bpm.allocated_count(), 3);
    assert_eq!(bpm.eviction_count(), 0);
}

/// A split below the root must promote into the existing parent rather
/// than dropping the key: every inserted key stays reachable.
#[test]
fn test_non_root_split_keeps_keys_reachable() {
    let (mut tree, bpm, _temp) = create_tree(3, 3);

    let keys: Vec<u32> = (1..=10).map(|k| k * 10).collect();
    for &key in &keys {
        tree.insert(key).unwrap();
    }

    let mut collected = Vec::new();
    collect_leaf_keys(&bpm, tree.root_page_id(), 3, &mut collected);
    assert_eq!(collected, keys);
}

/// Cascading splits past two levels: the root itself is internal and
/// full, so promotion splits it and grows a third level.
#[test]
fn test_cascading_splits_grow_tree_height() {
    let (mut tree, bpm, _temp) = create_tree(3, 3);

    let keys: Vec<u32> = (1..=50).collect();
    for &key in &keys {
        tree.insert(key).unwrap();
    }

    // The root is internal now and more pages exist than frames, so the
    // working set has been cycling through the cache
    let (is_leaf, _, _, _) = read_node(&bpm, tree.root_page_id(), 3);
    assert!(!is_leaf);
    assert!(bpm.allocated_count() > 3);
    assert!(bpm.eviction_count() > 0);

    let mut collected = Vec::new();
    collect_leaf_keys(&bpm, tree.root_page_id(), 3, &mut collected);
    assert_eq!(collected, keys);

    assert_eq!(walk_leaf_chain(&bpm, tree.root_page_id(), 3), keys);
}

#[test]
fn test_random_insert_order_keeps_leaves_sorted() {
    let (mut tree, bpm, _temp) = create_tree(3, 3);
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let mut keys: Vec<u32> = (1..=200).collect();
    keys.shuffle(&mut rng);
    for &key in &keys {
        tree.insert(key).unwrap();
    }

    let mut collected = Vec::new();
    collect_leaf_keys(&bpm, tree.root_page_id(), 3, &mut collected);

    keys.sort_unstable();
    assert_eq!(collected, keys);
    assert_eq!(walk_leaf_chain(&bpm, tree.root_page_id(), 3), keys);
}

/// Duplicate keys are allowed; they route rightward and all survive.
#[test]
fn test_duplicate_keys_all_retained() {
    let (mut tree, bpm, _temp) = create_tree(3, 3);

    for _ in 0..7 {
        tree.insert(20).unwrap();
    }
    tree.insert(10).unwrap();
    tree.insert(30).unwrap();

    let mut collected = Vec::new();
    collect_leaf_keys(&bpm, tree.root_page_id(), 3, &mut collected);
    assert_eq!(collected, vec![10, 20, 20, 20, 20, 20, 20, 20, 30]);
}

/// A larger node capacity delays splits: the first 128 keys fit in the
/// root leaf.
#[test]
fn test_wide_nodes_split_later() {
    let (mut tree, bpm, _temp) = create_tree(4, 128);

    for key in 1..=128u32 {
        tree.insert(key).unwrap();
    }
    let (is_leaf, keys, _, _) = read_node(&bpm, tree.root_page_id(), 128);
    assert!(is_leaf);
    assert_eq!(keys.len(), 128);

    tree.insert(129).unwrap();
    let (is_leaf, _, _, _) = read_node(&bpm, tree.root_page_id(), 128);
    assert!(!is_leaf);
}
