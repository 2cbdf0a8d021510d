use crate::common::{PageId, PAGE_SIZE};

/// On-page node format, little-endian throughout:
///
/// ```text
/// 0        u8   format version
/// 1        u8   node kind: 1 = leaf, 0 = internal
/// 2..4     u16  key count
/// 4..8     u32  parent page id   (u32::MAX = none)
/// 8..12    u32  next-leaf page id (u32::MAX = none; leaves only)
/// 12..     u32  keys[max_keys]
/// then     u32  children[max_keys + 1]   (internal nodes)
/// ```
///
/// `max_keys` is configured at engine construction, so the child array
/// starts at a fixed offset derived from it rather than from the live key
/// count.
pub const NODE_FORMAT_VERSION: u8 = 1;

const VERSION_OFFSET: usize = 0;
const NODE_KIND_OFFSET: usize = 1;
const NUM_KEYS_OFFSET: usize = 2;
const PARENT_OFFSET: usize = 4;
const NEXT_LEAF_OFFSET: usize = 8;
const HEADER_SIZE: usize = 12;

const KEY_SIZE: usize = 4;
const CHILD_SIZE: usize = 4;

const KIND_LEAF: u8 = 1;
const KIND_INTERNAL: u8 = 0;

const INVALID_PAGE: u32 = u32::MAX;

/// Largest `max_keys` whose node layout still fits in one page.
pub fn max_keys_for_page() -> usize {
    (PAGE_SIZE - HEADER_SIZE - CHILD_SIZE) / (KEY_SIZE + CHILD_SIZE)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    u32::from_le_bytes(bytes)
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn decode_page_ref(raw: u32) -> Option<PageId> {
    if raw == INVALID_PAGE {
        None
    } else {
        Some(PageId::new(raw))
    }
}

fn encode_page_ref(page_id: Option<PageId>) -> u32 {
    page_id.map(|p| p.as_u32()).unwrap_or(INVALID_PAGE)
}

/// Mutable view of a B+Tree node overlaid on a page buffer.
pub struct BTreeNode<'a> {
    data: &'a mut [u8],
    max_keys: usize,
}

impl<'a> BTreeNode<'a> {
    pub fn new(data: &'a mut [u8], max_keys: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        assert!(max_keys <= max_keys_for_page());
        Self { data, max_keys }
    }

    /// Initializes the buffer as an empty node with no parent and no
    /// next-leaf sibling.
    pub fn init(&mut self, is_leaf: bool) {
        self.data.fill(0);
        self.data[VERSION_OFFSET] = NODE_FORMAT_VERSION;
        self.data[NODE_KIND_OFFSET] = if is_leaf { KIND_LEAF } else { KIND_INTERNAL };
        self.set_num_keys(0);
        write_u32(self.data, PARENT_OFFSET, INVALID_PAGE);
        write_u32(self.data, NEXT_LEAF_OFFSET, INVALID_PAGE);
    }

    pub fn version(&self) -> u8 {
        self.data[VERSION_OFFSET]
    }

    pub fn is_leaf(&self) -> bool {
        self.data[NODE_KIND_OFFSET] == KIND_LEAF
    }

    pub fn num_keys(&self) -> u16 {
        let bytes: [u8; 2] = self.data[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    fn set_num_keys(&mut self, num: u16) {
        self.data[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 2].copy_from_slice(&num.to_le_bytes());
    }

    pub fn parent(&self) -> Option<PageId> {
        decode_page_ref(read_u32(self.data, PARENT_OFFSET))
    }

    pub fn set_parent(&mut self, page_id: Option<PageId>) {
        write_u32(self.data, PARENT_OFFSET, encode_page_ref(page_id));
    }

    pub fn next_leaf(&self) -> Option<PageId> {
        decode_page_ref(read_u32(self.data, NEXT_LEAF_OFFSET))
    }

    pub fn set_next_leaf(&mut self, page_id: Option<PageId>) {
        write_u32(self.data, NEXT_LEAF_OFFSET, encode_page_ref(page_id));
    }

    pub fn key(&self, index: usize) -> u32 {
        debug_assert!(index < self.max_keys + 1);
        read_u32(self.data, HEADER_SIZE + index * KEY_SIZE)
    }

    fn set_key(&mut self, index: usize, key: u32) {
        write_u32(self.data, HEADER_SIZE + index * KEY_SIZE, key);
    }

    fn child_offset(&self, index: usize) -> usize {
        HEADER_SIZE + self.max_keys * KEY_SIZE + index * CHILD_SIZE
    }

    pub fn child(&self, index: usize) -> PageId {
        debug_assert!(index <= self.num_keys() as usize);
        PageId::new(read_u32(self.data, self.child_offset(index)))
    }

    pub fn set_child(&mut self, index: usize, child: PageId) {
        let offset = self.child_offset(index);
        write_u32(self.data, offset, child.as_u32());
    }

    /// First index whose key is strictly greater than `key`. Used both for
    /// descent (duplicates route rightward) and for leaf insert position.
    pub fn upper_bound(&self, key: u32) -> usize {
        upper_bound_impl(key, self.num_keys() as usize, |i| self.key(i))
    }

    /// Inserts a key into a leaf with spare capacity, shifting greater keys
    /// one slot rightward to keep ascending order.
    pub fn insert_key(&mut self, key: u32) {
        let num_keys = self.num_keys() as usize;
        debug_assert!(num_keys < self.max_keys);

        let pos = self.upper_bound(key);
        for i in (pos..num_keys).rev() {
            let k = self.key(i);
            self.set_key(i + 1, k);
        }
        self.set_key(pos, key);
        self.set_num_keys((num_keys + 1) as u16);
    }

    /// Inserts a promoted key and the right-hand child it separates into an
    /// internal node with spare capacity.
    pub fn insert_key_child(&mut self, key: u32, right_child: PageId) {
        let num_keys = self.num_keys() as usize;
        debug_assert!(num_keys < self.max_keys);

        let pos = self.upper_bound(key);
        for i in (pos..num_keys).rev() {
            let k = self.key(i);
            self.set_key(i + 1, k);
        }
        for i in ((pos + 1)..=num_keys).rev() {
            let c = self.child(i);
            self.set_child(i + 1, c);
        }
        self.set_key(pos, key);
        self.set_child(pos + 1, right_child);
        self.set_num_keys((num_keys + 1) as u16);
    }

    /// Returns all stored keys in order.
    pub fn keys(&self) -> Vec<u32> {
        (0..self.num_keys() as usize).map(|i| self.key(i)).collect()
    }

    /// Returns all child references in order (key count + 1 of them).
    pub fn children(&self) -> Vec<PageId> {
        (0..=self.num_keys() as usize)
            .map(|i| self.child(i))
            .collect()
    }

    /// Replaces the stored keys, used when rebuilding a node after a split.
    pub fn write_keys(&mut self, keys: &[u32]) {
        debug_assert!(keys.len() <= self.max_keys);
        self.set_num_keys(keys.len() as u16);
        for (i, key) in keys.iter().enumerate() {
            self.set_key(i, *key);
        }
    }

    /// Replaces the stored keys and children of an internal node.
    pub fn write_keys_children(&mut self, keys: &[u32], children: &[PageId]) {
        debug_assert!(keys.len() <= self.max_keys);
        debug_assert_eq!(children.len(), keys.len() + 1);
        self.set_num_keys(keys.len() as u16);
        for (i, key) in keys.iter().enumerate() {
            self.set_key(i, *key);
        }
        for (i, child) in children.iter().enumerate() {
            self.set_child(i, *child);
        }
    }
}

/// Read-only view of a B+Tree node overlaid on a page buffer.
pub struct BTreeNodeRef<'a> {
    data: &'a [u8],
    max_keys: usize,
}

impl<'a> BTreeNodeRef<'a> {
    pub fn new(data: &'a [u8], max_keys: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        assert!(max_keys <= max_keys_for_page());
        Self { data, max_keys }
    }

    pub fn version(&self) -> u8 {
        self.data[VERSION_OFFSET]
    }

    pub fn is_leaf(&self) -> bool {
        self.data[NODE_KIND_OFFSET] == KIND_LEAF
    }

    pub fn num_keys(&self) -> u16 {
        let bytes: [u8; 2] = self.data[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    pub fn parent(&self) -> Option<PageId> {
        decode_page_ref(read_u32(self.data, PARENT_OFFSET))
    }

    pub fn next_leaf(&self) -> Option<PageId> {
        decode_page_ref(read_u32(self.data, NEXT_LEAF_OFFSET))
    }

    pub fn key(&self, index: usize) -> u32 {
        read_u32(self.data, HEADER_SIZE + index * KEY_SIZE)
    }

    pub fn child(&self, index: usize) -> PageId {
        let offset = HEADER_SIZE + self.max_keys * KEY_SIZE + index * CHILD_SIZE;
        PageId::new(read_u32(self.data, offset))
    }

    pub fn upper_bound(&self, key: u32) -> usize {
        upper_bound_impl(key, self.num_keys() as usize, |i| self.key(i))
    }

    pub fn keys(&self) -> Vec<u32> {
        (0..self.num_keys() as usize).map(|i| self.key(i)).collect()
    }

    pub fn children(&self) -> Vec<PageId> {
        (0..=self.num_keys() as usize)
            .map(|i| self.child(i))
            .collect()
    }
}

fn upper_bound_impl(key: u32, num_keys: usize, key_at: impl Fn(usize) -> u32) -> usize {
    let mut left = 0;
    let mut right = num_keys;

    while left < right {
        let mid = left + (right - left) / 2;
        if key_at(mid) <= key {
            left = mid + 1;
        } else {
            right = mid;
        }
    }

    left
}
