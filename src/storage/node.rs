//! B+ tree node layout: byte-precise accessors over a 4096-byte page.
//!
//! | **Property**            | **Internal Node**                  | **Leaf Node**              |
//! |-------------------------|------------------------------------|----------------------------|
//! | **Stores**              | Keys and pointers to children      | Keys and values            |
//! | **Number of keys**      | up to `INTERNAL_NODE_MAX_CELLS`    | as many as will fit        |
//! | **Number of pointers**  | number of keys + 1                 | none                       |
//! | **Key purpose**         | used for routing                   | paired with value          |
//!
//! The on-disk layout is the single source of truth: every field lives at a
//! `const` offset below, and every accessor just slices into `self.bytes`.
//! Integers are little-endian throughout.

use super::row;
use crate::errors::StorageError;

pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: u32 = 100;

/// Sentinel for "no page" — used for a freshly-initialized internal node's
/// right child, before anything has been inserted into it.
pub const INVALID_PAGE_NUM: u32 = 0xFFFFFFFF;

/// 0 in a leaf's `next_leaf` field means "no right sibling". Page 0 is
/// always the root and can therefore never be a real sibling pointer.
pub const NO_SIBLING: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

// --- Common node header (6 bytes) ---
const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_POINTER_SIZE: usize = 4;
const COMMON_NODE_HEADER_SIZE: usize = PARENT_POINTER_OFFSET + PARENT_POINTER_SIZE;

// --- Leaf node header (+8 bytes) ---
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_HEADER_SIZE: usize = LEAF_NODE_NEXT_LEAF_OFFSET + LEAF_NODE_NEXT_LEAF_SIZE;

// --- Leaf node body ---
pub const LEAF_NODE_KEY_SIZE: usize = 4;
const LEAF_NODE_VALUE_SIZE: usize = row::ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// --- Internal node header (+8 bytes) ---
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_HEADER_SIZE: usize =
    INTERNAL_NODE_RIGHT_CHILD_OFFSET + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// --- Internal node body ---
const INTERNAL_NODE_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_KEY_SIZE: usize = 4;
const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Pinned independently of what the page could geometrically hold, so that
/// splits are exercised by small, deterministic test fixtures.
pub const INTERNAL_NODE_MAX_CELLS: u32 = 3;

/// A single on-disk page, owned by the pager. All B+ tree node accessors
/// are inherent methods on `Page` that read or write fixed offsets in
/// `bytes`; they never allocate or copy the whole buffer.
pub struct Page {
    pub bytes: [u8; PAGE_SIZE],
}

impl Page {
    pub fn zeroed() -> Self {
        Page { bytes: [0u8; PAGE_SIZE] }
    }

    pub fn node_type(&self) -> Result<NodeType, StorageError> {
        match self.bytes[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            other => Err(StorageError::Corrupt(format!(
                "invalid node type byte {}",
                other
            ))),
        }
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.bytes[NODE_TYPE_OFFSET] = match node_type {
            NodeType::Internal => 0,
            NodeType::Leaf => 1,
        };
    }

    pub fn is_root(&self) -> bool {
        self.bytes[IS_ROOT_OFFSET] != 0
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.bytes[IS_ROOT_OFFSET] = is_root as u8;
    }

    pub fn parent_page(&self) -> u32 {
        read_u32(&self.bytes, PARENT_POINTER_OFFSET)
    }

    pub fn set_parent_page(&mut self, page_num: u32) {
        write_u32(&mut self.bytes, PARENT_POINTER_OFFSET, page_num);
    }

    // --- Leaf accessors ---

    pub fn initialize_leaf(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_is_root(false);
        self.set_leaf_num_cells(0);
        self.set_leaf_next_leaf(NO_SIBLING);
    }

    pub fn leaf_num_cells(&self) -> u32 {
        read_u32(&self.bytes, LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn set_leaf_num_cells(&mut self, num_cells: u32) {
        write_u32(&mut self.bytes, LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
    }

    pub fn leaf_next_leaf(&self) -> u32 {
        read_u32(&self.bytes, LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_next_leaf(&mut self, page_num: u32) {
        write_u32(&mut self.bytes, LEAF_NODE_NEXT_LEAF_OFFSET, page_num);
    }

    fn leaf_cell_offset(cell_num: u32) -> usize {
        LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE
    }

    pub fn leaf_key(&self, cell_num: u32) -> u32 {
        read_u32(&self.bytes, Self::leaf_cell_offset(cell_num))
    }

    pub fn set_leaf_key(&mut self, cell_num: u32, key: u32) {
        write_u32(&mut self.bytes, Self::leaf_cell_offset(cell_num), key);
    }

    pub fn leaf_value(&self, cell_num: u32) -> &[u8] {
        let offset = Self::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
        &self.bytes[offset..offset + LEAF_NODE_VALUE_SIZE]
    }

    pub fn set_leaf_value(&mut self, cell_num: u32, value: &[u8]) {
        let offset = Self::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
        self.bytes[offset..offset + LEAF_NODE_VALUE_SIZE].copy_from_slice(value);
    }

    /// Copies cell `src` onto cell `dst` whole (key + value), used when
    /// shifting cells during insertion and splits.
    pub fn copy_leaf_cell(&mut self, src: u32, dst: u32) {
        let (src_off, dst_off) = (Self::leaf_cell_offset(src), Self::leaf_cell_offset(dst));
        if src_off == dst_off {
            return;
        }
        let mut tmp = [0u8; LEAF_NODE_CELL_SIZE];
        tmp.copy_from_slice(&self.bytes[src_off..src_off + LEAF_NODE_CELL_SIZE]);
        self.bytes[dst_off..dst_off + LEAF_NODE_CELL_SIZE].copy_from_slice(&tmp);
    }

    /// Smallest index `i` such that `leaf_key(i) >= key`, or `leaf_num_cells()`.
    pub fn leaf_find(&self, key: u32) -> u32 {
        let mut lo = 0u32;
        let mut hi = self.leaf_num_cells();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.leaf_key(mid) >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    // --- Internal accessors ---

    pub fn initialize_internal(&mut self) {
        self.set_node_type(NodeType::Internal);
        self.set_is_root(false);
        self.set_internal_num_keys(0);
        // Necessary because page 0 is the root: leaving right_child at 0
        // would make this node appear to be the parent of the root.
        self.set_internal_right_child(INVALID_PAGE_NUM);
    }

    pub fn internal_num_keys(&self) -> u32 {
        read_u32(&self.bytes, INTERNAL_NODE_NUM_KEYS_OFFSET)
    }

    pub fn set_internal_num_keys(&mut self, num_keys: u32) {
        write_u32(&mut self.bytes, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
    }

    pub fn internal_right_child(&self) -> u32 {
        read_u32(&self.bytes, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_right_child(&mut self, page_num: u32) {
        write_u32(&mut self.bytes, INTERNAL_NODE_RIGHT_CHILD_OFFSET, page_num);
    }

    fn internal_cell_offset(cell_num: u32) -> usize {
        INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE
    }

    fn internal_cell_child(&self, cell_num: u32) -> u32 {
        read_u32(&self.bytes, Self::internal_cell_offset(cell_num))
    }

    fn set_internal_cell_child(&mut self, cell_num: u32, page_num: u32) {
        write_u32(&mut self.bytes, Self::internal_cell_offset(cell_num), page_num);
    }

    pub fn internal_key(&self, key_num: u32) -> u32 {
        let offset = Self::internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE;
        read_u32(&self.bytes, offset)
    }

    pub fn set_internal_key(&mut self, key_num: u32, key: u32) {
        let offset = Self::internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE;
        write_u32(&mut self.bytes, offset, key);
    }

    /// `internal_child(num_keys)` aliases the right-child slot; the two are
    /// never unioned physically, they just live at different offsets.
    pub fn internal_child(&self, child_num: u32) -> Result<u32, StorageError> {
        let num_keys = self.internal_num_keys();
        let page_num = if child_num == num_keys {
            self.internal_right_child()
        } else {
            self.internal_cell_child(child_num)
        };
        if page_num == INVALID_PAGE_NUM {
            return Err(StorageError::InvalidPageNum);
        }
        Ok(page_num)
    }

    pub fn set_internal_child(&mut self, child_num: u32, page_num: u32) {
        let num_keys = self.internal_num_keys();
        if child_num == num_keys {
            self.set_internal_right_child(page_num);
        } else {
            self.set_internal_cell_child(child_num, page_num);
        }
    }

    pub fn copy_internal_cell(&mut self, src: u32, dst: u32) {
        let (src_off, dst_off) = (Self::internal_cell_offset(src), Self::internal_cell_offset(dst));
        if src_off == dst_off {
            return;
        }
        let mut tmp = [0u8; INTERNAL_NODE_CELL_SIZE];
        tmp.copy_from_slice(&self.bytes[src_off..src_off + INTERNAL_NODE_CELL_SIZE]);
        self.bytes[dst_off..dst_off + INTERNAL_NODE_CELL_SIZE].copy_from_slice(&tmp);
    }

    /// Smallest index `i` such that `internal_key(i) >= key`, or `num_keys`.
    pub fn find_child_index(&self, key: u32) -> u32 {
        let mut lo = 0u32;
        let mut hi = self.internal_num_keys();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.internal_key(mid) >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    /// Overwrites the key for whichever child slot currently holds `old_key`.
    /// Silently a no-op when `old_key` names the right-child subtree: the
    /// caller's own `internal_insert` bubble-up refreshes that slot instead.
    pub fn update_internal_key(&mut self, old_key: u32, new_key: u32) {
        let index = self.find_child_index(old_key);
        if index < self.internal_num_keys() {
            self.set_internal_key(index, new_key);
        }
    }
}

fn read_u32(bytes: &[u8; PAGE_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn write_u32(bytes: &mut [u8; PAGE_SIZE], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_find_locates_existing_and_insertion_points() {
        let mut page = Page::zeroed();
        page.initialize_leaf();
        for (i, key) in [10, 20, 30].into_iter().enumerate() {
            page.set_leaf_key(i as u32, key);
        }
        page.set_leaf_num_cells(3);
        assert_eq!(page.leaf_find(20), 1);
        assert_eq!(page.leaf_find(15), 1);
        assert_eq!(page.leaf_find(5), 0);
        assert_eq!(page.leaf_find(99), 3);
    }

    #[test]
    fn internal_child_rejects_invalid_page_num() {
        let mut page = Page::zeroed();
        page.initialize_internal();
        assert!(matches!(
            page.internal_child(0),
            Err(StorageError::InvalidPageNum)
        ));
    }

    #[test]
    fn update_internal_key_is_noop_for_right_child_slot() {
        let mut page = Page::zeroed();
        page.initialize_internal();
        page.set_internal_num_keys(1);
        page.set_internal_key(0, 10);
        page.set_internal_child(0, 1);
        page.set_internal_right_child(2);
        // old_key = 50 doesn't match any key slot, so find_child_index
        // returns num_keys (1), landing on the right-child branch: no-op.
        page.update_internal_key(50, 999);
        assert_eq!(page.internal_key(0), 10);
    }

    #[test]
    fn max_cells_match_the_design_budget() {
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT, 7);
        assert_eq!(LEAF_NODE_RIGHT_SPLIT_COUNT, 7);
        assert_eq!(INTERNAL_NODE_MAX_CELLS, 3);
    }
}
