//! `Table`: the single B+ tree that backs the whole database file. Owns
//! the pager and the root page number, and implements insertion (with
//! leaf/internal/root splitting), a full scan, and the `.btree` /
//! `.constants` diagnostic dumps.

use std::path::Path;

use tracing::{debug, info};

use super::cursor::Cursor;
use super::node::{
    NodeType, INTERNAL_NODE_MAX_CELLS, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE,
    LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
    LEAF_NODE_SPACE_FOR_CELLS, PAGE_SIZE,
};
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::StorageError;

pub struct Table {
    pager: Pager,
    root_page_num: u32,
}

/// `insert` can fail two different ways: a duplicate key is a normal,
/// recoverable outcome the REPL prints and moves past; anything else
/// means the tree or the underlying file is broken and the caller should
/// treat it as fatal.
#[derive(Debug)]
pub enum InsertError {
    Duplicate,
    Storage(StorageError),
}

impl From<StorageError> for InsertError {
    fn from(err: StorageError) -> Self {
        InsertError::Storage(err)
    }
}

impl Table {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages_on_disk() == 0 {
            let root = pager.get(0)?;
            root.initialize_leaf();
            root.set_is_root(true);
            info!("initialized new empty database");
        }
        Ok(Table {
            pager,
            root_page_num: 0,
        })
    }

    pub fn close(&mut self) -> Result<(), StorageError> {
        self.pager.close_all()
    }

    /// Exposes the pager and root page for black-box invariant-checking
    /// tests; never used by `insert`/`select`/`print_tree` themselves.
    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    pub fn root_page_num(&self) -> u32 {
        self.root_page_num
    }

    /// Inserts `row`, rejecting duplicate ids. May split a leaf, then
    /// cascade up through ancestors, possibly growing the tree by one
    /// level via `create_new_root`.
    pub fn insert(&mut self, row: &Row) -> Result<(), InsertError> {
        let key = row.id;
        let mut cursor = Cursor::find(&mut self.pager, self.root_page_num, key)?;

        let page_num = cursor.page_num;
        let cell_num = cursor.cell_num;
        let leaf = cursor.pager_mut().get(page_num)?;
        if cell_num < leaf.leaf_num_cells() && leaf.leaf_key(cell_num) == key {
            return Err(InsertError::Duplicate);
        }

        self.leaf_insert(page_num, cell_num, key, row)?;
        Ok(())
    }

    fn leaf_insert(
        &mut self,
        page_num: u32,
        cell_num: u32,
        key: u32,
        row: &Row,
    ) -> Result<(), StorageError> {
        let num_cells = self.pager.get(page_num)?.leaf_num_cells();
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return self.leaf_split_and_insert(page_num, cell_num, key, row);
        }

        let page = self.pager.get(page_num)?;
        for i in (cell_num..num_cells).rev() {
            page.copy_leaf_cell(i, i + 1);
        }
        page.set_leaf_num_cells(num_cells + 1);
        page.set_leaf_key(cell_num, key);
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        page.set_leaf_value(cell_num, &buf);
        Ok(())
    }

    /// Splits a full leaf into old (left) and new (right) halves, 7 cells
    /// each, inserting the new key/row into whichever half it belongs in.
    /// The new leaf is linked in as `old.next_leaf`, preserving scan order.
    fn leaf_split_and_insert(
        &mut self,
        old_page_num: u32,
        cell_num: u32,
        key: u32,
        row: &Row,
    ) -> Result<(), StorageError> {
        let new_page_num = self.pager.unused_page_num();
        let old_is_root = self.pager.get(old_page_num)?.is_root();
        let old_next_leaf = self.pager.get(old_page_num)?.leaf_next_leaf();
        let old_parent = self.pager.get(old_page_num)?.parent_page();

        {
            let new_page = self.pager.get(new_page_num)?;
            new_page.initialize_leaf();
        }

        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);

        // Walk every cell position right-to-left across both pages,
        // copying from the old page except at the insertion point.
        for i in (0..=LEAF_NODE_MAX_CELLS as u32).rev() {
            let destination_page_num = if i >= LEAF_NODE_LEFT_SPLIT_COUNT as u32 {
                new_page_num
            } else {
                old_page_num
            };
            let index_within_page = i % LEAF_NODE_LEFT_SPLIT_COUNT as u32;

            if i == cell_num {
                let page = self.pager.get(destination_page_num)?;
                page.set_leaf_key(index_within_page, key);
                page.set_leaf_value(index_within_page, &buf);
            } else {
                let src_index = if i > cell_num { i - 1 } else { i };
                let mut src_val = [0u8; ROW_SIZE];
                let src_key = {
                    let old_page = self.pager.get(old_page_num)?;
                    src_val.copy_from_slice(old_page.leaf_value(src_index));
                    old_page.leaf_key(src_index)
                };
                let dest_page = self.pager.get(destination_page_num)?;
                dest_page.set_leaf_key(index_within_page, src_key);
                dest_page.set_leaf_value(index_within_page, &src_val);
            }
        }

        self.pager
            .get(old_page_num)?
            .set_leaf_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32);
        self.pager
            .get(new_page_num)?
            .set_leaf_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
        self.pager.get(new_page_num)?.set_parent_page(old_parent);
        self.pager.get(new_page_num)?.set_leaf_next_leaf(old_next_leaf);
        self.pager.get(old_page_num)?.set_leaf_next_leaf(new_page_num);

        debug!(old_page_num, new_page_num, "split leaf node");

        if old_is_root {
            self.create_new_root(new_page_num)
        } else {
            // The new page inherited the pre-split max key; the old page's
            // max shrank once the upper half of its cells moved out. Fix up
            // the parent's stale routing entry before inserting the new
            // child, so the two never momentarily share a routing key.
            let stale_max_key = self.get_node_max_key(new_page_num)?;
            let shrunk_max_key = self.get_node_max_key(old_page_num)?;
            let parent_page_num = old_parent;
            self.pager
                .get(parent_page_num)?
                .update_internal_key(stale_max_key, shrunk_max_key);
            self.pager
                .get(new_page_num)?
                .set_parent_page(parent_page_num);
            self.internal_insert(parent_page_num, new_page_num)
        }
    }

    /// Creates a brand-new internal root over `old_root` (still resident
    /// at page 0) and `right_child`, copying the old root's contents into
    /// a freshly allocated page first. Page 0 must remain the root
    /// forever, so this is the only way the tree grows in height.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<(), StorageError> {
        let left_child_page_num = self.pager.unused_page_num();

        {
            let root = self.pager.get(self.root_page_num)?;
            let root_bytes = root.bytes;
            let left_child = self.pager.get(left_child_page_num)?;
            left_child.bytes = root_bytes;
            left_child.set_is_root(false);
        }

        // If the node being promoted was itself internal (this is a second
        // or later root split), its children still point at the old root
        // page number. Re-parent every one of them to left_child_page_num
        // before anything else reads or splits this subtree.
        if self.pager.get(left_child_page_num)?.node_type()? == NodeType::Internal {
            let num_keys = self.pager.get(left_child_page_num)?.internal_num_keys();
            for i in 0..num_keys {
                let child = self.pager.get(left_child_page_num)?.internal_child(i)?;
                self.pager.get(child)?.set_parent_page(left_child_page_num);
            }
            let right_child = self.pager.get(left_child_page_num)?.internal_right_child();
            self.pager.get(right_child)?.set_parent_page(left_child_page_num);
        }

        let left_max_key = self.get_node_max_key(left_child_page_num)?;

        let root = self.pager.get(self.root_page_num)?;
        root.initialize_internal();
        root.set_is_root(true);
        root.set_internal_num_keys(1);
        root.set_internal_child(0, left_child_page_num);
        root.set_internal_key(0, left_max_key);
        root.set_internal_right_child(right_child_page_num);

        self.pager
            .get(left_child_page_num)?
            .set_parent_page(self.root_page_num);
        self.pager
            .get(right_child_page_num)?
            .set_parent_page(self.root_page_num);

        info!(left_child_page_num, right_child_page_num, "split root, tree grew by one level");
        Ok(())
    }

    fn get_node_max_key(&mut self, page_num: u32) -> Result<u32, StorageError> {
        let page = self.pager.get(page_num)?;
        match page.node_type()? {
            NodeType::Leaf => Ok(page.leaf_key(page.leaf_num_cells().saturating_sub(1))),
            NodeType::Internal => {
                let num_keys = page.internal_num_keys();
                if num_keys == 0 {
                    // An internal node can only be briefly keyless, between
                    // create_new_root initializing it and its first key
                    // being set a few lines later.
                    Ok(page.internal_key(0))
                } else {
                    Ok(page.internal_key(num_keys - 1))
                }
            }
        }
    }

    /// Adds `child_page_num` as a new child of `parent_page_num`, splitting
    /// the parent first if it's already at `INTERNAL_NODE_MAX_CELLS`.
    fn internal_insert(&mut self, parent_page_num: u32, child_page_num: u32) -> Result<(), StorageError> {
        let child_max_key = self.get_node_max_key(child_page_num)?;
        let (num_keys, right_child) = {
            let parent = self.pager.get(parent_page_num)?;
            (parent.internal_num_keys(), parent.internal_right_child())
        };

        if num_keys >= INTERNAL_NODE_MAX_CELLS {
            return self.internal_split_and_insert(parent_page_num, child_page_num);
        }

        let right_child_max_key = self.get_node_max_key(right_child)?;
        let index = {
            let parent = self.pager.get(parent_page_num)?;
            parent.find_child_index(child_max_key)
        };

        if child_max_key > right_child_max_key {
            // The new child becomes the rightmost subtree; the node that
            // used to hold that slot moves into the last key cell.
            let parent = self.pager.get(parent_page_num)?;
            parent.set_internal_child(num_keys, right_child);
            parent.set_internal_key(num_keys, right_child_max_key);
            parent.set_internal_right_child(child_page_num);
        } else {
            let parent = self.pager.get(parent_page_num)?;
            for i in (index..num_keys).rev() {
                parent.copy_internal_cell(i, i + 1);
            }
            parent.set_internal_child(index, child_page_num);
            parent.set_internal_key(index, child_max_key);
        }

        let parent = self.pager.get(parent_page_num)?;
        parent.set_internal_num_keys(num_keys + 1);
        self.pager.get(child_page_num)?.set_parent_page(parent_page_num);
        Ok(())
    }

    /// Splits a full internal node in two and bubbles the new sibling up
    /// into the grandparent, recursing (via `internal_insert`) if that
    /// node is itself full, and finally calling `create_new_root` when
    /// the split reaches the root.
    fn internal_split_and_insert(
        &mut self,
        old_page_num: u32,
        child_page_num: u32,
    ) -> Result<(), StorageError> {
        let old_is_root = self.pager.get(old_page_num)?.is_root();
        let old_parent = self.pager.get(old_page_num)?.parent_page();
        let child_max_key = self.get_node_max_key(child_page_num)?;

        let new_page_num = self.pager.unused_page_num();
        self.pager.get(new_page_num)?.initialize_internal();

        // Gather all num_keys+1 children (num_keys from the cell table,
        // plus the old right child) together with the new child, sorted
        // by max key, then redistribute across old/new evenly.
        let num_keys = self.pager.get(old_page_num)?.internal_num_keys();
        let mut entries: Vec<(u32, u32)> = Vec::with_capacity(num_keys as usize + 2);
        for i in 0..num_keys {
            let page = self.pager.get(old_page_num)?;
            let child = page.internal_child(i)?;
            drop(page);
            let max_key = self.get_node_max_key(child)?;
            entries.push((max_key, child));
        }
        let old_right_child = self.pager.get(old_page_num)?.internal_right_child();
        let old_right_max = self.get_node_max_key(old_right_child)?;
        entries.push((old_right_max, old_right_child));
        entries.push((child_max_key, child_page_num));
        entries.sort_by_key(|e| e.0);

        let split_at = entries.len() / 2;
        let (left_entries, right_entries) = entries.split_at(split_at);
        let (right_entries_body, right_rightmost) = right_entries.split_at(right_entries.len() - 1);

        {
            let old_page = self.pager.get(old_page_num)?;
            old_page.initialize_internal();
            for (i, (max_key, child)) in left_entries[..left_entries.len() - 1].iter().enumerate() {
                old_page.set_internal_child(i as u32, *child);
                old_page.set_internal_key(i as u32, *max_key);
            }
            old_page.set_internal_num_keys(left_entries.len() as u32 - 1);
            old_page.set_internal_right_child(left_entries.last().unwrap().1);
        }
        let old_max_key = left_entries.last().unwrap().0;

        {
            let new_page = self.pager.get(new_page_num)?;
            for (i, (max_key, child)) in right_entries_body.iter().enumerate() {
                new_page.set_internal_child(i as u32, *child);
                new_page.set_internal_key(i as u32, *max_key);
            }
            new_page.set_internal_num_keys(right_entries_body.len() as u32);
            new_page.set_internal_right_child(right_rightmost[0].1);
        }
        let new_max_key = right_rightmost[0].0;

        for (_, child) in left_entries {
            self.pager.get(*child)?.set_parent_page(old_page_num);
        }
        for (_, child) in right_entries {
            self.pager.get(*child)?.set_parent_page(new_page_num);
        }

        debug!(old_page_num, new_page_num, "split internal node");

        if old_is_root {
            self.create_new_root(new_page_num)
        } else {
            self.pager.get(new_page_num)?.set_parent_page(old_parent);
            // `new_max_key` is the pre-split max the grandparent still has
            // on file for `old_page_num`; entries are sorted, so the right
            // half always ends up holding it.
            self.pager
                .get(old_parent)?
                .update_internal_key(new_max_key, old_max_key);
            self.internal_insert(old_parent, new_page_num)
        }
    }

    pub fn select(&mut self) -> Result<Vec<Row>, StorageError> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(&mut self.pager, self.root_page_num)?;
        while !cursor.end_of_table {
            rows.push(cursor.value()?);
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Indented depth-first dump matching the `.btree` meta-command's format.
    pub fn print_tree(&mut self) -> Result<String, StorageError> {
        let mut out = String::new();
        self.print_node(self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn print_node(&mut self, page_num: u32, indent: usize, out: &mut String) -> Result<(), StorageError> {
        let pad = "  ".repeat(indent);
        let node_type = self.pager.get(page_num)?.node_type()?;
        match node_type {
            NodeType::Leaf => {
                let num_cells = self.pager.get(page_num)?.leaf_num_cells();
                out.push_str(&format!("{}- leaf (size {})\n", pad, num_cells));
                for i in 0..num_cells {
                    let key = self.pager.get(page_num)?.leaf_key(i);
                    out.push_str(&format!("{}  - {}\n", pad, key));
                }
            }
            NodeType::Internal => {
                let num_keys = self.pager.get(page_num)?.internal_num_keys();
                out.push_str(&format!("{}- internal (size {})\n", pad, num_keys));
                for i in 0..num_keys {
                    let child = self.pager.get(page_num)?.internal_child(i)?;
                    self.print_node(child, indent + 1, out)?;
                    let key = self.pager.get(page_num)?.internal_key(i);
                    out.push_str(&format!("{}  - key {}\n", pad, key));
                }
                let right_child = self.pager.get(page_num)?.internal_right_child();
                self.print_node(right_child, indent + 1, out)?;
            }
        }
        Ok(())
    }

    /// Backing values for the `.constants` meta-command.
    pub fn constants() -> String {
        format!(
            "ROW_SIZE: {}\nCOMMON_NODE_HEADER_SIZE: {}\nLEAF_NODE_HEADER_SIZE: {}\nLEAF_NODE_CELL_SIZE: {}\nLEAF_NODE_SPACE_FOR_CELLS: {}\nLEAF_NODE_MAX_CELLS: {}",
            ROW_SIZE,
            PAGE_SIZE - LEAF_NODE_SPACE_FOR_CELLS - 8,
            LEAF_NODE_HEADER_SIZE,
            LEAF_NODE_CELL_SIZE,
            LEAF_NODE_SPACE_FOR_CELLS,
            LEAF_NODE_MAX_CELLS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_temp() -> (Table, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let table = Table::open(tmp.path()).unwrap();
        (table, tmp)
    }

    fn row(id: u32) -> Row {
        Row::new(id as i64, &format!("user{}", id), &format!("user{}@x.com", id)).unwrap()
    }

    #[test]
    fn insert_and_select_round_trips() {
        let (mut table, _tmp) = open_temp();
        table.insert(&row(3)).unwrap();
        table.insert(&row(1)).unwrap();
        table.insert(&row(2)).unwrap();
        let rows = table.select().unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let (mut table, _tmp) = open_temp();
        table.insert(&row(1)).unwrap();
        assert!(matches!(
            table.insert(&row(1)).unwrap_err(),
            InsertError::Duplicate
        ));
    }

    #[test]
    fn leaf_splits_once_fourteen_rows_are_inserted() {
        let (mut table, _tmp) = open_temp();
        for id in 1..=13u32 {
            table.insert(&row(id)).unwrap();
        }
        let tree_before = table.print_tree().unwrap();
        assert!(tree_before.contains("leaf (size 13)"));

        table.insert(&row(14)).unwrap();
        let tree_after = table.print_tree().unwrap();
        assert!(tree_after.contains("internal (size 1)"));
        assert_eq!(table.select().unwrap().len(), 14);
    }

    #[test]
    fn a_large_scan_survives_multiple_leaf_splits() {
        let (mut table, _tmp) = open_temp();
        for id in 1..=100u32 {
            table.insert(&row(id)).unwrap();
        }
        let rows = table.select().unwrap();
        assert_eq!(rows.len(), 100);
        assert_eq!(rows.first().unwrap().id, 1);
        assert_eq!(rows.last().unwrap().id, 100);
    }

    #[test]
    fn data_survives_close_and_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(tmp.path()).unwrap();
            for id in 1..=20u32 {
                table.insert(&row(id)).unwrap();
            }
            table.close().unwrap();
        }
        {
            let mut table = Table::open(tmp.path()).unwrap();
            let rows = table.select().unwrap();
            assert_eq!(rows.len(), 20);
        }
    }
}
