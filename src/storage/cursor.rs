//! A `Cursor` names a single cell position in the tree: `(page_num,
//! cell_num)`, plus a flag for "one past the last cell of the last leaf".
//! `find` descends from the root; `advance` walks forward across leaf
//! boundaries via `next_leaf`, so a full scan never needs to revisit the
//! internal nodes at all.

use tracing::trace;

use super::node::NodeType;
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::StorageError;

pub struct Cursor<'a> {
    pager: &'a mut Pager,
    pub page_num: u32,
    pub cell_num: u32,
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions the cursor at the cell `key` would occupy, whether or not
    /// it's already present: descends internal nodes via binary search,
    /// then binary-searches the leaf for the insertion point.
    pub fn find(pager: &'a mut Pager, root_page_num: u32, key: u32) -> Result<Self, StorageError> {
        let mut page_num = root_page_num;
        loop {
            let node_type = pager.get(page_num)?.node_type()?;
            match node_type {
                NodeType::Leaf => {
                    let cell_num = pager.get(page_num)?.leaf_find(key);
                    let end_of_table = pager.get(page_num)?.leaf_num_cells() == cell_num
                        && pager.get(page_num)?.leaf_next_leaf() == 0;
                    return Ok(Cursor {
                        pager,
                        page_num,
                        cell_num,
                        end_of_table,
                    });
                }
                NodeType::Internal => {
                    let child_index = pager.get(page_num)?.find_child_index(key);
                    let child_page = pager.get(page_num)?.internal_child(child_index)?;
                    trace!(page_num, child_index, child_page, "descending internal node");
                    page_num = child_page;
                }
            }
        }
    }

    /// The leftmost cell of the leftmost leaf, used to start a full scan.
    pub fn start(pager: &'a mut Pager, root_page_num: u32) -> Result<Self, StorageError> {
        let mut cursor = Cursor::find(pager, root_page_num, 0)?;
        let num_cells = cursor.pager.get(cursor.page_num)?.leaf_num_cells();
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    pub fn value(&mut self) -> Result<Row, StorageError> {
        let page = self.pager.get(self.page_num)?;
        Ok(Row::deserialize(page.leaf_value(self.cell_num)))
    }

    pub fn insert(&mut self, key: u32, row: &Row) -> Result<(), StorageError> {
        let page = self.pager.get(self.page_num)?;
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        page.set_leaf_key(self.cell_num, key);
        page.set_leaf_value(self.cell_num, &buf);
        Ok(())
    }

    /// Moves one cell forward, following the leaf's `next_leaf` pointer
    /// when the current leaf is exhausted. A `next_leaf` of 0 means there
    /// is no right sibling, since page 0 is always the root.
    pub fn advance(&mut self) -> Result<(), StorageError> {
        let page = self.pager.get(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= page.leaf_num_cells() {
            let next_leaf = page.leaf_next_leaf();
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        self.pager
    }
}
