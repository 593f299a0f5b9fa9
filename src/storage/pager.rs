//! Demand-loaded page cache backed by a single on-disk file.
//!
//! Pages are read from disk the first time they're requested and kept in
//! an in-memory slot until `close_all` flushes everything back. There is
//! no write-ahead log and no intermediate durability: a crash mid-session
//! loses whatever hasn't been flushed.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace, warn};

use super::node::{Page, INVALID_PAGE_NUM, PAGE_SIZE, TABLE_MAX_PAGES};
use crate::errors::StorageError;

pub struct Pager {
    file: File,
    /// Pages backed by the file on disk at open time. Fixed for the life of
    /// the pager; used only to decide whether a cache miss reads from disk
    /// or starts from a blank page.
    file_length_pages: u32,
    /// Total logical pages, including ones allocated this session that
    /// haven't been flushed yet. This, not cache residency, is what
    /// `unused_page_num` hands out: a page can exist on disk (counted here)
    /// without ever having been brought into `pages` this session.
    num_pages: u32,
    /// One slot per page ever touched this session; `None` until first load.
    pages: Vec<Option<Box<Page>>>,
}

impl Pager {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupt(format!(
                "db file length {} is not a multiple of the page size",
                file_len
            )));
        }
        let file_length_pages = (file_len / PAGE_SIZE as u64) as u32;
        debug!(pages = file_length_pages, "opened pager");
        Ok(Pager {
            file,
            file_length_pages,
            num_pages: file_length_pages,
            pages: Vec::new(),
        })
    }

    pub fn num_pages_on_disk(&self) -> u32 {
        self.file_length_pages
    }

    /// Number of cache slots ever touched this session. Not the same as the
    /// database's logical page count after a reopen — see `unused_page_num`.
    pub fn num_pages_resident(&self) -> u32 {
        self.pages.len() as u32
    }

    fn ensure_capacity(&mut self, page_num: u32) -> Result<(), StorageError> {
        if page_num >= TABLE_MAX_PAGES {
            return Err(StorageError::PageOutOfBounds {
                page_num,
                max: TABLE_MAX_PAGES,
            });
        }
        if page_num as usize >= self.pages.len() {
            self.pages.resize_with(page_num as usize + 1, || None);
        }
        Ok(())
    }

    /// Returns a mutable reference to `page_num`, loading it from disk on
    /// first touch. Pages beyond the file's current length are returned
    /// zeroed — the caller is expected to initialize them.
    pub fn get(&mut self, page_num: u32) -> Result<&mut Page, StorageError> {
        self.ensure_capacity(page_num)?;
        if self.pages[page_num as usize].is_none() {
            let mut page = Box::new(Page::zeroed());
            if page_num < self.file_length_pages {
                trace!(page_num, "cache miss, reading from disk");
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut page.bytes)?;
            } else {
                trace!(page_num, "allocating blank page");
            }
            self.pages[page_num as usize] = Some(page);
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// The next unused page number: one past the highest logical page this
    /// database has, whether or not that page has been brought into the
    /// cache yet. A page that exists on disk but hasn't been touched this
    /// session is still a taken page number — handing it out again would
    /// silently overwrite real rows once that page was finally loaded.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    pub fn flush(&mut self, page_num: u32) -> Result<(), StorageError> {
        let page = self.pages[page_num as usize]
            .as_ref()
            .ok_or(StorageError::PageNotResident(page_num))?;
        trace!(page_num, "flushing page");
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&page.bytes)?;
        Ok(())
    }

    /// Flushes every resident page exactly once and syncs the file to
    /// disk. The reference implementation flushes a possible half-full
    /// trailing leaf a second time after the main loop; that was redundant
    /// since every resident page is already covered here.
    pub fn close_all(&mut self) -> Result<(), StorageError> {
        let resident: Vec<u32> = self
            .pages
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|_| i as u32))
            .collect();
        for page_num in resident {
            if let Err(e) = self.flush(page_num) {
                warn!(page_num, error = %e, "failed to flush page on close");
                return Err(e);
            }
        }
        self.file.sync_all()?;
        debug!("pager closed, all resident pages flushed");
        Ok(())
    }

    pub fn is_valid_page(page_num: u32) -> bool {
        page_num != INVALID_PAGE_NUM && page_num < TABLE_MAX_PAGES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_temp() -> (Pager, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Pager::open(tmp.path()).unwrap();
        (pager, tmp)
    }

    #[test]
    fn fresh_file_has_no_pages() {
        let (pager, _tmp) = open_temp();
        assert_eq!(pager.num_pages_on_disk(), 0);
        assert_eq!(pager.unused_page_num(), 0);
    }

    #[test]
    fn get_allocates_blank_pages_beyond_disk_length() {
        let (mut pager, _tmp) = open_temp();
        let page = pager.get(0).unwrap();
        assert_eq!(page.bytes, [0u8; PAGE_SIZE]);
    }

    #[test]
    fn page_beyond_table_max_pages_is_rejected() {
        let (mut pager, _tmp) = open_temp();
        let result = pager.get(TABLE_MAX_PAGES);
        assert!(matches!(
            result,
            Err(StorageError::PageOutOfBounds { .. })
        ));
    }

    #[test]
    fn writes_survive_a_close_and_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            let page = pager.get(0).unwrap();
            page.initialize_leaf();
            page.set_leaf_num_cells(3);
            pager.close_all().unwrap();
        }
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            assert_eq!(pager.num_pages_on_disk(), 1);
            let page = pager.get(0).unwrap();
            assert_eq!(page.leaf_num_cells(), 3);
        }
    }

    #[test]
    fn flush_of_non_resident_page_is_an_error() {
        let (mut pager, _tmp) = open_temp();
        assert!(matches!(
            pager.flush(0),
            Err(StorageError::PageNotResident(0))
        ));
    }
}
