use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{PageId, Result, PAGE_SIZE};

/// DiskManager is the paged store: durable fixed-block storage over a single
/// file, addressed by page identifier. Page `p` occupies byte range
/// `[p * PAGE_SIZE, (p + 1) * PAGE_SIZE)`. The file has no header, no
/// checksums and no free list.
pub struct DiskManager {
    /// The backing database file
    db_file: Mutex<std::fs::File>,
    /// Path to the backing file
    db_path: String,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the backing file for read+write, truncating any existing
    /// content. The engine always starts from an empty store; the file is
    /// created if it does not exist. Failure here is fatal to construction.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&db_path)?;

        Ok(Self {
            db_file: Mutex::new(file),
            db_path: path_str,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Reads a page from disk into the provided buffer, which must be
    /// exactly PAGE_SIZE bytes. Reading beyond the end of the file
    /// zero-fills the tail: a page that was allocated but never flushed
    /// reads back as zeros.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!(page = page_id.as_u32(), "read page from disk");
        Ok(())
    }

    /// Writes a page to disk from the provided buffer, which must be
    /// exactly PAGE_SIZE bytes. The write is flushed before returning;
    /// I/O failures surface as an error rather than passing silently.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(page = page_id.as_u32(), "wrote page to disk");
        Ok(())
    }

    /// Forces all written data down to the device.
    pub fn sync(&self) -> Result<()> {
        let file = self.db_file.lock();
        file.sync_all()?;
        Ok(())
    }

    /// Returns the number of page reads performed.
    pub fn read_count(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn write_count(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the path to the backing file.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.db_file.get_mut();
        let _ = file.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_manager_new() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();
        assert_eq!(dm.read_count(), 0);
        assert_eq!(dm.write_count(), 0);
    }

    #[test]
    fn test_disk_manager_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(PageId::new(0), &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(0), &mut read_data).unwrap();

        assert_eq!(read_data, write_data);
        assert_eq!(dm.read_count(), 1);
        assert_eq!(dm.write_count(), 1);
    }

    #[test]
    fn test_disk_manager_page_offsets_independent() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let mut page0 = [0u8; PAGE_SIZE];
        page0.fill(0xAA);
        let mut page2 = [0u8; PAGE_SIZE];
        page2.fill(0xBB);

        dm.write_page(PageId::new(0), &page0).unwrap();
        dm.write_page(PageId::new(2), &page2).unwrap();

        let mut buf = [1u8; PAGE_SIZE];
        dm.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf[0], 0xAA);

        dm.read_page(PageId::new(2), &mut buf).unwrap();
        assert_eq!(buf[0], 0xBB);
    }

    #[test]
    fn test_disk_manager_read_past_eof_zero_fills() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        // Page 1 in the hole between page 0 and page 2, page 7 past the end
        let data = [0x55u8; PAGE_SIZE];
        dm.write_page(PageId::new(0), &data).unwrap();

        let mut buf = [1u8; PAGE_SIZE];
        dm.read_page(PageId::new(7), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_truncates_existing_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let dm = DiskManager::new(&path).unwrap();
            let data = [7u8; PAGE_SIZE];
            dm.write_page(PageId::new(0), &data).unwrap();
        }

        // Reopening wipes the previous content
        let dm = DiskManager::new(&path).unwrap();
        let mut buf = [1u8; PAGE_SIZE];
        dm.read_page(PageId::new(0), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }
}
