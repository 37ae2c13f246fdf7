use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::UFS_BLOCK_SIZE;

/// API the engine drives a disk through. Writes issued between
/// `begin_transaction` and `commit` are buffered and become visible
/// atomically on `commit`; a transaction abandoned before `commit`
/// leaves the disk untouched. The engine never reads inside a
/// transaction, so reads always return committed state.
pub trait BlockDevice: Send + Sync {
  /// read block `block_id` into `buf`
  fn read_block(&self, block_id: usize, buf: &mut [u8]);

  /// write `buf` to block `block_id`
  fn write_block(&self, block_id: usize, buf: &[u8]);

  fn begin_transaction(&self);

  fn commit(&self);
}

struct FileDiskInner {
  file: File,
  pending: Option<Vec<(usize, Vec<u8>)>>,
}

/// A flat image file treated as a sequence of fixed-size blocks.
pub struct FileDisk(Mutex<FileDiskInner>);

impl FileDisk {
  /// Open an existing image.
  pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<FileDisk> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(FileDisk(Mutex::new(FileDiskInner {
      file,
      pending: None,
    })))
  }

  /// Create (or truncate) an image of `total_blocks` zeroed blocks.
  pub fn create<P: AsRef<Path>>(path: P, total_blocks: usize) -> std::io::Result<FileDisk> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(path)?;
    file.set_len((total_blocks * UFS_BLOCK_SIZE) as u64)?;
    Ok(FileDisk(Mutex::new(FileDiskInner {
      file,
      pending: None,
    })))
  }
}

impl BlockDevice for FileDisk {
  fn read_block(&self, block_id: usize, buf: &mut [u8]) {
    let mut inner = self.0.lock().unwrap();
    inner
      .file
      .seek(SeekFrom::Start((block_id * UFS_BLOCK_SIZE) as u64))
      .expect("error when seeking");
    inner.file.read_exact(buf).expect("not a complete block");
  }

  fn write_block(&self, block_id: usize, buf: &[u8]) {
    let mut inner = self.0.lock().unwrap();
    if let Some(pending) = inner.pending.as_mut() {
      pending.push((block_id, buf.to_vec()));
      return;
    }
    inner
      .file
      .seek(SeekFrom::Start((block_id * UFS_BLOCK_SIZE) as u64))
      .expect("error when seeking");
    inner.file.write_all(buf).expect("not a complete block");
  }

  fn begin_transaction(&self) {
    let mut inner = self.0.lock().unwrap();
    inner.pending = Some(Vec::new());
  }

  fn commit(&self) {
    let mut inner = self.0.lock().unwrap();
    let writes = inner.pending.take().unwrap_or_default();
    for (block_id, data) in writes {
      inner
        .file
        .seek(SeekFrom::Start((block_id * UFS_BLOCK_SIZE) as u64))
        .expect("error when seeking");
      inner.file.write_all(&data).expect("not a complete block");
    }
    inner.file.flush().expect("error when flushing");
  }
}

struct MemDiskInner {
  blocks: Vec<u8>,
  pending: Option<Vec<(usize, Vec<u8>)>>,
}

/// An in-memory disk with the same transaction semantics as `FileDisk`,
/// so tests can substitute it for the real image.
pub struct MemDisk(Mutex<MemDiskInner>);

impl MemDisk {
  pub fn new(total_blocks: usize) -> MemDisk {
    MemDisk(Mutex::new(MemDiskInner {
      blocks: vec![0; total_blocks * UFS_BLOCK_SIZE],
      pending: None,
    }))
  }

  /// Snapshot of the committed image bytes.
  pub fn image(&self) -> Vec<u8> {
    self.0.lock().unwrap().blocks.clone()
  }
}

impl BlockDevice for MemDisk {
  fn read_block(&self, block_id: usize, buf: &mut [u8]) {
    let inner = self.0.lock().unwrap();
    let start = block_id * UFS_BLOCK_SIZE;
    buf.copy_from_slice(&inner.blocks[start..start + UFS_BLOCK_SIZE]);
  }

  fn write_block(&self, block_id: usize, buf: &[u8]) {
    let mut inner = self.0.lock().unwrap();
    if let Some(pending) = inner.pending.as_mut() {
      pending.push((block_id, buf.to_vec()));
      return;
    }
    let start = block_id * UFS_BLOCK_SIZE;
    inner.blocks[start..start + UFS_BLOCK_SIZE].copy_from_slice(buf);
  }

  fn begin_transaction(&self) {
    let mut inner = self.0.lock().unwrap();
    inner.pending = Some(Vec::new());
  }

  fn commit(&self) {
    let mut inner = self.0.lock().unwrap();
    let writes = inner.pending.take().unwrap_or_default();
    for (block_id, data) in writes {
      let start = block_id * UFS_BLOCK_SIZE;
      inner.blocks[start..start + UFS_BLOCK_SIZE].copy_from_slice(&data);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mem_disk_read_write() {
    let disk = MemDisk::new(4);
    let block = [0x42u8; UFS_BLOCK_SIZE];
    disk.write_block(2, &block);

    let mut read = [0u8; UFS_BLOCK_SIZE];
    disk.read_block(2, &mut read);
    assert_eq!(read, block);
  }

  #[test]
  fn transaction_buffers_until_commit() {
    let disk = MemDisk::new(2);
    let block = [7u8; UFS_BLOCK_SIZE];

    disk.begin_transaction();
    disk.write_block(1, &block);

    let mut read = [1u8; UFS_BLOCK_SIZE];
    disk.read_block(1, &mut read);
    assert_eq!(read, [0u8; UFS_BLOCK_SIZE]);

    disk.commit();
    disk.read_block(1, &mut read);
    assert_eq!(read, block);
  }

  #[test]
  fn abandoned_transaction_is_discarded() {
    let disk = MemDisk::new(2);
    let before = disk.image();

    disk.begin_transaction();
    disk.write_block(0, &[9u8; UFS_BLOCK_SIZE]);
    disk.begin_transaction();
    disk.commit();

    assert_eq!(disk.image(), before);
  }

  #[test]
  fn file_disk_read_write() {
    let path = std::env::temp_dir().join("ufs-file-disk-test.img");
    let disk = FileDisk::create(&path, 8).unwrap();

    let block = [0x5au8; UFS_BLOCK_SIZE];
    disk.begin_transaction();
    disk.write_block(3, &block);
    disk.commit();

    let reopened = FileDisk::open(&path).unwrap();
    let mut read = [0u8; UFS_BLOCK_SIZE];
    reopened.read_block(3, &mut read);
    assert_eq!(read, block);

    std::fs::remove_file(&path).unwrap();
  }
}
