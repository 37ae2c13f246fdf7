//! On-disk layout: superblock, inode and directory entry records.
//!
//! All multi-byte fields are 32-bit little-endian two's complement;
//! `-1` marks an absent direct pointer or a vacant directory entry.

use crate::{DIRECT_PTRS, DIR_ENT_NAME_SIZE, UFS_BLOCK_SIZE};

/// size of an on-disk inode record
pub const INODE_SZ: usize = 128;
/// size of a directory entry
pub const DIRENT_SZ: usize = 32;

const UFS_DIRECTORY: i32 = 0;
const UFS_REGULAR_FILE: i32 = 1;

fn read_i32(buf: &[u8], offset: usize) -> i32 {
  i32::from_le_bytes([
    buf[offset],
    buf[offset + 1],
    buf[offset + 2],
    buf[offset + 3],
  ])
}

fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
  buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// File-system header at block 0. Addresses and lengths are in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
  pub inode_bitmap_addr: i32,
  pub inode_bitmap_len: i32,
  pub data_bitmap_addr: i32,
  pub data_bitmap_len: i32,
  pub inode_region_addr: i32,
  pub inode_region_len: i32,
  pub data_region_addr: i32,
  pub data_region_len: i32,
  pub num_inodes: i32,
  pub num_data: i32,
}

impl SuperBlock {
  /// Compute the region layout for a fresh image: superblock, inode
  /// bitmap, data bitmap, inode region, data region, all adjacent.
  pub fn new(num_inodes: usize, num_data: usize) -> SuperBlock {
    let bits_per_block = UFS_BLOCK_SIZE * 8;
    let inode_bitmap_len = num_inodes.div_ceil(bits_per_block);
    let data_bitmap_len = num_data.div_ceil(bits_per_block);
    let inode_region_len = (num_inodes * INODE_SZ).div_ceil(UFS_BLOCK_SIZE);

    let inode_bitmap_addr = 1;
    let data_bitmap_addr = inode_bitmap_addr + inode_bitmap_len;
    let inode_region_addr = data_bitmap_addr + data_bitmap_len;
    let data_region_addr = inode_region_addr + inode_region_len;

    SuperBlock {
      inode_bitmap_addr: inode_bitmap_addr as i32,
      inode_bitmap_len: inode_bitmap_len as i32,
      data_bitmap_addr: data_bitmap_addr as i32,
      data_bitmap_len: data_bitmap_len as i32,
      inode_region_addr: inode_region_addr as i32,
      inode_region_len: inode_region_len as i32,
      data_region_addr: data_region_addr as i32,
      data_region_len: num_data as i32,
      num_inodes: num_inodes as i32,
      num_data: num_data as i32,
    }
  }

  /// Image size in blocks, data region included.
  pub fn total_blocks(&self) -> usize {
    (self.data_region_addr + self.num_data) as usize
  }

  pub fn read_from(buf: &[u8]) -> SuperBlock {
    SuperBlock {
      inode_bitmap_addr: read_i32(buf, 0),
      inode_bitmap_len: read_i32(buf, 4),
      data_bitmap_addr: read_i32(buf, 8),
      data_bitmap_len: read_i32(buf, 12),
      inode_region_addr: read_i32(buf, 16),
      inode_region_len: read_i32(buf, 20),
      data_region_addr: read_i32(buf, 24),
      data_region_len: read_i32(buf, 28),
      num_inodes: read_i32(buf, 32),
      num_data: read_i32(buf, 36),
    }
  }

  pub fn write_to(&self, buf: &mut [u8]) {
    write_i32(buf, 0, self.inode_bitmap_addr);
    write_i32(buf, 4, self.inode_bitmap_len);
    write_i32(buf, 8, self.data_bitmap_addr);
    write_i32(buf, 12, self.data_bitmap_len);
    write_i32(buf, 16, self.inode_region_addr);
    write_i32(buf, 20, self.inode_region_len);
    write_i32(buf, 24, self.data_region_addr);
    write_i32(buf, 28, self.data_region_len);
    write_i32(buf, 32, self.num_inodes);
    write_i32(buf, 36, self.num_data);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
  File,
  Directory,
}

impl InodeType {
  pub fn raw(self) -> i32 {
    match self {
      InodeType::Directory => UFS_DIRECTORY,
      InodeType::File => UFS_REGULAR_FILE,
    }
  }
}

/// Fixed-size record describing one file or directory. `type_` is kept
/// raw so that stale records of freed inodes round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
  pub type_: i32,
  pub size: i32,
  pub direct: [i32; DIRECT_PTRS],
}

impl Inode {
  /// The all-zero record a freshly formatted inode region is filled with.
  pub fn zeroed() -> Inode {
    Inode {
      type_: 0,
      size: 0,
      direct: [0; DIRECT_PTRS],
    }
  }

  pub fn is_dir(&self) -> bool {
    self.type_ == UFS_DIRECTORY
  }

  pub fn is_file(&self) -> bool {
    self.type_ == UFS_REGULAR_FILE
  }

  /// blocks holding this inode's data
  pub fn data_blocks(&self) -> usize {
    (self.size as usize).div_ceil(UFS_BLOCK_SIZE)
  }

  pub fn read_from(buf: &[u8]) -> Inode {
    let mut direct = [0i32; DIRECT_PTRS];
    for (i, ptr) in direct.iter_mut().enumerate() {
      *ptr = read_i32(buf, 8 + i * 4);
    }
    Inode {
      type_: read_i32(buf, 0),
      size: read_i32(buf, 4),
      direct,
    }
  }

  pub fn write_to(&self, buf: &mut [u8]) {
    write_i32(buf, 0, self.type_);
    write_i32(buf, 4, self.size);
    for (i, ptr) in self.direct.iter().enumerate() {
      write_i32(buf, 8 + i * 4, *ptr);
    }
  }
}

/// A `(name, inum)` pair stored in a directory's data blocks. Names are
/// zero-padded; the bytes up to the first zero are the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
  pub name: [u8; DIR_ENT_NAME_SIZE],
  pub inum: i32,
}

impl DirEntry {
  pub fn vacant() -> DirEntry {
    DirEntry {
      name: [0; DIR_ENT_NAME_SIZE],
      inum: -1,
    }
  }

  /// Callers validate name length before building an entry.
  pub fn new(name: &str, inum: i32) -> DirEntry {
    debug_assert!(name.len() < DIR_ENT_NAME_SIZE);
    let mut bytes = [0u8; DIR_ENT_NAME_SIZE];
    bytes[..name.len()].copy_from_slice(name.as_bytes());
    DirEntry { name: bytes, inum }
  }

  /// Name bytes up to the first zero.
  pub fn name_bytes(&self) -> &[u8] {
    let len = self
      .name
      .iter()
      .position(|b| *b == 0)
      .unwrap_or(DIR_ENT_NAME_SIZE);
    &self.name[..len]
  }

  pub fn name(&self) -> String {
    String::from_utf8_lossy(self.name_bytes()).into_owned()
  }

  pub fn read_from(buf: &[u8]) -> DirEntry {
    let mut name = [0u8; DIR_ENT_NAME_SIZE];
    name.copy_from_slice(&buf[..DIR_ENT_NAME_SIZE]);
    DirEntry {
      name,
      inum: read_i32(buf, DIR_ENT_NAME_SIZE),
    }
  }

  pub fn write_to(&self, buf: &mut [u8]) {
    buf[..DIR_ENT_NAME_SIZE].copy_from_slice(&self.name);
    write_i32(buf, DIR_ENT_NAME_SIZE, self.inum);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn super_block_round_trip() {
    let super_block = SuperBlock::new(128, 64);
    let mut buf = [0u8; UFS_BLOCK_SIZE];
    super_block.write_to(&mut buf);
    assert_eq!(SuperBlock::read_from(&buf), super_block);
  }

  #[test]
  fn super_block_layout_is_adjacent() {
    let super_block = SuperBlock::new(4096, 1000);
    assert_eq!(super_block.inode_bitmap_addr, 1);
    assert_eq!(super_block.inode_bitmap_len, 1);
    assert_eq!(super_block.data_bitmap_addr, 2);
    assert_eq!(super_block.data_bitmap_len, 1);
    assert_eq!(super_block.inode_region_addr, 3);
    assert_eq!(super_block.inode_region_len, 128);
    assert_eq!(super_block.data_region_addr, 131);
    assert_eq!(super_block.total_blocks(), 1131);
  }

  #[test]
  fn inode_round_trip() {
    let mut inode = Inode::zeroed();
    inode.type_ = InodeType::File.raw();
    inode.size = 5000;
    inode.direct = [-1; DIRECT_PTRS];
    inode.direct[0] = 17;
    inode.direct[1] = 23;

    let mut buf = [0u8; INODE_SZ];
    inode.write_to(&mut buf);
    assert_eq!(Inode::read_from(&buf), inode);
  }

  #[test]
  fn inodes_fill_a_block_exactly() {
    assert_eq!(UFS_BLOCK_SIZE % INODE_SZ, 0);
    assert_eq!(UFS_BLOCK_SIZE % DIRENT_SZ, 0);
  }

  #[test]
  fn dir_entry_name_is_zero_padded() {
    let entry = DirEntry::new("hello", 3);
    assert_eq!(entry.name_bytes(), b"hello");
    assert_eq!(entry.name(), "hello");
    assert_eq!(&entry.name[5..], &[0u8; DIR_ENT_NAME_SIZE - 5]);

    let mut buf = [0u8; DIRENT_SZ];
    entry.write_to(&mut buf);
    assert_eq!(DirEntry::read_from(&buf), entry);
  }

  #[test]
  fn vacant_entry_has_no_inode() {
    let entry = DirEntry::vacant();
    assert_eq!(entry.inum, -1);
    assert_eq!(entry.name_bytes(), b"");
  }
}
