//! The file-system engine: lookup, stat, read, write, create, unlink.
//!
//! Every mutating operation plans its changes entirely in memory, then
//! issues all block writes between one `begin_transaction`/`commit`
//! pair. An operation either fails having written nothing or commits
//! atomically; no partial state is observable on disk.

use std::cmp::min;
use std::sync::Arc;

use log::info;

use crate::bitmap::Bitmap;
use crate::block_dev::BlockDevice;
use crate::error::UfsError;
use crate::layout::{DirEntry, Inode, InodeType, SuperBlock, DIRENT_SZ, INODE_SZ};
use crate::{DIRECT_PTRS, DIR_ENT_NAME_SIZE, MAX_FILE_SIZE, UFS_BLOCK_SIZE};

const ENTRIES_PER_BLOCK: usize = UFS_BLOCK_SIZE / DIRENT_SZ;

pub struct FileSystem {
  device: Arc<dyn BlockDevice>,
  super_block: SuperBlock,
}

impl FileSystem {
  /// Open an already formatted image.
  pub fn open(device: Arc<dyn BlockDevice>) -> FileSystem {
    let mut buf = [0u8; UFS_BLOCK_SIZE];
    device.read_block(0, &mut buf);
    let super_block = SuperBlock::read_from(&buf);
    FileSystem {
      device,
      super_block,
    }
  }

  /// Write a fresh file system onto `device`: zeroed regions, inode 0
  /// live as the root directory with `.` and `..` pointing at itself,
  /// and the root's first data block allocated.
  pub fn format(device: Arc<dyn BlockDevice>, num_inodes: usize, num_data: usize) -> FileSystem {
    let super_block = SuperBlock::new(num_inodes, num_data);

    let zero = [0u8; UFS_BLOCK_SIZE];
    for block in 0..super_block.total_blocks() {
      device.write_block(block, &zero);
    }

    let mut super_buf = [0u8; UFS_BLOCK_SIZE];
    super_block.write_to(&mut super_buf);

    let mut inode_bitmap = Bitmap::new(super_block.inode_bitmap_len as usize * UFS_BLOCK_SIZE);
    inode_bitmap.set(0);
    let mut data_bitmap = Bitmap::new(super_block.data_bitmap_len as usize * UFS_BLOCK_SIZE);
    data_bitmap.set(0);

    let mut inodes = vec![Inode::zeroed(); num_inodes];
    inodes[0].type_ = InodeType::Directory.raw();
    inodes[0].size = (2 * DIRENT_SZ) as i32;
    inodes[0].direct = [-1; DIRECT_PTRS];
    inodes[0].direct[0] = super_block.data_region_addr;

    let mut root_entries = [DirEntry::vacant(); ENTRIES_PER_BLOCK];
    root_entries[0] = DirEntry::new(".", 0);
    root_entries[1] = DirEntry::new("..", 0);

    let fs = FileSystem {
      device,
      super_block,
    };
    fs.device.begin_transaction();
    fs.device.write_block(0, &super_buf);
    fs.write_inode_bitmap(&inode_bitmap);
    fs.write_data_bitmap(&data_bitmap);
    fs.write_inode_region(&inodes);
    fs.write_entries_block(super_block.data_region_addr, &root_entries);
    fs.device.commit();

    info!(
      "formatted image: {} inodes, {} data blocks, {} blocks total",
      num_inodes,
      num_data,
      super_block.total_blocks()
    );
    fs
  }

  pub fn super_block(&self) -> &SuperBlock {
    &self.super_block
  }

  /// Copy out the record of inode `inum`, reading only the one block
  /// that contains it. The inode bitmap is not consulted, so a freed
  /// inode yields its stale record.
  pub fn stat(&self, inum: i32) -> Result<Inode, UfsError> {
    if !self.check_inode(inum) {
      return Err(UfsError::InvalidInode);
    }
    let pos = inum as usize * INODE_SZ;
    let block = self.super_block.inode_region_addr as usize + pos / UFS_BLOCK_SIZE;
    let offset = pos % UFS_BLOCK_SIZE;

    let mut buf = [0u8; UFS_BLOCK_SIZE];
    self.device.read_block(block, &mut buf);
    Ok(Inode::read_from(&buf[offset..offset + INODE_SZ]))
  }

  /// Find `name` in the directory `parent`. Live entries are densely
  /// packed from the start, so an absent block pointer or a vacant
  /// entry ends the scan. `.` and `..` are live entries and matchable.
  pub fn lookup(&self, parent: i32, name: &str) -> Result<i32, UfsError> {
    if !self.check_inode(parent) {
      return Err(UfsError::InvalidInode);
    }
    let parent_inode = self.stat(parent)?;
    if !parent_inode.is_dir() {
      return Err(UfsError::InvalidInode);
    }

    let mut buf = [0u8; UFS_BLOCK_SIZE];
    for block in parent_inode.direct {
      if block == -1 {
        return Err(UfsError::NotFound);
      }
      self.device.read_block(block as usize, &mut buf);
      for chunk in buf.chunks_exact(DIRENT_SZ) {
        let entry = DirEntry::read_from(chunk);
        if entry.inum == -1 {
          return Err(UfsError::NotFound);
        }
        if entry.name_bytes() == name.as_bytes() {
          return Ok(entry.inum);
        }
      }
    }
    Err(UfsError::NotFound)
  }

  /// Read up to `buf.len()` bytes from the start of the file or
  /// directory `inum`; returns how many bytes were copied, capped by
  /// the inode's size.
  pub fn read(&self, inum: i32, buf: &mut [u8]) -> Result<usize, UfsError> {
    if !self.check_inode(inum) {
      return Err(UfsError::InvalidInode);
    }
    if buf.len() > MAX_FILE_SIZE {
      return Err(UfsError::InvalidSize);
    }
    let inode = self.stat(inum)?;
    if !inode.is_file() && !inode.is_dir() {
      return Err(UfsError::InvalidType);
    }

    let effective = min(buf.len(), inode.size as usize);
    if effective == 0 {
      return Ok(0);
    }

    let mut block_buf = [0u8; UFS_BLOCK_SIZE];
    for idx in 0..effective.div_ceil(UFS_BLOCK_SIZE) {
      self.device.read_block(inode.direct[idx] as usize, &mut block_buf);
      let start = idx * UFS_BLOCK_SIZE;
      let len = min(UFS_BLOCK_SIZE, effective - start);
      buf[start..start + len].copy_from_slice(&block_buf[..len]);
    }
    Ok(effective)
  }

  /// The live entries of directory `inum`, in on-disk order.
  pub fn read_dir(&self, inum: i32) -> Result<Vec<DirEntry>, UfsError> {
    let inode = self.stat(inum)?;
    if !inode.is_dir() {
      return Err(UfsError::InvalidInode);
    }
    let mut raw = vec![0u8; inode.size as usize];
    let n = self.read(inum, &mut raw)?;
    Ok(
      raw[..n]
        .chunks_exact(DIRENT_SZ)
        .map(DirEntry::read_from)
        .collect(),
    )
  }

  /// Allocate a fresh inode of `type_` named `name` under `parent`.
  /// Calling it again with the same arguments is a success that
  /// returns 0 and writes nothing; a name collision with the other
  /// type is an `InvalidType` error. All needed bitmap bits are
  /// reserved in memory before the single committing transaction.
  pub fn create(&mut self, parent: i32, type_: InodeType, name: &str) -> Result<i32, UfsError> {
    if !self.check_inode(parent) {
      return Err(UfsError::InvalidInode);
    }
    if name.len() >= DIR_ENT_NAME_SIZE {
      return Err(UfsError::InvalidName);
    }

    let mut inodes = self.read_inode_region();
    if !inodes[parent as usize].is_dir() {
      return Err(UfsError::InvalidInode);
    }
    if inodes[parent as usize].size as usize >= DIRECT_PTRS * UFS_BLOCK_SIZE {
      return Err(UfsError::InsufficientSpace);
    }

    for entry in self.read_dir(parent)? {
      if entry.name_bytes() == name.as_bytes() {
        return if inodes[entry.inum as usize].type_ == type_.raw() {
          Ok(0)
        } else {
          Err(UfsError::InvalidType)
        };
      }
    }

    let mut inode_bitmap = self.read_inode_bitmap();
    let mut data_bitmap = self.read_data_bitmap();

    let new_inum = match inode_bitmap.first_clear() {
      Some(bit) if bit < self.super_block.num_inodes as usize => bit,
      _ => return Err(UfsError::InsufficientSpace),
    };
    inode_bitmap.set(new_inum);

    inodes[new_inum].type_ = type_.raw();
    inodes[new_inum].direct = [-1; DIRECT_PTRS];

    // a directory child starts with one block holding `.` and `..`
    let mut child_block = None;
    let mut child_entries = [DirEntry::vacant(); ENTRIES_PER_BLOCK];
    if type_ == InodeType::Directory {
      let bit = match data_bitmap.first_clear() {
        Some(bit) if bit < self.super_block.num_data as usize => bit,
        _ => return Err(UfsError::InsufficientSpace),
      };
      data_bitmap.set(bit);
      let block = self.bit_to_block(bit);

      child_entries[0] = DirEntry::new(".", new_inum as i32);
      child_entries[1] = DirEntry::new("..", parent);
      inodes[new_inum].size = (2 * DIRENT_SZ) as i32;
      inodes[new_inum].direct[0] = block;
      child_block = Some(block);
    } else {
      inodes[new_inum].size = 0;
    }

    // append the entry to the parent, growing it by a block when the
    // old size sits exactly on a block boundary
    let mut entry_buf = [DirEntry::vacant(); ENTRIES_PER_BLOCK];
    let entry_block;
    let parent_size = inodes[parent as usize].size as usize;
    if parent_size % UFS_BLOCK_SIZE == 0 {
      let bit = match data_bitmap.first_clear() {
        Some(bit) if bit < self.super_block.num_data as usize => bit,
        _ => return Err(UfsError::InsufficientSpace),
      };
      data_bitmap.set(bit);
      entry_block = self.bit_to_block(bit);

      entry_buf[0] = DirEntry::new(name, new_inum as i32);
      inodes[parent as usize].direct[parent_size / UFS_BLOCK_SIZE] = entry_block;
    } else {
      let last = parent_size.div_ceil(UFS_BLOCK_SIZE) - 1;
      entry_block = inodes[parent as usize].direct[last];

      let mut buf = [0u8; UFS_BLOCK_SIZE];
      self.device.read_block(entry_block as usize, &mut buf);
      for (i, chunk) in buf.chunks_exact(DIRENT_SZ).enumerate() {
        entry_buf[i] = DirEntry::read_from(chunk);
      }
      entry_buf[parent_size % UFS_BLOCK_SIZE / DIRENT_SZ] = DirEntry::new(name, new_inum as i32);
    }
    inodes[parent as usize].size += DIRENT_SZ as i32;

    self.device.begin_transaction();
    self.write_inode_bitmap(&inode_bitmap);
    self.write_data_bitmap(&data_bitmap);
    self.write_inode_region(&inodes);
    self.write_entries_block(entry_block, &entry_buf);
    if let Some(block) = child_block {
      self.write_entries_block(block, &child_entries);
    }
    self.device.commit();

    Ok(new_inum as i32)
  }

  /// Replace the contents of file `inum` with `buf`, growing or
  /// shrinking its block set as needed. Direct pointers past the new
  /// block count keep their old values; nothing reads past `size`.
  pub fn write(&mut self, inum: i32, buf: &[u8]) -> Result<usize, UfsError> {
    if !self.check_inode(inum) {
      return Err(UfsError::InvalidInode);
    }
    if buf.len() > MAX_FILE_SIZE {
      return Err(UfsError::InvalidSize);
    }

    let mut inodes = self.read_inode_region();
    if !inodes[inum as usize].is_file() {
      return Err(UfsError::InvalidType);
    }
    let mut data_bitmap = self.read_data_bitmap();

    let cur_blocks = inodes[inum as usize].data_blocks();
    let req_blocks = buf.len().div_ceil(UFS_BLOCK_SIZE);
    if req_blocks > DIRECT_PTRS {
      return Err(UfsError::InsufficientSpace);
    }

    for idx in cur_blocks..req_blocks {
      let bit = match data_bitmap.first_clear() {
        Some(bit) if bit < self.super_block.num_data as usize => bit,
        _ => return Err(UfsError::InsufficientSpace),
      };
      data_bitmap.set(bit);
      inodes[inum as usize].direct[idx] = self.bit_to_block(bit);
    }
    for idx in req_blocks..cur_blocks {
      data_bitmap.clear(self.block_to_bit(inodes[inum as usize].direct[idx]));
    }
    inodes[inum as usize].size = buf.len() as i32;

    self.device.begin_transaction();
    self.write_inode_region(&inodes);
    self.write_data_bitmap(&data_bitmap);

    let mut block_buf = [0u8; UFS_BLOCK_SIZE];
    for idx in 0..req_blocks {
      let start = idx * UFS_BLOCK_SIZE;
      let len = min(UFS_BLOCK_SIZE, buf.len() - start);
      block_buf[..len].copy_from_slice(&buf[start..start + len]);
      self
        .device
        .write_block(inodes[inum as usize].direct[idx] as usize, &block_buf);
    }
    self.device.commit();

    Ok(buf.len())
  }

  /// Remove `name` from directory `parent`, freeing the target inode
  /// and its data blocks. Unlinking an absent name succeeds without
  /// touching the disk; a directory still holding entries beyond its
  /// own `.` and `..` cannot be unlinked. The remaining entries keep
  /// their relative order.
  pub fn unlink(&mut self, parent: i32, name: &str) -> Result<(), UfsError> {
    if !self.check_inode(parent) {
      return Err(UfsError::InvalidInode);
    }
    if name == "." || name == ".." {
      return Err(UfsError::UnlinkNotAllowed);
    }
    if name.len() >= DIR_ENT_NAME_SIZE {
      return Err(UfsError::InvalidName);
    }

    let mut inodes = self.read_inode_region();
    if !inodes[parent as usize].is_dir() {
      return Err(UfsError::InvalidInode);
    }

    let mut entries = self.read_dir(parent)?;
    let Some(target_at) = entries
      .iter()
      .position(|entry| entry.name_bytes() == name.as_bytes())
    else {
      return Ok(());
    };
    let target_inum = entries[target_at].inum;
    let target = inodes[target_inum as usize];
    if target.is_dir() && target.size as usize > 2 * DIRENT_SZ {
      return Err(UfsError::DirNotEmpty);
    }

    let mut data_bitmap = self.read_data_bitmap();
    let mut inode_bitmap = self.read_inode_bitmap();

    for idx in 0..target.data_blocks() {
      data_bitmap.clear(self.block_to_bit(target.direct[idx]));
    }
    inode_bitmap.clear(target_inum as usize);

    entries.remove(target_at);
    inodes[parent as usize].size -= DIRENT_SZ as i32;

    // when the removal lands on a block boundary the trailing parent
    // block has no live entries left and goes back to the bitmap
    let parent_size = inodes[parent as usize].size as usize;
    if parent_size % UFS_BLOCK_SIZE == 0 {
      let blocks_needed = parent_size / UFS_BLOCK_SIZE;
      if blocks_needed < DIRECT_PTRS {
        let block = inodes[parent as usize].direct[blocks_needed];
        data_bitmap.clear(self.block_to_bit(block));
        inodes[parent as usize].direct[blocks_needed] = -1;
      }
    }

    while entries.len() % ENTRIES_PER_BLOCK != 0 {
      entries.push(DirEntry::vacant());
    }

    self.device.begin_transaction();
    self.write_inode_region(&inodes);
    self.write_data_bitmap(&data_bitmap);
    self.write_inode_bitmap(&inode_bitmap);
    for (idx, chunk) in entries.chunks(ENTRIES_PER_BLOCK).enumerate() {
      self.write_entries_block(inodes[parent as usize].direct[idx], chunk);
    }
    self.device.commit();

    Ok(())
  }

  pub fn read_inode_bitmap(&self) -> Bitmap {
    Bitmap::from_bytes(self.read_region(
      self.super_block.inode_bitmap_addr,
      self.super_block.inode_bitmap_len,
    ))
  }

  pub fn read_data_bitmap(&self) -> Bitmap {
    Bitmap::from_bytes(self.read_region(
      self.super_block.data_bitmap_addr,
      self.super_block.data_bitmap_len,
    ))
  }

  fn check_inode(&self, inum: i32) -> bool {
    inum >= 0 && inum < self.super_block.num_inodes
  }

  fn bit_to_block(&self, bit: usize) -> i32 {
    bit as i32 + self.super_block.data_region_addr
  }

  fn block_to_bit(&self, block: i32) -> usize {
    (block - self.super_block.data_region_addr) as usize
  }

  fn read_region(&self, addr: i32, len: i32) -> Vec<u8> {
    let mut bytes = vec![0u8; len as usize * UFS_BLOCK_SIZE];
    for (i, chunk) in bytes.chunks_exact_mut(UFS_BLOCK_SIZE).enumerate() {
      self.device.read_block(addr as usize + i, chunk);
    }
    bytes
  }

  fn write_region(&self, addr: i32, bytes: &[u8]) {
    for (i, chunk) in bytes.chunks_exact(UFS_BLOCK_SIZE).enumerate() {
      self.device.write_block(addr as usize + i, chunk);
    }
  }

  fn write_inode_bitmap(&self, bitmap: &Bitmap) {
    self.write_region(self.super_block.inode_bitmap_addr, bitmap.as_bytes());
  }

  fn write_data_bitmap(&self, bitmap: &Bitmap) {
    self.write_region(self.super_block.data_bitmap_addr, bitmap.as_bytes());
  }

  fn read_inode_region(&self) -> Vec<Inode> {
    let bytes = self.read_region(
      self.super_block.inode_region_addr,
      self.super_block.inode_region_len,
    );
    bytes
      .chunks_exact(INODE_SZ)
      .take(self.super_block.num_inodes as usize)
      .map(Inode::read_from)
      .collect()
  }

  fn write_inode_region(&self, inodes: &[Inode]) {
    let mut bytes = vec![0u8; self.super_block.inode_region_len as usize * UFS_BLOCK_SIZE];
    for (i, inode) in inodes.iter().enumerate() {
      inode.write_to(&mut bytes[i * INODE_SZ..(i + 1) * INODE_SZ]);
    }
    self.write_region(self.super_block.inode_region_addr, &bytes);
  }

  fn write_entries_block(&self, block: i32, entries: &[DirEntry]) {
    debug_assert_eq!(entries.len(), ENTRIES_PER_BLOCK);
    let mut buf = [0u8; UFS_BLOCK_SIZE];
    for (i, entry) in entries.iter().enumerate() {
      entry.write_to(&mut buf[i * DIRENT_SZ..(i + 1) * DIRENT_SZ]);
    }
    self.device.write_block(block as usize, &buf);
  }
}
