use crate::error::UfsError;
use crate::fs::FileSystem;

/// Walk a slash-separated `path` from `start`, one `lookup` per
/// component. Empty components mean "this inode" and are skipped, so
/// `a//b` and `a/b/` name the same inodes as `a/b`.
pub fn resolve(fs: &FileSystem, start: i32, path: &str) -> Result<i32, UfsError> {
  let mut inum = start;
  for component in path.split('/') {
    if component.is_empty() {
      continue;
    }
    inum = fs.lookup(inum, component)?;
  }
  Ok(inum)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::block_dev::MemDisk;
  use crate::layout::{InodeType, SuperBlock};
  use crate::ROOT_INODE;

  fn sample_fs() -> FileSystem {
    let total = SuperBlock::new(64, 64).total_blocks();
    let device = Arc::new(MemDisk::new(total));
    let mut fs = FileSystem::format(device, 64, 64);
    let a = fs.create(ROOT_INODE, InodeType::Directory, "a").unwrap();
    let b = fs.create(a, InodeType::Directory, "b").unwrap();
    fs.create(b, InodeType::File, "c").unwrap();
    fs
  }

  #[test]
  fn resolves_nested_components() {
    let fs = sample_fs();
    assert_eq!(resolve(&fs, ROOT_INODE, "a/b/c").unwrap(), 3);
    assert_eq!(resolve(&fs, ROOT_INODE, "a/b").unwrap(), 2);
    assert_eq!(resolve(&fs, 1, "b/c").unwrap(), 3);
  }

  #[test]
  fn empty_components_stay_put() {
    let fs = sample_fs();
    assert_eq!(resolve(&fs, ROOT_INODE, "").unwrap(), ROOT_INODE);
    assert_eq!(resolve(&fs, ROOT_INODE, "a/").unwrap(), 1);
    assert_eq!(resolve(&fs, ROOT_INODE, "//a//b").unwrap(), 2);
  }

  #[test]
  fn resolution_errors_surface() {
    let fs = sample_fs();
    assert_eq!(
      resolve(&fs, ROOT_INODE, "a/missing"),
      Err(UfsError::NotFound)
    );
    // walking through a file is an invalid parent, not a missing name
    assert_eq!(
      resolve(&fs, ROOT_INODE, "a/b/c/d"),
      Err(UfsError::InvalidInode)
    );
  }
}
