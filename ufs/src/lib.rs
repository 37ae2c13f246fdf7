mod bitmap;
mod block_dev;
mod error;
mod fs;
mod layout;
mod path;

pub use bitmap::Bitmap;
pub use block_dev::{BlockDevice, FileDisk, MemDisk};
pub use error::UfsError;
pub use fs::FileSystem;
pub use layout::{DirEntry, Inode, InodeType, SuperBlock, DIRENT_SZ, INODE_SZ};
pub use path::resolve;

/// disk block size in bytes
pub const UFS_BLOCK_SIZE: usize = 4096;
/// direct block pointers per inode
pub const DIRECT_PTRS: usize = 30;
/// bytes reserved for an entry name, zero terminator included
pub const DIR_ENT_NAME_SIZE: usize = 28;
/// largest representable file
pub const MAX_FILE_SIZE: usize = DIRECT_PTRS * UFS_BLOCK_SIZE;
/// inode number of `/`
pub const ROOT_INODE: i32 = 0;
