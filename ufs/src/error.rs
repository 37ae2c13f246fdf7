use thiserror::Error;

/// Error kinds surfaced by the engine. Every public operation returns
/// either a non-negative result or exactly one of these; errors are
/// values, never out-of-band control flow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UfsError {
  #[error("invalid inode number")]
  InvalidInode,
  #[error("invalid size")]
  InvalidSize,
  #[error("invalid name")]
  InvalidName,
  #[error("invalid type")]
  InvalidType,
  #[error("name not found")]
  NotFound,
  #[error("not enough space")]
  InsufficientSpace,
  #[error("directory is not empty")]
  DirNotEmpty,
  #[error("unlink of . and .. is not allowed")]
  UnlinkNotAllowed,
}
