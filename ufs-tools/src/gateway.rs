//! HTTP gateway over the engine: the namespace as a resource tree
//! under a fixed URL prefix. Handlers are plain functions over the
//! engine and the path suffix, so the status mapping can be tested
//! without a socket; the `ds3server` binary wires them to transport.

use ufs::{resolve, FileSystem, InodeType, UfsError, ROOT_INODE};

pub struct Reply {
  pub status: u16,
  pub body: Vec<u8>,
}

impl Reply {
  fn ok(body: Vec<u8>) -> Reply {
    Reply { status: 200, body }
  }

  fn empty() -> Reply {
    Reply {
      status: 200,
      body: Vec::new(),
    }
  }

  fn bad_request() -> Reply {
    Reply {
      status: 400,
      body: b"Bad Request".to_vec(),
    }
  }

  fn not_found() -> Reply {
    Reply {
      status: 404,
      body: b"Not Found".to_vec(),
    }
  }

  fn conflict() -> Reply {
    Reply {
      status: 409,
      body: b"Conflict".to_vec(),
    }
  }

  fn insufficient_storage() -> Reply {
    Reply {
      status: 507,
      body: b"Insufficient Storage".to_vec(),
    }
  }
}

/// `GET`: a file answers with its bytes, a directory with its
/// children (excluding `.` and `..`) sorted by name, one per line,
/// directories suffixed with `/`.
pub fn handle_get(fs: &FileSystem, path: &str) -> Reply {
  let inum = match resolve(fs, ROOT_INODE, path) {
    Ok(inum) => inum,
    Err(UfsError::NotFound) => return Reply::not_found(),
    Err(_) => return Reply::bad_request(),
  };
  let inode = match fs.stat(inum) {
    Ok(inode) => inode,
    Err(_) => return Reply::bad_request(),
  };

  if inode.is_file() {
    let mut buf = vec![0u8; inode.size as usize];
    match fs.read(inum, &mut buf) {
      Ok(n) => {
        buf.truncate(n);
        Reply::ok(buf)
      }
      Err(_) => Reply::bad_request(),
    }
  } else {
    let mut entries = match fs.read_dir(inum) {
      Ok(entries) => entries,
      Err(_) => return Reply::bad_request(),
    };
    entries.sort_by(|a, b| a.name_bytes().cmp(b.name_bytes()));

    let mut body = Vec::new();
    for entry in entries {
      let name = entry.name_bytes();
      if name == b"." || name == b".." {
        continue;
      }
      let child = match fs.stat(entry.inum) {
        Ok(child) => child,
        Err(_) => return Reply::bad_request(),
      };
      body.extend_from_slice(name);
      if child.is_dir() {
        body.push(b'/');
      }
      body.push(b'\n');
    }
    Reply::ok(body)
  }
}

/// `PUT`: create every missing component on the way down, directories
/// for intermediates and a file at the end, then write the request
/// body into the terminal file.
pub fn handle_put(fs: &mut FileSystem, path: &str, body: &[u8]) -> Reply {
  let mut inum = ROOT_INODE;
  let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
  for (i, component) in components.iter().enumerate() {
    inum = match fs.lookup(inum, component) {
      Ok(next) => next,
      Err(UfsError::NotFound) => {
        let type_ = if i == components.len() - 1 {
          InodeType::File
        } else {
          InodeType::Directory
        };
        match fs.create(inum, type_, component) {
          Ok(new_inum) => new_inum,
          Err(UfsError::InsufficientSpace) => return Reply::insufficient_storage(),
          Err(UfsError::InvalidType) => return Reply::conflict(),
          Err(_) => return Reply::bad_request(),
        }
      }
      Err(_) => return Reply::bad_request(),
    };
  }

  match fs.write(inum, body) {
    Ok(_) => Reply::empty(),
    Err(UfsError::InsufficientSpace) | Err(UfsError::InvalidSize) => {
      Reply::insufficient_storage()
    }
    Err(_) => Reply::bad_request(),
  }
}

/// `DELETE`: walk to the parent of the target and unlink it. A path
/// that goes missing anywhere is a silent success; a path through a
/// non-directory is a structural error.
pub fn handle_delete(fs: &mut FileSystem, path: &str) -> Reply {
  let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
  if components.is_empty() {
    return Reply::bad_request();
  }

  let mut parent = ROOT_INODE;
  let mut inum = ROOT_INODE;
  let mut target = "";
  for component in &components {
    let inode = match fs.stat(inum) {
      Ok(inode) => inode,
      Err(_) => return Reply::bad_request(),
    };
    if !inode.is_dir() {
      return Reply::bad_request();
    }
    parent = inum;
    target = component;
    inum = match fs.lookup(inum, component) {
      Ok(next) => next,
      Err(_) => return Reply::empty(),
    };
  }

  match fs.unlink(parent, target) {
    Ok(()) => Reply::empty(),
    Err(_) => Reply::bad_request(),
  }
}
