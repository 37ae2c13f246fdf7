use std::sync::Arc;

use clap::{App, Arg};
use ufs::{FileDisk, FileSystem, ROOT_INODE};

/// Print one directory's entries sorted by name, then recurse into its
/// subdirectories in the same order, depth first.
fn print_dir(fs: &FileSystem, inum: i32, path: &str) {
  println!("Directory {}", path);

  let Ok(mut entries) = fs.read_dir(inum) else {
    return;
  };
  entries.sort_by(|a, b| a.name_bytes().cmp(b.name_bytes()));

  for entry in &entries {
    println!("{}\t{}", entry.inum, entry.name());
  }
  println!();

  for entry in &entries {
    let name = entry.name_bytes();
    if name == b"." || name == b".." {
      continue;
    }
    if let Ok(inode) = fs.stat(entry.inum) {
      if inode.is_dir() {
        print_dir(fs, entry.inum, &format!("{}{}/", path, entry.name()));
      }
    }
  }
}

fn main() {
  env_logger::init();
  let matches = App::new("ds3ls")
    .arg(
      Arg::with_name("image")
        .required(true)
        .help("disk image file"),
    )
    .get_matches();

  let image = matches.value_of("image").unwrap();
  let device = Arc::new(FileDisk::open(image).expect("cannot open disk image"));
  let fs = FileSystem::open(device);

  print_dir(&fs, ROOT_INODE, "/");
}
