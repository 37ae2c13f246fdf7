use std::io::Write;
use std::process::exit;
use std::sync::Arc;

use clap::{App, Arg};
use ufs::{FileDisk, FileSystem};

fn main() {
  env_logger::init();
  let matches = App::new("ds3cat")
    .arg(
      Arg::with_name("image")
        .required(true)
        .help("disk image file"),
    )
    .arg(
      Arg::with_name("inode")
        .required(true)
        .help("inode number to print"),
    )
    .get_matches();

  let image = matches.value_of("image").unwrap();
  let inum: i32 = matches
    .value_of("inode")
    .unwrap()
    .parse()
    .expect("invalid inode number");

  let device = Arc::new(FileDisk::open(image).expect("cannot open disk image"));
  let fs = FileSystem::open(device);

  let Ok(inode) = fs.stat(inum) else {
    exit(1);
  };

  println!("File blocks");
  for idx in 0..inode.data_blocks() {
    println!("{}", inode.direct[idx]);
  }
  println!();

  println!("File data");
  let mut buf = vec![0u8; inode.size as usize];
  let Ok(n) = fs.read(inum, &mut buf) else {
    exit(1);
  };
  std::io::stdout()
    .write_all(&buf[..n])
    .expect("error writing to stdout");
}
