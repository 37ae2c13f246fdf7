use std::sync::Arc;

use clap::{App, Arg};
use ufs::{FileDisk, FileSystem};

fn print_bitmap(bytes: &[u8]) {
  for byte in bytes {
    print!("{} ", byte);
  }
  println!();
}

fn main() {
  env_logger::init();
  let matches = App::new("ds3bits")
    .arg(
      Arg::with_name("image")
        .required(true)
        .help("disk image file"),
    )
    .get_matches();

  let image = matches.value_of("image").unwrap();
  let device = Arc::new(FileDisk::open(image).expect("cannot open disk image"));
  let fs = FileSystem::open(device);
  let super_block = fs.super_block();

  println!("Super");
  println!("inode_region_addr {}", super_block.inode_region_addr);
  println!("data_region_addr {}", super_block.data_region_addr);
  println!();

  println!("Inode bitmap");
  print_bitmap(fs.read_inode_bitmap().as_bytes());
  println!();

  println!("Data bitmap");
  print_bitmap(fs.read_data_bitmap().as_bytes());
}
