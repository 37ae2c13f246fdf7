use std::sync::Arc;

use clap::{App, Arg};
use ufs::{FileDisk, FileSystem, SuperBlock};

fn main() {
  env_logger::init();
  let matches = App::new("ds3mkfs")
    .arg(
      Arg::with_name("image")
        .short("f")
        .long("image")
        .takes_value(true)
        .required(true)
        .help("disk image file to create"),
    )
    .arg(
      Arg::with_name("inodes")
        .short("i")
        .long("inodes")
        .takes_value(true)
        .required(true)
        .help("number of inodes"),
    )
    .arg(
      Arg::with_name("data")
        .short("d")
        .long("data")
        .takes_value(true)
        .required(true)
        .help("number of data blocks"),
    )
    .get_matches();

  let image = matches.value_of("image").unwrap();
  let num_inodes: usize = matches
    .value_of("inodes")
    .unwrap()
    .parse()
    .expect("invalid inode count");
  let num_data: usize = matches
    .value_of("data")
    .unwrap()
    .parse()
    .expect("invalid data block count");
  assert!(num_inodes > 0 && num_data > 0, "image needs room for the root");

  let total = SuperBlock::new(num_inodes, num_data).total_blocks();
  let device = Arc::new(FileDisk::create(image, total).expect("cannot create disk image"));
  FileSystem::format(device, num_inodes, num_data);

  println!(
    "{}: {} blocks, {} inodes, {} data blocks",
    image, total, num_inodes, num_data
  );
}
