use std::io::Read;
use std::sync::{Arc, Mutex};

use clap::{App, Arg};
use log::info;
use tiny_http::{Method, Response, Server};
use ufs::{FileDisk, FileSystem};
use ufs_tools::gateway::{handle_delete, handle_get, handle_put, Reply};

const URL_PREFIX: &str = "/ds3/";

fn main() {
  env_logger::init();
  let matches = App::new("ds3server")
    .arg(
      Arg::with_name("image")
        .required(true)
        .help("disk image file"),
    )
    .arg(
      Arg::with_name("port")
        .short("p")
        .long("port")
        .takes_value(true)
        .help("listen port (default 8080)"),
    )
    .get_matches();

  let image = matches.value_of("image").unwrap();
  let port: u16 = matches
    .value_of("port")
    .unwrap_or("8080")
    .parse()
    .expect("invalid port");

  let device = Arc::new(FileDisk::open(image).expect("cannot open disk image"));
  let fs = Mutex::new(FileSystem::open(device));

  let server = Server::http(("0.0.0.0", port)).expect("cannot bind");
  info!("serving {} on port {}", URL_PREFIX, port);

  for mut request in server.incoming_requests() {
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = Vec::new();
    if request.as_reader().read_to_end(&mut body).is_err() {
      let _ = request.respond(Response::from_data(Vec::new()).with_status_code(400));
      continue;
    }

    let reply = match url.strip_prefix(URL_PREFIX) {
      None => Reply {
        status: 200,
        body: Vec::new(),
      },
      Some(path) => {
        let mut fs = fs.lock().unwrap();
        match method {
          Method::Get => handle_get(&fs, path),
          Method::Put => handle_put(&mut fs, path, &body),
          Method::Delete => handle_delete(&mut fs, path),
          _ => Reply {
            status: 400,
            body: b"Bad Request".to_vec(),
          },
        }
      }
    };

    info!("{} {} -> {}", method, url, reply.status);
    let _ = request.respond(Response::from_data(reply.body).with_status_code(reply.status));
  }
}
