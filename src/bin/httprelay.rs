extern crate argparse;
extern crate env_logger;
extern crate httprelay;
#[macro_use]
extern crate log;

use std::env;
use std::sync::Arc;

use argparse::{ArgumentParser, Store};
use tokio::net::TcpListener;

use httprelay::dialer::TcpDialer;
use httprelay::{Config, Worker};

#[tokio::main]
async fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let mut config = Config::default();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Forwarding HTTP/1.1 proxy");
        ap.refer(&mut config.listen_port).add_option(
            &["--port"],
            Store,
            "Port to listen on",
        );
        ap.parse_args_or_exit();
    }

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .expect("failed to bind listener");
    info!("listening on port {}", config.listen_port);

    let dialer = Arc::new(TcpDialer);
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("accept failed: {}", err);
                continue;
            }
        };
        debug!("accepted connection from {}", peer);
        let worker = Worker::new(dialer.clone(), config.clone());
        tokio::spawn(async move {
            worker.run(socket).await;
        });
    }
}
