use std::sync::Arc;

use log::{info, warn};
use tokio::{signal, task};

use house_price_serving::{HttpServer, InferenceService, ServingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServingConfig::from_env()?;
    let addr = config.addr();

    let server = Arc::new(HttpServer::bind(&addr)?);
    info!("listening at {addr}");

    let service = Arc::new(InferenceService::from_config(&config));
    task::block_in_place(|| service.startup_probe());

    let threads = config.threads.get();
    let handlers: Vec<_> = (0..threads)
        .map(|_| {
            let server = Arc::clone(&server);
            let service = Arc::clone(&service);
            task::spawn_blocking(move || server.serve(&*service))
        })
        .collect();
    info!("serving with {threads} handler thread(s)");

    tokio::select! {
        _ = futures::future::join_all(handlers) => {
            warn!("all handler threads exited");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
    }

    for _ in 0..threads {
        server.unblock();
    }

    Ok(())
}
