//! apid-server: serves the demo action and method and seeds demo data.
//!
//! Pair with `apid-client` against the same broker.

use anyhow::Result;
use apid::{no_callback, Apid};
use apid_demo::{init_logging, ConnectArgs};
use clap::Parser;
use tracing::{info, warn};

/// Demo server for apid actions and methods
#[derive(Parser, Debug)]
#[command(name = "apid-server")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Action to serve
    #[arg(long, default_value = "test1")]
    action: String,

    /// Echo method to serve
    #[arg(long, default_value = "test2")]
    method: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    let apid = Apid::connect(args.connect.config()?).await?;
    info!(implementation = apid.underlying_impl(), "apid-server connected");

    apid.register_action(&args.action, |_, payload| {
        println!("recv1: {}", payload);
    })?;
    apid.register_method(&args.method, |apid, payload, ticket| {
        println!("recv2: {}", payload);
        if let Err(e) = apid.reply(ticket, payload) {
            warn!(error = %e, "Reply failed");
        }
    })?;

    apid.hash_set("test-hash", "a", "b", no_callback::<i64>())?;
    apid.hash_set("test-hash", "a", "c", no_callback::<i64>())?;
    apid.hash_set("test-hash", "d", "t", no_callback::<i64>())?;
    apid.set_clear("test3", no_callback::<i64>())?;
    apid.set_add("test3", "a b", no_callback::<i64>())?;
    apid.set_add("test3", "c", no_callback::<i64>())?;
    apid.kv_set("note", "it is the note!", no_callback::<()>())?;

    let stop = apid.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop.stop();
        }
    });

    apid.start().await?;
    info!("apid-server stopped");
    Ok(())
}
