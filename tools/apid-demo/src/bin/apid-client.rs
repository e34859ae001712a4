//! apid-client: exercises a running `apid-server`.

use anyhow::Result;
use apid::{no_callback, Apid, ApidResult, SetEntry, Wait};
use apid_demo::{init_logging, ConnectArgs};
use clap::Parser;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Demo client for apid actions and methods
#[derive(Parser, Debug)]
#[command(name = "apid-client")]
struct Args {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Give up on the method reply after this many milliseconds (0 waits forever)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    let apid = Apid::connect(args.connect.config()?).await?;
    info!(implementation = apid.underlying_impl(), "apid-client connected");

    // Stop once the method reply and the set enumeration are both in.
    let outstanding = Arc::new(AtomicUsize::new(2));
    let finish = {
        let outstanding = outstanding.clone();
        let stop = apid.stop_handle();
        move || {
            if outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
                stop.stop();
            }
        }
    };

    apid.kv_get("note", |note| match note {
        Ok(note) => println!("Got note: {}", note.unwrap_or_default()),
        Err(e) => warn!(error = %e, "GET failed"),
    })?;

    apid.invoke_action("test1", "test from client", no_callback::<i64>())?;

    let wait = match args.timeout_ms {
        0 => Wait::Forever,
        ms => Wait::For(Duration::from_millis(ms)),
    };
    let method_done = finish.clone();
    apid.invoke_method_with_wait(
        "test2",
        "test2 from client",
        wait,
        Some(move |reply: ApidResult<String>| {
            match reply {
                Ok(reply) => println!("Got reply: {}", reply),
                Err(e) => warn!(error = %e, "Method call failed"),
            }
            method_done();
        }),
    )?;

    for member in ["a c", "c"] {
        apid.set_contains("test3", member, move |contained| {
            if let Ok(contained) = contained {
                println!("detect({}): {}", member, contained);
            }
        })?;
    }
    apid.set_remove("test3", "a b", no_callback::<i64>())?;
    apid.hash_get("test-hash", "a", |value| {
        if let Ok(value) = value {
            println!("hash: {} {}", value.is_some(), value.unwrap_or_default());
        }
    })?;

    let iterate_done = finish;
    apid.set_iterate("test3", move |entry| match entry {
        Ok(SetEntry::Member(member)) => println!("SET -> {}", member),
        Ok(SetEntry::Done) => iterate_done(),
        Err(e) => {
            warn!(error = %e, "SMEMBERS failed");
            iterate_done();
        }
    })?;

    apid.start().await?;
    Ok(())
}
