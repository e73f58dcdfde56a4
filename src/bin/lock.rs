//! The "holding client": acquires one named lock and holds it until killed
//! or the connection drops.
//!
//! Grounded in `original_source/tcpnetlock/cli/tnl_client.py`'s two loops:
//! with `--keep-alive`, it sleeps and sends `.keepalive` every
//! `--keep-alive-secs`; without it, it polls `check_connection` on the same
//! interval, relying on the server's own TCP half-open detection rather than
//! sending protocol traffic. Either way `Ctrl-C` releases the lock and exits
//! cleanly.
//!
//! Exit codes: 0 released cleanly, 2 connection refused, 3 other connection
//! error, 122 lost the connection while holding the lock, 123 lock was
//! already held by someone else.

use std::io;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::time::sleep;

use tcpnetlock::client::LockClient;
use tcpnetlock::constants::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "tcpnetlock-lock", version, about = "Acquire and hold a named lock")]
struct Cli {
    /// Name of the lock to acquire.
    lock_name: String,

    #[arg(long, default_value = "127.0.0.1", env = "TCPNETLOCK_HOST")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT, env = "TCPNETLOCK_PORT")]
    port: u16,

    #[arg(long = "client-id", default_value = "tcpnetlock-lock", env = "TCPNETLOCK_CLIENT_ID")]
    client_id: String,

    /// Send `.keepalive` on the interval instead of merely polling the
    /// connection for liveness.
    #[arg(long = "keep-alive")]
    keep_alive: bool,

    #[arg(long = "keep-alive-secs", default_value_t = 15)]
    keep_alive_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let mut client = match LockClient::connect(&cli.host, cli.port, &cli.client_id).await {
        Ok(client) => client,
        Err(tcpnetlock::error::Error::Io(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
            eprintln!("tcpnetlock-lock: connection refused: {}", err);
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("tcpnetlock-lock: {}", err);
            std::process::exit(3);
        }
    };

    match client.lock(&cli.lock_name).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("tcpnetlock-lock: lock '{}' is already held", cli.lock_name);
            std::process::exit(123);
        }
        Err(err) => {
            eprintln!("tcpnetlock-lock: {}", err);
            std::process::exit(3);
        }
    }
    println!("lock '{}' acquired", cli.lock_name);

    let interval = Duration::from_secs(cli.keep_alive_secs);
    let exit_code = loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                let _ = client.release().await;
                break 0;
            }
            _ = sleep(interval) => {
                let outcome = if cli.keep_alive {
                    client.keepalive().await
                } else {
                    client.check_connection().await
                };
                if let Err(err) = outcome {
                    eprintln!("tcpnetlock-lock: lost connection while holding lock: {}", err);
                    break 122;
                }
            }
        }
    };

    std::process::exit(exit_code);
}
