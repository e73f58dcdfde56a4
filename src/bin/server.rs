//! The lock server's entry point.
//!
//! Parses the command line, installs logging, binds the listener, and hands
//! off to [`tcpnetlock::server::run`]. Exit codes: 0 clean shutdown, 2 bad
//! arguments (handled by `clap` itself), 3 bind failure.

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use tcpnetlock::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "tcpnetlock-server", version, about = "A network advisory lock server")]
struct Cli {
    /// Address to listen on.
    #[arg(long = "listen", default_value = "127.0.0.1")]
    listen: String,

    /// Port to listen on.
    #[arg(long = "port", default_value_t = DEFAULT_PORT, env = "TCPNETLOCK_PORT")]
    port: u16,

    /// Verbose (debug-level) logging.
    #[arg(long, conflicts_with = "info")]
    debug: bool,

    /// Informational logging (the default is warnings and errors only).
    #[arg(long, conflicts_with = "debug")]
    info: bool,
}

#[tokio::main]
pub async fn main() -> tcpnetlock::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.info {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .try_init()
        .ok();

    let addr = format!("{}:{}", cli.listen, cli.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(cause = %err, %addr, "failed to bind");
            std::process::exit(3);
        }
    };

    tracing::info!(%addr, "tcpnetlock listening");
    tcpnetlock::server::run(listener, async {
        let _ = signal::ctrl_c().await;
    })
    .await
}
