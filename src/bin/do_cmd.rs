//! The "wrap-a-command" runner: acquires a named lock, runs a child command
//! while holding it, then releases and exits with the child's status.
//!
//! Grounded in `original_source/tcpnetlock/cli/tnl_lock.py`, including its
//! lock-name auto-derivation when `--lock-name` is omitted: the command line
//! is joined with spaces and anything outside `[A-Za-z0-9_-]` is stripped,
//! giving e.g. `cargo build --release` the derived name `cargobuildrelease`.
//! Retries apply only to the initial `lock` action, per spec — once granted,
//! the lock is held unconditionally until the child exits.
//!
//! Exit codes: the child's own exit code on success; 123 if the lock could
//! not be acquired after exhausting `--retry`; 124 if the child failed to
//! spawn or could not be waited on; 125 if the connection was refused;
//! 127 if the command could not be found.

use std::time::Duration;

use clap::Parser;
use tokio::process::Command;
use tokio::time::sleep;

use tcpnetlock::client::LockClient;
use tcpnetlock::constants::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "tcpnetlock-do", version, about = "Run a command while holding a named lock")]
struct Cli {
    /// Name of the lock to acquire. Derived from the command line if
    /// omitted.
    #[arg(long = "lock-name")]
    lock_name: Option<String>,

    #[arg(long, default_value = "127.0.0.1", env = "TCPNETLOCK_HOST")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT, env = "TCPNETLOCK_PORT")]
    port: u16,

    #[arg(long = "client-id", default_value = "tcpnetlock-do", env = "TCPNETLOCK_CLIENT_ID")]
    client_id: String,

    /// Number of additional lock attempts after the first, spaced by
    /// `--retry-wait`. Omit to attempt exactly once.
    #[arg(long)]
    retry: Option<u32>,

    #[arg(long = "retry-wait", default_value_t = 1)]
    retry_wait: u64,

    /// Send `.keepalive` on the interval instead of merely polling for
    /// liveness while the child runs.
    #[arg(long = "keep-alive")]
    keep_alive: bool,

    #[arg(long = "keep-alive-secs", default_value_t = 15)]
    keep_alive_secs: u64,

    /// Run the command through `sh -c` instead of executing it directly.
    #[arg(long)]
    shell: bool,

    /// The command (and its arguments) to run while holding the lock.
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

/// Strips everything but `[A-Za-z0-9_-]` from the space-joined command line.
fn derive_lock_name(command: &[String]) -> String {
    command
        .join(" ")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let lock_name = cli
        .lock_name
        .clone()
        .unwrap_or_else(|| derive_lock_name(&cli.command));

    let mut client = match LockClient::connect(&cli.host, cli.port, &cli.client_id).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("tcpnetlock-do: connection refused: {}", err);
            std::process::exit(125);
        }
    };

    if !acquire_with_retry(&mut client, &lock_name, cli.retry, cli.retry_wait).await {
        eprintln!("tcpnetlock-do: lock '{}' could not be acquired", lock_name);
        std::process::exit(123);
    }

    let mut command = if cli.shell {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(cli.command.join(" "));
        cmd
    } else {
        let mut cmd = Command::new(&cli.command[0]);
        cmd.args(&cli.command[1..]);
        cmd
    };

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("tcpnetlock-do: command not found: {}", cli.command[0]);
            let _ = client.release().await;
            std::process::exit(127);
        }
        Err(err) => {
            eprintln!("tcpnetlock-do: failed to spawn child: {}", err);
            let _ = client.release().await;
            std::process::exit(124);
        }
    };

    let interval = Duration::from_secs(cli.keep_alive_secs);
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = sleep(interval) => {
                let outcome = if cli.keep_alive {
                    client.keepalive().await
                } else {
                    client.check_connection().await
                };
                if let Err(err) = outcome {
                    eprintln!("tcpnetlock-do: lost lock while running child: {}", err);
                }
            }
        }
    };

    let _ = client.release().await;

    match status {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(err) => {
            eprintln!("tcpnetlock-do: child wait failed: {}", err);
            std::process::exit(124);
        }
    }
}

/// Attempts the `lock` action up to `1 + retry.unwrap_or(0)` times, sleeping
/// `retry_wait` seconds between attempts.
async fn acquire_with_retry(
    client: &mut LockClient,
    lock_name: &str,
    retry: Option<u32>,
    retry_wait: u64,
) -> bool {
    let attempts = 1 + retry.unwrap_or(0);
    for attempt in 0..attempts {
        match client.lock(lock_name).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                eprintln!("tcpnetlock-do: {}", err);
                return false;
            }
        }
        if attempt + 1 < attempts {
            sleep(Duration::from_secs(retry_wait)).await;
        }
    }
    false
}
