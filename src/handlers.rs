//! Action handlers.
//!
//! Each top-level handler's contract is "write response(s), optionally
//! mutate state, return" — a tagged match in [`crate::server::Handler::run`]
//! dispatches to these free functions instead of the virtual-dispatch
//! class-per-action hierarchy of
//! `original_source/tcpnetlock/server/action_handlers.py`. The
//! lock-granted handler is the only one containing a loop; invalid-action
//! handling inside that loop must not close the socket, since the lease
//! continues.

use std::time::Duration;

use crate::action::Action;
use crate::constants::*;
use crate::error::Error;
use crate::framer::{Framer, ReadOutcome};
use crate::server::Context;

pub async fn handle_ping(framer: &mut Framer) -> Result<(), Error> {
    framer.send(RESPONSE_PONG).await
}

pub async fn handle_stats(framer: &mut Framer, ctx: &Context) -> Result<(), Error> {
    let stats = crate::stats::Stats::collect(ctx.registry.len(), &ctx.counters);
    framer
        .send(&format!("{},{}", RESPONSE_STATS_PREFIX, stats.to_json()))
        .await
}

/// Per DESIGN.md's resolution of the spec's open question: shutdown is
/// only honored from a loopback peer. A non-loopback request is treated as
/// just another disallowed action.
pub async fn handle_server_shutdown(framer: &mut Framer, ctx: &Context) -> Result<(), Error> {
    let is_loopback = framer
        .peer_addr()
        .map(|addr| addr.ip().is_loopback())
        .unwrap_or(false);

    if !is_loopback {
        tracing::warn!("rejected .server-shutdown from non-loopback peer");
        return framer.send(RESPONSE_INVALID_ACTION).await;
    }

    framer.send(RESPONSE_SHUTTING_DOWN).await?;
    ctx.shutdown.trigger();
    Ok(())
}

pub async fn handle_invalid_action(framer: &mut Framer) -> Result<(), Error> {
    framer.send(RESPONSE_INVALID_ACTION).await
}

pub async fn handle_invalid_lock_name(framer: &mut Framer) -> Result<(), Error> {
    framer.send(RESPONSE_ERR_INVALID_LOCK_NAME).await
}

pub async fn handle_not_granted(framer: &mut Framer, ctx: &Context) -> Result<(), Error> {
    ctx.counters.record_rejected();
    framer.send(RESPONSE_LOCK_NOT_GRANTED).await
}

/// Handles a granted `lock` action end to end: records the holder,
/// responds `ok`, then runs the inner loop until `release` or disconnect.
/// The lease is held for the entire body and is dropped on every exit path.
pub async fn handle_lock_granted(
    framer: &mut Framer,
    action: &Action,
    ctx: &Context,
    lock_name: &str,
    entry: &crate::lock::LockEntry,
    lease: crate::lock::Lease,
) -> Result<(), Error> {
    ctx.counters.record_granted();

    let holder_id = action.param("client-id").unwrap_or("").to_string();
    entry.update(lock_name, holder_id);

    framer.send(RESPONSE_OK).await?;

    let result = inner_loop(framer).await;
    // Two-phase release: the response for `release` is already on the wire
    // (written inside `inner_loop`); dropping the lease here is the
    // "release the mutex via scope exit" half of the sequence.
    drop(lease);
    result
}

async fn inner_loop(framer: &mut Framer) -> Result<(), Error> {
    loop {
        match framer.readline(Some(Duration::from_secs(1))).await {
            Ok(ReadOutcome::Timeout) => continue,
            Ok(ReadOutcome::Line(line)) => {
                let inner = Action::from_line(&line);
                match inner.name() {
                    ACTION_RELEASE => {
                        framer.send(RESPONSE_RELEASED).await?;
                        return Ok(());
                    }
                    ACTION_KEEPALIVE => {
                        framer.send(RESPONSE_STILL_ALIVE).await?;
                    }
                    _ => {
                        // Invalid inner action: respond, but keep the lease.
                        framer.send(RESPONSE_INVALID_ACTION).await?;
                    }
                }
            }
            Err(Error::PeerDisconnected) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
