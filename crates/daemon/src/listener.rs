// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O (spec.md §4.12, §6.1).
//!
//! Runs in a spawned task, accepting Unix-domain stream connections and
//! handling each without blocking any other connection. Grounded in the
//! teacher's `listener/mod.rs` accept-loop/per-connection-task shape,
//! generalized from a closed `Request` enum to the daemon's open
//! `{event, data}` dispatch through `Router<DaemonCtx>`.

use std::sync::Arc;

use ksi_core::{now_seconds, CorrelationId, Event};
use ksi_wire::{read_frame, write_frame, FrameError, PushFrame, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::context::DaemonCtx;

pub struct Listener {
    unix: UnixListener,
    ctx: Arc<DaemonCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<DaemonCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept connections until the daemon's shutdown signal fires,
    /// spawning one task per connection so a slow client never blocks
    /// another (spec.md §5).
    pub async fn run(self) {
        loop {
            tokio::select! {
                accepted = self.unix.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let ctx = Arc::clone(&self.ctx);
                            let (reader, writer) = stream.into_split();
                            tokio::spawn(async move {
                                handle_connection(reader, writer, ctx).await;
                            });
                        }
                        Err(err) => error!(%err, "accept error"),
                    }
                }
                _ = self.ctx.shutdown.notified() => {
                    info!("listener shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle_connection<R, W>(reader: R, mut writer: W, ctx: Arc<DaemonCtx>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("client disconnected");
                return;
            }
            Err(err) => {
                log_frame_error(&err);
                return;
            }
        };
        let request: Request = match serde_json::from_value(frame) {
            Ok(request) => request,
            Err(err) => {
                let response = Response::error(format!("invalid request frame: {err}"));
                if write_frame(&mut writer, &response).await.is_err() {
                    return;
                }
                continue;
            }
        };

        if request.event == "monitor:subscribe" {
            run_subscription(&request, &mut writer, &ctx).await;
            return;
        }

        let response = dispatch(&ctx, request).await;
        if write_frame(&mut writer, &response).await.is_err() {
            return;
        }
    }
}

async fn dispatch(ctx: &DaemonCtx, request: Request) -> Response {
    let now = now_seconds();
    let event = Event::new(request.event.clone(), request.data, now);
    let parent = request.correlation_id.as_deref().map(CorrelationId::from_string);
    match ctx.router.emit_first(ctx, event, parent).await {
        Some(value) => Response::ok(value),
        None => Response::error(format!("no handler registered for event `{}`", request.event)),
    }
}

/// Upgrades the connection into a one-way push stream for `monitor:subscribe`
/// (spec.md §4.1, §4.12): the client sends one request naming the patterns
/// it wants, then the connection carries nothing but `PushFrame`s until it
/// disconnects or the daemon shuts down.
async fn run_subscription<W>(request: &Request, writer: &mut W, ctx: &Arc<DaemonCtx>)
where
    W: AsyncWrite + Unpin,
{
    let patterns = request
        .data
        .get("patterns")
        .and_then(serde_json::Value::as_array)
        .map(|values| values.iter().filter_map(serde_json::Value::as_str).map(str::to_owned).collect())
        .unwrap_or_else(|| vec!["*".to_string()]);

    let (subscription_id, mut receiver) = ctx.router.subscribe(patterns);
    let ack = Response::ok(serde_json::json!({ "status": "subscribed" }));
    if write_frame(writer, &ack).await.is_err() {
        ctx.router.unsubscribe(subscription_id);
        return;
    }

    loop {
        tokio::select! {
            pushed = receiver.recv() => {
                match pushed {
                    Some(event) => {
                        let mut frame = PushFrame::new(event.name, event.data, event.timestamp);
                        if let Some(correlation_id) = event.correlation_id {
                            frame = frame.with_correlation(correlation_id.as_str());
                        }
                        if write_frame(writer, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ctx.shutdown.notified() => break,
        }
    }
    ctx.router.unsubscribe(subscription_id);
}

fn log_frame_error(err: &FrameError) {
    match err {
        FrameError::Io(io_err) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected mid-frame");
        }
        _ => warn!(%err, "frame error"),
    }
}
