// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static handler registration (spec.md §4.13): one submodule per event
//! namespace, each registering its handlers and a discovery blurb against
//! the shared `Router<DaemonCtx>`/`DiscoveryRegistry` pair.
//!
//! `monitor:subscribe` is deliberately absent here -- it upgrades a
//! connection to a streaming push rather than answering one request, so
//! `listener.rs` special-cases it directly as a connection upgrade rather
//! than dispatching it through the handler table.

mod agent;
mod async_state;
mod completion;
mod composition;
mod correlation;
mod extract;
mod injection;
mod monitor;
mod permission;
mod state;
mod system;

use std::sync::Arc;

use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, Router};

use crate::context::DaemonCtx;

fn reg<H>(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry, pattern: &str, handler: H)
where
    H: Handler<DaemonCtx> + Discoverable + 'static,
{
    discovery.register(handler.describe());
    router.register(pattern, Arc::new(handler));
}

pub(crate) fn register_all(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    system::register(router, discovery);
    state::register(router, discovery);
    async_state::register(router, discovery);
    composition::register(router, discovery);
    permission::register(router, discovery);
    completion::register(router, discovery);
    agent::register(router, discovery);
    injection::register(router, discovery);
    monitor::register(router, discovery);
    correlation::register(router, discovery);
}
