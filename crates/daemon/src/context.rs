// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's shared context: every long-lived subsystem the event
//! handlers touch, bundled behind one `Arc<DaemonCtx>` (spec.md §6).
//!
//! `ksi-engine`'s pieces are transport- and context-agnostic; this module
//! is where they get wired to each other and to a concrete
//! `Router<DaemonCtx>`. The one circular piece is [`RouterSink`]: the
//! scheduler, injection router, and agent manager all need to emit
//! events back through the very router they are constructed alongside,
//! so `RouterSink` holds a `Weak<DaemonCtx>` set once construction
//! finishes rather than taking `Arc<DaemonCtx>` up front.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use ksi_adapters::SubprocessProvider;
use ksi_compositions::{CapabilityRegistry, CompositionStore};
use ksi_core::Event;
use ksi_engine::{AgentManager, CircuitBreaker, DiscoveryRegistry, EventSink, InjectionRouter, Router, Scheduler};
use ksi_storage::{CorrelationStore, EventLog, Paths, StateStore};
use tokio::sync::Notify;
use tracing::warn;

use crate::config::Config;

/// Forwards `Scheduler`/`InjectionRouter`/`AgentManager` emissions into
/// the shared `Router<DaemonCtx>`, running every registered handler for
/// the event and discarding the responses -- these are fire-and-forget
/// pushes (`completion:result`, `injection:stored`, `agent:cancel_outstanding`,
/// ...), not request/response calls.
pub struct RouterSink {
    ctx: OnceLock<Weak<DaemonCtx>>,
}

impl RouterSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { ctx: OnceLock::new() })
    }

    fn bind(&self, ctx: &Arc<DaemonCtx>) {
        let _ = self.ctx.set(Arc::downgrade(ctx));
    }
}

#[async_trait]
impl EventSink for RouterSink {
    async fn emit(&self, event: Event) {
        let Some(weak) = self.ctx.get() else {
            warn!(event = %event.name, "router sink used before bind(); dropping event");
            return;
        };
        let Some(ctx) = weak.upgrade() else {
            warn!(event = %event.name, "daemon context already dropped; dropping event");
            return;
        };
        let name = event.name.clone();
        let responses = ctx.router.emit(&ctx, event, None).await;
        if let Some(error) = responses.iter().find_map(|r| r.get("error")) {
            warn!(event = %name, %error, "handler reported an error for a forwarded event");
        }
    }
}

/// Everything an event handler needs, shared read-only across every
/// connection and worker task.
pub struct DaemonCtx {
    pub config: Arc<Config>,
    pub router: Router<DaemonCtx>,
    pub state: Arc<StateStore>,
    pub event_log: Arc<EventLog>,
    pub correlation: Arc<CorrelationStore>,
    pub compositions: Arc<CompositionStore>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub discovery: Arc<DiscoveryRegistry>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub scheduler: Arc<Scheduler<SubprocessProvider, RouterSink>>,
    pub injection: Arc<InjectionRouter<RouterSink>>,
    pub agents: Arc<AgentManager<RouterSink>>,
    pub shutdown: Arc<Notify>,
    pub started_at: f64,
}

/// Assembled subsystems a caller (`main`, or a test harness) hands to
/// [`DaemonCtx::assemble`] instead of repeating every constructor.
pub struct Subsystems {
    pub state: Arc<StateStore>,
    pub event_log: Arc<EventLog>,
    pub correlation: Arc<CorrelationStore>,
    pub compositions: Arc<CompositionStore>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub provider_command: PathBuf,
}

impl DaemonCtx {
    /// Builds every subsystem and wires the two-phase `RouterSink` cycle:
    /// construct the sink unbound, build the scheduler/injection/agent
    /// managers against it, assemble `Router` + handler registrations,
    /// wrap the whole thing in an `Arc`, then bind the sink's weak
    /// back-reference.
    pub fn assemble(config: Arc<Config>, subsystems: Subsystems, now: f64) -> Arc<Self> {
        let paths = Arc::new(config.paths.clone());
        let circuit_breaker = Arc::new(CircuitBreaker::new());
        let sink = RouterSink::new();

        let provider = Arc::new(SubprocessProvider::new(subsystems.provider_command));
        let scheduler = Scheduler::new(Arc::clone(&paths), Arc::clone(&circuit_breaker), provider, Arc::clone(&sink));
        let injection = InjectionRouter::new(Arc::clone(&subsystems.state), Arc::clone(&circuit_breaker), Arc::clone(&sink));
        let agents = AgentManager::new(paths.sandbox_root.clone(), Arc::clone(&subsystems.state), Arc::clone(&sink));

        let capabilities = subsystems.capabilities;
        let mut discovery = DiscoveryRegistry::new();
        let mut router = Router::new(Arc::clone(&subsystems.event_log), Arc::clone(&subsystems.correlation));
        crate::handlers::register_all(&mut router, &mut discovery);
        let discovery = Arc::new(discovery);

        let ctx = Arc::new(Self {
            config,
            router,
            state: subsystems.state,
            event_log: subsystems.event_log,
            correlation: subsystems.correlation,
            compositions: subsystems.compositions,
            capabilities,
            discovery,
            circuit_breaker,
            scheduler,
            injection,
            agents,
            shutdown: Arc::new(Notify::new()),
            started_at: now,
        });
        sink.bind(&ctx);
        ctx
    }
}
