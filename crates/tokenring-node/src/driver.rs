//! The per-node round state machine.
//!
//! ```text
//! AWAIT --token--> AUGMENT --observer--> OBSERVE --> FORWARD --> AWAIT
//!   |                  \---------other-------------->/
//!   +--missing, not observer--> REGENERATE --> AWAIT
//!   +--missing, observer------> AWAIT
//! ```
//!
//! One state runs at a time. The only suspension points are the bounded
//! inbound wait and the bounded per-hop sends, plus the pacing pauses.
//! Shutdown is observed between states; a token held at that moment is
//! dropped, never forwarded.

use std::sync::Arc;
use std::time::Duration;

use tokenring_network::{Delivery, Forwarder, Inbound, NetworkError, TokenListener};
use tokenring_protocol::{RingConfig, Role, Token};

use crate::config::{CorruptTokenPolicy, NodeConfig};
use crate::context::RunContext;
use crate::recovery::RecoveryController;
use crate::render::Renderer;
use crate::sensor::MeasurementSource;

#[derive(Debug)]
pub enum RoundState {
    Await,
    Augment(Token),
    Observe(Token),
    /// `completes_round` is false for the bootstrap token, which was not
    /// received from anyone.
    Forward { token: Token, completes_round: bool },
    Regenerate,
}

impl RoundState {
    fn holds_token(&self) -> bool {
        matches!(
            self,
            RoundState::Augment(_) | RoundState::Observe(_) | RoundState::Forward { .. }
        )
    }
}

/// Counters exposed so operators can tell a healthy ring from a fragmented one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingStats {
    pub rounds_completed: u64,
    pub tokens_received: u64,
    pub tokens_forwarded: u64,
    pub regenerations: u64,
    pub corrupt_tokens: u64,
    pub skipped_successors: u64,
    pub ring_unreachable: u64,
    pub render_failures: u64,
}

/// Timing and policy knobs the driver needs, lifted out of `NodeConfig`.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub receive_timeout: Duration,
    pub hop_timeout: Duration,
    pub round_pause: Duration,
    pub retry_pause: Duration,
    pub corrupt_policy: CorruptTokenPolicy,
}

impl From<&NodeConfig> for DriverSettings {
    fn from(config: &NodeConfig) -> Self {
        Self {
            receive_timeout: config.timing.receive_timeout(),
            hop_timeout: config.timing.hop_timeout(),
            round_pause: config.timing.round_pause(),
            retry_pause: config.timing.retry_pause(),
            corrupt_policy: config.corrupt_token_policy,
        }
    }
}

pub struct RoundDriver {
    role: Role,
    listener: TokenListener,
    forwarder: Forwarder,
    source: Arc<dyn MeasurementSource>,
    recovery: RecoveryController,
    renderer: Option<Arc<dyn Renderer>>,
    settings: DriverSettings,
    /// Label for the next render; starts at 1.
    round: u64,
    bootstrapped: bool,
    stats: RingStats,
}

impl RoundDriver {
    pub fn new(
        ring: RingConfig,
        listener: TokenListener,
        source: Arc<dyn MeasurementSource>,
        settings: DriverSettings,
    ) -> Self {
        let forwarder = Forwarder::new(ring.topology, settings.hop_timeout);
        Self {
            role: ring.role,
            listener,
            forwarder,
            recovery: RecoveryController::new(Arc::clone(&source)),
            source,
            renderer: None,
            settings,
            round: 1,
            bootstrapped: false,
            stats: RingStats::default(),
        }
    }

    /// Only consulted when the role renders.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn stats(&self) -> &RingStats {
        &self.stats
    }

    /// Run until shutdown.
    pub async fn run(self, ctx: RunContext) -> RingStats {
        self.run_rounds(ctx, None).await
    }

    /// Run until shutdown or until `limit` rounds have completed.
    pub async fn run_rounds(mut self, ctx: RunContext, limit: Option<u64>) -> RingStats {
        let topology = self.forwarder.topology();
        tracing::info!(
            role = %self.role,
            node = %topology.self_address(),
            index = topology.self_index(),
            predecessor = %topology.predecessor(),
            ring_size = topology.len(),
            "Round driver started"
        );

        let mut state = self.initial_state();
        loop {
            if ctx.is_shutdown() {
                if state.holds_token() {
                    tracing::info!(round = self.round, "Shutdown requested, abandoning held token");
                } else {
                    tracing::info!(round = self.round, "Shutdown requested");
                }
                break;
            }
            if matches!(state, RoundState::Await)
                && limit.is_some_and(|n| self.stats.rounds_completed >= n)
            {
                break;
            }
            state = self.step(state, &ctx).await;
        }

        tracing::info!(role = %self.role, stats = ?self.stats, "Round driver stopped");
        self.stats
    }

    /// The initiator's first cycle bootstraps a token; every other cycle,
    /// and every other role, starts by waiting.
    fn initial_state(&mut self) -> RoundState {
        if self.role.bootstraps() && !self.bootstrapped {
            self.bootstrapped = true;
            let token = self.recovery.fresh_token();
            tracing::info!(entries = token.len(), "Bootstrapping initial token");
            RoundState::Forward {
                token,
                completes_round: false,
            }
        } else {
            RoundState::Await
        }
    }

    async fn step(&mut self, state: RoundState, ctx: &RunContext) -> RoundState {
        match state {
            RoundState::Await => self.await_token(ctx).await,
            RoundState::Augment(token) => self.augment(token),
            RoundState::Observe(token) => self.observe(token),
            RoundState::Forward {
                token,
                completes_round,
            } => self.forward(token, completes_round, ctx).await,
            RoundState::Regenerate => self.regenerate(ctx).await,
        }
    }

    async fn await_token(&mut self, ctx: &RunContext) -> RoundState {
        match self.listener.receive_token(self.settings.receive_timeout).await {
            Ok(Inbound::Token { token, from }) => {
                self.stats.tokens_received += 1;
                tracing::info!(
                    peer = %from,
                    entries = token.len(),
                    round = self.round,
                    "Received token"
                );
                RoundState::Augment(token)
            }
            Ok(Inbound::NoToken) => {
                tracing::warn!(
                    waited_ms = self.settings.receive_timeout.as_millis() as u64,
                    "No token within wait budget"
                );
                self.after_missing_token()
            }
            Ok(Inbound::Corrupt { from, reason }) => {
                self.stats.corrupt_tokens += 1;
                tracing::warn!(peer = %from, reason = %reason, "Discarding corrupt token");
                match self.settings.corrupt_policy {
                    CorruptTokenPolicy::Regenerate => self.after_missing_token(),
                    CorruptTokenPolicy::Await => RoundState::Await,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Receiving token failed");
                ctx.pause(self.settings.retry_pause).await;
                RoundState::Await
            }
        }
    }

    fn after_missing_token(&self) -> RoundState {
        if self.role.may_regenerate() {
            RoundState::Regenerate
        } else {
            RoundState::Await
        }
    }

    fn augment(&mut self, mut token: Token) -> RoundState {
        let ring_size = self.forwarder.topology().len();
        let evicted = token.append_within(self.source.measure(), ring_size);
        tracing::debug!(entries = token.len(), evicted, "Appended local measurement");

        if self.role.renders() {
            RoundState::Observe(token)
        } else {
            RoundState::Forward {
                token,
                completes_round: true,
            }
        }
    }

    fn observe(&mut self, token: Token) -> RoundState {
        if let Some(renderer) = &self.renderer {
            match renderer.render(self.round, &token) {
                Ok(path) => tracing::info!(
                    round = self.round,
                    entries = token.len(),
                    path = %path.display(),
                    "Rendered round"
                ),
                Err(e) => {
                    self.stats.render_failures += 1;
                    tracing::warn!(round = self.round, error = %e, "Render failed");
                }
            }
        }
        RoundState::Forward {
            token,
            completes_round: true,
        }
    }

    async fn forward(&mut self, token: Token, completes_round: bool, ctx: &RunContext) -> RoundState {
        if completes_round && !ctx.pause(self.settings.round_pause).await {
            tracing::info!(round = self.round, "Shutdown during round pause, abandoning held token");
            return RoundState::Await;
        }

        let result = self.forwarder.forward(token).await;
        self.record_forward(result);

        if completes_round {
            self.stats.rounds_completed += 1;
            tracing::info!(
                round = self.round,
                received = self.stats.tokens_received,
                forwarded = self.stats.tokens_forwarded,
                regenerations = self.stats.regenerations,
                corrupt = self.stats.corrupt_tokens,
                ring_unreachable = self.stats.ring_unreachable,
                "Round complete"
            );
            self.round += 1;
        }
        RoundState::Await
    }

    async fn regenerate(&mut self, ctx: &RunContext) -> RoundState {
        self.stats.regenerations += 1;
        let result = self.recovery.regenerate(&self.forwarder).await;
        self.record_forward(result);
        ctx.pause(self.settings.retry_pause).await;
        RoundState::Await
    }

    fn record_forward(&mut self, result: Result<Delivery, NetworkError>) {
        match result {
            Ok(delivery) => {
                self.stats.tokens_forwarded += 1;
                self.stats.skipped_successors += delivery.skipped.len() as u64;
            }
            Err(NetworkError::RingUnreachable { tried }) => {
                self.stats.ring_unreachable += 1;
                self.stats.skipped_successors += tried as u64;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Forwarding failed, token dropped");
            }
        }
    }
}
