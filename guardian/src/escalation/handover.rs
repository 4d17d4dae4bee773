//! Hold/Handover — explicit states and a cancellable hold timer.
//!
//! ```text
//! Normal ──escalation_required──▶ Escalating ──▶ HoldSimulated ──timer──▶ HandedOff
//!   ▲                                 │               │
//!   └──────────── cancelled ──────────┴───────────────┘
//! ```
//!
//! `HandedOff` is terminal: the caller routes the next turn to a fresh
//! assistant context or a human queue. The hold never blocks a thread; it
//! races a `tokio` sleep against a [`CancellationToken`] that the session
//! fires when a new message arrives or the conversation ends.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{GuardError, GuardResult};

/// Hard cap on any simulated hold.
pub const MAX_HOLD_MS: u64 = 60_000;

/// Hold length used when the caller does not ask for one.
pub const DEFAULT_HOLD_MS: u64 = 30_000;

/// Clamp a requested hold to [`MAX_HOLD_MS`].
pub fn capped_hold_ms(requested_ms: u64) -> u64 {
    requested_ms.min(MAX_HOLD_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverState {
    Normal,
    Escalating,
    HoldSimulated,
    HandedOff,
}

impl HandoverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::HandedOff)
    }
}

impl fmt::Display for HandoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Escalating => write!(f, "escalating"),
            Self::HoldSimulated => write!(f, "hold_simulated"),
            Self::HandedOff => write!(f, "handed_off"),
        }
    }
}

fn is_legal_transition(from: HandoverState, to: HandoverState) -> bool {
    use HandoverState::*;

    matches!(
        (from, to),
        (Normal, Escalating)
            | (Escalating, HoldSimulated)
            | (HoldSimulated, HandedOff)
            // cancellation returns the conversation to normal
            | (Escalating, Normal)
            | (HoldSimulated, Normal)
    )
}

/// A single recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: HandoverState,
    pub to: HandoverState,
    /// Milliseconds since the machine was created.
    pub elapsed_ms: u64,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Guarded handover state machine with a transition log.
#[derive(Debug, Clone)]
pub struct HandoverMachine {
    state: HandoverState,
    started: Instant,
    log: Vec<TransitionRecord>,
}

impl HandoverMachine {
    pub fn new() -> Self {
        Self {
            state: HandoverState::Normal,
            started: Instant::now(),
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> HandoverState {
        self.state
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.log
    }

    /// Move to `to`, rejecting edges outside the state graph.
    pub fn advance(&mut self, to: HandoverState, reason: Option<&str>) -> GuardResult<()> {
        let from = self.state;
        if !is_legal_transition(from, to) {
            return Err(GuardError::IllegalTransition { from, to });
        }
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        debug!(%from, %to, elapsed_ms, "Handover transition");
        self.log.push(TransitionRecord {
            from,
            to,
            elapsed_ms,
            at: Utc::now(),
            reason: reason.map(str::to_string),
        });
        self.state = to;
        Ok(())
    }
}

impl Default for HandoverMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// How a hold ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum HoldOutcome {
    HandedOff { waited_ms: u64 },
    Cancelled { waited_ms: u64 },
}

/// One escalation's hold, from `Escalating` to its end.
#[derive(Debug)]
pub struct HoldSession {
    machine: HandoverMachine,
    hold: Duration,
    cancel: CancellationToken,
}

impl HoldSession {
    /// Enter `Escalating` with a hold of `requested_ms`, capped at
    /// [`MAX_HOLD_MS`].
    pub fn begin(requested_ms: u64, reason: &str) -> GuardResult<Self> {
        Self::with_token(requested_ms, reason, CancellationToken::new())
    }

    /// Like [`HoldSession::begin`], tied to an existing session token so that
    /// ending the session also ends the hold.
    pub fn with_token(
        requested_ms: u64,
        reason: &str,
        cancel: CancellationToken,
    ) -> GuardResult<Self> {
        let mut machine = HandoverMachine::new();
        machine.advance(HandoverState::Escalating, Some(reason))?;
        Ok(Self {
            machine,
            hold: Duration::from_millis(capped_hold_ms(requested_ms)),
            cancel,
        })
    }

    pub fn state(&self) -> HandoverState {
        self.machine.state()
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold
    }

    /// Token that aborts the hold. Fire it on a new user message or when
    /// the session ends.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait out the hold unless cancelled first.
    ///
    /// Returns the outcome and the machine so the caller can inspect the
    /// transition log.
    pub async fn run(mut self) -> GuardResult<(HoldOutcome, HandoverMachine)> {
        self.machine
            .advance(HandoverState::HoldSimulated, Some("hold started"))?;
        let started = Instant::now();
        info!(hold_ms = self.hold.as_millis() as u64, "Simulating hold before handover");

        let cancelled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(self.hold) => false,
        };
        let waited_ms = started.elapsed().as_millis() as u64;

        let outcome = if cancelled {
            self.machine
                .advance(HandoverState::Normal, Some("hold cancelled"))?;
            info!(waited_ms, "Hold cancelled before handover");
            HoldOutcome::Cancelled { waited_ms }
        } else {
            self.machine
                .advance(HandoverState::HandedOff, Some("hold complete"))?;
            info!(waited_ms, "Hold complete, handing off to specialist");
            HoldOutcome::HandedOff { waited_ms }
        };
        Ok((outcome, self.machine))
    }
}
