//! Background hold after a handover.
//!
//! The hold runs on its own task so the stdin loop keeps reading; the next
//! turn for the session cancels it.

use anyhow::{Context, Result};
use flow_guardian::escalation::{HandoverMachine, HandoverState, TransitionRecord};
use flow_guardian::{GuardResult, HoldOutcome, HoldSession};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Printed once a hold has ended.
#[derive(Debug, Serialize)]
pub struct HoldReport {
    pub hold: HoldOutcome,
    pub state: HandoverState,
    pub transitions: Vec<TransitionRecord>,
}

impl HoldReport {
    fn new(hold: HoldOutcome, machine: &HandoverMachine) -> Self {
        Self {
            hold,
            state: machine.state(),
            transitions: machine.transitions().to_vec(),
        }
    }
}

/// A hold running in the background.
pub struct PendingHold {
    cancel: CancellationToken,
    handle: JoinHandle<GuardResult<(HoldOutcome, HandoverMachine)>>,
}

impl PendingHold {
    pub fn spawn(hold: HoldSession) -> Self {
        let cancel = hold.cancel_token();
        let handle = tokio::spawn(hold.run());
        Self { cancel, handle }
    }

    /// The user sent another message: stop waiting and report.
    pub async fn interrupt(self) -> Result<HoldReport> {
        self.cancel.cancel();
        self.finish().await
    }

    /// Wait for the hold to end on its own (or via the session token).
    pub async fn finish(self) -> Result<HoldReport> {
        let (outcome, machine) = self.handle.await.context("Hold task panicked")??;
        Ok(HoldReport::new(outcome, &machine))
    }
}
