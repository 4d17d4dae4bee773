mod config;
mod hold;
mod turn;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flow_guardian::{ConversationGuard, TurnOutcome};
use hold::{HoldReport, PendingHold};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use turn::TurnInput;

/// Evaluate chat turns through the flow guardian and print each outcome as
/// a JSON line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Evaluate a single message instead of reading JSON lines from stdin
    #[arg(long)]
    message: Option<String>,

    /// User id for turns that do not carry one
    #[arg(long, default_value = "cli")]
    user: String,

    /// Client IP for turns that do not carry one
    #[arg(long)]
    ip: Option<String>,

    /// Path to a guardian TOML config (GUARDIAN_* env vars still apply)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the simulated hold after a handover (the next turn or Ctrl-C
    /// cancels it)
    #[arg(long, default_value_t = false)]
    hold: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;
    info!(
        feature = %config.feature,
        rate_limit = config.rate_limit,
        window_ms = config.window_ms,
        "Flow guardian starting"
    );
    let guard = ConversationGuard::new(config).context("Failed to build conversation guard")?;

    let session = CancellationToken::new();
    let ctrl_c = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    if let Some(message) = args.message.as_deref() {
        let turn = TurnInput::from_message(message);
        if let Some(pending) = run_turn(&guard, &args, &turn, &session).await? {
            print_report(&pending.finish().await?)?;
        }
        return Ok(());
    }

    let mut pending: Option<PendingHold> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = session.cancelled() => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let turn: TurnInput = match serde_json::from_str(&line) {
            Ok(turn) => turn,
            Err(e) => {
                warn!(error = %e, "Skipping malformed turn");
                continue;
            }
        };
        // a new message ends the hold still waiting on the previous one
        if let Some(hold) = pending.take() {
            print_report(&hold.interrupt().await?)?;
        }
        pending = run_turn(&guard, &args, &turn, &session).await?;
    }

    // no further message can arrive; let the last hold run out
    if let Some(hold) = pending.take() {
        print_report(&hold.finish().await?)?;
    }
    Ok(())
}

/// Evaluate and print one turn. Returns the started hold, if any.
async fn run_turn(
    guard: &ConversationGuard,
    args: &Args,
    turn: &TurnInput,
    session: &CancellationToken,
) -> Result<Option<PendingHold>> {
    let (user, ip) = turn.identity(&args.user, args.ip.as_deref());
    let key = guard.key_for(user, ip);
    let outcome = guard.evaluate(&key, &turn.message, &turn.context()).await;
    println!("{}", serde_json::to_string(&outcome)?);

    match &outcome {
        TurnOutcome::Handover { detection, .. } if args.hold => {
            let hold = guard.start_hold_with_token(&detection.summary(), session)?;
            Ok(Some(PendingHold::spawn(hold)))
        }
        _ => Ok(None),
    }
}

fn print_report(report: &HoldReport) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
