//! Asynchronous coil write path.
//!
//! Each dispatch becomes its own task returning a [`CommandHandle`] and writes
//! over a connection of its own. Concurrent connections are bounded by a
//! semaphore. There is no ordering guarantee between
//! two dispatches: when both target the same coil, whichever write completes
//! last on the wire wins.

use super::connection::ConnectionState;
use super::link::BusLink;
use super::LogKind;
use crate::error::BusError;
use crate::map::coil_label;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub coil: u16,
    pub value: bool,
}

impl Command {
    pub fn new(coil: u16, value: bool) -> Self {
        Self { coil, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Accepted,
    /// The plant (or a gateway in front of it) answered with an error.
    Rejected(String),
    /// The write never got an answer: transport lost or timed out.
    Failed(String),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("PLC Disconnected (link is {0})")]
    NotConnected(ConnectionState),
}

/// Completion handle of one dispatched command.
#[derive(Debug)]
pub struct CommandHandle {
    command: Command,
    task: JoinHandle<CommandOutcome>,
}

impl CommandHandle {
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn outcome(self) -> CommandOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => CommandOutcome::Failed(format!("dispatch task ended: {}", e)),
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    link: Arc<BusLink>,
    permits: Arc<Semaphore>,
}

impl CommandDispatcher {
    pub fn new(link: Arc<BusLink>) -> Self {
        let permits = Arc::new(Semaphore::new(link.config().max_in_flight));
        Self { link, permits }
    }

    /// Refused up front unless the link is [`ConnectionState::Connected`];
    /// everything after that is reported through the handle and the event log.
    pub fn dispatch(&self, command: Command) -> Result<CommandHandle, DispatchError> {
        let state = self.link.state();
        if state != ConnectionState::Connected {
            warn!("Refusing command to coil {}: link is {}", command.coil, state);
            return Err(DispatchError::NotConnected(state));
        }

        let link = Arc::clone(&self.link);
        let permits = Arc::clone(&self.permits);
        let task = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return CommandOutcome::Failed("dispatcher closed".into());
            };

            link.log(
                LogKind::Info,
                format!("Sending CMD to Coil {} ({})...", command.coil, coil_label(command.coil)),
            );
            let outcome = match link.write_coil(command.coil, command.value).await {
                Ok(()) => CommandOutcome::Accepted,
                Err(BusError::Protocol(reason)) => CommandOutcome::Rejected(reason),
                Err(e) => CommandOutcome::Failed(e.to_string()),
            };
            report(&link, command, &outcome);
            outcome
        });

        Ok(CommandHandle { command, task })
    }
}

fn report(link: &BusLink, command: Command, outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Accepted => {
            info!("✅ Coil {} <- {} accepted", command.coil, command.value);
            link.log(
                LogKind::Accepted,
                format!("[+] COMMAND ACCEPTED (Coil {})", command.coil),
            );
        }
        CommandOutcome::Rejected(reason) => {
            warn!("❌ Coil {} <- {} rejected: {}", command.coil, command.value, reason);
            link.log(
                LogKind::Rejected,
                format!("[!] PLC REJECTED COMMAND (Coil {})", command.coil),
            );
        }
        CommandOutcome::Failed(reason) => {
            warn!("⚠️  Coil {} <- {} failed: {}", command.coil, command.value, reason);
            link.log(LogKind::Error, format!("Error: {}", reason));
        }
    }
}
