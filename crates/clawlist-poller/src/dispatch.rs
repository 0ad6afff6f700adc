//! Delivery of listing alerts to buyer agents.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use clawlist_types::{BuyerProfile, RoomEvent};
use tokio::process::Command;

use crate::error::DispatchError;

/// Characters of the listing body quoted in an alert.
const ALERT_BODY_CHARS: usize = 200;

/// One alert addressed to one buyer agent.
#[derive(Clone, PartialEq, Eq)]
pub struct Trigger {
    pub profile: String,
    pub gateway_url: String,
    pub gateway_token: String,
    pub text: String,
}

impl Trigger {
    /// Builds the alert for `buyer` about `event` in `room`.
    pub fn for_listing(buyer: &BuyerProfile, room: &str, event: &RoomEvent) -> Self {
        Self {
            profile: buyer.profile.clone(),
            gateway_url: buyer.gateway_url.clone(),
            gateway_token: buyer.gateway_token.clone(),
            text: alert_text(room, event),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("profile", &self.profile)
            .field("gateway_url", &self.gateway_url)
            .field("gateway_token", &"[REDACTED]")
            .field("text", &self.text)
            .finish()
    }
}

/// Renders the alert sent to a buyer agent for a matching listing.
pub fn alert_text(room: &str, event: &RoomEvent) -> String {
    let excerpt: String = event.body.chars().take(ALERT_BODY_CHARS).collect();
    format!(
        "NEW LISTING ALERT:\n\n\
         Listing in {room} matches your interests!\n\n\
         Message: {excerpt}\n\
         From: {sender}\n\n\
         Action: DM the seller now to start negotiating. Ask about condition, \
         accessories, price, and pickup location.",
        sender = event.sender,
    )
}

/// Sink for triggers. Implementations must be shareable across the
/// delayed dispatch tasks.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, trigger: Trigger) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Runs the agent CLI once per trigger:
/// `<program> --profile <p> system event --url <u> --token <t> --text <alert>`.
///
/// Arguments are passed directly, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    program: PathBuf,
    timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Dispatcher for CommandDispatcher {
    async fn dispatch(&self, trigger: Trigger) -> Result<(), DispatchError> {
        let mut command = Command::new(&self.program);
        command
            .arg("--profile")
            .arg(&trigger.profile)
            .arg("system")
            .arg("event")
            .arg("--url")
            .arg(&trigger.gateway_url)
            .arg("--token")
            .arg(&trigger.gateway_token)
            .arg("--text")
            .arg(&trigger.text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout.as_secs()))?
            .map_err(DispatchError::Spawn)?;

        if !output.status.success() {
            return Err(DispatchError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
