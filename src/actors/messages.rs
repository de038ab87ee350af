//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Replies**: oneshot channels carried inside the command
//! 3. **Events**: fired alerts are broadcast by the rule engine, not by actors

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Outcome of one SNMP polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    /// Devices attempted
    pub polled: usize,

    /// Devices whose sample was collected and persisted
    pub succeeded: usize,

    /// Devices that timed out, errored or could not be persisted
    pub failed: usize,
}

/// Commands that can be sent to the SnmpPollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Run a polling cycle now, bypassing the interval timer
    PollNow {
        respond_to: oneshot::Sender<anyhow::Result<PollSummary>>,
    },

    /// Stop after the current cycle
    Shutdown,
}

/// Outcome of one scheduled evaluation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Devices with a fresh sample
    pub devices: usize,

    /// Alerts fired and persisted
    pub alerts: usize,

    /// Rule loading failed and the built-in rules were used
    pub degraded: bool,
}

/// Commands that can be sent to the AlertSchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    RunNow {
        respond_to: oneshot::Sender<CycleSummary>,
    },

    Shutdown,
}

/// Syslog listener counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyslogStats {
    /// Datagrams received since startup
    pub received: u64,
}

/// Commands that can be sent to the SyslogListenerActor
#[derive(Debug)]
pub enum SyslogCommand {
    GetStats {
        respond_to: oneshot::Sender<SyslogStats>,
    },

    /// Stop listening and release the socket
    Shutdown,
}

/// Commands that can be sent to the RetentionActor
#[derive(Debug)]
pub enum RetentionCommand {
    /// Run a cleanup now; replies with the number of deleted metric rows
    RunNow {
        respond_to: oneshot::Sender<anyhow::Result<usize>>,
    },

    Shutdown,
}
