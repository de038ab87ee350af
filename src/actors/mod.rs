//! Actor-based telemetry pipeline
//!
//! Each actor runs as an independent async task and is driven through a
//! cloneable handle wrapping its mpsc command channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!                       ┌─────────────────┐
//!                       │   Hub (main)    │
//!                       └────────┬────────┘
//!                                │ spawns
//!      ┌──────────────┬──────────┼───────────┬───────────────┐
//!      │              │          │           │               │
//! ┌────▼─────┐  ┌─────▼─────┐  ┌─▼────────┐  ┌▼──────────┐  ┌─▼───┐
//! │ Poller   │  │ Scheduler │  │ Syslog   │  │ Retention │  │ API │
//! └────┬─────┘  └─────┬─────┘  └────┬─────┘  └─────┬─────┘  └──┬──┘
//!      │ sample       │ batch       │ record       │ sweep     │
//!      └──────┬───────┘             │              │           │
//!      ┌──────▼───────────┐         │              │           │
//!      │ AlertRuleEngine  │──► broadcast (alerts)  │           │
//!      └──────┬───────────┘         │              │           │
//!             └─────────────────────┴──────┬───────┴───────────┘
//!                                   ┌──────▼──────┐
//!                                   │   Storage   │
//!                                   └─────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **SnmpPollerActor**: Polls SNMP devices and evaluates every fresh sample
//! - **AlertSchedulerActor**: Re-evaluates the latest sample per device
//! - **SyslogListenerActor**: Persists syslog datagrams received over UDP
//! - **RetentionActor**: Deletes metrics past the retention period
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Events**: The rule engine publishes fired alerts on a broadcast channel
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod messages;
pub mod poller;
pub mod retention;
pub mod scheduler;
pub mod syslog;
