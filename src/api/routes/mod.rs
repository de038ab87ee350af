pub mod alerts;
pub mod devices;
pub mod health;
pub mod metrics;
pub mod rules;
pub mod syslog;
pub mod topology;
