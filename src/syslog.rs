//! Syslog datagram parsing
//!
//! Only the `<PRI>` header is interpreted. Whatever follows it (timestamp,
//! hostname, tag) is kept verbatim as the message; the hostname of the
//! record is the sender's address, not the one claimed in the payload.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::storage::schema::SyslogRecord;

/// user.notice, assumed when the datagram carries no priority
pub const DEFAULT_PRIORITY: u8 = 13;

const MAX_PRIORITY: u16 = 191;

/// Build a record from one received datagram
pub fn parse_datagram(
    bytes: &[u8],
    source_ip: IpAddr,
    received_at: DateTime<Utc>,
) -> SyslogRecord {
    let raw = String::from_utf8_lossy(bytes).into_owned();
    let (priority, rest) = split_priority(&raw);
    let message = rest.trim().to_string();

    SyslogRecord {
        id: None,
        hostname: source_ip.to_string(),
        facility: priority / 8,
        severity: priority % 8,
        message,
        raw,
        received_at,
    }
}

/// Split a leading `<PRI>` off the text
///
/// A header that is not 1 to 3 digits within 0..=191 is treated as message
/// text and the default priority applies.
fn split_priority(text: &str) -> (u8, &str) {
    let Some(after_open) = text.strip_prefix('<') else {
        return (DEFAULT_PRIORITY, text);
    };
    let Some(close) = after_open.find('>') else {
        return (DEFAULT_PRIORITY, text);
    };

    let digits = &after_open[..close];
    let valid = (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
    if !valid {
        return (DEFAULT_PRIORITY, text);
    }

    match digits.parse::<u16>() {
        Ok(pri) if pri <= MAX_PRIORITY => (pri as u8, &after_open[close + 1..]),
        _ => (DEFAULT_PRIORITY, text),
    }
}
