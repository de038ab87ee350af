//! Minimal SNMP v1/v2c client
//!
//! Only GET is implemented; that is all the poller needs. Requests go out over
//! a fresh connected UDP socket per call, with a per-attempt timeout and a
//! bounded number of retries.

pub mod ber;

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, trace};

use crate::SnmpVersion;
use ber::{Message, Pdu, PduType, decode_message, encode_message};

pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_UPTIME: &str = "1.3.6.1.2.1.1.3.0";

/// IF-MIB ifName column
pub const IF_NAME: &str = "1.3.6.1.2.1.31.1.1.1.1";
/// IF-MIB ifHCInOctets column
pub const IF_HC_IN_OCTETS: &str = "1.3.6.1.2.1.31.1.1.1.6";
/// IF-MIB ifHCOutOctets column
pub const IF_HC_OUT_OCTETS: &str = "1.3.6.1.2.1.31.1.1.1.10";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_RETRIES: u32 = 1;

/// Object identifier in dotted notation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// This OID with `index` appended, e.g. a table column plus row index
    pub fn child(&self, index: u32) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(index);
        Self(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err("empty OID".to_string());
        }

        trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| format!("invalid OID arc {arc:?} in {s:?}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
    }
}

/// A decoded variable value
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Numeric reading of the value
    ///
    /// Some agents report gauges as strings, so textual numbers are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnmpValue::Integer(v) => Some(*v as f64),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(f64::from(*v))
            }
            SnmpValue::Counter64(v) => Some(*v as f64),
            SnmpValue::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Integer(v) => u64::try_from(*v).ok(),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(u64::from(*v))
            }
            SnmpValue::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// v2c exception marker instead of a value
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

#[derive(Debug)]
pub enum SnmpError {
    /// No matching response after all retries
    Timeout,

    Io(std::io::Error),

    /// Malformed BER
    Decode(String),

    /// The agent answered with a non-zero error-status
    ErrorStatus { status: i64, index: i64 },
}

impl fmt::Display for SnmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpError::Timeout => write!(f, "SNMP request timed out"),
            SnmpError::Io(err) => write!(f, "SNMP I/O error: {}", err),
            SnmpError::Decode(msg) => write!(f, "malformed SNMP message: {}", msg),
            SnmpError::ErrorStatus { status, index } => {
                write!(f, "SNMP agent returned error-status {} at index {}", status, index)
            }
        }
    }
}

impl std::error::Error for SnmpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnmpError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnmpError {
    fn from(err: std::io::Error) -> Self {
        SnmpError::Io(err)
    }
}

/// Where and how to reach an agent
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpTarget {
    pub addr: SocketAddr,
    pub community: String,
    pub version: SnmpVersion,
}

impl SnmpTarget {
    pub fn new(addr: SocketAddr, community: impl Into<String>, version: SnmpVersion) -> Self {
        Self {
            addr,
            community: community.into(),
            version,
        }
    }
}

#[async_trait]
pub trait SnmpClient: Send + Sync {
    /// GET `oids` in one request; varbinds come back in request order
    async fn get(&self, target: &SnmpTarget, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError>;
}

pub struct UdpSnmpClient {
    timeout: Duration,
    retries: u32,
    next_request_id: AtomicI32,
}

impl UdpSnmpClient {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        let seed = (Utc::now().timestamp_subsec_nanos() & 0x3FFF_FFFF) as i32;

        Self {
            timeout,
            retries,
            next_request_id: AtomicI32::new(seed),
        }
    }

    fn request_id(&self) -> i32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }
}

impl Default for UdpSnmpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_RETRIES)
    }
}

#[async_trait]
impl SnmpClient for UdpSnmpClient {
    #[instrument(skip(self, target, oids), fields(target = %target.addr, oids = oids.len()))]
    async fn get(&self, target: &SnmpTarget, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        let request_id = self.request_id();
        let request = encode_message(&Message {
            version: target.version.wire_value(),
            community: target.community.as_bytes().to_vec(),
            pdu: Pdu::get_request(request_id, oids),
        });

        let bind_addr: SocketAddr = if target.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target.addr).await?;

        let mut buf = vec![0u8; 65_535];

        for attempt in 0..=self.retries {
            socket.send(&request).await?;
            let deadline = Instant::now() + self.timeout;

            while let Ok(received) = timeout_at(deadline, socket.recv(&mut buf)).await {
                let len = received?;

                let response = match decode_message(&buf[..len]) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("discarding undecodable datagram: {}", e);
                        continue;
                    }
                };

                if response.pdu.pdu_type != PduType::Response
                    || response.pdu.request_id != request_id
                {
                    trace!(
                        request_id = response.pdu.request_id,
                        "discarding unrelated datagram"
                    );
                    continue;
                }

                if response.pdu.error_status != 0 {
                    return Err(SnmpError::ErrorStatus {
                        status: response.pdu.error_status,
                        index: response.pdu.error_index,
                    });
                }

                return Ok(response.pdu.varbinds);
            }

            debug!(attempt, "no response within {:?}", self.timeout);
        }

        Err(SnmpError::Timeout)
    }
}
