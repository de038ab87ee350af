//! BER encoding of SNMP v1/v2c messages
//!
//! Covers the subset a read-only poller needs: GetRequest and Response PDUs
//! carrying the universal and SNMP application types.

use super::{Oid, SnmpError, SnmpValue, VarBind};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OBJECT_ID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;

const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;

const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    Response,
}

impl PduType {
    fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xA0,
            PduType::Response => 0xA2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, SnmpError> {
        match tag {
            0xA0 => Ok(PduType::GetRequest),
            0xA2 => Ok(PduType::Response),
            other => Err(SnmpError::Decode(format!("unsupported PDU type 0x{other:02x}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// GetRequest for `oids`, values set to NULL
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids
                .iter()
                .map(|oid| VarBind {
                    oid: oid.clone(),
                    value: SnmpValue::Null,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// 0 for v1, 1 for v2c
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut varbinds = Vec::new();
    for vb in &message.pdu.varbinds {
        let mut body = Vec::new();
        write_tlv(&mut body, TAG_OBJECT_ID, &encode_oid(&vb.oid));
        encode_value(&mut body, &vb.value);
        write_tlv(&mut varbinds, TAG_SEQUENCE, &body);
    }

    let mut pdu = Vec::new();
    write_tlv(
        &mut pdu,
        TAG_INTEGER,
        &encode_integer(i64::from(message.pdu.request_id)),
    );
    write_tlv(&mut pdu, TAG_INTEGER, &encode_integer(message.pdu.error_status));
    write_tlv(&mut pdu, TAG_INTEGER, &encode_integer(message.pdu.error_index));
    write_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

    let mut body = Vec::new();
    write_tlv(&mut body, TAG_INTEGER, &encode_integer(message.version));
    write_tlv(&mut body, TAG_OCTET_STRING, &message.community);
    write_tlv(&mut body, message.pdu.pdu_type.tag(), &pdu);

    let mut out = Vec::with_capacity(body.len() + 4);
    write_tlv(&mut out, TAG_SEQUENCE, &body);
    out
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, SnmpError> {
    let mut outer = Reader::new(bytes);
    let mut body = Reader::new(outer.expect(TAG_SEQUENCE)?);

    let version = decode_integer(body.expect(TAG_INTEGER)?)?;
    let community = body.expect(TAG_OCTET_STRING)?.to_vec();

    let (tag, pdu_bytes) = body.read_tlv()?;
    let pdu_type = PduType::from_tag(tag)?;
    let mut pdu = Reader::new(pdu_bytes);

    let request_id = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let request_id = i32::try_from(request_id)
        .map_err(|_| SnmpError::Decode(format!("request id {request_id} out of range")))?;
    let error_status = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let error_index = decode_integer(pdu.expect(TAG_INTEGER)?)?;

    let mut list = Reader::new(pdu.expect(TAG_SEQUENCE)?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = Reader::new(list.expect(TAG_SEQUENCE)?);
        let oid = decode_oid(vb.expect(TAG_OBJECT_ID)?)?;
        let (tag, content) = vb.read_tlv()?;
        varbinds.push(VarBind {
            oid,
            value: decode_value(tag, content)?,
        });
    }

    Ok(Message {
        version,
        community,
        pdu: Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        },
    })
}

fn encode_value(out: &mut Vec<u8>, value: &SnmpValue) {
    match value {
        SnmpValue::Integer(v) => write_tlv(out, TAG_INTEGER, &encode_integer(*v)),
        SnmpValue::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
        SnmpValue::Null => write_tlv(out, TAG_NULL, &[]),
        SnmpValue::ObjectId(oid) => write_tlv(out, TAG_OBJECT_ID, &encode_oid(oid)),
        SnmpValue::IpAddress(octets) => write_tlv(out, TAG_IP_ADDRESS, octets),
        SnmpValue::Counter32(v) => {
            write_tlv(out, TAG_COUNTER32, &encode_unsigned(u64::from(*v)))
        }
        SnmpValue::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &encode_unsigned(u64::from(*v))),
        SnmpValue::TimeTicks(v) => {
            write_tlv(out, TAG_TIMETICKS, &encode_unsigned(u64::from(*v)))
        }
        SnmpValue::Opaque(bytes) => write_tlv(out, TAG_OPAQUE, bytes),
        SnmpValue::Counter64(v) => write_tlv(out, TAG_COUNTER64, &encode_unsigned(*v)),
        SnmpValue::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
        SnmpValue::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
        SnmpValue::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
    }
}

fn decode_value(tag: u8, content: &[u8]) -> Result<SnmpValue, SnmpError> {
    let value = match tag {
        TAG_INTEGER => SnmpValue::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
        TAG_NULL => SnmpValue::Null,
        TAG_OBJECT_ID => SnmpValue::ObjectId(decode_oid(content)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = content.try_into().map_err(|_| {
                SnmpError::Decode(format!("IpAddress of {} bytes", content.len()))
            })?;
            SnmpValue::IpAddress(octets)
        }
        TAG_COUNTER32 => SnmpValue::Counter32(decode_u32(content)?),
        TAG_GAUGE32 => SnmpValue::Gauge32(decode_u32(content)?),
        TAG_TIMETICKS => SnmpValue::TimeTicks(decode_u32(content)?),
        TAG_OPAQUE => SnmpValue::Opaque(content.to_vec()),
        TAG_COUNTER64 => SnmpValue::Counter64(decode_unsigned(content)?),
        TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        other => {
            return Err(SnmpError::Decode(format!(
                "unsupported value type 0x{other:02x}"
            )));
        }
    };
    Ok(value)
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }

    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Minimal two's complement encoding
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Unsigned encoding; a leading zero keeps the high bit clear
fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|b| **b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

fn decode_integer(content: &[u8]) -> Result<i64, SnmpError> {
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::Decode(format!(
            "INTEGER of {} bytes",
            content.len()
        )));
    }

    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for byte in content {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

fn decode_unsigned(content: &[u8]) -> Result<u64, SnmpError> {
    let content = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::Decode(format!(
            "unsigned value of {} bytes",
            content.len()
        )));
    }

    Ok(content
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

fn decode_u32(content: &[u8]) -> Result<u32, SnmpError> {
    let value = decode_unsigned(content)?;
    u32::try_from(value).map_err(|_| SnmpError::Decode(format!("{value} overflows 32 bits")))
}

fn encode_oid(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut out = Vec::new();

    let (first, rest) = match arcs {
        [a, b, rest @ ..] => (u64::from(*a) * 40 + u64::from(*b), rest),
        [a] => (u64::from(*a) * 40, &[][..]),
        [] => return out,
    };

    write_base128(&mut out, first);
    for arc in rest {
        write_base128(&mut out, u64::from(*arc));
    }
    out
}

fn write_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7F) as u8;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

fn decode_oid(content: &[u8]) -> Result<Oid, SnmpError> {
    let mut values = Vec::new();
    let mut current: u64 = 0;
    for (i, byte) in content.iter().enumerate() {
        if current > u64::MAX >> 7 {
            return Err(SnmpError::Decode("OID arc overflow".to_string()));
        }
        current = (current << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            values.push(current);
            current = 0;
        } else if i == content.len() - 1 {
            return Err(SnmpError::Decode("truncated OID arc".to_string()));
        }
    }

    let Some((&first, rest)) = values.split_first() else {
        return Err(SnmpError::Decode("empty OID".to_string()));
    };

    let (a, b) = match first {
        0..40 => (0, first),
        40..80 => (1, first - 40),
        _ => (2, first - 80),
    };

    let mut arcs = Vec::with_capacity(values.len() + 1);
    arcs.push(a as u32);
    for value in std::iter::once(b).chain(rest.iter().copied()) {
        arcs.push(
            u32::try_from(value)
                .map_err(|_| SnmpError::Decode(format!("OID arc {value} overflows 32 bits")))?,
        );
    }
    Ok(Oid::new(arcs))
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), SnmpError> {
        let buf: &'a [u8] = self.buf;
        let [tag, first, rest @ ..] = buf else {
            return Err(SnmpError::Decode("truncated TLV header".to_string()));
        };

        let (len, rest) = if first & 0x80 == 0 {
            (usize::from(*first), rest)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > 4 || rest.len() < count {
                return Err(SnmpError::Decode(format!("bad length of {count} octets")));
            }
            let len = rest[..count]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            (len, &rest[count..])
        };

        if rest.len() < len {
            return Err(SnmpError::Decode(format!(
                "value of {len} bytes with {} remaining",
                rest.len()
            )));
        }

        let (content, remaining) = rest.split_at(len);
        self.buf = remaining;
        Ok((*tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], SnmpError> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(SnmpError::Decode(format!(
                "expected tag 0x{expected:02x}, found 0x{tag:02x}"
            )));
        }
        Ok(content)
    }
}
