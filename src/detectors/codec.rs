use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

pub const ICMP_HEADER_LEN: usize = 8;
const IPV4_MIN_HEADER_LEN: usize = 20;
// 65535 total length - 20 ipv4 header - 8 icmp header
pub const MAX_PAYLOAD_LEN: usize = 65_507;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl From<u8> for MessageType {
    fn from(v: u8) -> Self {
        match v {
            0 => MessageType::EchoReply,
            3 => MessageType::DestinationUnreachable,
            8 => MessageType::EchoRequest,
            11 => MessageType::TimeExceeded,
            other => MessageType::Other(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(v: MessageType) -> Self {
        match v {
            MessageType::EchoReply => 0,
            MessageType::DestinationUnreachable => 3,
            MessageType::EchoRequest => 8,
            MessageType::TimeExceeded => 11,
            MessageType::Other(other) => other,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::EchoReply => f.write_str("echo reply"),
            MessageType::DestinationUnreachable => f.write_str("destination unreachable"),
            MessageType::EchoRequest => f.write_str("echo request"),
            MessageType::TimeExceeded => f.write_str("time exceeded"),
            MessageType::Other(t) => write!(f, "type {}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Echo {
        identifier: u16,
        sequence: u16,
        data: Bytes,
    },
    Raw(Bytes),
}

/// An ICMPv4 message as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub kind: MessageType,
    pub code: u8,
    pub checksum: u16,
    pub body: MessageBody,
}

impl ParsedMessage {
    pub fn is_echo_reply(&self) -> bool {
        self.kind == MessageType::EchoReply
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.kind, self.code)?;
        if let MessageBody::Echo {
            identifier,
            sequence,
            ..
        } = &self.body
        {
            write!(f, " id={} seq={}", identifier, sequence)?;
        }
        Ok(())
    }
}

/// Builds an Echo Request frame with the checksum filled in.
pub fn encode(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Bytes, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(ICMP_HEADER_LEN + payload.len());
    buf.put_u8(MessageType::EchoRequest.into());
    buf.put_u8(0);
    buf.put_u16(0);
    buf.put_u16(identifier);
    buf.put_u16(sequence);
    buf.put_slice(payload);

    let sum = checksum(&buf);
    buf[2..4].copy_from_slice(&sum.to_be_bytes());
    Ok(buf.freeze())
}

pub fn decode(frame: &[u8]) -> Result<ParsedMessage, CodecError> {
    if frame.len() < 4 {
        return Err(CodecError::Truncated {
            got: frame.len(),
            want: 4,
        });
    }

    let mut buf = frame;
    let kind = MessageType::from(buf.get_u8());
    let code = buf.get_u8();
    let checksum = buf.get_u16();

    let body = match kind {
        MessageType::EchoReply | MessageType::EchoRequest => {
            if frame.len() < ICMP_HEADER_LEN {
                return Err(CodecError::Truncated {
                    got: frame.len(),
                    want: ICMP_HEADER_LEN,
                });
            }
            let identifier = buf.get_u16();
            let sequence = buf.get_u16();
            MessageBody::Echo {
                identifier,
                sequence,
                data: Bytes::copy_from_slice(buf),
            }
        }
        _ => MessageBody::Raw(Bytes::copy_from_slice(buf)),
    };

    Ok(ParsedMessage {
        kind,
        code,
        checksum,
        body,
    })
}

/// Raw sockets, and datagram sockets on BSD-derived systems, hand back the
/// IPv4 header in front of the ICMP message. No ICMP type has 4 in its high
/// nibble, so a leading version nibble of 4 identifies the header.
pub fn strip_ipv4_header(frame: &[u8]) -> &[u8] {
    if frame.len() < IPV4_MIN_HEADER_LEN || frame[0] >> 4 != 4 {
        return frame;
    }
    let ihl = usize::from(frame[0] & 0x0f) * 4;
    if ihl < IPV4_MIN_HEADER_LEN || frame.len() < ihl {
        return frame;
    }
    &frame[ihl..]
}

// RFC 1071
fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(u16::from_be_bytes([word[0], word[1]])));
    }
    if let [odd] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*odd) << 8);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
