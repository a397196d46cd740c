//! Length-prefixed packets of the binary macaroon format
//!
//! Every field travels as `HHHHkey value\n`, where `HHHH` is the total packet
//! length (header included) as four lowercase hex digits.

use crate::{MacaroonError, Result};

/// Largest packet the four-digit header can describe
pub const MAX_PACKET_SIZE: usize = 0xFFFF;

const HEADER_SIZE: usize = 4;

/// One decoded packet, borrowing from the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Appends one packet to `out`
///
/// Fails with [`MacaroonError::SerializationError`] if the packet would be
/// longer than [`MAX_PACKET_SIZE`]; `out` is untouched in that case.
pub fn encode_packet(out: &mut Vec<u8>, key: &str, value: &[u8]) -> Result<()> {
    let size = HEADER_SIZE + key.len() + 1 + value.len() + 1;
    if size > MAX_PACKET_SIZE {
        return Err(MacaroonError::SerializationError(format!(
            "{key} packet is {size} bytes, the limit is {MAX_PACKET_SIZE}"
        )));
    }

    out.reserve(size);
    out.extend_from_slice(format!("{size:04x}").as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
    Ok(())
}

/// Splits a buffer into its packets
pub fn decode_packets(data: &[u8]) -> Result<Vec<Packet<'_>>> {
    let mut packets = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let (packet, size) = decode_packet(rest)?;
        packets.push(packet);
        rest = &rest[size..];
    }

    Ok(packets)
}

fn decode_packet(data: &[u8]) -> Result<(Packet<'_>, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(malformed("truncated packet header"));
    }

    let header = &data[..HEADER_SIZE];
    if !header.iter().all(u8::is_ascii_hexdigit) {
        return Err(malformed("packet header is not hexadecimal"));
    }
    let size = header
        .iter()
        .fold(0usize, |acc, digit| (acc << 4) | hex_value(*digit));

    if size < HEADER_SIZE + 2 {
        return Err(malformed(&format!("packet length {size} is too small")));
    }
    if size > data.len() {
        return Err(malformed(&format!(
            "packet length {size} exceeds the {} bytes left",
            data.len()
        )));
    }

    let body = &data[HEADER_SIZE..size];
    let Some((&b'\n', content)) = body.split_last() else {
        return Err(malformed("packet does not end with a newline"));
    };
    let Some(space) = content.iter().position(|&b| b == b' ') else {
        return Err(malformed("packet has no key separator"));
    };

    let packet = Packet {
        key: &content[..space],
        value: &content[space + 1..],
    };
    Ok((packet, size))
}

fn hex_value(digit: u8) -> usize {
    match digit {
        b'0'..=b'9' => (digit - b'0') as usize,
        b'a'..=b'f' => (digit - b'a' + 10) as usize,
        _ => (digit - b'A' + 10) as usize,
    }
}

fn malformed(reason: &str) -> MacaroonError {
    MacaroonError::DeserializationError(reason.to_string())
}
