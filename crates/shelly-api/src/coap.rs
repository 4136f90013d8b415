//! Gen1 CoAP datagram codec.
//!
//! Gen1 devices push status (`code 30`) and self-description (`code 69`)
//! messages to the CoAP multicast group. The decoder extracts the vendor
//! device option and the payload text; everything else in the option chain
//! is ignored. The encoder builds the non-confirmable GET requests used to
//! solicit those messages.
//!
//! Socket plumbing is the host's job: feed each received datagram to
//! [`decode`] and hand the payload to the schema/normalization step.

use tracing::{debug, trace};

use crate::error::Error;

// ── Protocol constants ───────────────────────────────────────────────

/// CoAP multicast group Gen1 devices publish on.
pub const MULTICAST_GROUP: [u8; 4] = [224, 0, 1, 187];

/// Default CoAP UDP port.
pub const COAP_PORT: u16 = 5683;

/// Path answering with a code-69 device description.
pub const DESCRIPTION_PATH: &str = "/cit/d";

/// Path answering with a code-30 status report.
pub const STATUS_PATH: &str = "/cit/s";

/// Vendor option carrying `"{deviceType}#{deviceIdentifier}[#...]"`.
pub const DEVICE_OPTION: u32 = 3332;

/// Shorter datagrams are never relevant and are dropped silently.
const MIN_PACKET_LEN: usize = 10;

/// Frames relayed by a proxy start with this tag and an address block.
const PROXY_TAG: &[u8; 4] = b"prxy";
const PROXY_HEADER_LEN: usize = 8;

const HEADER_LEN: usize = 4;
const PAYLOAD_MARKER: u8 = 0xFF;
const URI_PATH_OPTION: u32 = 11;

// ── Message types ────────────────────────────────────────────────────

/// The two message codes Gen1 devices publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageCode {
    /// Periodic or change-triggered sensor status.
    Status = 30,
    /// Block/sensor self-description.
    Description = 69,
}

impl MessageCode {
    fn from_byte(code: u8) -> Option<Self> {
        match code {
            30 => Some(Self::Status),
            69 => Some(Self::Description),
            _ => None,
        }
    }
}

/// A decoded Gen1 CoAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapMessage {
    pub code: MessageCode,
    /// Device model, e.g. `"SHSW-1"`.
    pub device_type: Option<String>,
    /// Device identifier, e.g. `"349CDB"`.
    pub device_identifier: Option<String>,
    /// Payload text after the `0xFF` marker.
    pub payload: String,
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode a raw datagram.
///
/// Returns `None` for datagrams shorter than 10 bytes, for message codes
/// other than status/description, and for malformed option chains. None of
/// these are errors: they are "not a relevant packet".
pub fn decode(bytes: &[u8]) -> Option<CoapMessage> {
    if bytes.len() < MIN_PACKET_LEN {
        trace!(len = bytes.len(), "dropping short CoAP datagram");
        return None;
    }

    match decode_packet(bytes) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "dropping malformed CoAP datagram");
            None
        }
    }
}

fn decode_packet(bytes: &[u8]) -> Result<Option<CoapMessage>, Error> {
    let mut cursor = Cursor::new(bytes);

    if bytes.starts_with(PROXY_TAG) {
        cursor.skip(PROXY_HEADER_LEN)?;
    }

    let header_start = cursor.position();
    let token_len = usize::from(cursor.byte()? & 0x0F);
    let Some(code) = MessageCode::from_byte(cursor.byte()?) else {
        return Ok(None);
    };
    cursor.seek(header_start + HEADER_LEN + token_len)?;

    let mut device_type = None;
    let mut device_identifier = None;
    let mut option_number: u32 = 0;

    while !cursor.at_end() {
        let option = cursor.byte()?;
        if option == PAYLOAD_MARKER {
            break;
        }

        let delta = cursor.extended(option >> 4)?;
        let length = cursor.extended(option & 0x0F)?;
        option_number += delta;

        let value = cursor.take(usize::try_from(length).unwrap_or(usize::MAX))?;

        if option_number == DEVICE_OPTION {
            let text = decode_text(value);
            let mut parts = text.split('#');
            device_type = parts.next().map(str::to_owned);
            device_identifier = parts.next().map(str::to_owned);
        }
    }

    let payload = decode_text(cursor.rest());

    Ok(Some(CoapMessage {
        code,
        device_type,
        device_identifier,
        payload,
    }))
}

/// Devices emit single-byte text in their native codepage (Latin-1).
fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Bounds-checked reader over the datagram.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn overrun(&self, reason: &'static str) -> Error {
        Error::CoapDecode {
            offset: self.pos,
            reason,
        }
    }

    fn byte(&mut self) -> Result<u8, Error> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.overrun("read past end of datagram"))?;
        self.pos += 1;
        Ok(b)
    }

    fn seek(&mut self, pos: usize) -> Result<(), Error> {
        if pos > self.bytes.len() {
            return Err(self.overrun("token runs past end of datagram"));
        }
        self.pos = pos;
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.seek(self.pos + n)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.overrun("option value runs past end of datagram"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        self.bytes.get(self.pos..).unwrap_or_default()
    }

    /// Resolve a delta/length nibble using the CoAP extended encoding.
    fn extended(&mut self, nibble: u8) -> Result<u32, Error> {
        match nibble {
            13 => Ok(u32::from(self.byte()?) + 13),
            14 => {
                let hi = u32::from(self.byte()?);
                let lo = u32::from(self.byte()?);
                Ok(((hi << 8) | lo) + 269)
            }
            15 => Err(self.overrun("reserved option nibble 15")),
            n => Ok(u32::from(n)),
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Build a non-confirmable CoAP GET for `path` (e.g. [`DESCRIPTION_PATH`]).
pub fn encode_request(message_id: u16, path: &str) -> Vec<u8> {
    // Version 1, type NON, no token; code 0.01 GET.
    let mut buf = vec![0x50, 0x01];
    buf.extend_from_slice(&message_id.to_be_bytes());

    let mut previous = 0;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        push_option(&mut buf, URI_PATH_OPTION - previous, segment.as_bytes());
        previous = URI_PATH_OPTION;
    }

    buf
}

fn push_option(buf: &mut Vec<u8>, delta: u32, value: &[u8]) {
    let length = u32::try_from(value.len()).unwrap_or(u32::MAX);
    let (delta_nibble, delta_ext) = split_extended(delta);
    let (length_nibble, length_ext) = split_extended(length);

    buf.push((delta_nibble << 4) | length_nibble);
    buf.extend_from_slice(&delta_ext);
    buf.extend_from_slice(&length_ext);
    buf.extend_from_slice(value);
}

fn split_extended(value: u32) -> (u8, Vec<u8>) {
    match value {
        0..=12 => (u8::try_from(value).unwrap_or(0), Vec::new()),
        13..=268 => (13, vec![u8::try_from(value - 13).unwrap_or(u8::MAX)]),
        _ => {
            let ext = u16::try_from(value - 269).unwrap_or(u16::MAX);
            (14, ext.to_be_bytes().to_vec())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
