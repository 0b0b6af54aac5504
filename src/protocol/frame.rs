//! Length-prefixed frame codec
//!
//! Every message on both links is `[u16 big-endian length][payload]`, where the
//! length counts the payload only. When retry mode is active the proxy adds one
//! sequence byte in front of the payload, inside the counted region.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;

use crate::common::{HexDump, ProxyError, Result};

/// Size of the length header in bytes
pub const HEADER_LEN: usize = 2;

/// Largest payload a 16-bit header can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Frame sent to the source in place of an empty reply (length field 0)
pub const EMPTY_FRAME: [u8; HEADER_LEN] = [0x00, 0x00];

/// Extract every complete frame from `buffer`
///
/// Complete payloads are returned in arrival order and their bytes are removed
/// from `buffer`. Whatever is left (an incomplete header or a partial payload)
/// stays in `buffer` untouched, so this can be called after every read.
pub fn decode(buffer: &mut BytesMut) -> Vec<Bytes> {
    let mut messages = Vec::new();

    while buffer.len() >= HEADER_LEN {
        let payload_len = u16::from_be_bytes([buffer[0], buffer[1]]) as usize;
        let frame_len = HEADER_LEN + payload_len;

        if buffer.len() < frame_len {
            trace!("Partial frame: have {} of {} bytes", buffer.len(), frame_len);
            break;
        }

        buffer.advance(HEADER_LEN);
        messages.push(buffer.split_to(payload_len).freeze());
    }

    messages
}

/// Prefix `payload` with its length header
///
/// Fails with [`ProxyError::FrameTooLarge`] instead of wrapping the length.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    let header = header_for(payload.len())?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u16(header);
    frame.put_slice(payload);

    trace!("Encoded frame {}", HexDump::from(&frame[..]));
    Ok(frame.freeze())
}

/// Build the retry envelope: `encode(sequence ++ payload)`
pub fn encode_sequenced(sequence: u8, payload: &[u8]) -> Result<Bytes> {
    let header = header_for(payload.len() + 1)?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + 1 + payload.len());
    frame.put_u16(header);
    frame.put_u8(sequence);
    frame.put_slice(payload);

    trace!("Encoded sequenced frame {}", HexDump::from(&frame[..]));
    Ok(frame.freeze())
}

fn header_for(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| ProxyError::FrameTooLarge(len))
}
