//! Segment framing for the wire. Every datagram is either a literal control
//! token (`START`, `END`, `END_ACK`), a decimal-ASCII cumulative ACK, or a
//! fixed-layout DATA segment: an 8-byte big-endian sequence number, a 4-byte
//! big-endian payload length, and the payload itself.
use byteorder::{BigEndian, ByteOrder};

const START: &[u8] = b"START";
const END: &[u8] = b"END";
const END_ACK: &[u8] = b"END_ACK";

const SEQ_FIELD_LEN: usize = 8;
const LEN_FIELD_LEN: usize = 4;
pub(crate) const HEADER_LEN: usize = SEQ_FIELD_LEN + LEN_FIELD_LEN;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("datagram of {0} bytes does not match any known framing")]
    Unrecognized(usize),
    #[error("DATA header declares {declared} byte payload but datagram carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// A decoded datagram, as seen from either endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Start,
    End,
    EndAck,
    Ack(u64),
    Data { seq_num: u64, payload: Vec<u8> },
}

/// Decodes a raw datagram. Ambiguity between a short DATA segment and an ACK
/// is resolved in favor of ACK: a buffer that is plausible decimal ASCII is
/// always treated as one, and only buffers that fail that test are tried as
/// DATA segments.
pub fn decode(buf: &[u8]) -> Result<Datagram, CodecError> {
    if buf == START {
        return Ok(Datagram::Start);
    }
    if buf == END {
        return Ok(Datagram::End);
    }
    if buf == END_ACK {
        return Ok(Datagram::EndAck);
    }
    if let Some(ack) = parse_decimal_ack(buf) {
        return Ok(Datagram::Ack(ack));
    }
    if buf.len() >= HEADER_LEN {
        let seq_num = BigEndian::read_u64(&buf[0..SEQ_FIELD_LEN]);
        let declared = BigEndian::read_u32(&buf[SEQ_FIELD_LEN..HEADER_LEN]) as usize;
        let actual = buf.len() - HEADER_LEN;
        if declared != actual {
            return Err(CodecError::LengthMismatch { declared, actual });
        }
        return Ok(Datagram::Data {
            seq_num,
            payload: buf[HEADER_LEN..].to_vec(),
        });
    }
    Err(CodecError::Unrecognized(buf.len()))
}

fn parse_decimal_ack(buf: &[u8]) -> Option<u64> {
    if buf.is_empty() || !buf.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(buf).ok()?.parse().ok()
}

pub fn encode_start() -> Vec<u8> {
    START.to_vec()
}

pub fn encode_end() -> Vec<u8> {
    END.to_vec()
}

pub fn encode_end_ack() -> Vec<u8> {
    END_ACK.to_vec()
}

pub fn encode_ack(seq_num: u64) -> Vec<u8> {
    seq_num.to_string().into_bytes()
}

pub fn encode_data(seq_num: u64, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.resize(HEADER_LEN, 0);
    BigEndian::write_u64(&mut buf[0..SEQ_FIELD_LEN], seq_num);
    BigEndian::write_u32(&mut buf[SEQ_FIELD_LEN..HEADER_LEN], payload.len() as u32);
    buf.extend_from_slice(payload);
    buf
}
