//! Receiver-side session: handshake, out-of-order reassembly, and
//! cumulative-ACK generation.
use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;

use log::{debug, info, warn};

use crate::config::Config;
use crate::err::Error;
use crate::socket::DatagramSocket;
use crate::wire::{self, Datagram};

const RECV_BUFFER_LEN: usize = 65536;

enum Progress {
    Continue,
    Done,
}

/// Segments received out of order, buffered until the missing prefix
/// arrives and they can be flushed to the output stream.
#[derive(Debug, Default)]
struct ReassemblyBuffer {
    pending: BTreeMap<u64, Vec<u8>>,
}

impl ReassemblyBuffer {
    fn new() -> Self {
        ReassemblyBuffer::default()
    }

    /// Absorbs one arriving segment. If it extends the in-order prefix, it
    /// (and any now-contiguous buffered segments) are written to `out` and
    /// `expected_seq_num` advances past them. Otherwise, if it is not
    /// already buffered, it is stored for later. Returns the new
    /// `expected_seq_num`.
    fn absorb(
        &mut self,
        expected_seq_num: u64,
        seq_num: u64,
        payload: Vec<u8>,
        out: &mut impl Write,
    ) -> std::io::Result<u64> {
        let mut expected = expected_seq_num;
        if seq_num == expected {
            out.write_all(&payload)?;
            expected += payload.len() as u64;
            while let Some(buffered) = self.pending.remove(&expected) {
                out.write_all(&buffered)?;
                expected += buffered.len() as u64;
            }
        } else if seq_num > expected {
            self.pending.entry(seq_num).or_insert(payload);
        }
        // seq_num < expected: already-delivered duplicate, dropped silently.
        Ok(expected)
    }
}

pub struct Receiver<S: DatagramSocket> {
    socket: S,
    config: Config,
    server_address: SocketAddr,
    expected_seq_num: u64,
    buffer: ReassemblyBuffer,
    handshake_sent: bool,
}

impl<S: DatagramSocket> Receiver<S> {
    pub fn new(socket: S, config: Config, server_address: SocketAddr) -> Self {
        Receiver {
            socket,
            config,
            server_address,
            expected_seq_num: 0,
            buffer: ReassemblyBuffer::new(),
            handshake_sent: false,
        }
    }

    /// Drives the whole transfer to completion, writing the reassembled
    /// byte stream to `out` as segments arrive in order.
    pub fn run(&mut self, out: &mut impl Write) -> Result<(), Error> {
        self.handshake()?;
        loop {
            match self.recv_and_dispatch(out)? {
                Progress::Done => break,
                Progress::Continue => {}
            }
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), Error> {
        if !self.handshake_sent {
            self.socket.send_to(&wire::encode_start(), self.server_address)?;
            self.handshake_sent = true;
            info!("sent START to {}", self.server_address);
        }
        Ok(())
    }

    fn recv_and_dispatch(&mut self, out: &mut impl Write) -> Result<Progress, Error> {
        self.socket.set_timeout(self.config.receiver_recv_timeout)?;
        let mut buf = [0u8; RECV_BUFFER_LEN];
        match self.socket.recv_from(&mut buf)? {
            None => {
                debug!("recv timeout, re-sending last cumulative ack");
                self.send_ack()?;
                Ok(Progress::Continue)
            }
            Some((n, from)) => match wire::decode(&buf[..n]) {
                Ok(Datagram::End) => {
                    info!("received END from {from}, sending END_ACK");
                    self.socket.send_to(&wire::encode_end_ack(), self.server_address)?;
                    Ok(Progress::Done)
                }
                Ok(Datagram::Data { seq_num, payload }) => {
                    let len = payload.len();
                    self.expected_seq_num = self.buffer.absorb(self.expected_seq_num, seq_num, payload, out)?;
                    debug!("absorbed segment seq={seq_num} len={len}, expected now {}", self.expected_seq_num);
                    self.send_ack()?;
                    Ok(Progress::Continue)
                }
                Ok(Datagram::Start) => {
                    debug!("ignoring redundant START from {from}");
                    Ok(Progress::Continue)
                }
                Ok(Datagram::Ack(_)) | Ok(Datagram::EndAck) => {
                    warn!("unexpected control datagram received by receiver, ignoring");
                    Ok(Progress::Continue)
                }
                Err(e) => {
                    warn!("malformed datagram from {from}: {e}");
                    Ok(Progress::Continue)
                }
            },
        }
    }

    fn send_ack(&mut self) -> Result<(), Error> {
        self.socket
            .send_to(&wire::encode_ack(self.expected_seq_num), self.server_address)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockSocket;
    use std::io::Cursor;

    fn server_addr() -> SocketAddr {
        "10.0.0.1:9000".parse().unwrap()
    }

    fn new_receiver() -> Receiver<MockSocket> {
        Receiver::new(MockSocket::new(), Config::default(), server_addr())
    }

    #[test]
    fn handshake_sends_start_exactly_once() {
        let mut recv = new_receiver();
        recv.handshake().unwrap();
        recv.handshake().unwrap();
        assert_eq!(recv.socket.sent.len(), 1);
        assert_eq!(wire::decode(&recv.socket.sent[0].0).unwrap(), Datagram::Start);
    }

    #[test]
    fn in_order_segment_is_written_and_advances_ack() {
        let mut recv = new_receiver();
        let mut out = Cursor::new(Vec::new());
        let expected = recv
            .buffer
            .absorb(0, 0, b"hello".to_vec(), &mut out)
            .unwrap();
        assert_eq!(expected, 5);
        assert_eq!(out.into_inner(), b"hello");
    }

    #[test]
    fn out_of_order_segment_is_buffered_then_flushed_on_gap_fill() {
        let mut recv = new_receiver();
        let mut out = Cursor::new(Vec::new());

        let expected = recv.buffer.absorb(0, 5, b"world".to_vec(), &mut out).unwrap();
        assert_eq!(expected, 0, "out-of-order segment must not advance expected_seq_num");
        assert!(out.get_ref().is_empty());

        let expected = recv.buffer.absorb(expected, 0, b"hello".to_vec(), &mut out).unwrap();
        assert_eq!(expected, 10);
        assert_eq!(out.into_inner(), b"helloworld");
    }

    #[test]
    fn duplicate_in_order_segment_is_dropped_without_rewriting() {
        let mut recv = new_receiver();
        let mut out = Cursor::new(Vec::new());
        let expected = recv.buffer.absorb(0, 0, b"hello".to_vec(), &mut out).unwrap();
        let expected = recv.buffer.absorb(expected, 0, b"hello".to_vec(), &mut out).unwrap();
        assert_eq!(expected, 5);
        assert_eq!(out.into_inner(), b"hello");
    }

    #[test]
    fn end_triggers_end_ack_and_completion() {
        let mut recv = new_receiver();
        recv.socket.deliver(server_addr(), wire::encode_end());
        let mut out = Cursor::new(Vec::new());

        let progress = recv.recv_and_dispatch(&mut out).unwrap();
        assert!(matches!(progress, Progress::Done));
        assert_eq!(recv.socket.sent.len(), 1);
        assert_eq!(wire::decode(&recv.socket.sent[0].0).unwrap(), Datagram::EndAck);
    }

    #[test]
    fn timeout_resends_last_cumulative_ack() {
        let mut recv = new_receiver();
        recv.expected_seq_num = 42;
        let mut out = Cursor::new(Vec::new());

        let progress = recv.recv_and_dispatch(&mut out).unwrap();
        assert!(matches!(progress, Progress::Continue));
        assert_eq!(recv.socket.sent.len(), 1);
        assert_eq!(wire::decode(&recv.socket.sent[0].0).unwrap(), Datagram::Ack(42));
    }
}
