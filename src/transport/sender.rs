//! Sender-side session: handshake, transmit-window fill, and the
//! ACK/timeout-driven retransmission loop.
use std::io::Read;
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::Config;
use crate::err::Error;
use crate::rtt::RttEstimator;
use crate::socket::DatagramSocket;
use crate::transport::congestion::Controller;
use crate::transport::window::SendWindow;
use crate::wire::{self, Datagram};

const RECV_BUFFER_LEN: usize = 65536;

enum WaitOutcome {
    Continue,
    Complete,
}

pub struct Sender<S: DatagramSocket> {
    socket: S,
    config: Config,
    peer: Option<SocketAddr>,
    next_seq_num: u64,
    window: SendWindow,
    last_ack_received: Option<u64>,
    duplicate_ack_count: u32,
    rtt: RttEstimator,
    controller: Controller,
    end_sent: bool,
}

impl<S: DatagramSocket> Sender<S> {
    pub fn new(socket: S, config: Config, controller: Controller) -> Self {
        let rtt = RttEstimator::new(&config);
        Sender {
            socket,
            config,
            peer: None,
            next_seq_num: 0,
            window: SendWindow::new(),
            last_ack_received: None,
            duplicate_ack_count: 0,
            rtt,
            controller,
            end_sent: false,
        }
    }

    /// Drives the whole transfer to completion: blocks for the initial
    /// handshake, then alternates filling the transmit window with fresh
    /// file data and waiting for the next ACK or retransmission timeout
    /// until the receiver's END_ACK arrives.
    pub fn run(&mut self, file: &mut impl Read) -> Result<(), Error> {
        self.handshake()?;
        loop {
            self.fill_phase(file)?;
            match self.wait_phase()? {
                WaitOutcome::Complete => break,
                WaitOutcome::Continue => {}
            }
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            let received = self.socket.recv_from(&mut buf)?;
            let Some((n, from)) = received else {
                continue;
            };
            match wire::decode(&buf[..n]) {
                Ok(Datagram::Start) => {
                    info!("connection established with {from}");
                    self.peer = Some(from);
                    return Ok(());
                }
                Ok(_) => warn!("ignoring datagram from {from} before handshake completes"),
                Err(e) => warn!("malformed datagram from {from} before handshake: {e}"),
            }
        }
    }

    /// Whether the controller's current window still has room for another
    /// segment, counted in segments for both controllers (§4.5: AIMD's
    /// bound is `floor(cwnd / MSS)` segments, not raw bytes-in-flight).
    fn has_room(&self) -> bool {
        self.window.len() < self.controller.window_bound()
    }

    fn fill_phase(&mut self, file: &mut impl Read) -> Result<(), Error> {
        while self.has_room() {
            let mut chunk = vec![0u8; self.config.mss];
            let n = file.read(&mut chunk)?;
            if n == 0 {
                if !self.end_sent && self.window.is_empty() {
                    if let Some(peer) = self.peer {
                        self.socket.send_to(&wire::encode_end(), peer)?;
                        self.end_sent = true;
                        info!("sent END, {} bytes transmitted", self.next_seq_num);
                    }
                }
                break;
            }
            chunk.truncate(n);

            if let Some(peer) = self.peer {
                let seq = self.next_seq_num;
                let bytes = self.window.encode_and_insert(seq, &chunk, Instant::now());
                self.socket.send_to(&bytes, peer)?;
                debug!("sent segment seq={seq} len={}", chunk.len());
                self.next_seq_num += chunk.len() as u64;
            } else {
                // Should not happen: handshake() always runs first.
                break;
            }
        }
        Ok(())
    }

    fn wait_phase(&mut self) -> Result<WaitOutcome, Error> {
        self.socket.set_timeout(self.rtt.rto())?;
        let mut buf = [0u8; RECV_BUFFER_LEN];
        match self.socket.recv_from(&mut buf)? {
            None => {
                self.on_timeout()?;
                Ok(WaitOutcome::Continue)
            }
            Some((n, from)) => match wire::decode(&buf[..n]) {
                Ok(Datagram::Start) => {
                    debug!("ignoring redundant START from {from}");
                    Ok(WaitOutcome::Continue)
                }
                Ok(Datagram::EndAck) => {
                    info!("received END_ACK, transfer complete");
                    Ok(WaitOutcome::Complete)
                }
                Ok(Datagram::Ack(ack_seq)) => {
                    self.on_ack(ack_seq)?;
                    Ok(WaitOutcome::Continue)
                }
                Ok(Datagram::Data { seq_num, .. }) => {
                    warn!("unexpected DATA segment (seq={seq_num}) received by sender, ignoring");
                    Ok(WaitOutcome::Continue)
                }
                Err(e) => {
                    warn!("malformed datagram from {from}: {e}");
                    Ok(WaitOutcome::Continue)
                }
            },
        }
    }

    fn on_ack(&mut self, ack_seq: u64) -> Result<(), Error> {
        let is_new = match self.last_ack_received {
            None => true,
            Some(last) => ack_seq > last,
        };

        if is_new {
            debug!("new cumulative ack {ack_seq}");
            self.last_ack_received = Some(ack_seq);
            self.duplicate_ack_count = 0;
            self.controller.on_new_ack();

            if let Some(segment) = self.window.get(ack_seq) {
                let rtt = segment.sent_at.elapsed();
                self.rtt.sample(rtt);
            }
            self.window.prune_below(ack_seq);
        } else {
            self.duplicate_ack_count += 1;
            debug!("duplicate ack {ack_seq}, count={}", self.duplicate_ack_count);

            if self.duplicate_ack_count >= self.config.dup_ack_threshold {
                let outcome = self.controller.on_dup_ack_threshold();
                if outcome.retransmit_earliest {
                    if let Some(peer) = self.peer {
                        self.window.retransmit_earliest(&mut self.socket, peer, Instant::now())?;
                    }
                }
                if outcome.reset_counter {
                    self.duplicate_ack_count = 0;
                }
            }
        }
        Ok(())
    }

    fn on_timeout(&mut self) -> Result<(), Error> {
        debug!("retransmission timeout elapsed after {:?}", self.rtt.rto());
        self.duplicate_ack_count = 0;
        self.controller.on_timeout();

        if let Some(peer) = self.peer {
            self.window.retransmit_all(&mut self.socket, peer, Instant::now())?;
            if self.end_sent {
                self.socket.send_to(&wire::encode_end(), peer)?;
                debug!("retransmitted END");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockSocket;
    use crate::transport::congestion::FixedWindowController;
    use std::io::Cursor;

    fn peer_addr() -> SocketAddr {
        "10.0.0.2:9000".parse().unwrap()
    }

    fn new_fixed_sender(enable_fast_recovery: bool) -> Sender<MockSocket> {
        let config = Config::default();
        let controller = Controller::Fixed(FixedWindowController::new(&config, enable_fast_recovery));
        Sender::new(MockSocket::new(), config, controller)
    }

    #[test]
    fn handshake_then_fill_sends_first_segment() {
        let mut sender = new_fixed_sender(false);
        sender.socket.deliver(peer_addr(), wire::encode_start());
        let mut file = Cursor::new(b"hello world".to_vec());

        sender.handshake().unwrap();
        sender.fill_phase(&mut file).unwrap();

        assert_eq!(sender.socket.sent.len(), 1);
        match wire::decode(&sender.socket.sent[0].0).unwrap() {
            Datagram::Data { seq_num, payload } => {
                assert_eq!(seq_num, 0);
                assert_eq!(payload, b"hello world");
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn new_ack_prunes_window_and_clears_duplicate_count() {
        let mut sender = new_fixed_sender(false);
        sender.peer = Some(peer_addr());
        sender.duplicate_ack_count = 2;
        sender.window.insert(0, wire::encode_data(0, b"a"), Instant::now());
        sender.window.insert(1, wire::encode_data(1, b"b"), Instant::now());

        sender.on_ack(1).unwrap();

        assert_eq!(sender.duplicate_ack_count, 0);
        assert_eq!(sender.last_ack_received, Some(1));
        assert!(sender.window.get(0).is_none());
        assert!(sender.window.get(1).is_some());
    }

    #[test]
    fn three_duplicate_acks_trigger_fast_retransmit_when_enabled() {
        let mut sender = new_fixed_sender(true);
        sender.peer = Some(peer_addr());
        sender.last_ack_received = Some(0);
        sender.window.insert(0, wire::encode_data(0, b"a"), Instant::now());

        sender.on_ack(0).unwrap();
        sender.on_ack(0).unwrap();
        sender.on_ack(0).unwrap();

        assert_eq!(sender.duplicate_ack_count, 0);
        assert_eq!(sender.socket.sent.len(), 1);
    }

    #[test]
    fn duplicate_acks_without_fast_recovery_never_retransmit() {
        let mut sender = new_fixed_sender(false);
        sender.peer = Some(peer_addr());
        sender.last_ack_received = Some(0);
        sender.window.insert(0, wire::encode_data(0, b"a"), Instant::now());

        for _ in 0..5 {
            sender.on_ack(0).unwrap();
        }

        assert_eq!(sender.socket.sent.len(), 0);
        assert_eq!(sender.duplicate_ack_count, 5);
    }

    #[test]
    fn timeout_retransmits_everything_unacked() {
        let mut sender = new_fixed_sender(false);
        sender.peer = Some(peer_addr());
        sender.window.insert(0, wire::encode_data(0, b"a"), Instant::now());
        sender.window.insert(1, wire::encode_data(1, b"b"), Instant::now());

        sender.on_timeout().unwrap();

        assert_eq!(sender.socket.sent.len(), 2);
    }

    #[test]
    fn end_is_only_sent_once_window_drains() {
        let mut sender = new_fixed_sender(false);
        sender.peer = Some(peer_addr());
        let mut file = Cursor::new(Vec::new());

        sender.fill_phase(&mut file).unwrap();

        assert!(sender.end_sent);
        assert_eq!(sender.socket.sent.len(), 1);
        assert_eq!(wire::decode(&sender.socket.sent[0].0).unwrap(), Datagram::End);
    }
}
