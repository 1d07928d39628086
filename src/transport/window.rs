//! Sender-side bookkeeping for segments that have been sent but not yet
//! cumulatively acknowledged.
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use crate::socket::DatagramSocket;
use crate::wire;

/// A segment in flight: its encoded wire bytes plus the time it was last
/// (re)sent, kept around so a future cumulative ACK can still yield an RTT
/// sample for the original transmission.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub bytes: Vec<u8>,
    pub sent_at: Instant,
}

/// Segments sent but not yet acknowledged, keyed by the sequence number of
/// their first byte. A `BTreeMap` keeps iteration in ascending sequence
/// order, which both `retransmit_all` and `retransmit_earliest` depend on.
#[derive(Debug, Default)]
pub struct SendWindow {
    unacked: BTreeMap<u64, InFlight>,
}

impl SendWindow {
    pub fn new() -> Self {
        SendWindow::default()
    }

    pub fn len(&self) -> usize {
        self.unacked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unacked.is_empty()
    }

    /// Total payload bytes currently in flight, excluding wire-header
    /// overhead.
    pub fn byte_size(&self) -> usize {
        self.unacked
            .values()
            .map(|seg| seg.bytes.len() - wire::HEADER_LEN)
            .sum()
    }

    pub fn get(&self, seq_num: u64) -> Option<&InFlight> {
        self.unacked.get(&seq_num)
    }

    pub fn insert(&mut self, seq_num: u64, bytes: Vec<u8>, now: Instant) {
        self.unacked.insert(seq_num, InFlight { bytes, sent_at: now });
    }

    /// Drops every segment whose first byte precedes `ack_seq_num`, i.e.
    /// everything the cumulative ACK covers.
    pub fn prune_below(&mut self, ack_seq_num: u64) {
        self.unacked.retain(|&seq, _| seq >= ack_seq_num);
    }

    /// Retransmits every unacked segment, in ascending sequence order,
    /// stamping each with a fresh send time.
    pub fn retransmit_all<S: DatagramSocket>(
        &mut self,
        socket: &mut S,
        peer: SocketAddr,
        now: Instant,
    ) -> std::io::Result<()> {
        for seg in self.unacked.values_mut() {
            socket.send_to(&seg.bytes, peer)?;
            seg.sent_at = now;
        }
        Ok(())
    }

    /// Retransmits only the earliest unacked segment, for fast retransmit.
    pub fn retransmit_earliest<S: DatagramSocket>(
        &mut self,
        socket: &mut S,
        peer: SocketAddr,
        now: Instant,
    ) -> std::io::Result<()> {
        if let Some((_, seg)) = self.unacked.iter_mut().next() {
            socket.send_to(&seg.bytes, peer)?;
            seg.sent_at = now;
        }
        Ok(())
    }

    pub fn encode_and_insert(&mut self, seq_num: u64, payload: &[u8], now: Instant) -> Vec<u8> {
        let bytes = wire::encode_data(seq_num, payload);
        self.insert(seq_num, bytes.clone(), now);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockSocket;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn prune_below_drops_only_fully_acked_segments() {
        let mut window = SendWindow::new();
        let now = Instant::now();
        window.insert(0, wire::encode_data(0, &[0; 10]), now);
        window.insert(10, wire::encode_data(10, &[0; 10]), now);
        window.insert(20, wire::encode_data(20, &[0; 10]), now);

        window.prune_below(10);

        assert_eq!(window.len(), 2);
        assert!(window.get(0).is_none());
        assert!(window.get(10).is_some());
        assert!(window.get(20).is_some());
    }

    #[test]
    fn byte_size_counts_payload_only_not_wire_header() {
        let mut window = SendWindow::new();
        let now = Instant::now();
        window.insert(0, wire::encode_data(0, &[0; 1400]), now);
        window.insert(1400, wire::encode_data(1400, &[0; 700]), now);

        assert_eq!(window.byte_size(), 2100);
    }

    #[test]
    fn retransmit_all_visits_in_ascending_order() {
        let mut window = SendWindow::new();
        let now = Instant::now();
        window.insert(20, wire::encode_data(20, &[1]), now);
        window.insert(0, wire::encode_data(0, &[2]), now);
        window.insert(10, wire::encode_data(10, &[3]), now);

        let mut socket = MockSocket::new();
        window.retransmit_all(&mut socket, addr(), now).unwrap();

        let seqs: Vec<u64> = socket
            .sent
            .iter()
            .map(|(bytes, _)| match wire::decode(bytes).unwrap() {
                wire::Datagram::Data { seq_num, .. } => seq_num,
                _ => panic!("expected data"),
            })
            .collect();
        assert_eq!(seqs, vec![0, 10, 20]);
    }

    #[test]
    fn retransmit_earliest_only_sends_one() {
        let mut window = SendWindow::new();
        let now = Instant::now();
        window.insert(10, wire::encode_data(10, &[1]), now);
        window.insert(0, wire::encode_data(0, &[2]), now);

        let mut socket = MockSocket::new();
        window.retransmit_earliest(&mut socket, addr(), now).unwrap();

        assert_eq!(socket.sent.len(), 1);
        match wire::decode(&socket.sent[0].0).unwrap() {
            wire::Datagram::Data { seq_num, .. } => assert_eq!(seq_num, 0),
            _ => panic!("expected data"),
        }
    }
}
