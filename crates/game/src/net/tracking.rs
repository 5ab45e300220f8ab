use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::protocol::{sequence_greater_than, Packet};

pub const SEQUENCE_BUFFER_SIZE: usize = 1024;
pub const ACK_BITS: u32 = 32;
pub const RESEND_TIMEOUT: Duration = Duration::from_millis(300);
pub const MAX_RETRIES: u32 = 10;
pub const MAX_PENDING_AGE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub packet: Packet,
    pub first_send: Instant,
    pub last_send: Instant,
    pub retries: u32,
}

impl PendingPacket {
    pub fn sequence(&self) -> u32 {
        self.packet.header.sequence
    }
}

/// Remembers which of the last 1024 remote sequences arrived.
///
/// Each slot stores the sequence that last occupied it, so a slot reused after
/// the window slides never reports a stale hit.
#[derive(Debug)]
pub struct ReceiveTracker {
    slots: Vec<Option<u32>>,
    remote_sequence: u32,
    has_received: bool,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            slots: vec![None; SEQUENCE_BUFFER_SIZE],
            remote_sequence: 0,
            has_received: false,
        }
    }

    /// Returns `true` only the first time a sequence is seen.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.has_received
            && sequence_greater_than(self.remote_sequence, sequence)
            && self.remote_sequence.wrapping_sub(sequence) >= SEQUENCE_BUFFER_SIZE as u32
        {
            return false;
        }

        if self.is_received(sequence) {
            return false;
        }

        self.slots[Self::slot(sequence)] = Some(sequence);
        if !self.has_received || sequence_greater_than(sequence, self.remote_sequence) {
            self.remote_sequence = sequence;
            self.has_received = true;
        }
        true
    }

    pub fn is_received(&self, sequence: u32) -> bool {
        self.slots[Self::slot(sequence)] == Some(sequence)
    }

    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }

    pub fn ack_data(&self) -> (u32, u32) {
        if !self.has_received {
            return (0, 0);
        }

        let mut bitfield = 0u32;
        for i in 1..=ACK_BITS {
            if self.is_received(self.remote_sequence.wrapping_sub(i)) {
                bitfield |= 1 << (i - 1);
            }
        }
        (self.remote_sequence, bitfield)
    }

    fn slot(sequence: u32) -> usize {
        sequence as usize % SEQUENCE_BUFFER_SIZE
    }
}

/// Retransmitting channel: owns the local reliable sequence space, the
/// pending queue and the inbound duplicate filter.
#[derive(Debug, Default)]
pub struct ReliableChannel {
    local_sequence: u32,
    pending: VecDeque<PendingPacket>,
    received: ReceiveTracker,
}

impl ReliableChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences start at 1 so an ack of 0 from a peer that has heard nothing
    /// never matches a real packet.
    pub fn next_sequence(&mut self) -> u32 {
        self.local_sequence = self.local_sequence.wrapping_add(1);
        self.local_sequence
    }

    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }

    pub fn ack_data(&self) -> (u32, u32) {
        self.received.ack_data()
    }

    pub fn record_received(&mut self, sequence: u32) -> bool {
        self.received.record_received(sequence)
    }

    pub fn track(&mut self, packet: Packet, now: Instant) {
        let sequence = packet.header.sequence;
        if self.pending.iter().any(|p| p.sequence() == sequence) {
            return;
        }
        self.pending.push_back(PendingPacket {
            packet,
            first_send: now,
            last_send: now,
            retries: 0,
        });
    }

    /// Drops every pending packet named by `ack` or its bitfield. Returns the
    /// last send time of the exact match, or else of the lowest-index
    /// bitfield match, for RTT sampling.
    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32) -> Option<Instant> {
        let mut exact = None;
        let mut nearest: Option<(u32, Instant)> = None;

        self.pending.retain(|pending| {
            let sequence = pending.sequence();
            if sequence == ack {
                exact = Some(pending.last_send);
                return false;
            }

            let distance = ack.wrapping_sub(sequence);
            if (1..=ACK_BITS).contains(&distance) && ack_bitfield & (1 << (distance - 1)) != 0 {
                if nearest.is_none_or(|(best, _)| distance < best) {
                    nearest = Some((distance, pending.last_send));
                }
                return false;
            }

            true
        });

        exact.or(nearest.map(|(_, sent)| sent))
    }

    /// Packets due for retransmission. Each returned packet has its retry
    /// count bumped; packets past the retry or age limit are dropped silently.
    pub fn collect_resends(&mut self, now: Instant) -> Vec<Packet> {
        let mut resend = Vec::new();

        self.pending.retain_mut(|pending| {
            if now.duration_since(pending.first_send) > MAX_PENDING_AGE {
                return false;
            }
            if now.duration_since(pending.last_send) > RESEND_TIMEOUT {
                pending.retries += 1;
                if pending.retries > MAX_RETRIES {
                    return false;
                }
                pending.last_send = now;
                resend.push(pending.packet.clone());
            }
            true
        });

        resend
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, sequence: u32) -> bool {
        self.pending.iter().any(|p| p.sequence() == sequence)
    }
}

/// Fire-and-forget channel; only a sequence counter.
#[derive(Debug, Default)]
pub struct UnreliableChannel {
    local_sequence: u32,
}

impl UnreliableChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence(&mut self) -> u32 {
        self.local_sequence = self.local_sequence.wrapping_add(1);
        self.local_sequence
    }

    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::PacketHeader;

    fn packet(sequence: u32) -> Packet {
        Packet::new(PacketHeader::new(sequence, 0, 0, 4), vec![sequence as u8])
    }

    #[test]
    fn test_receive_tracker_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(1);
        tracker.record_received(2);
        tracker.record_received(3);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
        assert_eq!(bitfield & 0b100, 0);
    }

    #[test]
    fn test_receive_tracker_out_of_order() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(3);
        tracker.record_received(1);
        tracker.record_received(2);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record_received(1));
        assert!(!tracker.record_received(1));
        assert!(tracker.record_received(2));
    }

    #[test]
    fn test_no_duplicates_for_shuffled_window() {
        let mut tracker = ReceiveTracker::new();
        let base = u32::MAX - 500;
        // Deterministic permutation of 0..1024 (421 is coprime with 1024).
        let order: Vec<u32> = (0..1024u32).map(|i| (i * 421) % 1024).collect();

        for &offset in &order {
            assert!(tracker.record_received(base.wrapping_add(offset)));
        }
        for &offset in &order {
            assert!(!tracker.record_received(base.wrapping_add(offset)));
        }
        assert_eq!(tracker.remote_sequence(), base.wrapping_add(1023));
    }

    #[test]
    fn test_slot_reuse_is_not_a_duplicate() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record_received(5));
        assert!(tracker.record_received(5 + SEQUENCE_BUFFER_SIZE as u32));
        assert!(!tracker.record_received(5));
    }

    #[test]
    fn test_ack_bitfield_across_wrap() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(u32::MAX - 1);
        tracker.record_received(u32::MAX);
        tracker.record_received(1);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 1);
        // 0 missing, MAX at bit 1, MAX-1 at bit 2
        assert_eq!(bitfield, 0b110);
    }

    #[test]
    fn test_nothing_received_acks_zero() {
        let tracker = ReceiveTracker::new();
        assert_eq!(tracker.ack_data(), (0, 0));
    }

    #[test]
    fn test_reliable_sequence_starts_at_one() {
        let mut channel = ReliableChannel::new();
        assert_eq!(channel.next_sequence(), 1);
        assert_eq!(channel.next_sequence(), 2);
    }

    #[test]
    fn test_process_ack_removes_exact_and_bitfield() {
        let mut channel = ReliableChannel::new();
        let start = Instant::now();

        for seq in 1..=6 {
            channel.track(packet(seq), start + Duration::from_millis(seq as u64));
        }

        // ack 5, bitfield names 4 (bit 0) and 2 (bit 2)
        let sent = channel.process_ack(5, 0b101);

        assert_eq!(sent, Some(start + Duration::from_millis(5)));
        assert!(channel.is_pending(1));
        assert!(!channel.is_pending(2));
        assert!(channel.is_pending(3));
        assert!(!channel.is_pending(4));
        assert!(!channel.is_pending(5));
        assert!(channel.is_pending(6));
        assert_eq!(channel.pending_count(), 3);
    }

    #[test]
    fn test_process_ack_prefers_lowest_bit_without_exact() {
        let mut channel = ReliableChannel::new();
        let start = Instant::now();

        channel.track(packet(7), start);
        channel.track(packet(9), start + Duration::from_millis(20));

        // ack 10 is not pending; bits name 9 (bit 0) and 7 (bit 2)
        let sent = channel.process_ack(10, 0b101);

        assert_eq!(sent, Some(start + Duration::from_millis(20)));
        assert_eq!(channel.pending_count(), 0);
    }

    #[test]
    fn test_process_ack_unknown_returns_none() {
        let mut channel = ReliableChannel::new();
        channel.track(packet(3), Instant::now());

        assert_eq!(channel.process_ack(40, 0), None);
        assert_eq!(channel.pending_count(), 1);
    }

    #[test]
    fn test_resend_after_timeout() {
        let mut channel = ReliableChannel::new();
        let start = Instant::now();
        channel.track(packet(1), start);

        assert!(channel.collect_resends(start + Duration::from_millis(200)).is_empty());

        let resent = channel.collect_resends(start + Duration::from_millis(301));
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].header.sequence, 1);

        // clock restarts from the resend
        assert!(channel.collect_resends(start + Duration::from_millis(500)).is_empty());
        assert_eq!(channel.collect_resends(start + Duration::from_millis(602)).len(), 1);
    }

    #[test]
    fn test_abandon_after_max_retries() {
        let mut channel = ReliableChannel::new();
        let start = Instant::now();
        channel.track(packet(1), start);

        let mut now = start;
        for _ in 0..MAX_RETRIES {
            now += Duration::from_millis(301);
            assert_eq!(channel.collect_resends(now).len(), 1);
        }

        now += Duration::from_millis(301);
        assert!(channel.collect_resends(now).is_empty());
        assert_eq!(channel.pending_count(), 0);
    }

    #[test]
    fn test_abandon_after_max_age() {
        let mut channel = ReliableChannel::new();
        let start = Instant::now();
        channel.track(packet(1), start);

        assert!(channel.collect_resends(start + Duration::from_millis(5001)).is_empty());
        assert_eq!(channel.pending_count(), 0);
    }
}
