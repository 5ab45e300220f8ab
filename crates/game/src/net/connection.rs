use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::protocol::{MAX_PAYLOAD_SIZE, Packet, PacketError, PacketHeader};
use super::stats::NetworkStats;
use super::tracking::{ReliableChannel, UnreliableChannel};
use crate::message::{Delivery, Message, MessageError, MessageType};

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const RTT_SAMPLE_COUNT: usize = 10;

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Per-endpoint protocol state: both sequence spaces, RTT and liveness.
#[derive(Debug)]
pub struct Connection {
    pub addr: SocketAddr,
    pub client_id: u32,
    reliable: ReliableChannel,
    unreliable: UnreliableChannel,
    rtt_samples: [f32; RTT_SAMPLE_COUNT],
    rtt_index: usize,
    rtt_ms: f32,
    last_receive_time: Instant,
    timeout: Duration,
    connected: bool,
    stats: NetworkStats,
}

impl Connection {
    pub fn new(addr: SocketAddr, client_id: u32, now: Instant) -> Self {
        Self {
            addr,
            client_id,
            reliable: ReliableChannel::new(),
            unreliable: UnreliableChannel::new(),
            rtt_samples: [0.0; RTT_SAMPLE_COUNT],
            rtt_index: 0,
            rtt_ms: 0.0,
            last_receive_time: now,
            timeout: CONNECTION_TIMEOUT,
            connected: true,
            stats: NetworkStats::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Frames `message` on the channel its type selects. Reliable packets are
    /// queued for retransmission until acknowledged.
    pub fn build_packet(&mut self, message: &Message, now: Instant) -> Result<Packet, SendError> {
        let payload = message.encode()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge(payload.len()).into());
        }

        let delivery = message.delivery();
        let sequence = match delivery {
            Delivery::Reliable => self.reliable.next_sequence(),
            Delivery::Unreliable => self.unreliable.next_sequence(),
        };
        let (ack, ack_bitfield) = self.reliable.ack_data();
        let header = PacketHeader::new(sequence, ack, ack_bitfield, message.message_type() as u8);
        let packet = Packet::new(header, payload);

        if delivery == Delivery::Reliable {
            self.reliable.track(packet.clone(), now);
        }
        self.stats.record_sent(packet.payload.len() + super::protocol::HEADER_SIZE);
        Ok(packet)
    }

    /// Applies the piggybacked ack and records arrival. Returns `false` for a
    /// reliable packet that was already delivered.
    pub fn receive(&mut self, packet: &Packet, now: Instant) -> bool {
        self.last_receive_time = now;
        self.stats
            .record_received(packet.payload.len() + super::protocol::HEADER_SIZE);

        if let Some(sent) = self
            .reliable
            .process_ack(packet.header.ack, packet.header.ack_bitfield)
        {
            self.add_rtt_sample(now.saturating_duration_since(sent));
        }

        match MessageType::delivery_for_tag(packet.message_type()) {
            Delivery::Reliable => {
                let fresh = self.reliable.record_received(packet.header.sequence);
                if !fresh {
                    self.stats.packets_dropped += 1;
                }
                fresh
            }
            Delivery::Unreliable => true,
        }
    }

    /// Reliable packets due for another send, stamped with the current ack.
    pub fn collect_resends(&mut self, now: Instant) -> Vec<Packet> {
        let (ack, ack_bitfield) = self.reliable.ack_data();
        let mut resends = self.reliable.collect_resends(now);
        for packet in &mut resends {
            packet.header.ack = ack;
            packet.header.ack_bitfield = ack_bitfield;
        }
        resends
    }

    /// Marks the connection dead once nothing has arrived within the timeout.
    pub fn update(&mut self, now: Instant) -> bool {
        if self.connected && now.saturating_duration_since(self.last_receive_time) > self.timeout {
            self.connected = false;
        }
        self.connected
    }

    fn add_rtt_sample(&mut self, rtt: Duration) {
        self.rtt_samples[self.rtt_index] = rtt.as_secs_f32() * 1000.0;
        self.rtt_index = (self.rtt_index + 1) % RTT_SAMPLE_COUNT;

        let (sum, count) = self
            .rtt_samples
            .iter()
            .filter(|&&sample| sample > 0.0)
            .fold((0.0, 0u32), |(sum, count), sample| (sum + sample, count + 1));
        if count > 0 {
            self.rtt_ms = sum / count as f32;
        }
    }

    pub fn rtt_ms(&self) -> f32 {
        self.rtt_ms
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn pending_reliable(&self) -> usize {
        self.reliable.pending_count()
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}

/// Server-side table of connections keyed by client id, with an address index.
#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, u32>,
    connections: BTreeMap<u32, Connection>,
    next_client_id: u32,
    timeout: Duration,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            connections: BTreeMap::new(),
            next_client_id: 1,
            timeout: CONNECTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get_or_create(&mut self, addr: SocketAddr, now: Instant) -> &mut Connection {
        let next_client_id = &mut self.next_client_id;
        let client_id = *self.clients_by_addr.entry(addr).or_insert_with(|| {
            let id = *next_client_id;
            *next_client_id = next_client_id.wrapping_add(1).max(1);
            log::debug!("New connection {id} from {addr}");
            id
        });

        let timeout = self.timeout;
        self.connections
            .entry(client_id)
            .or_insert_with(|| Connection::new(addr, client_id, now).with_timeout(timeout))
    }

    pub fn get(&self, client_id: u32) -> Option<&Connection> {
        self.connections.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Connection> {
        self.connections.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<Connection> {
        let connection = self.connections.remove(&client_id)?;
        self.clients_by_addr.remove(&connection.addr);
        Some(connection)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.values_mut()
    }

    /// Removes every connection that has gone quiet and returns them.
    pub fn update_all(&mut self, now: Instant) -> Vec<(u32, SocketAddr)> {
        let timed_out: Vec<(u32, SocketAddr)> = self
            .connections
            .values_mut()
            .filter_map(|conn| (!conn.update(now)).then_some((conn.client_id, conn.addr)))
            .collect();

        for (client_id, _) in &timed_out {
            self.remove(*client_id);
        }
        timed_out
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn heartbeat(timestamp_ms: u32) -> Message {
        Message::Heartbeat { timestamp_ms }
    }

    #[test]
    fn reliable_messages_are_tracked_until_acked() {
        let now = Instant::now();
        let mut sender = Connection::new(addr(1), 1, now);
        let mut receiver = Connection::new(addr(2), 1, now);

        let packet = sender.build_packet(&heartbeat(7), now).unwrap();
        assert_eq!(packet.header.sequence, 1);
        assert_eq!(sender.pending_reliable(), 1);

        assert!(receiver.receive(&packet, now));
        assert!(!receiver.receive(&packet, now));

        let reply = receiver.build_packet(&heartbeat(8), now).unwrap();
        assert_eq!(reply.header.ack, 1);

        sender.receive(&reply, now + Duration::from_millis(40));
        assert_eq!(sender.pending_reliable(), 0);
        assert!((sender.rtt_ms() - 40.0).abs() < 0.5);
    }

    #[test]
    fn unreliable_messages_use_their_own_sequence() {
        let now = Instant::now();
        let mut conn = Connection::new(addr(1), 1, now);
        let snapshot = Message::Snapshot(crate::message::Snapshot {
            server_tick: 3,
            entities: Vec::new(),
        });

        let first = conn.build_packet(&snapshot, now).unwrap();
        let second = conn.build_packet(&snapshot, now).unwrap();
        let reliable = conn.build_packet(&heartbeat(0), now).unwrap();

        assert_eq!((first.header.sequence, second.header.sequence), (1, 2));
        assert_eq!(reliable.header.sequence, 1);
        assert_eq!(conn.pending_reliable(), 1);

        let mut peer = Connection::new(addr(2), 1, now);
        assert!(peer.receive(&first, now));
        assert!(peer.receive(&first, now));
    }

    #[test]
    fn oversized_message_is_refused_before_sequencing() {
        let now = Instant::now();
        let mut conn = Connection::new(addr(1), 1, now);
        let huge = Message::ConnectReject {
            reason: "x".repeat(2000),
        };

        assert!(matches!(
            conn.build_packet(&huge, now),
            Err(SendError::Packet(PacketError::PayloadTooLarge(_)))
        ));
        assert_eq!(conn.pending_reliable(), 0);
        let next = conn.build_packet(&heartbeat(1), now).unwrap();
        assert_eq!(next.header.sequence, 1);
    }

    #[test]
    fn resends_carry_fresh_acks() {
        let start = Instant::now();
        let mut conn = Connection::new(addr(1), 1, start);
        conn.build_packet(&heartbeat(1), start).unwrap();

        let mut peer = Connection::new(addr(2), 1, start);
        let incoming = peer.build_packet(&heartbeat(2), start).unwrap();
        conn.receive(&incoming, start);

        let resends = conn.collect_resends(start + Duration::from_millis(350));
        assert_eq!(resends.len(), 1);
        assert_eq!(resends[0].header.ack, incoming.header.sequence);
    }

    #[test]
    fn rtt_averages_recent_samples() {
        let now = Instant::now();
        let mut conn = Connection::new(addr(1), 1, now);
        conn.add_rtt_sample(Duration::from_millis(100));
        conn.add_rtt_sample(Duration::from_millis(50));
        assert!((conn.rtt_ms() - 75.0).abs() < 0.01);

        for _ in 0..RTT_SAMPLE_COUNT {
            conn.add_rtt_sample(Duration::from_millis(20));
        }
        assert!((conn.rtt_ms() - 20.0).abs() < 0.01);
    }

    #[test]
    fn silence_times_out() {
        let start = Instant::now();
        let mut conn = Connection::new(addr(1), 1, start);

        assert!(conn.update(start + Duration::from_secs(9)));
        assert!(!conn.update(start + Duration::from_secs(11)));
        assert!(!conn.is_connected());
    }

    #[test]
    fn manager_assigns_ids_and_evicts() {
        let start = Instant::now();
        let mut manager = ConnectionManager::new();

        let a = manager.get_or_create(addr(1), start).client_id;
        let b = manager.get_or_create(addr(2), start).client_id;
        assert_eq!((a, b), (1, 2));
        assert_eq!(manager.get_or_create(addr(1), start).client_id, 1);
        assert_eq!(manager.len(), 2);

        let later = start + Duration::from_secs(8);
        if let Some(conn) = manager.get_mut(b) {
            conn.last_receive_time = later;
        }

        let evicted = manager.update_all(start + Duration::from_secs(11));
        assert_eq!(evicted, vec![(1, addr(1))]);
        assert!(manager.get(1).is_none());
        assert!(manager.get(2).is_some());

        assert!(manager.remove(2).is_some());
        assert!(manager.is_empty());
    }
}
