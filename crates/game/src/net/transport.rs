use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::protocol::MAX_PACKET_SIZE;
use super::simulator::PacketSimulator;
use super::stats::{NetworkStats, PacketConditions};

const IDLE_SLEEP: Duration = Duration::from_millis(1);
const STOP_TIMEOUT: Duration = Duration::from_secs(1);
/// Larger than any valid datagram so oversize ones can be detected.
const RECV_BUFFER_SIZE: usize = 2048;

pub type Datagram = (Vec<u8>, SocketAddr);

/// Non-blocking UDP socket with a background receive thread.
///
/// The receive thread only copies datagrams into a channel. Everything else,
/// including the outgoing queue flush, runs on the thread that owns the
/// transport.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    incoming: Receiver<Datagram>,
    outgoing_tx: Sender<Datagram>,
    outgoing_rx: Receiver<Datagram>,
    receive_thread: Option<JoinHandle<()>>,
    stopped: Receiver<()>,
    simulator: Option<PacketSimulator>,
    stats: NetworkStats,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let recv_socket = socket.try_clone()?;

        let running = Arc::new(AtomicBool::new(true));
        let (incoming_tx, incoming) = unbounded();
        let (outgoing_tx, outgoing_rx) = unbounded();
        let (stopped_tx, stopped) = crossbeam_channel::bounded(1);

        let thread_running = Arc::clone(&running);
        let receive_thread = std::thread::Builder::new()
            .name(format!("udp-recv-{}", local_addr.port()))
            .spawn(move || {
                receive_loop(&recv_socket, &thread_running, &incoming_tx);
                let _ = stopped_tx.send(());
            })?;

        log::debug!("UDP transport bound to {local_addr}");

        Ok(Self {
            socket,
            local_addr,
            running,
            incoming,
            outgoing_tx,
            outgoing_rx,
            receive_thread: Some(receive_thread),
            stopped,
            simulator: None,
            stats: NetworkStats::default(),
        })
    }

    /// Routes traffic through a seeded loss/latency simulator.
    pub fn set_conditions(&mut self, conditions: PacketConditions, seed: u64) {
        if conditions.enabled {
            log::info!(
                "Simulating {}% loss, {}ms +/- {}ms latency",
                conditions.loss_percent,
                conditions.latency_ms,
                conditions.jitter_ms
            );
            self.simulator = Some(PacketSimulator::new(conditions, seed));
        } else {
            self.simulator = None;
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn simulator(&self) -> Option<&PacketSimulator> {
        self.simulator.as_ref()
    }

    /// Queues a datagram for the next [`Self::flush`].
    pub fn send(&self, data: Vec<u8>, addr: SocketAddr) {
        if data.len() > MAX_PACKET_SIZE {
            log::warn!("Dropping {}-byte datagram to {addr}: exceeds {MAX_PACKET_SIZE}", data.len());
            return;
        }
        let _ = self.outgoing_tx.send((data, addr));
    }

    /// Everything received since the last call, after simulated loss.
    pub fn drain_received(&mut self) -> Vec<Datagram> {
        let mut received = Vec::new();
        for (data, addr) in self.incoming.try_iter() {
            let delivered = self
                .simulator
                .as_mut()
                .is_none_or(|simulator| simulator.process_incoming());
            if !delivered {
                self.stats.packets_dropped += 1;
                continue;
            }
            self.stats.record_received(data.len());
            received.push((data, addr));
        }
        received
    }

    /// Writes every queued datagram to the socket, plus any simulator-delayed
    /// ones whose release time has passed.
    pub fn flush(&mut self, now: Instant) {
        let queued: Vec<Datagram> = self.outgoing_rx.try_iter().collect();
        let ready = match self.simulator.as_mut() {
            Some(simulator) => {
                let mut ready: Vec<Datagram> = queued
                    .into_iter()
                    .filter_map(|(data, addr)| simulator.process_outgoing(data, addr, now))
                    .collect();
                ready.extend(simulator.take_ready(now));
                ready
            }
            None => queued,
        };

        for (data, addr) in ready {
            match self.socket.send_to(&data, addr) {
                Ok(bytes) => self.stats.record_sent(bytes),
                Err(e) if is_transient(&e) => {}
                Err(e) => {
                    self.stats.send_errors += 1;
                    log::warn!("UDP send to {addr} failed: {e}");
                }
            }
        }
    }

    /// Signals the receive thread and joins it, waiting at most one second.
    /// Unread and unsent datagrams are discarded.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.receive_thread.take() {
            match self.stopped.recv_timeout(STOP_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = handle.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("UDP receive thread on {} did not stop in time", self.local_addr);
                }
            }
        }

        self.incoming.try_iter().for_each(drop);
        self.outgoing_rx.try_iter().for_each(drop);
        if let Some(simulator) = self.simulator.as_mut() {
            simulator.clear();
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(socket: &UdpSocket, running: &AtomicBool, incoming: &Sender<Datagram>) {
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buffer) {
            Ok((size, addr)) => {
                if size > MAX_PACKET_SIZE {
                    log::warn!("Dropping oversized {size}-byte datagram from {addr}");
                    continue;
                }
                if incoming.send((buffer[..size].to_vec(), addr)).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::sleep(IDLE_SLEEP),
            Err(e) if is_transient(&e) => {}
            Err(e) => {
                log::warn!("UDP receive error: {e}");
                std::thread::sleep(IDLE_SLEEP);
            }
        }
    }
}

/// Peer-unreachable notifications surfaced by the OS as socket errors.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_for(transport: &mut UdpTransport, count: usize) -> Vec<Datagram> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut received = Vec::new();
        while received.len() < count && Instant::now() < deadline {
            received.extend(transport.drain_received());
            std::thread::sleep(Duration::from_millis(2));
        }
        received
    }

    #[test]
    fn loopback_send_and_receive() {
        let mut a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0").unwrap();

        a.send(vec![1, 2, 3], b.local_addr());
        a.flush(Instant::now());

        let received = wait_for(&mut b, 1);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, vec![1, 2, 3]);
        assert_eq!(received[0].1, a.local_addr());
        assert_eq!(a.stats().packets_sent, 1);
        assert_eq!(b.stats().bytes_received, 3);
    }

    #[test]
    fn nothing_leaves_before_flush() {
        let a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0").unwrap();

        a.send(vec![9], b.local_addr());
        std::thread::sleep(Duration::from_millis(30));
        assert!(b.drain_received().is_empty());
    }

    #[test]
    fn oversized_datagrams_are_not_queued() {
        let mut a = UdpTransport::bind("127.0.0.1:0").unwrap();
        a.send(vec![0; MAX_PACKET_SIZE + 1], a.local_addr());
        a.flush(Instant::now());
        assert_eq!(a.stats().packets_sent, 0);
    }

    #[test]
    fn stop_joins_receive_thread() {
        let mut transport = UdpTransport::bind("127.0.0.1:0").unwrap();
        assert!(transport.is_running());
        transport.stop();
        assert!(!transport.is_running());
        assert!(transport.receive_thread.is_none());
    }

    #[test]
    fn full_loss_drops_everything_outgoing() {
        let mut a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0").unwrap();
        a.set_conditions(PacketConditions::lossy(100.0), 3);

        for _ in 0..5 {
            a.send(vec![1], b.local_addr());
        }
        a.flush(Instant::now());
        std::thread::sleep(Duration::from_millis(30));

        assert!(b.drain_received().is_empty());
        assert_eq!(a.simulator().map(|s| s.dropped()), Some(5));
    }
}
