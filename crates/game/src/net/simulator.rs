use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::stats::PacketConditions;

#[derive(Debug)]
struct DelayedDatagram {
    release_time: Instant,
    order: u64,
    data: Vec<u8>,
    addr: SocketAddr,
}

impl PartialEq for DelayedDatagram {
    fn eq(&self, other: &Self) -> bool {
        self.release_time == other.release_time && self.order == other.order
    }
}

impl Eq for DelayedDatagram {}

impl PartialOrd for DelayedDatagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedDatagram {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Seeded loss/latency injection for outgoing and incoming datagrams.
#[derive(Debug)]
pub struct PacketSimulator {
    conditions: PacketConditions,
    rng: StdRng,
    delayed: BinaryHeap<DelayedDatagram>,
    next_order: u64,
    dropped: u64,
}

impl PacketSimulator {
    pub fn new(conditions: PacketConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: StdRng::seed_from_u64(seed),
            delayed: BinaryHeap::new(),
            next_order: 0,
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn pending(&self) -> usize {
        self.delayed.len()
    }

    /// Returns the datagram if it should go out now. Dropped or delayed
    /// datagrams return `None`; delayed ones come back from [`Self::take_ready`].
    pub fn process_outgoing(
        &mut self,
        data: Vec<u8>,
        addr: SocketAddr,
        now: Instant,
    ) -> Option<(Vec<u8>, SocketAddr)> {
        if !self.conditions.enabled {
            return Some((data, addr));
        }
        if self.roll_loss() {
            return None;
        }

        let delay = self.roll_delay();
        if delay.is_zero() {
            return Some((data, addr));
        }

        self.delayed.push(DelayedDatagram {
            release_time: now + delay,
            order: self.next_order,
            data,
            addr,
        });
        self.next_order += 1;
        None
    }

    /// `true` if the incoming datagram should be delivered.
    pub fn process_incoming(&mut self) -> bool {
        !(self.conditions.enabled && self.roll_loss())
    }

    pub fn take_ready(&mut self, now: Instant) -> Vec<(Vec<u8>, SocketAddr)> {
        let mut ready = Vec::new();
        while self.delayed.peek().is_some_and(|d| d.release_time <= now) {
            if let Some(delayed) = self.delayed.pop() {
                ready.push((delayed.data, delayed.addr));
            }
        }
        ready
    }

    pub fn clear(&mut self) {
        self.delayed.clear();
    }

    fn roll_loss(&mut self) -> bool {
        if self.conditions.loss_percent <= 0.0 {
            return false;
        }
        let dropped = self.rng.gen_range(0.0..100.0) < self.conditions.loss_percent;
        if dropped {
            self.dropped += 1;
        }
        dropped
    }

    fn roll_delay(&mut self) -> Duration {
        if self.conditions.latency_ms == 0 {
            return Duration::ZERO;
        }
        let mut delay = self.conditions.latency_ms as f32;
        if self.conditions.jitter_ms > 0 {
            let jitter = self.conditions.jitter_ms as f32;
            delay += self.rng.gen_range(-jitter..=jitter);
        }
        Duration::from_secs_f32(delay.max(0.0) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:7777".parse().unwrap()
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut sim = PacketSimulator::new(PacketConditions::default(), 1);
        let now = Instant::now();

        for i in 0..100u8 {
            assert_eq!(sim.process_outgoing(vec![i], addr(), now), Some((vec![i], addr())));
            assert!(sim.process_incoming());
        }
        assert_eq!(sim.dropped(), 0);
    }

    #[test]
    fn test_full_loss_drops_everything() {
        let mut sim = PacketSimulator::new(PacketConditions::lossy(100.0), 7);
        let now = Instant::now();

        for _ in 0..50 {
            assert!(sim.process_outgoing(vec![0], addr(), now).is_none());
            assert!(!sim.process_incoming());
        }
        assert_eq!(sim.dropped(), 100);
    }

    #[test]
    fn test_partial_loss_is_reproducible() {
        let run = |seed| {
            let mut sim = PacketSimulator::new(PacketConditions::lossy(30.0), seed);
            (0..200).map(|_| sim.process_incoming()).collect::<Vec<_>>()
        };

        let first = run(42);
        assert_eq!(first, run(42));
        let delivered = first.iter().filter(|d| **d).count();
        assert!(delivered > 100 && delivered < 180, "delivered {delivered}");
    }

    #[test]
    fn test_latency_holds_until_release() {
        let mut sim = PacketSimulator::new(PacketConditions::delayed(100, 0), 3);
        let now = Instant::now();

        assert!(sim.process_outgoing(vec![1], addr(), now).is_none());
        assert!(sim.process_outgoing(vec![2], addr(), now).is_none());
        assert_eq!(sim.pending(), 2);

        assert!(sim.take_ready(now + Duration::from_millis(50)).is_empty());
        let ready = sim.take_ready(now + Duration::from_millis(101));
        assert_eq!(ready, vec![(vec![1], addr()), (vec![2], addr())]);
        assert_eq!(sim.pending(), 0);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut sim = PacketSimulator::new(PacketConditions::delayed(50, 20), 9);
        let now = Instant::now();

        for i in 0..20u8 {
            assert!(sim.process_outgoing(vec![i], addr(), now).is_none());
        }
        assert!(sim.take_ready(now + Duration::from_millis(29)).is_empty());
        assert_eq!(sim.take_ready(now + Duration::from_millis(71)).len(), 20);
    }
}
