use std::collections::VecDeque;

use super::types::GameEvent;

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub tick: u32,
    pub event: GameEvent,
}

/// Events raised during a tick, drained in order for broadcast.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<PendingEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: u32, event: GameEvent) {
        self.pending.push_back(PendingEvent { tick, event });
    }

    pub fn drain(&mut self) -> impl Iterator<Item = PendingEvent> + '_ {
        self.pending.drain(..)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn drains_in_order() {
        let mut queue = EventQueue::new();

        queue.push(3, GameEvent::Damage {
            target_id: 2,
            source_id: 1,
            damage: 25,
            new_health: 0,
        });
        queue.push(3, GameEvent::Death {
            player_id: 2,
            killer_id: 1,
        });
        queue.push(3, GameEvent::Despawn { entity_id: 9 });

        let drained: Vec<_> = queue.drain().map(|p| p.event.to_message()).collect();
        assert!(queue.is_empty());
        assert_eq!(drained.len(), 3);
        assert!(matches!(drained[0], Message::PlayerDamage { new_health: 0, .. }));
        assert!(matches!(drained[1], Message::PlayerDeath { player_id: 2, killer_id: 1 }));
        assert_eq!(drained[2], Message::EntityDespawn { entity_id: 9 });
    }
}
