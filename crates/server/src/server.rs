use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;

use tanknet::message::{DELTA_EPSILON, DeltaUpdate, EntityDelta, Snapshot};
use tanknet::net::{MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use tanknet::physics::safe_spawn_position;
use tanknet::player::config::{MAX_PLAYER_NAME_BYTES, TANK_MAX_HEALTH};
use tanknet::{
    Arena, Connection, ConnectionManager, EventQueue, FixedTimestep, GameEvent, Message,
    NetworkStats, Packet, PlayerInput, PlayerState, UdpTransport, World,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::simulation::{apply_input, expire_projectiles, fire_projectile, resolve_projectile_hits};

/// Largest number of full deltas that fits one packet: 10 bytes of header
/// plus 22 bytes per entity.
pub const MAX_DELTAS_PER_MESSAGE: usize = 53;

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

pub struct GameServer {
    transport: UdpTransport,
    connections: ConnectionManager,
    players: BTreeMap<u32, PlayerState>,
    world: World,
    game_events: EventQueue,
    config: ServerConfig,
    timestep: FixedTimestep,
    last_frame: Instant,
    rng: StdRng,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        let mut transport = UdpTransport::bind(config.bind_addr())?;
        if let Some(conditions) = config.packet_conditions {
            transport.set_conditions(conditions, config.seed);
        }

        let mut world = World::new();
        Arena::new().spawn(&mut world);

        let mut pending_events = VecDeque::new();
        pending_events.push_back(ServerEvent::Started {
            addr: transport.local_addr(),
        });
        log::info!(
            "Server listening on {} ({} Hz, {} players max)",
            transport.local_addr(),
            config.tick_rate,
            config.max_players
        );

        Ok(Self {
            transport,
            connections: ConnectionManager::new().with_timeout(config.connection_timeout),
            players: BTreeMap::new(),
            world,
            game_events: EventQueue::new(),
            timestep: FixedTimestep::new(config.tick_rate),
            last_frame: Instant::now(),
            rng: StdRng::seed_from_u64(config.seed),
            running: Arc::new(AtomicBool::new(true)),
            pending_events,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn player(&self, client_id: u32) -> Option<&PlayerState> {
        self.players.get(&client_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Ticks until the running flag is cleared, then shuts down. Events
    /// are logged and discarded.
    pub fn run(&mut self) {
        let mut last_status = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.pending_events.drain(..) {
                log::debug!("{event:?}");
            }

            let now = Instant::now();
            if now.duration_since(last_status) >= STATUS_INTERVAL {
                log::info!("{}", self.status_line());
                last_status = now;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown();
    }

    /// Drains the socket, runs every fixed tick that is due and flushes the
    /// outgoing queue.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.process_network(now);

        self.timestep.accumulate(delta);
        while self.timestep.consume_tick() {
            self.tick(now);
        }

        self.transport.flush(now);
    }

    /// One authoritative simulation step.
    pub fn tick(&mut self, now: Instant) {
        let dt = self.timestep.dt();
        self.world.advance_tick();
        let tick = self.world.tick();

        for (client_id, addr) in self.connections.update_all(now) {
            if self.players.contains_key(&client_id) {
                self.remove_player(client_id, DisconnectReason::Timeout, now);
            } else {
                log::debug!("Evicted idle connection {client_id} from {addr}");
            }
        }

        self.update_respawns(dt, tick);
        self.process_inputs(dt, tick);

        for player in self.players.values_mut() {
            player.tick_cooldown(dt);
        }
        for event in expire_projectiles(&mut self.world, dt) {
            self.game_events.push(tick, event);
        }
        for event in resolve_projectile_hits(&mut self.world, self.config.gameplay.projectile_damage) {
            self.game_events.push(tick, event);
        }
        self.dispatch_game_events(now);

        if tick % self.config.snapshot_interval.max(1) == 0 {
            self.broadcast_snapshot(now);
        } else {
            self.broadcast_deltas(now);
        }
        self.world.update_previous();

        self.send_resends(now);
    }

    fn update_respawns(&mut self, dt: f32, tick: u32) {
        let due: Vec<u32> = self
            .players
            .values_mut()
            .filter_map(|player| player.tick_respawn(dt).then_some(player.client_id))
            .collect();

        for client_id in due {
            let position =
                safe_spawn_position(&self.world, &mut self.rng, self.config.gameplay.spawn_area_half_size);
            let Some(player) = self.players.get_mut(&client_id) else {
                continue;
            };
            let Some(tank) = self.world.get_mut(player.entity_id) else {
                continue;
            };

            tank.position = position;
            tank.health = TANK_MAX_HEALTH;
            tank.rotation = 0.0;
            player.respawn();
            log::info!("{} respawned at {position}", player.name);

            self.game_events.push(
                tick,
                GameEvent::Respawn {
                    player_id: player.entity_id,
                    position,
                },
            );
        }
    }

    fn process_inputs(&mut self, dt: f32, tick: u32) {
        let gameplay = &self.config.gameplay;

        for player in self.players.values_mut().filter(|p| p.alive) {
            let Some(input) = player.inputs.pop() else {
                continue;
            };

            apply_input(&mut self.world, player.entity_id, &input, gameplay, dt);

            if input.shoot && player.can_shoot() {
                if let Some(event) = fire_projectile(&mut self.world, player.entity_id, gameplay) {
                    player.shoot_cooldown = gameplay.shoot_cooldown;
                    self.game_events.push(tick, event);
                }
            }
        }
    }

    fn dispatch_game_events(&mut self, now: Instant) {
        let events: Vec<GameEvent> = self.game_events.drain().map(|pending| pending.event).collect();

        for event in events {
            if let GameEvent::Death {
                player_id,
                killer_id,
            } = event
            {
                self.record_death(player_id, killer_id);
            }
            self.broadcast(&event.to_message(), None, now);
        }
    }

    fn record_death(&mut self, victim_entity: u32, killer_entity: u32) {
        let respawn_time = self.config.gameplay.respawn_time;

        if let Some(victim) = self.players.values_mut().find(|p| p.entity_id == victim_entity) {
            victim.die(respawn_time);
            log::info!("{} was destroyed", victim.name);
        }
        if let Some(killer) = self.players.values_mut().find(|p| p.entity_id == killer_entity) {
            killer.kills += 1;
        }

        self.pending_events.push_back(ServerEvent::PlayerKilled {
            victim_id: victim_entity,
            killer_id: killer_entity,
        });
    }

    fn broadcast_snapshot(&mut self, now: Instant) {
        let snapshot = self.world.snapshot(false);
        let message = Message::Snapshot(snapshot);

        if fits_in_packet(&message) {
            self.broadcast(&message, None, now);
            return;
        }

        let Message::Snapshot(snapshot) = message else {
            return;
        };
        log::debug!(
            "Snapshot of {} entities exceeds packet size, sending full deltas",
            snapshot.entities.len()
        );
        let deltas: Vec<EntityDelta> = snapshot.entities.iter().map(EntityDelta::full).collect();
        self.broadcast_delta_chunks(&deltas, now);
    }

    fn broadcast_deltas(&mut self, now: Instant) {
        let deltas = self.world.changed_entities(DELTA_EPSILON);
        if !deltas.is_empty() {
            self.broadcast_delta_chunks(&deltas, now);
        }
    }

    fn broadcast_delta_chunks(&mut self, deltas: &[EntityDelta], now: Instant) {
        let server_tick = self.world.tick();
        for chunk in deltas.chunks(MAX_DELTAS_PER_MESSAGE) {
            let message = Message::DeltaUpdate(DeltaUpdate {
                server_tick,
                baseline_tick: server_tick.wrapping_sub(1),
                deltas: chunk.to_vec(),
            });
            self.broadcast(&message, None, now);
        }
    }

    /// Sends to every joined player, optionally skipping one client.
    fn broadcast(&mut self, message: &Message, exclude: Option<u32>, now: Instant) {
        for &client_id in self.players.keys() {
            if exclude == Some(client_id) {
                continue;
            }
            if let Some(conn) = self.connections.get_mut(client_id) {
                send_message(&self.transport, conn, message, now);
            }
        }
    }

    fn send_to(&mut self, client_id: u32, message: &Message, now: Instant) {
        if let Some(conn) = self.connections.get_mut(client_id) {
            send_message(&self.transport, conn, message, now);
        }
    }

    fn send_resends(&mut self, now: Instant) {
        for conn in self.connections.iter_mut() {
            for packet in conn.collect_resends(now) {
                queue_packet(&self.transport, &packet, conn.addr);
            }
        }
    }

    fn process_network(&mut self, now: Instant) {
        for (data, addr) in self.transport.drain_received() {
            let packet = match Packet::deserialize(&data) {
                Ok(packet) => packet,
                Err(e) => {
                    log::trace!("Dropping datagram from {addr}: {e}");
                    continue;
                }
            };

            let conn = self.connections.get_or_create(addr, now);
            if !conn.receive(&packet, now) {
                continue;
            }
            let client_id = conn.client_id;

            match Message::decode(packet.message_type(), &packet.payload) {
                Ok(message) => self.handle_message(client_id, addr, message, now),
                Err(e) => log::debug!("Ignoring message from {addr}: {e}"),
            }
        }
    }

    fn handle_message(&mut self, client_id: u32, addr: SocketAddr, message: Message, now: Instant) {
        match message {
            Message::ConnectRequest {
                protocol_version,
                player_name,
            } => self.handle_connect(client_id, addr, protocol_version, &player_name, now),
            Message::Disconnect { reason } => {
                log::debug!("Client {client_id} disconnected: {reason}");
                if self.players.contains_key(&client_id) {
                    self.remove_player(client_id, DisconnectReason::Graceful, now);
                } else {
                    self.connections.remove(client_id);
                }
            }
            Message::PlayerInput(input) => self.handle_input(client_id, input),
            Message::Heartbeat { .. } => {}
            other => log::debug!("Unexpected {:?} from {addr}", other.message_type()),
        }
    }

    fn handle_connect(
        &mut self,
        client_id: u32,
        addr: SocketAddr,
        protocol_version: u32,
        player_name: &str,
        now: Instant,
    ) {
        let rejection = if self.players.contains_key(&client_id) {
            Some("Already connected")
        } else if protocol_version != PROTOCOL_VERSION {
            Some("Protocol version mismatch")
        } else if self.players.len() >= self.config.max_players {
            Some("Server full")
        } else {
            None
        };

        if let Some(reason) = rejection {
            log::warn!("Rejecting {addr}: {reason}");
            self.send_to(
                client_id,
                &Message::ConnectReject {
                    reason: reason.into(),
                },
                now,
            );
            self.pending_events.push_back(ServerEvent::ConnectionDenied {
                addr,
                reason: reason.into(),
            });
            return;
        }

        let name = sanitize_name(player_name, client_id);
        let position =
            safe_spawn_position(&self.world, &mut self.rng, self.config.gameplay.spawn_area_half_size);
        let entity_id = self.world.spawn_tank(&name, position).id();
        self.players
            .insert(client_id, PlayerState::new(client_id, addr, name.clone(), entity_id));

        log::info!("Player connected: {name} (client {client_id}, entity {entity_id}) from {addr}");

        self.send_to(
            client_id,
            &Message::ConnectAccept {
                client_id,
                server_tick: self.world.tick(),
                player_entity_id: entity_id,
            },
            now,
        );
        self.send_initial_state(client_id, now);

        if let Some(spawn) = self.world.get(entity_id).map(|tank| tank.to_spawn()) {
            self.broadcast(&Message::EntitySpawn(spawn), Some(client_id), now);
        }

        self.pending_events.push_back(ServerEvent::PlayerJoined {
            client_id,
            addr,
            entity_id,
            name,
        });
    }

    /// Full world including walls. When that is too large for one packet
    /// the walls go in a snapshot and everything else as spawn messages.
    fn send_initial_state(&mut self, client_id: u32, now: Instant) {
        let full = Message::Snapshot(self.world.snapshot(true));
        if fits_in_packet(&full) {
            self.send_to(client_id, &full, now);
            return;
        }

        let walls = Snapshot {
            server_tick: self.world.tick(),
            entities: self.world.walls().map(|wall| wall.to_state()).collect(),
        };
        self.send_to(client_id, &Message::Snapshot(walls), now);

        let spawns: Vec<Message> = self
            .world
            .entities()
            .filter(|e| !e.is_wall())
            .map(|e| Message::EntitySpawn(e.to_spawn()))
            .collect();
        for spawn in &spawns {
            self.send_to(client_id, spawn, now);
        }
    }

    fn handle_input(&mut self, client_id: u32, input: PlayerInput) {
        if let Some(player) = self.players.get_mut(&client_id).filter(|p| p.alive) {
            player.inputs.push(input);
        }
    }

    fn remove_player(&mut self, client_id: u32, reason: DisconnectReason, now: Instant) {
        let Some(player) = self.players.remove(&client_id) else {
            return;
        };

        log::info!("Player {} (client {client_id}) {}", player.name, reason.as_str());

        self.world.despawn(player.entity_id);
        self.broadcast(
            &Message::EntityDespawn {
                entity_id: player.entity_id,
            },
            None,
            now,
        );
        self.connections.remove(client_id);

        self.pending_events.push_back(ServerEvent::PlayerLeft {
            client_id,
            name: player.name,
            reason,
        });
    }

    /// Tells every player the server is going away and stops the socket.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let now = Instant::now();

        self.broadcast(
            &Message::Disconnect {
                reason: "Server shutting down".into(),
            },
            None,
            now,
        );
        self.transport.flush(now);

        let client_ids: Vec<u32> = self.players.keys().copied().collect();
        for client_id in client_ids {
            if let Some(player) = self.players.remove(&client_id) {
                self.world.despawn(player.entity_id);
                self.pending_events.push_back(ServerEvent::PlayerLeft {
                    client_id,
                    name: player.name,
                    reason: DisconnectReason::Shutdown,
                });
            }
            self.connections.remove(client_id);
        }

        self.transport.stop();
        log::info!("Server stopped");
    }

    pub fn status_line(&self) -> String {
        format!(
            "Server: Running | Port: {} | Players: {}/{} | Tick: {}",
            self.local_addr().port(),
            self.players.len(),
            self.config.max_players,
            self.world.tick()
        )
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.world.tick(),
            player_count: self.players.len(),
            connection_count: self.connections.len(),
            max_players: self.config.max_players,
            entity_count: self.world.entity_count(),
            network_stats: self.transport.stats().clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u32,
    pub player_count: usize,
    pub connection_count: usize,
    pub max_players: usize,
    pub entity_count: usize,
    pub network_stats: NetworkStats,
}

fn fits_in_packet(message: &Message) -> bool {
    message
        .encode()
        .is_ok_and(|payload| payload.len() <= MAX_PAYLOAD_SIZE)
}

fn send_message(transport: &UdpTransport, conn: &mut Connection, message: &Message, now: Instant) {
    match conn.build_packet(message, now) {
        Ok(packet) => queue_packet(transport, &packet, conn.addr),
        Err(e) => log::warn!(
            "Cannot send {:?} to client {}: {e}",
            message.message_type(),
            conn.client_id
        ),
    }
}

fn queue_packet(transport: &UdpTransport, packet: &Packet, addr: SocketAddr) {
    match packet.serialize() {
        Ok(bytes) => transport.send(bytes, addr),
        Err(e) => log::warn!("Failed to serialize packet for {addr}: {e}"),
    }
}

/// Trims, caps the length on a char boundary and substitutes a default for
/// empty names.
fn sanitize_name(name: &str, client_id: u32) -> String {
    let trimmed = name.trim();
    let mut end = trimmed.len().min(MAX_PLAYER_NAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let name = &trimmed[..end];
    if name.is_empty() {
        format!("Player{client_id}")
    } else {
        name.to_string()
    }
}
