use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};

use tanknet::net::PROTOCOL_VERSION;
use tanknet::{
    Connection, DeltaUpdate, Message, NetworkStats, Packet, PacketConditions, Snapshot,
    UdpTransport,
};

use super::config::ClientConfig;
use super::events::ClientEvent;
use super::input::InputState;
use super::prediction::ClientPrediction;
use super::replication::{RemoteEntity, ReplicatedWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// ConnectRequest sent, waiting for an answer.
    Connecting,
    /// Accepted, waiting for the first snapshot.
    Connected,
    InGame,
}

pub struct GameClient {
    transport: UdpTransport,
    connection: Option<Connection>,
    config: ClientConfig,
    state: ConnectionState,
    client_id: Option<u32>,
    entity_id: Option<u32>,
    world: ReplicatedWorld,
    prediction: ClientPrediction,
    input: InputState,
    input_sequence: u32,
    last_input_time: Instant,
    last_heartbeat_time: Instant,
    connect_started: Option<Instant>,
    snapshot_received: bool,
    last_update: Option<Instant>,
    start_time: Instant,
    events: VecDeque<ClientEvent>,
}

impl GameClient {
    pub fn new(config: ClientConfig) -> io::Result<Self> {
        let transport = UdpTransport::bind("0.0.0.0:0")?;
        let now = Instant::now();

        Ok(Self {
            transport,
            connection: None,
            world: ReplicatedWorld::new(config.interpolation_window.as_secs_f32()),
            prediction: ClientPrediction::new(),
            state: ConnectionState::Disconnected,
            client_id: None,
            entity_id: None,
            input: InputState::default(),
            input_sequence: 0,
            last_input_time: now,
            last_heartbeat_time: now,
            connect_started: None,
            snapshot_received: false,
            last_update: None,
            start_time: now,
            events: VecDeque::new(),
            config,
        })
    }

    /// Simulates loss and latency on this client's socket.
    pub fn set_packet_conditions(&mut self, conditions: PacketConditions) {
        self.transport.set_conditions(conditions, self.config.seed);
    }

    /// Resolves `host` and starts the handshake. Resolution failures are
    /// reported as [`ClientEvent::ConnectionFailed`].
    pub fn connect(&mut self, host: &str, port: u16, player_name: &str) {
        let resolved = (host, port)
            .to_socket_addrs()
            .map(|mut addrs| addrs.find(SocketAddr::is_ipv4));

        match resolved {
            Ok(Some(addr)) => self.connect_to(addr, player_name, Instant::now()),
            Ok(None) => self.fail(format!("No IPv4 address for {host}")),
            Err(e) => self.fail(format!("Could not resolve {host}: {e}")),
        }
    }

    pub fn connect_to(&mut self, server_addr: SocketAddr, player_name: &str, now: Instant) {
        log::info!("Connecting to {server_addr} as {player_name}");
        self.reset();

        self.connection =
            Some(Connection::new(server_addr, 0, now).with_timeout(self.config.connection_timeout));
        self.state = ConnectionState::Connecting;
        self.connect_started = Some(now);

        self.send(
            &Message::ConnectRequest {
                protocol_version: PROTOCOL_VERSION,
                player_name: player_name.to_string(),
            },
            now,
        );
        self.transport.flush(now);
    }

    /// Tells the server we are leaving and drops all replicated state.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        let now = Instant::now();
        self.send(
            &Message::Disconnect {
                reason: "Client disconnected".into(),
            },
            now,
        );
        self.transport.flush(now);

        self.reset();
        self.events.push_back(ClientEvent::Disconnected {
            reason: "Client disconnected".into(),
        });
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.connection = None;
        self.client_id = None;
        self.entity_id = None;
        self.world.clear();
        self.prediction.clear();
        self.input = InputState::default();
        self.input_sequence = 0;
        self.connect_started = None;
        self.snapshot_received = false;
    }

    fn fail(&mut self, reason: String) {
        log::warn!("Connection failed: {reason}");
        self.reset();
        self.events.push_back(ClientEvent::ConnectionFailed { reason });
    }

    fn lose_connection(&mut self, reason: String) {
        log::info!("Disconnected: {reason}");
        self.reset();
        self.events.push_back(ClientEvent::Disconnected { reason });
    }

    /// Latest stick state; sent with the next input tick.
    pub fn set_input(&mut self, move_input: Vec2, aim_input: Vec2, shoot: bool) {
        self.input.set(move_input, aim_input, shoot);
    }

    /// One frame: read the network, send inputs and heartbeats, retransmit,
    /// and advance interpolation.
    pub fn update(&mut self, now: Instant) {
        let dt = self
            .last_update
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_update = Some(now);

        self.process_network(now);

        match self.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Connecting => {
                let timed_out = self
                    .connect_started
                    .is_some_and(|started| now.saturating_duration_since(started) > self.config.connect_timeout);
                if timed_out {
                    self.fail("Connection timed out".into());
                }
            }
            ConnectionState::Connected | ConnectionState::InGame => {
                let live = self.connection.as_mut().is_some_and(|conn| conn.update(now));
                if !live {
                    self.lose_connection("Connection timed out".into());
                } else {
                    self.send_input_if_due(now);
                    self.send_heartbeat_if_due(now);
                }
            }
        }

        self.send_resends(now);
        self.world.advance(dt);
        self.transport.flush(now);
    }

    fn send_input_if_due(&mut self, now: Instant) {
        let interval = self.config.input_interval();
        if now.saturating_duration_since(self.last_input_time) < interval {
            return;
        }
        self.last_input_time = now;

        self.input_sequence += 1;
        let input = self.input.take_input(self.input_sequence, self.world.latest_tick());

        if self.world.local_entity().is_some_and(|e| e.alive) {
            self.prediction.apply_input(
                Vec2::new(input.move_x, input.move_y),
                Vec2::new(input.aim_x, input.aim_y),
                interval.as_secs_f32(),
            );
        }

        self.send(&Message::PlayerInput(input), now);
    }

    fn send_heartbeat_if_due(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_heartbeat_time) < self.config.heartbeat_interval {
            return;
        }
        self.last_heartbeat_time = now;

        let timestamp_ms = now.saturating_duration_since(self.start_time).as_millis() as u32;
        self.send(&Message::Heartbeat { timestamp_ms }, now);
    }

    fn send_resends(&mut self, now: Instant) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let addr = conn.addr;
        for packet in conn.collect_resends(now) {
            queue_packet(&self.transport, &packet, addr);
        }
    }

    fn send(&mut self, message: &Message, now: Instant) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        match conn.build_packet(message, now) {
            Ok(packet) => queue_packet(&self.transport, &packet, conn.addr),
            Err(e) => log::warn!("Cannot send {:?}: {e}", message.message_type()),
        }
    }

    fn process_network(&mut self, now: Instant) {
        for (data, addr) in self.transport.drain_received() {
            let Some(conn) = self.connection.as_mut().filter(|conn| conn.addr == addr) else {
                log::trace!("Ignoring datagram from {addr}");
                continue;
            };

            let packet = match Packet::deserialize(&data) {
                Ok(packet) => packet,
                Err(e) => {
                    log::trace!("Dropping datagram from {addr}: {e}");
                    continue;
                }
            };
            if !conn.receive(&packet, now) {
                continue;
            }

            match Message::decode(packet.message_type(), &packet.payload) {
                Ok(message) => self.handle_message(message),
                Err(e) => log::debug!("Ignoring message from server: {e}"),
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::ConnectAccept {
                client_id,
                server_tick,
                player_entity_id,
            } => {
                if self.state != ConnectionState::Connecting {
                    return;
                }
                log::info!("Connected as client {client_id} (entity {player_entity_id}, tick {server_tick})");
                self.state = ConnectionState::Connected;
                self.client_id = Some(client_id);
                self.entity_id = Some(player_entity_id);
                self.connect_started = None;
                self.world.set_local_entity(Some(player_entity_id));
                self.events.push_back(ClientEvent::Connected {
                    client_id,
                    entity_id: player_entity_id,
                });

                // The unreliable initial snapshot can overtake a resent accept.
                if let Some(local) = self.world.local_entity() {
                    self.prediction
                        .initialize(local.target_position(), local.target_rotation());
                }
                if self.snapshot_received {
                    self.enter_game();
                }
            }
            Message::ConnectReject { reason } => {
                if self.state == ConnectionState::Connecting {
                    self.fail(reason);
                }
            }
            Message::Disconnect { reason } => self.lose_connection(reason),
            Message::Snapshot(snapshot) => self.handle_snapshot(&snapshot),
            Message::DeltaUpdate(delta) => self.handle_delta(&delta),
            Message::EntitySpawn(spawn) => {
                if !self.world.spawn(&spawn) {
                    return;
                }
                log::debug!("Spawned {:?} {}", spawn.kind, spawn.entity_id);
                if self.entity_id == Some(spawn.entity_id) {
                    self.prediction.initialize(spawn.position, spawn.rotation);
                }
                self.events.push_back(ClientEvent::EntitySpawned {
                    entity_id: spawn.entity_id,
                    kind: spawn.kind,
                });
            }
            Message::EntityDespawn { entity_id } => {
                if self.world.despawn(entity_id) {
                    log::debug!("Despawned entity {entity_id}");
                    self.events.push_back(ClientEvent::EntityDespawned { entity_id });
                }
            }
            Message::PlayerDamage {
                target_id,
                source_id,
                damage,
                new_health,
            } => {
                self.world.set_health(target_id, new_health);
                self.events.push_back(ClientEvent::Damaged {
                    target_id,
                    source_id,
                    damage,
                    new_health,
                });
            }
            Message::PlayerDeath {
                player_id,
                killer_id,
            } => {
                self.world.mark_dead(player_id);
                self.events.push_back(ClientEvent::Died {
                    player_id,
                    killer_id,
                });
            }
            Message::PlayerRespawn {
                player_id,
                position,
            } => {
                self.world.respawn(player_id, position);
                if self.entity_id == Some(player_id) {
                    self.prediction.initialize(position, 0.0);
                }
                self.events.push_back(ClientEvent::Respawned {
                    player_id,
                    position,
                });
            }
            Message::ProjectileSpawn {
                projectile_id,
                owner_id,
                position,
                velocity,
            } => {
                let owner_position =
                    (self.entity_id == Some(owner_id)).then(|| self.prediction.position());
                if self
                    .world
                    .spawn_projectile(projectile_id, owner_id, position, velocity, owner_position)
                {
                    self.events.push_back(ClientEvent::ProjectileSpawned {
                        projectile_id,
                        owner_id,
                        position,
                        velocity,
                    });
                }
            }
            Message::Heartbeat { .. } => {}
            other => log::debug!("Unexpected {:?} from server", other.message_type()),
        }
    }

    /// Applied in every state that has a server, so walls sent before the
    /// accept arrives are kept.
    fn handle_snapshot(&mut self, snapshot: &Snapshot) {
        let changes = self.world.apply_snapshot(snapshot);
        for &(entity_id, kind) in &changes.spawned {
            self.events.push_back(ClientEvent::EntitySpawned { entity_id, kind });
        }
        for &entity_id in &changes.removed {
            self.events.push_back(ClientEvent::EntityDespawned { entity_id });
        }

        let local_spawned = self
            .entity_id
            .is_some_and(|id| changes.spawned.iter().any(|&(spawned, _)| spawned == id));
        if local_spawned {
            if let Some(local) = self.world.local_entity() {
                self.prediction.initialize(local.position, local.rotation);
            }
        } else if changes.local_updated {
            self.reconcile();
        }

        self.snapshot_received = true;
        if self.state == ConnectionState::Connected {
            self.enter_game();
        }
    }

    fn enter_game(&mut self) {
        log::info!("Entered game ({} entities)", self.world.len());
        self.state = ConnectionState::InGame;
    }

    fn handle_delta(&mut self, delta: &DeltaUpdate) {
        if self.world.apply_delta(delta) {
            self.reconcile();
        }
    }

    fn reconcile(&mut self) {
        if let Some(local) = self.world.local_entity().filter(|e| e.alive) {
            self.prediction
                .reconcile(local.target_position(), local.target_rotation());
        }
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.events.drain(..)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn local_entity_id(&self) -> Option<u32> {
        self.entity_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn entity(&self, entity_id: u32) -> Option<&RemoteEntity> {
        self.world.get(entity_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.world.iter()
    }

    /// Pose to draw for the local tank.
    pub fn predicted_position(&self) -> Vec3 {
        self.prediction.position()
    }

    pub fn predicted_rotation(&self) -> f32 {
        self.prediction.rotation()
    }

    pub fn server_tick(&self) -> u32 {
        self.world.latest_tick()
    }

    pub fn rtt_ms(&self) -> f32 {
        self.connection.as_ref().map_or(0.0, Connection::rtt_ms)
    }

    pub fn stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    pub fn input_interval(&self) -> Duration {
        self.config.input_interval()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn queue_packet(transport: &UdpTransport, packet: &Packet, addr: SocketAddr) {
    match packet.serialize() {
        Ok(bytes) => transport.send(bytes, addr),
        Err(e) => log::warn!("Failed to serialize packet for {addr}: {e}"),
    }
}
