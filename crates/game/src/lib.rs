pub mod event;
pub mod map;
pub mod message;
pub mod net;
pub mod physics;
pub mod player;
pub mod simulation;
pub mod snapshot;

pub use event::{EventQueue, GameEvent, PendingEvent};
pub use map::{Arena, MapObject, MapObjectKind};
pub use message::{
    DELTA_EPSILON, DeltaFlags, DeltaUpdate, Delivery, EntityDelta, EntitySpawn, EntityState,
    Message, MessageError, MessageType, PlayerInput, Snapshot,
};
pub use net::{
    CodecError, Connection, ConnectionManager, DEFAULT_PORT, DEFAULT_TICK_RATE, NetworkStats,
    Packet, PacketConditions, PacketError, PacketHeader, SendError, UdpTransport,
};
pub use player::{GameplayConfig, PlayerState};
pub use simulation::{FixedTimestep, InputBuffer};
pub use snapshot::{Entity, EntityHandle, EntityKind, World};
