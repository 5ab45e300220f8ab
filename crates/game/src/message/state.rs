use glam::Vec3;

use crate::net::{CodecError, PacketReader, PacketWriter};
use crate::snapshot::EntityKind;

use super::MessageError;

pub const DELTA_EPSILON: f32 = 0.001;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Which replicated fields an [`EntityDelta`] carries, in wire order.
    pub struct DeltaFlags: u8 {
        const POS_X = 0b0000_0001;
        const POS_Y = 0b0000_0010;
        const POS_Z = 0b0000_0100;
        const ROT_Y = 0b0000_1000;
        const HEALTH = 0b0001_0000;
    }
}

impl Default for DeltaFlags {
    fn default() -> Self {
        DeltaFlags::empty()
    }
}

/// Full replicated state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub entity_id: u32,
    pub kind: EntityKind,
    pub position: Vec3,
    pub rotation: f32,
    pub health: u8,
    pub owner_id: u32,
    pub name: String,
    pub scale: Vec3,
}

impl EntityState {
    pub fn write(&self, writer: &mut PacketWriter) -> Result<(), CodecError> {
        writer.write_u32(self.entity_id);
        writer.write_u8(self.kind as u8);
        writer.write_vec3(self.position);
        writer.write_f32(self.rotation);
        writer.write_u8(self.health);
        writer.write_u32(self.owner_id);
        writer.write_string(&self.name)?;
        writer.write_vec3(self.scale);
        Ok(())
    }

    pub fn read(reader: &mut PacketReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            entity_id: reader.read_u32()?,
            kind: EntityKind::try_from(reader.read_u8()?)?,
            position: reader.read_vec3()?,
            rotation: reader.read_f32()?,
            health: reader.read_u8()?,
            owner_id: reader.read_u32()?,
            name: reader.read_string()?,
            scale: reader.read_vec3()?,
        })
    }
}

/// Changed fields of one entity. Absent fields are left untouched on apply.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntityDelta {
    pub entity_id: u32,
    pub pos_x: Option<f32>,
    pub pos_y: Option<f32>,
    pub pos_z: Option<f32>,
    pub rot_y: Option<f32>,
    pub health: Option<u8>,
}

fn changed(from: f32, to: f32, epsilon: f32) -> Option<f32> {
    ((to - from).abs() > epsilon).then_some(to)
}

impl EntityDelta {
    /// Fields of `to` that differ from `from` by more than `epsilon`.
    pub fn between(from: &EntityState, to: &EntityState, epsilon: f32) -> Self {
        Self::from_fields(
            to.entity_id,
            (from.position, from.rotation, from.health),
            (to.position, to.rotation, to.health),
            epsilon,
        )
    }

    pub fn from_fields(
        entity_id: u32,
        (prev_pos, prev_rot, prev_health): (Vec3, f32, u8),
        (pos, rot, health): (Vec3, f32, u8),
        epsilon: f32,
    ) -> Self {
        Self {
            entity_id,
            pos_x: changed(prev_pos.x, pos.x, epsilon),
            pos_y: changed(prev_pos.y, pos.y, epsilon),
            pos_z: changed(prev_pos.z, pos.z, epsilon),
            rot_y: changed(prev_rot, rot, epsilon),
            health: (health != prev_health).then_some(health),
        }
    }

    /// Every replicated field, regardless of change.
    pub fn full(state: &EntityState) -> Self {
        Self {
            entity_id: state.entity_id,
            pos_x: Some(state.position.x),
            pos_y: Some(state.position.y),
            pos_z: Some(state.position.z),
            rot_y: Some(state.rotation),
            health: Some(state.health),
        }
    }

    pub fn flags(&self) -> DeltaFlags {
        let mut flags = DeltaFlags::empty();
        flags.set(DeltaFlags::POS_X, self.pos_x.is_some());
        flags.set(DeltaFlags::POS_Y, self.pos_y.is_some());
        flags.set(DeltaFlags::POS_Z, self.pos_z.is_some());
        flags.set(DeltaFlags::ROT_Y, self.rot_y.is_some());
        flags.set(DeltaFlags::HEALTH, self.health.is_some());
        flags
    }

    pub fn is_empty(&self) -> bool {
        self.flags().is_empty()
    }

    pub fn has_position(&self) -> bool {
        self.pos_x.is_some() || self.pos_y.is_some() || self.pos_z.is_some()
    }

    pub fn apply_position(&self, position: &mut Vec3) {
        if let Some(x) = self.pos_x {
            position.x = x;
        }
        if let Some(y) = self.pos_y {
            position.y = y;
        }
        if let Some(z) = self.pos_z {
            position.z = z;
        }
    }

    pub fn apply_to(&self, state: &mut EntityState) {
        self.apply_position(&mut state.position);
        if let Some(rot) = self.rot_y {
            state.rotation = rot;
        }
        if let Some(health) = self.health {
            state.health = health;
        }
    }

    pub fn write(&self, writer: &mut PacketWriter) {
        writer.write_u32(self.entity_id);
        writer.write_u8(self.flags().bits());
        for value in [self.pos_x, self.pos_y, self.pos_z, self.rot_y]
            .into_iter()
            .flatten()
        {
            writer.write_f32(value);
        }
        if let Some(health) = self.health {
            writer.write_u8(health);
        }
    }

    pub fn read(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let entity_id = reader.read_u32()?;
        let flags = DeltaFlags::from_bits_truncate(reader.read_u8()?);

        let mut read_if = |flag: DeltaFlags| -> Result<Option<f32>, CodecError> {
            if flags.contains(flag) {
                reader.read_f32().map(Some)
            } else {
                Ok(None)
            }
        };

        let pos_x = read_if(DeltaFlags::POS_X)?;
        let pos_y = read_if(DeltaFlags::POS_Y)?;
        let pos_z = read_if(DeltaFlags::POS_Z)?;
        let rot_y = read_if(DeltaFlags::ROT_Y)?;
        let health = if flags.contains(DeltaFlags::HEALTH) {
            Some(reader.read_u8()?)
        } else {
            None
        };

        Ok(Self {
            entity_id,
            pos_x,
            pos_y,
            pos_z,
            rot_y,
            health,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank_state(position: Vec3, rotation: f32, health: u8) -> EntityState {
        EntityState {
            entity_id: 3,
            kind: EntityKind::Tank,
            position,
            rotation,
            health,
            owner_id: 3,
            name: "Player3".to_owned(),
            scale: Vec3::ONE,
        }
    }

    #[test]
    fn delta_reproduces_target_for_every_flag_combination() {
        let a = tank_state(Vec3::new(1.0, 0.0, -2.0), 10.0, 100);
        let full = tank_state(Vec3::new(4.5, 1.25, 7.0), 275.5, 50);

        for bits in 0u8..32 {
            let flags = DeltaFlags::from_bits_truncate(bits);
            let mut b = a.clone();
            if flags.contains(DeltaFlags::POS_X) {
                b.position.x = full.position.x;
            }
            if flags.contains(DeltaFlags::POS_Y) {
                b.position.y = full.position.y;
            }
            if flags.contains(DeltaFlags::POS_Z) {
                b.position.z = full.position.z;
            }
            if flags.contains(DeltaFlags::ROT_Y) {
                b.rotation = full.rotation;
            }
            if flags.contains(DeltaFlags::HEALTH) {
                b.health = full.health;
            }

            let delta = EntityDelta::between(&a, &b, DELTA_EPSILON);
            assert_eq!(delta.flags(), flags);

            let mut writer = PacketWriter::new();
            delta.write(&mut writer);
            let bytes = writer.into_vec();
            let decoded = EntityDelta::read(&mut PacketReader::new(&bytes)).unwrap();
            assert_eq!(decoded, delta);

            let mut applied = a.clone();
            decoded.apply_to(&mut applied);
            assert_eq!(applied, b, "flags {bits:#07b}");
        }
    }

    #[test]
    fn sub_epsilon_changes_are_omitted() {
        let a = tank_state(Vec3::ZERO, 0.0, 100);
        let b = tank_state(Vec3::new(0.0005, 0.0, 0.002), 0.0009, 100);

        let delta = EntityDelta::between(&a, &b, DELTA_EPSILON);
        assert_eq!(delta.flags(), DeltaFlags::POS_Z);
    }

    #[test]
    fn delta_wire_size_tracks_flags() {
        let delta = EntityDelta {
            entity_id: 9,
            pos_x: Some(1.0),
            health: Some(75),
            ..Default::default()
        };
        let mut writer = PacketWriter::new();
        delta.write(&mut writer);
        assert_eq!(writer.position(), 4 + 1 + 4 + 1);
    }

    #[test]
    fn entity_state_rejects_unknown_kind() {
        let mut writer = PacketWriter::new();
        tank_state(Vec3::ZERO, 0.0, 100).write(&mut writer).unwrap();
        let mut bytes = writer.into_vec();
        bytes[4] = 9;

        assert!(matches!(
            EntityState::read(&mut PacketReader::new(&bytes)),
            Err(MessageError::InvalidEntityKind(9))
        ));
    }
}
