use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapObjectKind {
    Boundary,
    Obstacle,
}

/// Axis-aligned wall block; `scale` is the full box size.
#[derive(Debug, Clone)]
pub struct MapObject {
    pub kind: MapObjectKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub entity_id: Option<u32>,
}

impl MapObject {
    pub fn boundary(position: Vec3, scale: Vec3) -> Self {
        Self {
            kind: MapObjectKind::Boundary,
            position,
            scale,
            entity_id: None,
        }
    }

    pub fn obstacle(position: Vec3, scale: Vec3) -> Self {
        Self {
            kind: MapObjectKind::Obstacle,
            position,
            scale,
            entity_id: None,
        }
    }

    pub fn half_extents(&self) -> Vec3 {
        self.scale * 0.5
    }
}
