//! Геометрия окружения для context probe
//!
//! Environment-сущности несут `ProbeVolume` (axis-aligned box + битовая маска
//! слоёв) и доменные маркеры (Ladder, ClimbableWall, InteractHandle,
//! PathTurnVolume). Вся геометрия проб — через `bevy::math::bounding`
//! (Aabb3d / RayCast3d / AabbCast3d): полный rapier pipeline в headless
//! ядре не запускаем, тела rapier описывают персонажа, а не двигают его.
//!
//! Ограничение: probe volumes трактуются как axis-aligned (lane-layout
//! уровня), rotation у Transform окружения в AABB не учитывается.

use bevy::math::bounding::{Aabb3d, AabbCast3d, RayCast3d};
use bevy::math::{Dir3A, Vec3A};
use bevy::prelude::*;

use crate::components::{Player, StreetAngle};
use crate::logger;

// ============================================================================
// Слои (битовые маски, по образцу collision layers)
// ============================================================================

/// Layer 1: walkable мир (улица, платформы)
pub const LAYER_WORLD: u32 = 0b1;
/// Layer 2: лестницы (ladder)
pub const LAYER_LADDER: u32 = 0b10;
/// Layer 3: высокие препятствия (wall-climb, большой класс)
pub const LAYER_WALL_HIGH: u32 = 0b100;
/// Layer 4: средние препятствия
pub const LAYER_WALL_MID: u32 = 0b1000;
/// Layer 5: низкие препятствия (vault)
pub const LAYER_WALL_LOW: u32 = 0b1_0000;
/// Layer 6: generic interactables
pub const LAYER_INTERACT: u32 = 0b10_0000;
/// Layer 7: path turn триггеры (не solid)
pub const LAYER_PATH_TURN: u32 = 0b100_0000;

/// Mask: всё, на чём можно стоять (ground probe, landing probe)
pub const MASK_SOLID: u32 = LAYER_WORLD | LAYER_WALL_HIGH | LAYER_WALL_MID | LAYER_WALL_LOW;

/// Название слоя для debug логов
pub fn layer_name(layer_bits: u32) -> &'static str {
    match layer_bits {
        LAYER_WORLD => "World",
        LAYER_LADDER => "Ladder",
        LAYER_WALL_HIGH => "WallHigh",
        LAYER_WALL_MID => "WallMid",
        LAYER_WALL_LOW => "WallLow",
        LAYER_INTERACT => "Interact",
        LAYER_PATH_TURN => "PathTurn",
        _ => "Unknown",
    }
}

// ============================================================================
// Компоненты окружения
// ============================================================================

/// Axis-aligned объём, видимый context probe
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct ProbeVolume {
    /// Половинные размеры box'а (мировые оси)
    pub half_extents: Vec3,
    /// На каких слоях объём находится (битовая маска LAYER_*)
    pub layers: u32,
}

/// Лестница (вертикальный подъём вдоль объёма)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Ladder {
    /// На каком расстоянии от поверхности висит персонаж (hang depth)
    pub depth_offset: f32,
}

impl Default for Ladder {
    fn default() -> Self {
        Self { depth_offset: 0.5 }
    }
}

/// Классы препятствий wall-climb (по максимальной высоте)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, serde::Serialize, serde::Deserialize)]
pub enum WallClass {
    High,
    Mid,
    Low,
}

/// Слой probe volume для класса препятствия
pub fn wall_layer(class: WallClass) -> u32 {
    match class {
        WallClass::High => LAYER_WALL_HIGH,
        WallClass::Mid => LAYER_WALL_MID,
        WallClass::Low => LAYER_WALL_LOW,
    }
}

/// Преодолимое препятствие (vault / climb)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct ClimbableWall {
    pub class: WallClass,
}

/// Capability interface для generic interactables
///
/// Один метод, вызывается с entity персонажа. Реализуется любым объектом
/// коллаборатора; ядро не интерпретирует, что именно произошло.
pub trait Interaction: Send + Sync + 'static {
    fn interact(&mut self, instigator: Entity);
}

/// Handle на capability (хранится на environment-сущности)
#[derive(Component)]
pub struct InteractHandle(pub Box<dyn Interaction>);

/// Событие: probe вызвал interact на объекте
#[derive(Event, Debug, Clone)]
pub struct Interacted {
    pub target: Entity,
    pub instigator: Entity,
}

/// Триггер смены оси улицы (вход в объём переключает StreetAngle)
///
/// Два угла (A/B); при входе применяется тот, который ДАЛЬШЕ от текущего:
/// если персонаж шёл по A — поворачиваем на B, и наоборот (возврат).
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct PathTurnVolume {
    pub angle_a: f32,
    pub angle_b: f32,
    /// Latch входа (событие только на переходе снаружи → внутрь)
    pub occupied: bool,
}

impl PathTurnVolume {
    pub fn new(angle_a: f32, angle_b: f32) -> Self {
        Self {
            angle_a,
            angle_b,
            occupied: false,
        }
    }
}

// ============================================================================
// Чистая геометрия (unit-тестируемая, без ECS)
// ============================================================================

/// Снятая копия probe volume для чистых запросов
#[derive(Debug, Clone, Copy)]
pub struct Volume {
    pub entity: Entity,
    pub aabb: Aabb3d,
    pub layers: u32,
}

impl Volume {
    pub fn new(entity: Entity, center: Vec3, half_extents: Vec3, layers: u32) -> Self {
        Self {
            entity,
            aabb: Aabb3d::new(center, half_extents),
            layers,
        }
    }

    pub fn top_y(&self) -> f32 {
        self.aabb.max.y
    }

    pub fn center(&self) -> Vec3 {
        Vec3::from((self.aabb.min + self.aabb.max) * 0.5)
    }
}

/// Результат raycast'а
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub entity: Entity,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Результат sweep'а (downward capsule/box cast)
#[derive(Debug, Clone, Copy)]
pub struct SweepHit {
    pub entity: Entity,
    pub distance: f32,
}

/// Собрать volumes из ECS query (итератор кортежей)
pub fn volumes_from<'a>(
    iter: impl Iterator<Item = (Entity, &'a Transform, &'a ProbeVolume)>,
) -> Vec<Volume> {
    iter.map(|(entity, transform, volume)| {
        Volume::new(entity, transform.translation, volume.half_extents, volume.layers)
    })
    .collect()
}

/// Луч против всех volumes на маске; ближайший hit
pub fn raycast(
    volumes: &[Volume],
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    mask: u32,
) -> Option<RayHit> {
    let dir = Dir3A::new(Vec3A::from(direction)).ok()?;
    let cast = RayCast3d::new(Vec3A::from(origin), dir, max_distance);

    let mut best: Option<RayHit> = None;
    for volume in volumes.iter().filter(|v| v.layers & mask != 0) {
        if let Some(distance) = cast.aabb_intersection_at(&volume.aabb) {
            if best.map_or(true, |b| distance < b.distance) {
                let point = origin + direction * distance;
                best = Some(RayHit {
                    entity: volume.entity,
                    distance,
                    point,
                    normal: face_normal(&volume.aabb, point),
                });
            }
        }
    }
    best
}

/// Sweep box'а (half_extents вокруг origin) вдоль направления; ближайший hit
pub fn sweep_aabb(
    volumes: &[Volume],
    origin: Vec3,
    half_extents: Vec3,
    direction: Vec3,
    max_distance: f32,
    mask: u32,
) -> Option<SweepHit> {
    let dir = Dir3A::new(Vec3A::from(direction)).ok()?;
    let moving = Aabb3d::new(Vec3A::ZERO, Vec3A::from(half_extents));
    let cast = AabbCast3d::new(moving, Vec3A::from(origin), dir, max_distance);

    let mut best: Option<SweepHit> = None;
    for volume in volumes.iter().filter(|v| v.layers & mask != 0) {
        if let Some(distance) = cast.aabb_collision_at(volume.aabb) {
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(SweepHit {
                    entity: volume.entity,
                    distance,
                });
            }
        }
    }
    best
}

/// Нормаль грани AABB, ближайшей к точке на поверхности
///
/// Берём ось с максимальным относительным смещением от центра — для точек,
/// полученных raycast'ом по грани, это и есть нормаль этой грани.
pub fn face_normal(aabb: &Aabb3d, point: Vec3) -> Vec3 {
    let center = Vec3::from((aabb.min + aabb.max) * 0.5);
    let half = Vec3::from((aabb.max - aabb.min) * 0.5);
    let local = point - center;

    let rx = (local.x / half.x.max(1e-4)).abs();
    let ry = (local.y / half.y.max(1e-4)).abs();
    let rz = (local.z / half.z.max(1e-4)).abs();

    if rx >= ry && rx >= rz {
        Vec3::X * local.x.signum()
    } else if ry >= rz {
        Vec3::Y * local.y.signum()
    } else {
        Vec3::Z * local.z.signum()
    }
}

/// Точка внутри volume (для триггеров)
pub fn contains(volume: &Volume, point: Vec3) -> bool {
    let p = Vec3A::from(point);
    p.cmpge(volume.aabb.min).all() && p.cmple(volume.aabb.max).all()
}

// ============================================================================
// Системы
// ============================================================================

/// Система: path turn триггеры переключают StreetAngle
///
/// Поведение оригинальных поворотных триггеров: при входе в объём сравниваем
/// кратчайшие угловые дистанции до A и до B, применяем более ДАЛЬНИЙ угол
/// (идём по улице A → поворот на B; возвращаемся по B → назад на A).
pub fn apply_path_turns(
    mut characters: Query<(&Transform, &mut StreetAngle), With<Player>>,
    mut turns: Query<(&Transform, &ProbeVolume, &mut PathTurnVolume), Without<Player>>,
) {
    for (character_transform, mut street) in characters.iter_mut() {
        let position = character_transform.translation;

        for (turn_transform, volume, mut turn) in turns.iter_mut() {
            let aabb = Volume::new(
                Entity::PLACEHOLDER,
                turn_transform.translation,
                volume.half_extents,
                volume.layers,
            );
            let inside = contains(&aabb, position);

            if inside && !turn.occupied {
                let to_a = street.distance_to(turn.angle_a);
                let to_b = street.distance_to(turn.angle_b);
                let next = if to_a < to_b { turn.angle_b } else { turn.angle_a };
                street.set(next);
                logger::log(&format!("Path turn: street angle -> {:.1}", street.degrees()));
            }
            turn.occupied = inside;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_at(center: Vec3, half: Vec3, layers: u32) -> Volume {
        Volume::new(Entity::PLACEHOLDER, center, half, layers)
    }

    #[test]
    fn test_raycast_hits_nearest_on_mask() {
        let volumes = vec![
            volume_at(Vec3::new(0.0, 0.0, 5.0), Vec3::splat(1.0), LAYER_WALL_HIGH),
            volume_at(Vec3::new(0.0, 0.0, 3.0), Vec3::splat(1.0), LAYER_WALL_HIGH),
            volume_at(Vec3::new(0.0, 0.0, 1.5), Vec3::splat(1.0), LAYER_LADDER),
        ];

        // Ladder-слой игнорируется маской, ближайшая стена на z=2.0
        let hit = raycast(&volumes, Vec3::ZERO, Vec3::Z, 10.0, LAYER_WALL_HIGH).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-4);
        assert!((hit.normal - (-Vec3::Z)).length() < 1e-4);
    }

    #[test]
    fn test_raycast_respects_max_distance() {
        let volumes = vec![volume_at(Vec3::new(0.0, 0.0, 5.0), Vec3::splat(1.0), LAYER_WORLD)];
        assert!(raycast(&volumes, Vec3::ZERO, Vec3::Z, 3.0, LAYER_WORLD).is_none());
        assert!(raycast(&volumes, Vec3::ZERO, Vec3::Z, 4.5, LAYER_WORLD).is_some());
    }

    #[test]
    fn test_face_normal_axes() {
        let aabb = Aabb3d::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(face_normal(&aabb, Vec3::new(1.0, 0.5, 0.0)), Vec3::X);
        assert_eq!(face_normal(&aabb, Vec3::new(-1.0, 0.0, 1.0)), -Vec3::X);
        assert_eq!(face_normal(&aabb, Vec3::new(0.2, 2.0, 0.0)), Vec3::Y);
        assert_eq!(face_normal(&aabb, Vec3::new(0.0, -1.0, -3.0)), -Vec3::Z);
    }

    #[test]
    fn test_sweep_downward_finds_ladder() {
        let volumes = vec![volume_at(
            Vec3::new(0.0, 1.0, 2.0),
            Vec3::new(0.5, 1.0, 0.2),
            LAYER_LADDER,
        )];

        // Box 0.3 падает с высоты 4.0 над лестницей: верх лестницы y=2.0
        let hit = sweep_aabb(
            &volumes,
            Vec3::new(0.0, 4.0, 2.0),
            Vec3::splat(0.3),
            -Vec3::Y,
            5.0,
            LAYER_LADDER,
        )
        .unwrap();
        // Дистанция до касания: 4.0 - 0.3 (низ box'а) - 2.0 (верх лестницы)
        assert!((hit.distance - 1.7).abs() < 1e-3);
    }

    #[test]
    fn test_contains() {
        let volume = volume_at(Vec3::ZERO, Vec3::splat(1.0), LAYER_PATH_TURN);
        assert!(contains(&volume, Vec3::new(0.5, -0.5, 0.9)));
        assert!(!contains(&volume, Vec3::new(1.5, 0.0, 0.0)));
    }
}
