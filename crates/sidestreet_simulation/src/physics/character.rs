//! Spawn и синхронизация физического тела персонажа

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::components::{
    CharacterInput, CharacterMotor, LocomotionSpeed, MovementAuthority, MovementLock, Player,
    StreetAngle, SupportVolume,
};
use crate::locomotion::MovementConfig;

/// Collision groups персонажа: сам на GROUP_2, коллайдит с миром (GROUP_1)
/// и другими акторами (GROUP_2)
pub fn character_groups() -> CollisionGroups {
    CollisionGroups::new(Group::GROUP_2, Group::GROUP_1 | Group::GROUP_2)
}

/// Концы сегмента капсулы в локальных координатах персонажа
///
/// Transform.translation — точка опоры (ноги), поэтому сегмент смещён вверх
/// вокруг center_y; половина цилиндрической части = height/2 - radius.
fn capsule_segment(volume: &SupportVolume) -> (Vec3, Vec3) {
    let half_height = (volume.height * 0.5 - volume.radius).max(0.05);
    (
        Vec3::Y * (volume.center_y - half_height),
        Vec3::Y * (volume.center_y + half_height),
    )
}

/// Capsule collider под текущий опорный объём
fn capsule_for(volume: &SupportVolume) -> Collider {
    let (bottom, top) = capsule_segment(volume);
    Collider::capsule(bottom, top, volume.radius)
}

/// Полный набор компонентов персонажа
///
/// Transform.translation — точка опоры (ноги); SupportVolume задаёт capsule
/// над ней. Authority стартует с Locomotion.
pub fn character_bundle(config: &MovementConfig, position: Vec3, street_angle: f32) -> impl Bundle {
    let volume = SupportVolume {
        height: config.normal_height,
        center_y: config.normal_center_y,
        radius: config.capsule_radius,
    };
    let collider = capsule_for(&volume);

    (
        Transform::from_translation(position),
        Player,
        CharacterMotor::default(),
        volume,
        StreetAngle::new(street_angle),
        LocomotionSpeed::default(),
        MovementLock::default(),
        CharacterInput::default(),
        MovementAuthority::Locomotion,
        // Rapier-представление
        RigidBody::KinematicPositionBased,
        collider,
        Velocity::default(),
        character_groups(),
    )
}

/// Spawn helper (для binary и интеграционных тестов)
pub fn spawn_character(
    commands: &mut Commands,
    config: &MovementConfig,
    position: Vec3,
    street_angle: f32,
) -> Entity {
    commands.spawn(character_bundle(config, position, street_angle)).id()
}

/// Система: SupportVolume следует за crouch-флагом, capsule — за SupportVolume
///
/// Запускается каждый тик ПОСЛЕ locomotion и lock-команд: геометрия не
/// должна рассинхронизироваться с crouch-состоянием, даже если обработка
/// движения в этот тик пропущена (forced uncrouch от combat).
pub fn sync_support_collider(
    config: Res<MovementConfig>,
    mut query: Query<(&CharacterMotor, &mut SupportVolume, &mut Collider), With<Player>>,
) {
    for (motor, mut volume, mut collider) in query.iter_mut() {
        let (height, center_y) = if motor.crouching {
            (config.crouch_height, config.crouch_center_y)
        } else {
            (config.normal_height, config.normal_center_y)
        };

        if (volume.height - height).abs() > f32::EPSILON {
            volume.height = height;
            volume.center_y = center_y;
            *collider = capsule_for(&volume);
        }
    }
}

/// Система: зеркалим CharacterMotor в rapier Velocity
///
/// Rapier тело kinematic — velocity чисто информационная (внешние
/// наблюдатели, future queries), двигает персонажа locomotion.
pub fn sync_velocity_to_rapier(
    mut query: Query<(&CharacterMotor, &mut Velocity), With<Player>>,
) {
    for (motor, mut velocity) in query.iter_mut() {
        velocity.linvel = motor.horizontal_velocity + Vec3::Y * motor.vertical_velocity;
    }
}
