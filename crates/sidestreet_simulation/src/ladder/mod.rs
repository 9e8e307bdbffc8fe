//! Ladder ride: вертикальное движение по лестнице
//!
//! Пока authority == LadderRide, поза меняется только по вертикали —
//! горизонтальная фиксация позы сделана входной хореографией. Сессия
//! живёт в LadderSession и уничтожается при любом выходе.
//!
//! Выходы:
//! - наверху (подъём выше top bound - margin) → top-exit хореография
//! - внизу (спуск до опоры под ногами) → прямой возврат в Locomotion
//! - interact во время езды → прямой возврат в Locomotion

use bevy::prelude::*;

use crate::animation::AnimationCue;
use crate::choreography::{self, Choreography, ChoreographyConfig};
use crate::components::{
    CharacterInput, CharacterMotor, LocomotionSpeed, MovementAuthority, Player,
};
use crate::environment::{self, ProbeVolume};
use crate::locomotion::{self, MovementConfig};
use crate::logger;

/// Параметры езды по лестнице
#[derive(Resource, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LadderConfig {
    /// Скорость подъёма/спуска (m/s)
    pub climb_speed: f32,
    /// Порог верхнего выхода: exit при y >= top_bound - margin
    pub top_exit_margin: f32,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            climb_speed: 1.5,
            top_exit_margin: 0.35,
        }
    }
}

/// Активная сессия езды по лестнице
///
/// top_bound_y — записанный на входе fallback; живое значение каждый тик
/// перечитывается с bounding box'а лестницы (лестница могла сдвинуться).
#[derive(Component, Debug, Clone)]
pub struct LadderSession {
    pub ladder: Entity,
    pub top_bound_y: f32,
    pub depth_offset: f32,
    /// Поворот лицом к лестнице, зафиксированный входной хореографией
    pub face_rotation: Quat,
}

/// Система: езда по лестнице
pub fn ladder_ride(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    config: Res<LadderConfig>,
    movement_config: Res<MovementConfig>,
    choreography_config: Res<ChoreographyConfig>,
    mut cues: EventWriter<AnimationCue>,
    mut characters: Query<
        (
            Entity,
            &mut Transform,
            &mut CharacterMotor,
            &mut LocomotionSpeed,
            &CharacterInput,
            &mut MovementAuthority,
            &LadderSession,
        ),
        With<Player>,
    >,
    sessionless: Query<
        (Entity, &MovementAuthority),
        (With<Player>, Without<LadderSession>, Without<Choreography>),
    >,
    environment_query: Query<(Entity, &Transform, &ProbeVolume), Without<Player>>,
) {
    // Precondition: LadderRide authority без сессии — ошибка программирования
    // (сессию создаёт только handoff хореографии, снимает только выход)
    for (entity, authority) in sessionless.iter() {
        assert!(
            *authority != MovementAuthority::LadderRide,
            "LadderRide authority without LadderSession on {:?}",
            entity
        );
    }

    let delta = time.delta_secs();
    let volumes = environment::volumes_from(environment_query.iter());

    for (entity, mut transform, mut motor, mut signal, input, mut authority, session) in
        characters.iter_mut()
    {
        if *authority != MovementAuthority::LadderRide {
            continue;
        }

        // На лестнице наземного сигнала скорости нет
        signal.value = 0.0;
        motor.horizontal_velocity = Vec3::ZERO;

        let axis = input.vertical.clamp(-1.0, 1.0);
        transform.translation.y += axis * config.climb_speed * delta;

        // Живая верхняя граница; записанное значение — fallback
        let top = volumes
            .iter()
            .find(|volume| volume.entity == session.ladder)
            .map(|volume| volume.top_y())
            .unwrap_or(session.top_bound_y);

        // Выход наверху: во время подъёма, не доезжая margin до границы
        if axis > 0.0 && transform.translation.y >= top - config.top_exit_margin {
            let target = choreography::ladder_top_exit_target(
                &choreography_config,
                top,
                session.face_rotation,
                transform.translation,
            );
            commands.entity(entity).remove::<LadderSession>();
            choreography::begin(
                &mut commands,
                &mut cues,
                entity,
                &transform,
                &mut authority,
                target,
            );
            continue;
        }

        // Выход внизу: опора под ногами при спуске, либо interact —
        // прямой возврат без хореографии
        let support = locomotion::grounded_probe(
            &volumes,
            transform.translation,
            movement_config.ground_probe_distance,
        );
        let reached_bottom = axis < 0.0 && support.is_some();
        if reached_bottom || input.interact_pressed {
            commands.entity(entity).remove::<LadderSession>();
            motor.vertical_velocity = 0.0;
            motor.grounded = reached_bottom;
            *authority = MovementAuthority::Locomotion;
            logger::log(&format!(
                "Ladder ride released for {:?} ({})",
                entity,
                if reached_bottom { "bottom" } else { "interact" }
            ));
        }
    }
}
