//! Наземное движение персонажа (тик за тиком, пока authority == Locomotion)
//!
//! Порядок внутри тика (см. SimulationPlugin):
//! 1. apply_lock_commands — InstantStop / StopCrouch от combat-коллаборатора
//! 2. locomotion — ground check, input, гравитация, единый move
//! 3. sync_support_collider — геометрия следует за crouch-состоянием
//!
//! Кастомная интеграция velocity: rapier описывает тело, двигаем сами.

use bevy::prelude::*;

use crate::animation::{AnimationCue, CueId};
use crate::components::{
    CharacterInput, CharacterMotor, LocomotionSpeed, MovementAuthority, MovementLock, Player,
    StreetAngle,
};
use crate::environment::{self, ProbeVolume, Volume, MASK_SOLID};
use crate::logger;

/// Параметры наземного движения
///
/// Числа — из оригинального тюнинга уличного прототипа: base 4 m/s,
/// run x1.5, crouch 2 m/s, прыжок 1.2 m, гравитация -20.
#[derive(Resource, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MovementConfig {
    /// Базовая скорость (m/s)
    pub speed: f32,
    /// Множитель бега
    pub run_multiplier: f32,
    /// Скорость в приседе (m/s, форсируется даже при run modifier)
    pub crouch_speed: f32,
    /// Высота прыжка (m)
    pub jump_height: f32,
    /// Гравитация (m/s², отрицательная)
    pub gravity: f32,
    /// "Прижимная" вертикальная скорость на земле (гасит contact judder)
    pub grounded_stick_velocity: f32,
    /// Дальность downward ground probe (m)
    pub ground_probe_distance: f32,
    /// Время демпфирования сигнала скорости для анимации (sec)
    pub speed_damp_time: f32,
    /// Опорный объём: normal preset
    pub normal_height: f32,
    pub normal_center_y: f32,
    /// Опорный объём: crouched preset
    pub crouch_height: f32,
    pub crouch_center_y: f32,
    /// Радиус капсулы (общий для обоих пресетов)
    pub capsule_radius: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 4.0,
            run_multiplier: 1.5,
            crouch_speed: 2.0,
            jump_height: 1.2,
            gravity: -20.0,
            grounded_stick_velocity: -2.0,
            ground_probe_distance: 0.15,
            speed_damp_time: 0.1,
            normal_height: 1.8,
            normal_center_y: 0.9,
            crouch_height: 1.0,
            crouch_center_y: 0.45,
            capsule_radius: 0.4,
        }
    }
}

/// Событие: мгновенная остановка (без easing)
///
/// Combat-коллаборатор шлёт при блоке/атаке. Обнуляет горизонтальную
/// скорость и сигнал анимации в начале следующего тика.
#[derive(Event, Debug, Clone)]
pub struct InstantStop {
    pub entity: Entity,
}

/// Событие: форсированный выход из приседа
///
/// Геометрия опорного объёма восстановится в том же тике
/// (sync_support_collider работает каждый тик, независимо от locomotion).
#[derive(Event, Debug, Clone)]
pub struct StopCrouch {
    pub entity: Entity,
}

/// Результирующая скорость: crouch подавляет run (форсированное замедление)
pub fn resolve_speed(config: &MovementConfig, crouching: bool, running: bool) -> f32 {
    if crouching {
        config.crouch_speed
    } else if running {
        config.speed * config.run_multiplier
    } else {
        config.speed
    }
}

/// Вертикальная скорость прыжка: v = sqrt(2·h·|g|)
pub fn jump_velocity(jump_height: f32, gravity: f32) -> f32 {
    (2.0 * jump_height * gravity.abs()).sqrt()
}

/// Downward probe от точки опоры; Some(y поверхности) если есть опора
pub fn grounded_probe(volumes: &[Volume], position: Vec3, probe_distance: f32) -> Option<f32> {
    // Старт чуть выше ног, чтобы луч не начинался внутри пола
    let origin = position + Vec3::Y * 0.05;
    environment::raycast(volumes, origin, -Vec3::Y, probe_distance + 0.05, MASK_SOLID)
        .map(|hit| hit.point.y)
}

/// Система: применить lock-команды combat-коллаборатора
///
/// Работает до любой обработки движения и независимо от authority:
/// InstantStop/StopCrouch валидны в произвольный момент.
pub fn apply_lock_commands(
    mut stops: EventReader<InstantStop>,
    mut uncrouches: EventReader<StopCrouch>,
    mut query: Query<(&mut CharacterMotor, &mut LocomotionSpeed), With<Player>>,
) {
    for stop in stops.read() {
        match query.get_mut(stop.entity) {
            Ok((mut motor, mut signal)) => {
                motor.horizontal_velocity = Vec3::ZERO;
                signal.value = 0.0;
            }
            Err(_) => logger::log_warning(&format!(
                "InstantStop: entity {:?} has no character components",
                stop.entity
            )),
        }
    }

    for command in uncrouches.read() {
        match query.get_mut(command.entity) {
            Ok((mut motor, _)) => {
                if motor.crouching {
                    motor.crouching = false;
                }
            }
            Err(_) => logger::log_warning(&format!(
                "StopCrouch: entity {:?} has no character components",
                command.entity
            )),
        }
    }
}

/// Система: наземное движение
///
/// Пока держит Locomotion authority: ground check, lock gate, оси/edges,
/// дискретный разворот по street-angle, гравитация, единый move с ground
/// snap. При can_move == false — только гравитация.
pub fn locomotion(
    config: Res<MovementConfig>,
    time: Res<Time<Fixed>>,
    mut cues: EventWriter<AnimationCue>,
    mut characters: Query<
        (
            Entity,
            &mut Transform,
            &mut CharacterMotor,
            &mut LocomotionSpeed,
            &CharacterInput,
            &MovementLock,
            &StreetAngle,
            &MovementAuthority,
        ),
        With<Player>,
    >,
    environment_query: Query<(Entity, &Transform, &ProbeVolume), Without<Player>>,
) {
    let delta = time.delta_secs();
    let volumes = environment::volumes_from(environment_query.iter());

    for (entity, mut transform, mut motor, mut signal, input, lock, street, authority) in
        characters.iter_mut()
    {
        if *authority != MovementAuthority::Locomotion {
            continue;
        }

        // 1. Ground check (vv > 0 — взлетаем, опоры нет по определению)
        let support = grounded_probe(&volumes, transform.translation, config.ground_probe_distance);
        motor.grounded = support.is_some() && motor.vertical_velocity <= 0.0;
        if motor.grounded && motor.vertical_velocity < 0.0 {
            motor.vertical_velocity = config.grounded_stick_velocity;
        }

        // 2. Lock gate: горизонталь и сигнал — в ноль мгновенно, гравитация живёт
        if !lock.can_move {
            motor.horizontal_velocity = Vec3::ZERO;
            signal.value = 0.0;
            integrate(&config, delta, &volumes, &mut transform, &mut motor);
            continue;
        }

        let damp = 1.0 - (-delta / config.speed_damp_time.max(1e-4)).exp();

        if motor.grounded {
            // Crouch toggle (edge)
            if input.crouch_pressed && !lock.prevent_crouching {
                motor.crouching = !motor.crouching;
            }

            // Горизонтальная ось вдоль улицы
            let axis = input.horizontal.clamp(-1.0, 1.0);
            if axis.abs() >= 0.1 {
                let running = input.run_held && !lock.prevent_running;
                let current = resolve_speed(&config, motor.crouching, running);
                let sign = if axis > 0.0 { 1.0 } else { -1.0 };
                motor.horizontal_velocity = street.direction() * sign * current;

                // Разворот дискретный: street-angle или street-angle+180
                let look = if axis > 0.0 {
                    street.degrees()
                } else {
                    street.degrees() + 180.0
                };
                transform.rotation = Quat::from_rotation_y(look.to_radians());

                signal.value += (current - signal.value) * damp;
            } else {
                motor.horizontal_velocity = Vec3::ZERO;
                signal.value += (0.0 - signal.value) * damp;
            }

            // Прыжок: только с земли и не в приседе
            if input.jump_pressed && !motor.crouching {
                motor.vertical_velocity = jump_velocity(config.jump_height, config.gravity);
                motor.grounded = false;
                cues.write(AnimationCue {
                    entity,
                    cue: CueId::Jump,
                });
            }
        } else {
            // В воздухе momentum сохраняется, input не обрабатывается
            let airborne_speed = motor.horizontal_velocity.length();
            signal.value += (airborne_speed - signal.value) * damp;
        }

        integrate(&config, delta, &volumes, &mut transform, &mut motor);
    }
}

/// Гравитация + единый move (horizontal + vertical) с ground snap
fn integrate(
    config: &MovementConfig,
    delta: f32,
    volumes: &[Volume],
    transform: &mut Transform,
    motor: &mut CharacterMotor,
) {
    motor.vertical_velocity += config.gravity * delta;

    let displacement = (motor.horizontal_velocity + Vec3::Y * motor.vertical_velocity) * delta;
    let mut next = transform.translation + displacement;

    // Падаем: не проваливаемся сквозь walkable top (snap на поверхность)
    if next.y < transform.translation.y {
        let drop = transform.translation.y - next.y;
        let origin = transform.translation + Vec3::Y * 0.05;
        if let Some(hit) =
            environment::raycast(volumes, origin, -Vec3::Y, drop + 0.06, MASK_SOLID)
        {
            if next.y < hit.point.y {
                next.y = hit.point.y;
                motor.vertical_velocity = config.grounded_stick_velocity;
                motor.grounded = true;
            }
        }
    }

    transform.translation = next;
}

/// Система: сброс edge-флагов input'а (конец тика)
pub fn clear_input_edges(mut query: Query<&mut CharacterInput, With<Player>>) {
    for mut input in query.iter_mut() {
        input.clear_edges();
    }
}
