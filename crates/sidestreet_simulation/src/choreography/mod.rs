//! Хореография траверса: ограниченное по времени, curve-driven движение позы
//!
//! State machine: Idle (компонента нет) → Entering → Locked → Exiting → снят.
//! Пока хореография активна, она — единственный писатель позы
//! (MovementAuthority::Choreography); физическое разрешение коллизий
//! выключено (ColliderDisabled), поза пишется напрямую.
//!
//! Re-entry policy: reject. Пока хореография не Idle, новые запросы
//! отклоняются (begin возвращает false) — запуск второй хореографии
//! поверх активной испортил бы позу. Очередь сознательно не делаем:
//! отложенная цель, посчитанная от устаревшей позы, к моменту запуска
//! уже неверна.
//!
//! Guaranteed release: оба пути завершения (штатный Exiting и cancel)
//! идут через единый release — коллизии всегда включаются обратно,
//! authority всегда отпускается.

use bevy::prelude::*;
use bevy_rapier3d::prelude::ColliderDisabled;

use crate::animation::{AnimationCue, CueId};
use crate::components::{CharacterMotor, LocomotionSpeed, MovementAuthority, Player};
use crate::environment::{Ladder, ProbeVolume, Volume};
use crate::ladder::LadderSession;
use crate::logger;

/// Параметры хореографий (длительности и смещения целевых поз)
#[derive(Resource, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChoreographyConfig {
    /// Вход на лестницу снизу (sec)
    pub ladder_entry_duration: f32,
    /// Вход на лестницу сверху, свешивание с платформы (sec)
    pub ladder_top_entry_duration: f32,
    /// Выход с лестницы наверху (sec)
    pub ladder_top_exit_duration: f32,
    /// Насколько ниже верхней границы лестницы точка виса при входе сверху
    pub top_entry_drop: f32,
    /// Смещение стартовой позы за край платформы (тело видимо выходит за край)
    pub top_entry_edge_clearance: f32,
    /// Шаг вперёд при выходе наверху
    pub top_exit_forward: f32,
    /// Насколько выше верхней границы точка выхода
    pub top_exit_rise: f32,
    /// Доля длительности, после которой начинается горизонтальное движение
    /// ("rise, then advance" силуэт)
    pub advance_fraction: f32,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            ladder_entry_duration: 0.9,
            ladder_top_entry_duration: 1.4,
            ladder_top_exit_duration: 1.2,
            top_entry_drop: 1.2,
            top_entry_edge_clearance: 0.4,
            top_exit_forward: 0.6,
            top_exit_rise: 0.1,
            advance_fraction: 0.6,
        }
    }
}

/// Easing-кривые для интерполяции по осям
///
/// Раздельные кривые на вертикаль и горизонталь дают силуэт
/// "поднялся, потом шагнул": вертикаль front-loaded (RiseEaseOut),
/// горизонталь back-loaded (DelayedAdvance).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EasingCurve {
    Linear,
    SmoothStep,
    /// Быстрый старт, плавное замедление: 1 - (1-t)²
    RiseEaseOut,
    /// Ноль до start_fraction, затем smoothstep на остатке
    DelayedAdvance { start_fraction: f32 },
}

impl EasingCurve {
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            EasingCurve::Linear => t,
            EasingCurve::SmoothStep => t * t * (3.0 - 2.0 * t),
            EasingCurve::RiseEaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            EasingCurve::DelayedAdvance { start_fraction } => {
                let f = start_fraction.clamp(0.0, 0.999);
                if t <= f {
                    0.0
                } else {
                    let local = (t - f) / (1.0 - f);
                    local * local * (3.0 - 2.0 * local)
                }
            }
        }
    }
}

/// Кому отдать authority после завершения
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraversalHandoff {
    Locomotion,
    LadderRide { ladder: Entity },
}

/// Целевая поза хореографии (потребляется ровно один раз)
#[derive(Debug, Clone)]
pub struct TraversalTarget {
    pub position: Vec3,
    pub rotation: Quat,
    pub duration: f32,
    pub cue: CueId,
    pub vertical_curve: EasingCurve,
    pub horizontal_curve: EasingCurve,
    pub handoff: TraversalHandoff,
    /// Смещение записанной стартовой позы (вход на лестницу сверху:
    /// тело сначала выносится за край платформы)
    pub start_shift: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoreographyPhase {
    Entering,
    Locked,
    Exiting,
}

/// Активная хореография (resumable task: тик за тиком копит elapsed)
#[derive(Component, Debug, Clone)]
pub struct Choreography {
    pub phase: ChoreographyPhase,
    pub elapsed: f32,
    pub start_position: Vec3,
    pub start_rotation: Quat,
    pub target: TraversalTarget,
}

/// Событие: принудительная отмена активной хореографии
///
/// Семантика отмены: snap в ближайшую безопасную позу (старт при t < 0.5,
/// иначе цель), коллизии включаются, authority возвращается Locomotion.
/// LadderSession при отменённом входе на лестницу не создаётся.
#[derive(Event, Debug, Clone)]
pub struct CancelChoreography {
    pub entity: Entity,
}

/// Yaw-поворот, смотрящий вдоль горизонтального направления
pub fn yaw_towards(direction: Vec3) -> Quat {
    Quat::from_rotation_y(direction.x.atan2(direction.z))
}

// ============================================================================
// Target builders (чистые, unit-тестируемые)
// ============================================================================

/// Вход на лестницу снизу: проекция на центр bounding box'а, наружу по
/// нормали на depth, высота текущая; лицом к -нормали
pub fn ladder_bottom_target(
    config: &ChoreographyConfig,
    ladder: Entity,
    ladder_volume: &Volume,
    depth_offset: f32,
    surface_normal: Vec3,
    start: &Transform,
) -> TraversalTarget {
    let center = ladder_volume.center();
    let position =
        Vec3::new(center.x, start.translation.y, center.z) + surface_normal * depth_offset;

    TraversalTarget {
        position,
        rotation: yaw_towards(-surface_normal),
        duration: config.ladder_entry_duration,
        cue: CueId::LadderBottomEntry,
        vertical_curve: EasingCurve::Linear,
        horizontal_curve: EasingCurve::SmoothStep,
        handoff: TraversalHandoff::LadderRide { ladder },
        start_shift: Vec3::ZERO,
    }
}

/// Вход на лестницу сверху: точка виса ниже верхней границы, горизонталь
/// к центру лестницы со смещением на глубину виса; старт выносится за
/// край платформы, чтобы тело видимо очистило край перед спуском
pub fn ladder_top_entry_target(
    config: &ChoreographyConfig,
    ladder: Entity,
    ladder_volume: &Volume,
    ladder_forward: Vec3,
    depth_offset: f32,
    start: &Transform,
) -> TraversalTarget {
    let center = ladder_volume.center();
    let top = ladder_volume.top_y();
    let position = Vec3::new(center.x, top - config.top_entry_drop, center.z)
        + ladder_forward * depth_offset;

    let mut outward = position - start.translation;
    outward.y = 0.0;
    let start_shift = outward.normalize_or_zero() * config.top_entry_edge_clearance;

    TraversalTarget {
        position,
        rotation: yaw_towards(-ladder_forward),
        duration: config.ladder_top_entry_duration,
        cue: CueId::LadderTopEntry,
        vertical_curve: EasingCurve::RiseEaseOut,
        horizontal_curve: EasingCurve::DelayedAdvance {
            start_fraction: config.advance_fraction,
        },
        handoff: TraversalHandoff::LadderRide { ladder },
        start_shift,
    }
}

/// Выход с лестницы наверху: точка чуть выше верхней границы + шаг вперёд;
/// те же двойные кривые — тело поднимается, затем шагает
pub fn ladder_top_exit_target(
    config: &ChoreographyConfig,
    top_bound_y: f32,
    face_rotation: Quat,
    start_position: Vec3,
) -> TraversalTarget {
    let forward = face_rotation * Vec3::Z;
    let position = Vec3::new(start_position.x, top_bound_y + config.top_exit_rise, start_position.z)
        + forward * config.top_exit_forward;

    TraversalTarget {
        position,
        rotation: face_rotation,
        duration: config.ladder_top_exit_duration,
        cue: CueId::LadderTopExit,
        vertical_curve: EasingCurve::RiseEaseOut,
        horizontal_curve: EasingCurve::DelayedAdvance {
            start_fraction: config.advance_fraction,
        },
        handoff: TraversalHandoff::Locomotion,
        start_shift: Vec3::ZERO,
    }
}

/// Wall-climb: landing point уже посчитан пробой (включая forward inset)
pub fn wall_climb_target(
    duration: f32,
    advance_fraction: f32,
    cue: CueId,
    landing: Vec3,
    start: &Transform,
) -> TraversalTarget {
    TraversalTarget {
        position: landing,
        rotation: start.rotation,
        duration,
        cue,
        vertical_curve: EasingCurve::RiseEaseOut,
        horizontal_curve: EasingCurve::DelayedAdvance {
            start_fraction: advance_fraction,
        },
        handoff: TraversalHandoff::Locomotion,
        start_shift: Vec3::ZERO,
    }
}

// ============================================================================
// Запуск / продвижение / отмена
// ============================================================================

/// Запустить хореографию (фаза Entering)
///
/// Acquire-часть: authority → Choreography, коллизии выключены, cue
/// отправлен, стартовая поза записана. Возвращает false (и ничего не
/// делает), если персонаж уже в хореографии — re-entry отклоняется.
pub fn begin(
    commands: &mut Commands,
    cues: &mut EventWriter<AnimationCue>,
    entity: Entity,
    transform: &Transform,
    authority: &mut MovementAuthority,
    target: TraversalTarget,
) -> bool {
    if *authority == MovementAuthority::Choreography {
        logger::log_warning(&format!(
            "Choreography rejected for {:?}: another is active",
            entity
        ));
        return false;
    }

    let cue = target.cue;
    let start_position = transform.translation + target.start_shift;

    commands.entity(entity).insert((
        Choreography {
            phase: ChoreographyPhase::Entering,
            elapsed: 0.0,
            start_position,
            start_rotation: transform.rotation,
            target,
        },
        // Поза пишется напрямую, физическое разрешение движения выключено
        ColliderDisabled,
    ));
    *authority = MovementAuthority::Choreography;
    cues.write(AnimationCue { entity, cue });
    logger::log(&format!("Choreography started: {:?} for {:?}", cue, entity));
    true
}

/// Release-часть: коллизии обратно, компонент снят. Общая для штатного
/// завершения и отмены — инвариант "всегда вернуть коллизии и authority"
/// держится структурно, одним путём.
fn release(commands: &mut Commands, entity: Entity, motor: &mut CharacterMotor) {
    commands
        .entity(entity)
        .remove::<(Choreography, ColliderDisabled)>();
    motor.horizontal_velocity = Vec3::ZERO;
    motor.vertical_velocity = 0.0;
    motor.grounded = false; // locomotion пересчитает в свой тик
}

/// Система: продвижение активной хореографии (раз в тик)
pub fn advance_choreography(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    mut characters: Query<
        (
            Entity,
            &mut Transform,
            &mut CharacterMotor,
            &mut LocomotionSpeed,
            &mut MovementAuthority,
            &mut Choreography,
        ),
        With<Player>,
    >,
    ladders: Query<(&Transform, &ProbeVolume, &Ladder), Without<Player>>,
) {
    let delta = time.delta_secs();

    for (entity, mut transform, mut motor, mut signal, mut authority, mut choreography) in
        characters.iter_mut()
    {
        // Компонент существует только под Choreography authority
        debug_assert_eq!(*authority, MovementAuthority::Choreography);

        match choreography.phase {
            ChoreographyPhase::Entering => {
                // Стартовая поза (с учётом edge clearance), сигналы в ноль
                transform.translation = choreography.start_position;
                motor.horizontal_velocity = Vec3::ZERO;
                motor.vertical_velocity = 0.0;
                signal.value = 0.0;
                choreography.phase = ChoreographyPhase::Locked;
            }
            ChoreographyPhase::Locked => {
                choreography.elapsed += delta;
                let t = (choreography.elapsed / choreography.target.duration.max(1e-4))
                    .clamp(0.0, 1.0);

                let vertical = choreography.target.vertical_curve.evaluate(t);
                let horizontal = choreography.target.horizontal_curve.evaluate(t);
                let start = choreography.start_position;
                let end = choreography.target.position;

                transform.translation = Vec3::new(
                    start.x + (end.x - start.x) * horizontal,
                    start.y + (end.y - start.y) * vertical,
                    start.z + (end.z - start.z) * horizontal,
                );
                transform.rotation = choreography
                    .start_rotation
                    .slerp(choreography.target.rotation, EasingCurve::SmoothStep.evaluate(t));

                if t >= 1.0 {
                    // Snap точно в цель: накопленный floating-point дрейф в ноль
                    transform.translation = choreography.target.position;
                    transform.rotation = choreography.target.rotation;
                    choreography.phase = ChoreographyPhase::Exiting;
                }
            }
            ChoreographyPhase::Exiting => {
                match choreography.target.handoff {
                    TraversalHandoff::Locomotion => {
                        release(&mut commands, entity, &mut motor);
                        *authority = MovementAuthority::Locomotion;
                        logger::log(&format!("Choreography finished for {:?} -> Locomotion", entity));
                    }
                    TraversalHandoff::LadderRide { ladder } => match ladders.get(ladder) {
                        Ok((ladder_transform, volume, ladder_data)) => {
                            let top = Volume::new(
                                ladder,
                                ladder_transform.translation,
                                volume.half_extents,
                                volume.layers,
                            )
                            .top_y();
                            release(&mut commands, entity, &mut motor);
                            commands.entity(entity).insert(LadderSession {
                                ladder,
                                top_bound_y: top,
                                depth_offset: ladder_data.depth_offset,
                                face_rotation: transform.rotation,
                            });
                            *authority = MovementAuthority::LadderRide;
                            logger::log(&format!(
                                "Choreography finished for {:?} -> LadderRide (top {:.2})",
                                entity, top
                            ));
                        }
                        Err(_) => {
                            // Лестница пропала во время входа: деградируем в locomotion
                            logger::log_error(&format!(
                                "Ladder {:?} despawned during entry, releasing to locomotion",
                                ladder
                            ));
                            release(&mut commands, entity, &mut motor);
                            *authority = MovementAuthority::Locomotion;
                        }
                    },
                }
            }
        }
    }
}

/// Система: отмена хореографии по внешнему событию (lethal damage и т.п.)
pub fn handle_cancellation(
    mut commands: Commands,
    mut events: EventReader<CancelChoreography>,
    mut characters: Query<
        (
            &mut Transform,
            &mut CharacterMotor,
            &mut MovementAuthority,
            &Choreography,
        ),
        With<Player>,
    >,
) {
    for event in events.read() {
        let Ok((mut transform, mut motor, mut authority, choreography)) =
            characters.get_mut(event.entity)
        else {
            // Нет активной хореографии — отменять нечего (expected negative)
            continue;
        };

        let t = choreography.elapsed / choreography.target.duration.max(1e-4);
        if t < 0.5 {
            transform.translation = choreography.start_position;
            transform.rotation = choreography.start_rotation;
        } else {
            transform.translation = choreography.target.position;
            transform.rotation = choreography.target.rotation;
        }

        release(&mut commands, event.entity, &mut motor);
        *authority = MovementAuthority::Locomotion;
        logger::log_info(&format!(
            "Choreography cancelled for {:?} at t={:.2}",
            event.entity, t
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::LAYER_LADDER;

    #[test]
    fn test_easing_endpoints() {
        let curves = [
            EasingCurve::Linear,
            EasingCurve::SmoothStep,
            EasingCurve::RiseEaseOut,
            EasingCurve::DelayedAdvance { start_fraction: 0.6 },
        ];
        for curve in curves {
            assert_eq!(curve.evaluate(0.0), 0.0, "{:?} at 0", curve);
            assert!((curve.evaluate(1.0) - 1.0).abs() < 1e-6, "{:?} at 1", curve);
        }
    }

    #[test]
    fn test_delayed_advance_holds_then_moves() {
        let curve = EasingCurve::DelayedAdvance { start_fraction: 0.6 };
        assert_eq!(curve.evaluate(0.3), 0.0);
        assert_eq!(curve.evaluate(0.6), 0.0);
        assert!(curve.evaluate(0.7) > 0.0);
        assert!(curve.evaluate(0.9) > curve.evaluate(0.7));
    }

    #[test]
    fn test_rise_ease_out_front_loads() {
        // Вертикаль должна пройти больше половины пути к середине времени
        assert!(EasingCurve::RiseEaseOut.evaluate(0.5) > 0.5);
    }

    #[test]
    fn test_yaw_towards() {
        let rotation = yaw_towards(Vec3::Z);
        assert!(((rotation * Vec3::Z) - Vec3::Z).length() < 1e-5);

        let rotation = yaw_towards(-Vec3::Z);
        assert!(((rotation * Vec3::Z) + Vec3::Z).length() < 1e-5);

        let rotation = yaw_towards(Vec3::X);
        assert!(((rotation * Vec3::Z) - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_ladder_bottom_target_projection() {
        let config = ChoreographyConfig::default();
        let ladder_volume = Volume::new(
            Entity::PLACEHOLDER,
            Vec3::new(0.0, 1.5, 1.0),
            Vec3::new(0.4, 1.5, 0.1),
            LAYER_LADDER,
        );
        let start = Transform::from_translation(Vec3::ZERO);
        let normal = -Vec3::Z; // передняя грань

        let target = ladder_bottom_target(
            &config,
            Entity::PLACEHOLDER,
            &ladder_volume,
            0.5,
            normal,
            &start,
        );

        // X/Z = центр bounding box + нормаль * depth; Y — стартовая
        assert!((target.position - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-4);
        // Лицом к -нормали (= +Z)
        assert!(((target.rotation * Vec3::Z) - Vec3::Z).length() < 1e-4);
        assert_eq!(target.cue, CueId::LadderBottomEntry);
        assert!(matches!(target.handoff, TraversalHandoff::LadderRide { .. }));
    }

    #[test]
    fn test_ladder_top_exit_target_above_bound() {
        let config = ChoreographyConfig::default();
        let face = yaw_towards(Vec3::Z);
        let target = ladder_top_exit_target(&config, 3.0, face, Vec3::new(0.0, 2.7, 0.5));

        assert!((target.position.y - (3.0 + config.top_exit_rise)).abs() < 1e-5);
        // Шаг вперёд по направлению лица
        assert!((target.position.z - (0.5 + config.top_exit_forward)).abs() < 1e-5);
        assert_eq!(target.handoff, TraversalHandoff::Locomotion);
    }

    #[test]
    fn test_top_entry_start_shift_clears_edge() {
        let config = ChoreographyConfig::default();
        let ladder_volume = Volume::new(
            Entity::PLACEHOLDER,
            Vec3::new(0.0, 1.5, 2.0),
            Vec3::new(0.4, 1.5, 0.1),
            LAYER_LADDER,
        );
        // Персонаж на платформе, лестница впереди снизу
        let start = Transform::from_translation(Vec3::new(0.0, 3.0, 1.0));

        let target = ladder_top_entry_target(
            &config,
            Entity::PLACEHOLDER,
            &ladder_volume,
            Vec3::Z,
            0.5,
            &start,
        );

        // Точка виса ниже верхней границы (3.0)
        assert!(target.position.y < 3.0);
        // Стартовый сдвиг — горизонтальный, в сторону лестницы
        assert_eq!(target.start_shift.y, 0.0);
        assert!(target.start_shift.z > 0.0);
        assert!((target.start_shift.length() - config.top_entry_edge_clearance).abs() < 1e-4);
    }
}
