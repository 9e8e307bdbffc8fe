//! Context probe: классификация окружения по interact-нажатию
//!
//! Единственная кнопка контекстного действия. По edge-нажатию пробегаем
//! упорядоченный список проверок (приоритет — данные конфига), первая
//! удача выигрывает:
//! 1. Лестница снизу (chest ray вперёд)
//! 2. Лестница сверху (downward sweep перед персонажем)
//! 3. Wall-climb классы High → Mid → Low (ankle ray + landing probe)
//! 4. Generic interactable (chest ray, вызов capability)
//!
//! Probe работает только под Locomotion authority — активная хореография
//! или езда по лестнице не прерываются новым нажатием. Combat-лок
//! (can_move == false) блокирует interact целиком, как и движение.

use bevy::prelude::*;

use crate::animation::{AnimationCue, CueId};
use crate::choreography::{self, ChoreographyConfig};
use crate::components::{CharacterInput, CharacterMotor, MovementAuthority, MovementLock, Player};
use crate::environment::{
    self, wall_layer, ClimbableWall, InteractHandle, Interacted, Ladder, ProbeVolume, Volume,
    WallClass, LAYER_INTERACT, LAYER_LADDER, MASK_SOLID,
};
use crate::locomotion::{grounded_probe, MovementConfig};
use crate::logger;

/// Параметры одного класса wall-climb
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct WallClassConfig {
    /// Максимальная высота препятствия класса (m)
    pub max_height: f32,
    /// Длительность хореографии преодоления (sec)
    pub duration: f32,
}

/// Виды проверок probe (порядок в конфиге = приоритет)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProbeKind {
    LadderBottom,
    LadderTop,
    WallHigh,
    WallMid,
    WallLow,
    Interactable,
}

/// Параметры context probe
#[derive(Resource, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProbeConfig {
    /// Probe только с опоры (прыжковый grab сознательно выключен)
    pub require_grounded: bool,
    /// Порядок проверок (данные, не код)
    pub priority: Vec<ProbeKind>,
    /// Высота chest ray (лестницы, interactables)
    pub chest_height: f32,
    /// Высота ankle ray (wall-climb)
    pub ankle_height: f32,
    /// Дальность interact ray
    pub interact_distance: f32,
    /// Дальность chest ray до лестницы
    pub ladder_check_distance: f32,
    /// Дальность ankle ray до препятствия
    pub wall_check_distance: f32,
    /// Вынос точки верхнего ladder-sweep вперёд
    pub ladder_top_forward: f32,
    /// Подъём точки верхнего ladder-sweep
    pub ladder_top_rise: f32,
    /// Глубина верхнего ladder-sweep вниз
    pub ladder_top_sweep_depth: f32,
    /// Полуразмер box'а верхнего ladder-sweep
    pub ladder_top_probe_radius: f32,
    /// Смещение landing point вглубь препятствия (ноги не на кромке)
    pub landing_inset: f32,
    pub wall_high: WallClassConfig,
    pub wall_mid: WallClassConfig,
    pub wall_low: WallClassConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            require_grounded: true,
            priority: vec![
                ProbeKind::LadderBottom,
                ProbeKind::LadderTop,
                ProbeKind::WallHigh,
                ProbeKind::WallMid,
                ProbeKind::WallLow,
                ProbeKind::Interactable,
            ],
            chest_height: 1.0,
            ankle_height: 0.2,
            interact_distance: 2.0,
            ladder_check_distance: 1.0,
            wall_check_distance: 1.0,
            ladder_top_forward: 0.6,
            ladder_top_rise: 0.5,
            ladder_top_sweep_depth: 2.5,
            ladder_top_probe_radius: 0.3,
            landing_inset: 0.3,
            wall_high: WallClassConfig {
                max_height: 2.2,
                duration: 1.5,
            },
            wall_mid: WallClassConfig {
                max_height: 1.4,
                duration: 1.1,
            },
            wall_low: WallClassConfig {
                max_height: 0.7,
                duration: 0.8,
            },
        }
    }
}

impl ProbeConfig {
    pub fn wall_class(&self, class: WallClass) -> WallClassConfig {
        match class {
            WallClass::High => self.wall_high,
            WallClass::Mid => self.wall_mid,
            WallClass::Low => self.wall_low,
        }
    }
}

/// Cue хореографии преодоления для класса препятствия
pub fn wall_cue(class: WallClass) -> CueId {
    match class {
        WallClass::High => CueId::WallClimbHigh,
        WallClass::Mid => CueId::WallClimbMid,
        WallClass::Low => CueId::WallClimbLow,
    }
}

/// Классификация, выданная probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeResult {
    LadderBottom { ladder: Entity, surface_normal: Vec3 },
    LadderTop { ladder: Entity },
    WallClimb { wall: Entity, class: WallClass, landing: Vec3 },
    Interactable { target: Entity },
}

/// Лестница перед грудью: hit + нормаль поверхности (сторона подхода)
fn check_ladder_bottom(
    config: &ProbeConfig,
    volumes: &[Volume],
    position: Vec3,
    forward: Vec3,
) -> Option<ProbeResult> {
    let chest = position + Vec3::Y * config.chest_height;
    environment::raycast(volumes, chest, forward, config.ladder_check_distance, LAYER_LADDER).map(
        |hit| ProbeResult::LadderBottom {
            ladder: hit.entity,
            surface_normal: hit.normal,
        },
    )
}

/// Лестница под краем платформы: downward sweep из точки перед персонажем
fn check_ladder_top(
    config: &ProbeConfig,
    volumes: &[Volume],
    position: Vec3,
    forward: Vec3,
) -> Option<ProbeResult> {
    let origin =
        position + forward * config.ladder_top_forward + Vec3::Y * config.ladder_top_rise;
    environment::sweep_aabb(
        volumes,
        origin,
        Vec3::splat(config.ladder_top_probe_radius),
        -Vec3::Y,
        config.ladder_top_sweep_depth,
        LAYER_LADDER,
    )
    .map(|hit| ProbeResult::LadderTop { ladder: hit.entity })
}

/// Двухфазная проверка препятствия класса: ankle ray вперёд, затем landing
/// probe вниз с максимальной высоты класса
fn check_wall(
    config: &ProbeConfig,
    class: WallClass,
    volumes: &[Volume],
    position: Vec3,
    forward: Vec3,
) -> Option<ProbeResult> {
    let class_config = config.wall_class(class);
    let ankle = position + Vec3::Y * config.ankle_height;
    let front = environment::raycast(
        volumes,
        ankle,
        forward,
        config.wall_check_distance,
        wall_layer(class),
    )?;

    // Landing probe: вниз с max высоты класса над точкой контакта; старт
    // сдвинут чуть вглубь препятствия, чтобы луч не скользил по его грани
    let down_origin = Vec3::new(front.point.x, position.y + class_config.max_height, front.point.z)
        + forward * 0.01;
    let landing = environment::raycast(
        volumes,
        down_origin,
        -Vec3::Y,
        class_config.max_height + 1.0,
        MASK_SOLID,
    )?;

    // Старт внутри геометрии — верх препятствия выше max высоты класса,
    // посадочной поверхности в пределах досягаемости нет
    if landing.distance < 1e-3 {
        return None;
    }

    let landing_point =
        Vec3::new(front.point.x, landing.point.y, front.point.z) + forward * config.landing_inset;
    Some(ProbeResult::WallClimb {
        wall: front.entity,
        class,
        landing: landing_point,
    })
}

/// Generic interactable перед грудью (только объекты с capability)
fn check_interactable(
    config: &ProbeConfig,
    volumes: &[Volume],
    position: Vec3,
    forward: Vec3,
    has_capability: &dyn Fn(Entity) -> bool,
) -> Option<ProbeResult> {
    let chest = position + Vec3::Y * config.chest_height;
    environment::raycast(volumes, chest, forward, config.interact_distance, LAYER_INTERACT)
        .filter(|hit| has_capability(hit.entity))
        .map(|hit| ProbeResult::Interactable { target: hit.entity })
}

/// Прогнать проверки в порядке приоритета; первая удача выигрывает
pub fn resolve_probe(
    config: &ProbeConfig,
    volumes: &[Volume],
    position: Vec3,
    forward: Vec3,
    has_capability: &dyn Fn(Entity) -> bool,
) -> Option<ProbeResult> {
    for kind in &config.priority {
        let result = match kind {
            ProbeKind::LadderBottom => check_ladder_bottom(config, volumes, position, forward),
            ProbeKind::LadderTop => check_ladder_top(config, volumes, position, forward),
            ProbeKind::WallHigh => {
                check_wall(config, WallClass::High, volumes, position, forward)
            }
            ProbeKind::WallMid => check_wall(config, WallClass::Mid, volumes, position, forward),
            ProbeKind::WallLow => check_wall(config, WallClass::Low, volumes, position, forward),
            ProbeKind::Interactable => {
                check_interactable(config, volumes, position, forward, has_capability)
            }
        };
        if result.is_some() {
            return result;
        }
    }
    None
}

/// Система: context probe по interact-нажатию
pub fn probe_interactions(
    mut commands: Commands,
    config: Res<ProbeConfig>,
    choreography_config: Res<ChoreographyConfig>,
    mut cues: EventWriter<AnimationCue>,
    mut interactions: EventWriter<Interacted>,
    movement_config: Res<MovementConfig>,
    mut characters: Query<
        (
            Entity,
            &Transform,
            &CharacterMotor,
            &CharacterInput,
            &MovementLock,
            &mut MovementAuthority,
        ),
        With<Player>,
    >,
    environment_query: Query<(Entity, &Transform, &ProbeVolume), Without<Player>>,
    ladders: Query<(&Transform, &Ladder), Without<Player>>,
    climbables: Query<&ClimbableWall, Without<Player>>,
    mut handles: Query<&mut InteractHandle, Without<Player>>,
) {
    let volumes = environment::volumes_from(environment_query.iter());

    for (entity, transform, motor, input, lock, mut authority) in characters.iter_mut() {
        if !input.interact_pressed {
            continue;
        }
        // Interact подчиняется combat-локу так же, как движение
        if !lock.can_move {
            continue;
        }
        if *authority != MovementAuthority::Locomotion {
            continue;
        }
        if config.require_grounded {
            // Свежая опорная проба: motor.grounded пишется locomotion ПОЗЖЕ
            // в цепочке тика и на первом тике персонажа ещё пуст
            let support = grounded_probe(
                &volumes,
                transform.translation,
                movement_config.ground_probe_distance,
            );
            if support.is_none() || motor.vertical_velocity > 0.0 {
                continue;
            }
        }

        let forward = transform.rotation * Vec3::Z;
        let result = resolve_probe(&config, &volumes, transform.translation, forward, &|target| {
            handles.contains(target)
        });

        let Some(result) = result else {
            continue; // expected negative: нажатие в пустоту
        };
        logger::log(&format!("Probe for {:?}: {:?}", entity, result));

        match result {
            ProbeResult::LadderBottom {
                ladder,
                surface_normal,
            } => {
                let Some(volume) = volumes.iter().find(|v| v.entity == ladder) else {
                    continue;
                };
                let depth = ladders
                    .get(ladder)
                    .map(|(_, data)| data.depth_offset)
                    .unwrap_or(Ladder::default().depth_offset);
                let target = choreography::ladder_bottom_target(
                    &choreography_config,
                    ladder,
                    volume,
                    depth,
                    surface_normal,
                    transform,
                );
                choreography::begin(&mut commands, &mut cues, entity, transform, &mut authority, target);
            }
            ProbeResult::LadderTop { ladder } => {
                let Some(volume) = volumes.iter().find(|v| v.entity == ladder) else {
                    continue;
                };
                let Ok((ladder_transform, ladder_data)) = ladders.get(ladder) else {
                    logger::log_warning(&format!(
                        "Ladder volume {:?} without Ladder component",
                        ladder
                    ));
                    continue;
                };
                let ladder_forward = ladder_transform.rotation * Vec3::Z;
                let target = choreography::ladder_top_entry_target(
                    &choreography_config,
                    ladder,
                    volume,
                    ladder_forward,
                    ladder_data.depth_offset,
                    transform,
                );
                choreography::begin(&mut commands, &mut cues, entity, transform, &mut authority, target);
            }
            ProbeResult::WallClimb { wall, class, landing } => {
                // Класс на компоненте препятствия авторитетен; слой probe
                // volume — только broadphase-фильтр лучей
                let class = climbables.get(wall).map(|c| c.class).unwrap_or(class);
                let target = choreography::wall_climb_target(
                    config.wall_class(class).duration,
                    choreography_config.advance_fraction,
                    wall_cue(class),
                    landing,
                    transform,
                );
                choreography::begin(&mut commands, &mut cues, entity, transform, &mut authority, target);
            }
            ProbeResult::Interactable { target } => {
                if let Ok(mut handle) = handles.get_mut(target) {
                    handle.0.interact(entity);
                    interactions.write(Interacted {
                        target,
                        instigator: entity,
                    });
                }
            }
        }
    }
}
