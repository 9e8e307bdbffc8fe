//! SIDESTREET Simulation Core
//!
//! Headless ECS-симуляция контекстного движения персонажа на Bevy 0.16:
//! lane-движение вдоль оси улицы, crouch/jump, context probe (лестницы,
//! wall-climb, interactables), curve-driven хореографии траверса, езда
//! по лестнице и арбитраж movement lock с combat-коллаборатором.
//!
//! Поза пишется ровно одним владельцем за тик (MovementAuthority):
//! Locomotion | Choreography | LadderRide. Физика — rapier описывает
//! тело (kinematic capsule), velocity интегрируем сами; probe-геометрия
//! через bevy::math::bounding.

use bevy::prelude::*;

// Публичные модули
pub mod animation;
pub mod choreography;
pub mod components;
pub mod environment;
pub mod ladder;
pub mod locomotion;
pub mod logger;
pub mod physics;
pub mod probe;

// Re-export базовых компонентов для удобства
pub use animation::{AnimationCue, CueId};
pub use choreography::{
    CancelChoreography, Choreography, ChoreographyConfig, ChoreographyPhase, EasingCurve,
    TraversalHandoff, TraversalTarget,
};
pub use components::*;
pub use environment::{
    ClimbableWall, InteractHandle, Interacted, Interaction, Ladder, PathTurnVolume, ProbeVolume,
    WallClass,
};
pub use ladder::{LadderConfig, LadderSession};
pub use locomotion::{InstantStop, MovementConfig, StopCrouch};
pub use logger::{init_logger, set_log_level, set_logger, LogLevel, LogPrinter};
pub use physics::{character_bundle, spawn_character};
pub use probe::{ProbeConfig, ProbeKind, ProbeResult};

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// Все системы — один chained-тюпл в FixedUpdate: внутри тика порядок
/// фиксирован, между тиками состояние детерминировано.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick (легче считать интервалы)
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .init_resource::<MovementConfig>()
            .init_resource::<ProbeConfig>()
            .init_resource::<ChoreographyConfig>()
            .init_resource::<LadderConfig>()
            .add_event::<InstantStop>()
            .add_event::<StopCrouch>()
            .add_event::<CancelChoreography>()
            .add_event::<AnimationCue>()
            .add_event::<Interacted>()
            .add_systems(
                FixedUpdate,
                (
                    // Lock-команды и отмены — до любой обработки движения
                    locomotion::apply_lock_commands,
                    choreography::handle_cancellation,
                    choreography::advance_choreography,
                    // Probe до ladder_ride: interact, отпустивший лестницу,
                    // не должен в тот же тик начать новый вход
                    probe::probe_interactions,
                    ladder::ladder_ride,
                    locomotion::locomotion,
                    physics::sync_support_collider,
                    environment::apply_path_turns,
                    physics::sync_velocity_to_rapier,
                    locomotion::clear_input_edges,
                )
                    .chain(),
            );
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app() -> App {
    let mut app = App::new();
    logger::init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Прогнать ровно `ticks` симуляционных тиков
///
/// FixedUpdate гоняем вручную с ручным продвижением Time<Fixed>:
/// app.update() завязан на wall-clock и для tick-точных сценариев
/// недетерминистичен.
pub fn step_ticks(app: &mut App, ticks: u32) {
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    for _ in 0..ticks {
        app.world_mut()
            .resource_mut::<Time<Fixed>>()
            .advance_by(timestep);
        app.world_mut().run_schedule(FixedUpdate);
    }
}

/// Snapshot мира для сравнения детерминизма
///
/// Сортировка по Entity ID, сериализация через Debug — достаточно для
/// побайтового сравнения двух прогонов.
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
