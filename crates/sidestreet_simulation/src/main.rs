//! Headless симуляция SIDESTREET
//!
//! Скриптованный прогон без рендера: улица, низкое препятствие, лестница;
//! персонаж идёт, прыгает, перелезает и поднимается по лестнице.

use bevy::prelude::*;
use sidestreet_simulation::environment::{LAYER_LADDER, LAYER_WALL_LOW, LAYER_WORLD};
use sidestreet_simulation::{
    create_headless_app, spawn_character, step_ticks, CharacterInput, ClimbableWall, Ladder,
    MovementAuthority, MovementConfig, Player, ProbeVolume, SimulationPlugin, WallClass,
};

fn spawn_street(world: &mut World) {
    // Улица
    world.spawn((
        Transform::from_translation(Vec3::new(0.0, -0.5, 0.0)),
        ProbeVolume {
            half_extents: Vec3::new(60.0, 0.5, 6.0),
            layers: LAYER_WORLD,
        },
    ));

    // Низкое препятствие поперёк улицы (vault), фронт на x=5.6
    world.spawn((
        Transform::from_translation(Vec3::new(6.0, 0.3, 0.0)),
        ProbeVolume {
            half_extents: Vec3::new(0.4, 0.3, 3.0),
            layers: LAYER_WALL_LOW,
        },
        ClimbableWall {
            class: WallClass::Low,
        },
    ));

    // Лестница дальше по улице, климб-грань со стороны -X
    world.spawn((
        Transform::from_translation(Vec3::new(12.0, 1.5, 0.0))
            .with_rotation(Quat::from_rotation_y(-core::f32::consts::FRAC_PI_2)),
        ProbeVolume {
            half_extents: Vec3::new(0.1, 1.5, 0.4),
            layers: LAYER_LADDER,
        },
        Ladder::default(),
    ));
}

fn drive(world: &mut World, player: Entity, write: impl FnOnce(&mut CharacterInput)) {
    let mut state = world.query_filtered::<&mut CharacterInput, With<Player>>();
    if let Ok(mut input) = state.get_mut(world, player) {
        write(&mut input);
    }
}

fn report(world: &mut World, player: Entity, label: &str) {
    let mut state = world.query_filtered::<(&Transform, &MovementAuthority), With<Player>>();
    if let Ok((transform, authority)) = state.get(world, player) {
        println!(
            "{}: pos ({:.2}, {:.2}, {:.2}), authority {:?}",
            label,
            transform.translation.x,
            transform.translation.y,
            transform.translation.z,
            authority
        );
    }
}

fn main() {
    println!("Starting SIDESTREET headless simulation");

    let mut app = create_headless_app();
    app.add_plugins(SimulationPlugin);

    spawn_street(app.world_mut());

    let config = app.world().resource::<MovementConfig>().clone();
    let world = app.world_mut();
    let player = {
        let mut commands = world.commands();
        // Street angle 90 => ось улицы вдоль +X
        spawn_character(&mut commands, &config, Vec3::ZERO, 90.0)
    };
    world.flush();

    // Идём вдоль улицы с прыжком на старте
    drive(app.world_mut(), player, |input| {
        input.horizontal = 1.0;
        input.jump_pressed = true;
    });
    step_ticks(&mut app, 60);
    report(app.world_mut(), player, "After 1s walk + jump");

    // Подходим вплотную к препятствию
    step_ticks(&mut app, 20);
    drive(app.world_mut(), player, |input| {
        input.horizontal = 0.0;
        input.interact_pressed = true;
    });
    step_ticks(&mut app, 30);
    report(app.world_mut(), player, "Mid-vault");
    step_ticks(&mut app, 30);
    report(app.world_mut(), player, "After vault");

    // Дальше к лестнице
    drive(app.world_mut(), player, |input| input.horizontal = 1.0);
    step_ticks(&mut app, 80);
    drive(app.world_mut(), player, |input| {
        input.horizontal = 0.0;
        input.interact_pressed = true;
    });
    step_ticks(&mut app, 60);
    report(app.world_mut(), player, "On ladder");

    // Подъём и выход наверху
    drive(app.world_mut(), player, |input| input.vertical = 1.0);
    step_ticks(&mut app, 200);
    report(app.world_mut(), player, "After ladder climb");

    println!("Simulation complete!");
}
