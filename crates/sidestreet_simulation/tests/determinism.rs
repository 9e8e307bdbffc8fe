//! Два идентичных скриптованных прогона дают побайтово одинаковый мир

use bevy::prelude::*;
use sidestreet_simulation::environment::{LAYER_LADDER, LAYER_WALL_HIGH, LAYER_WORLD};
use sidestreet_simulation::*;

fn scripted_run() -> (Vec<u8>, Vec<u8>) {
    let mut app = create_headless_app();
    app.add_plugins(SimulationPlugin);

    app.world_mut().spawn((
        Transform::from_xyz(0.0, -0.5, 0.0),
        ProbeVolume {
            half_extents: Vec3::new(50.0, 0.5, 50.0),
            layers: LAYER_WORLD,
        },
    ));
    app.world_mut().spawn((
        Transform::from_xyz(0.0, 1.0, 5.4),
        ProbeVolume {
            half_extents: Vec3::new(2.0, 1.0, 0.5),
            layers: LAYER_WALL_HIGH,
        },
        ClimbableWall {
            class: WallClass::High,
        },
    ));
    app.world_mut().spawn((
        Transform::from_xyz(0.0, 3.5, 8.0),
        ProbeVolume {
            half_extents: Vec3::new(0.4, 1.5, 0.1),
            layers: LAYER_LADDER,
        },
        Ladder::default(),
    ));

    let config = app.world().resource::<MovementConfig>().clone();
    let player = app
        .world_mut()
        .spawn(character_bundle(&config, Vec3::ZERO, 0.0))
        .id();

    let drive = |app: &mut App, write: &dyn Fn(&mut CharacterInput)| {
        let mut input = app.world_mut().get_mut::<CharacterInput>(player).unwrap();
        write(&mut input);
    };

    // Скрипт: ходьба, прыжок, остановка перед препятствием, wall-climb
    drive(&mut app, &|input| input.horizontal = 1.0);
    step_ticks(&mut app, 45);
    drive(&mut app, &|input| input.jump_pressed = true);
    step_ticks(&mut app, 30);
    drive(&mut app, &|input| {
        input.horizontal = 0.0;
        input.interact_pressed = true;
    });
    step_ticks(&mut app, 120);
    drive(&mut app, &|input| input.horizontal = 1.0);
    step_ticks(&mut app, 60);

    (
        world_snapshot::<Transform>(app.world_mut()),
        world_snapshot::<CharacterMotor>(app.world_mut()),
    )
}

#[test]
fn test_identical_runs_produce_identical_snapshots() {
    let (transforms_a, motors_a) = scripted_run();
    let (transforms_b, motors_b) = scripted_run();

    assert_eq!(transforms_a, transforms_b, "Transform snapshot must match");
    assert_eq!(motors_a, motors_b, "CharacterMotor snapshot must match");
    assert!(!transforms_a.is_empty());
}
