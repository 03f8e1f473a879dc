use std::time::Duration;

use bevy::prelude::*;
use bevy_level_set::{
    LevelSetPlugin,
    plugin::{ExtractedSurface, LevelSetBuffers, LevelSetSet, LevelSetSettings},
};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

#[derive(Resource)]
struct FieldTimer(Timer);

fn main() {
    let mut settings = LevelSetSettings::default();
    settings.set_animating(true);
    let _ = settings.set_resolution(48);

    App::new()
        .add_plugins((
            DefaultPlugins,
            PanOrbitCameraPlugin,
            LevelSetPlugin {
                settings,
                ..default()
            },
        ))
        .insert_resource(FieldTimer(Timer::new(
            Duration::from_secs(8),
            TimerMode::Repeating,
        )))
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (attach_material, cycle_fields.before(LevelSetSet::Queue)),
        )
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera::default(),
        Transform::from_xyz(2.2, 1.6, 2.2).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::FULL_DAYLIGHT,
            ..Default::default()
        },
        Transform::default().with_rotation(Quat::from_rotation_x(-45.0_f32.to_radians())),
    ));
}

fn attach_material(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
    surface: Query<Entity, (With<ExtractedSurface>, Without<MeshMaterial3d<StandardMaterial>>)>,
) {
    for entity in surface.iter() {
        commands
            .entity(entity)
            .insert(MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.9, 0.4, 0.3),
                cull_mode: None,
                double_sided: true,
                ..Default::default()
            })));
    }
}

fn cycle_fields(
    time: Res<Time>,
    mut timer: ResMut<FieldTimer>,
    mut settings: ResMut<LevelSetSettings>,
    buffers: Res<LevelSetBuffers>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        info!(
            "{}: {} primitives in the last upload",
            settings.field().name(),
            buffers.counts.surface_primitives,
        );
        settings.next_field();
    }
}
