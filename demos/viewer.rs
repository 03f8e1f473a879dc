use std::env;

use bevy::prelude::*;
use bevy_level_set::{
    LevelSetPlugin,
    plugin::{
        ExtractedSurface, GridWireframe, LevelSetBuffers, LevelSetSet, LevelSetSettings,
        SamplePoints,
    },
    types::Dimension,
};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

fn main() {
    let mut settings = LevelSetSettings::default();
    if let Some(argument) = env::args().nth(1) {
        let applied = argument
            .parse::<u32>()
            .ok()
            .map(|resolution| settings.set_resolution(resolution));
        if !matches!(applied, Some(Ok(()))) {
            eprintln!("usage: viewer [RESOLUTION]  (an integer of at least 2)");
            std::process::exit(1);
        }
    }

    App::new()
        .add_plugins((
            DefaultPlugins,
            PanOrbitCameraPlugin,
            LevelSetPlugin {
                settings,
                ..default()
            },
        ))
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                attach_materials,
                handle_keys.before(LevelSetSet::Queue),
                report_errors,
            ),
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

    info!(
        "keys: 1/2/3 dimension, +/- resolution, up/down threshold, F field, M animate, \
         G grid, P points, S surface"
    );
}

/// Gives each of the plugin's render entities a material once it exists.
fn attach_materials(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
    surface: Query<Entity, (With<ExtractedSurface>, Without<MeshMaterial3d<StandardMaterial>>)>,
    grid: Query<Entity, (With<GridWireframe>, Without<MeshMaterial3d<StandardMaterial>>)>,
    points: Query<Entity, (With<SamplePoints>, Without<MeshMaterial3d<StandardMaterial>>)>,
) {
    for entity in surface.iter() {
        commands
            .entity(entity)
            .insert(MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.35, 0.65, 0.95),
                // Contours and open surfaces are viewed from both sides.
                cull_mode: None,
                double_sided: true,
                ..Default::default()
            })));
    }
    for entity in grid.iter() {
        commands
            .entity(entity)
            .insert(MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.25, 0.25, 0.3),
                unlit: true,
                ..Default::default()
            })));
    }
    for entity in points.iter() {
        commands
            .entity(entity)
            .insert(MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.95, 0.8, 0.2),
                unlit: true,
                ..Default::default()
            })));
    }
}

fn handle_keys(
    keys: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<LevelSetSettings>,
    mut grid: Query<
        &mut Visibility,
        (With<GridWireframe>, Without<SamplePoints>, Without<ExtractedSurface>),
    >,
    mut points: Query<
        &mut Visibility,
        (With<SamplePoints>, Without<GridWireframe>, Without<ExtractedSurface>),
    >,
    mut surface: Query<
        &mut Visibility,
        (With<ExtractedSurface>, Without<GridWireframe>, Without<SamplePoints>),
    >,
) {
    if keys.just_pressed(KeyCode::Digit1) {
        settings.set_dimension(Dimension::One);
    }
    if keys.just_pressed(KeyCode::Digit2) {
        settings.set_dimension(Dimension::Two);
    }
    if keys.just_pressed(KeyCode::Digit3) {
        settings.set_dimension(Dimension::Three);
    }
    if keys.just_pressed(KeyCode::KeyF) {
        settings.next_field();
        info!("field: {}", settings.field().name());
    }
    if keys.just_pressed(KeyCode::KeyM) {
        settings.toggle_animating();
    }
    if keys.just_pressed(KeyCode::Equal) || keys.just_pressed(KeyCode::NumpadAdd) {
        let resolution = settings.resolution().saturating_add(1);
        let _ = settings.set_resolution(resolution);
        info!("resolution: {resolution}");
    }
    if keys.just_pressed(KeyCode::Minus) || keys.just_pressed(KeyCode::NumpadSubtract) {
        let resolution = settings.resolution().saturating_sub(1).max(2);
        let _ = settings.set_resolution(resolution);
        info!("resolution: {resolution}");
    }
    if keys.just_pressed(KeyCode::ArrowUp) {
        settings.set_threshold(settings.threshold() + 0.05);
        info!("threshold: {:.2}", settings.threshold());
    }
    if keys.just_pressed(KeyCode::ArrowDown) {
        settings.set_threshold(settings.threshold() - 0.05);
        info!("threshold: {:.2}", settings.threshold());
    }

    if keys.just_pressed(KeyCode::KeyG) {
        for mut visibility in &mut grid {
            visibility.toggle_visible_hidden();
        }
    }
    if keys.just_pressed(KeyCode::KeyP) {
        for mut visibility in &mut points {
            visibility.toggle_visible_hidden();
        }
    }
    if keys.just_pressed(KeyCode::KeyS) {
        for mut visibility in &mut surface {
            visibility.toggle_visible_hidden();
        }
    }
}

fn report_errors(buffers: Option<Res<LevelSetBuffers>>) {
    if let Some(buffers) = buffers
        && buffers.is_changed()
        && let Some(error) = &buffers.last_error
    {
        warn!("extraction rejected: {error}");
    }
}
