use anyhow::Context;
use bevy::prelude::*;
use bevy_terrain_lod::prelude::*;
use std::{path::Path, sync::Arc};

const SCENE_PATH: &str = "assets/scene.ron";
const FLIGHT_RADIUS: f32 = 900.0;
const FLIGHT_SPEED: f32 = 0.05;

#[derive(Resource)]
struct DemoScene {
    descriptor: SceneDescriptor,
    height_field: Arc<HeightField>,
}

fn main() -> anyhow::Result<()> {
    let (descriptor, height_field) = load_scene()?;

    App::new()
        .add_plugins((DefaultPlugins, TerrainLodPlugin::default()))
        .insert_resource(DemoScene {
            descriptor,
            height_field: Arc::new(height_field),
        })
        .add_systems(Startup, setup)
        .add_systems(Update, fly_viewer)
        .run();

    Ok(())
}

fn load_scene() -> anyhow::Result<(SceneDescriptor, HeightField)> {
    let descriptor = if Path::new(SCENE_PATH).exists() {
        SceneDescriptor::load(SCENE_PATH).context("failed to load the scene descriptor")?
    } else {
        SceneDescriptor::default()
    };

    let height_field = match &descriptor.heightmap {
        Some(path) => load_height_field(path, descriptor.resolution)
            .with_context(|| format!("failed to load the height map {path}"))?,
        None => procedural_height_field()?,
    };

    Ok((descriptor, height_field))
}

/// Rolling hills with a ridge running through the middle, normalized to `[0, 1]`.
fn procedural_height_field() -> anyhow::Result<HeightField> {
    let size = 257;

    let height_field = HeightField::from_fn(size, size, 1.0, |column, row| {
        let x = column as f32 / (size - 1) as f32;
        let z = row as f32 / (size - 1) as f32;

        let hills = (x * 9.0).sin() * (z * 7.0).cos() * 0.15;
        let ridge = (1.0 - ((x - z) * 3.0).abs()).max(0.0) * 0.5;

        (0.3 + hills + ridge).clamp(0.0, 1.0)
    })?;

    Ok(height_field)
}

fn setup(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
    scene: Res<DemoScene>,
) {
    let width = scene.descriptor.terrain.width;

    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.35, 0.45, 0.3),
        perceptual_roughness: 1.0,
        ..default()
    });

    // center the terrain around the origin
    let transform = Transform::from_xyz(-width / 2.0, 0.0, -width / 2.0);

    TerrainSceneBuilder::from_descriptor(
        &scene.descriptor,
        scene.height_field.clone(),
        material,
        transform,
    )
    .queue(&mut commands);

    commands.spawn((
        TerrainViewer,
        Camera3d::default(),
        Transform::from_xyz(0.0, 350.0, 0.0).looking_at(Vec3::new(100.0, 250.0, 0.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            ..default()
        },
        Transform::from_xyz(0.01, 1.0, 0.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn fly_viewer(time: Res<Time>, mut viewers: Query<&mut Transform, With<TerrainViewer>>) {
    let angle = time.elapsed_secs() * FLIGHT_SPEED;
    let position = Vec3::new(angle.cos() * FLIGHT_RADIUS, 350.0, angle.sin() * FLIGHT_RADIUS);
    let direction = Vec3::new(-angle.sin(), -0.2, angle.cos());

    for mut transform in &mut viewers {
        *transform = Transform::from_translation(position).looking_to(direction, Vec3::Y);
    }
}
