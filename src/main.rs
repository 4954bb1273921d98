//! Interactive viewer for the dissolve effect.
//!
//! Spawns a dissolving mesh with particles and glow, plus an egui control
//! panel. Tab cycles the target shape, Space toggles playback.

use bevy::prelude::*;
use bevy_dissolve::DissolvePlugin;
use bevy_egui::EguiPlugin;

mod scene;
mod ui;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Dissolve Viewer".to_string(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(DissolvePlugin)
        .add_plugins((scene::ScenePlugin, ui::ControlPanelPlugin))
        .run();
}
