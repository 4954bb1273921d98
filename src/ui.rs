//! egui control panel: boundary parameters, playback, particles, glow,
//! and presets.

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use bevy_dissolve::{
    default_presets, Direction, DissolveParams, GlowSettings, MotionModel, ParticleParams,
    Playback, TrajectoryConfig, VelocityConfig,
};

use crate::scene::DissolveTarget;

fn color_edit(ui: &mut egui::Ui, label: &str, color: &mut LinearRgba) -> bool {
    let mut rgb = [color.red, color.green, color.blue];
    ui.label(label);
    let changed = ui.color_edit_button_rgb(&mut rgb).changed();
    if changed {
        color.red = rgb[0];
        color.green = rgb[1];
        color.blue = rgb[2];
    }
    ui.end_row();
    changed
}

#[allow(clippy::too_many_lines)]
fn control_panel(
    mut contexts: EguiContexts,
    mut targets: Query<
        (&mut DissolveParams, &mut Playback, &mut ParticleParams),
        With<DissolveTarget>,
    >,
    mut glows: Query<&mut GlowSettings>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };
    let Ok((mut params, mut playback, mut particles)) = targets.single_mut() else {
        return;
    };

    egui::Window::new("Dissolve")
        .anchor(egui::Align2::LEFT_TOP, [12.0, 12.0])
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Boundary");
            egui::Grid::new("boundary_grid").num_columns(2).show(ui, |ui| {
                ui.label("Progress");
                ui.add(egui::Slider::new(&mut params.progress, -20.0..=20.0));
                ui.end_row();
                ui.label("Frequency");
                ui.add(egui::Slider::new(&mut params.frequency, 0.01..=2.0));
                ui.end_row();
                ui.label("Amplitude");
                ui.add(egui::Slider::new(&mut params.amplitude, 0.0..=24.0));
                ui.end_row();
                ui.label("Edge width");
                ui.add(egui::Slider::new(&mut params.edge_width, 0.0..=4.0));
                ui.end_row();
                color_edit(ui, "Edge color", &mut params.edge_color);
            });

            ui.separator();
            ui.heading("Playback");
            ui.horizontal(|ui| {
                let label = if playback.playing { "Pause" } else { "Play" };
                if ui.button(label).clicked() {
                    playback.playing = !playback.playing;
                }
                for direction in Direction::ALL {
                    if ui
                        .selectable_label(playback.direction == direction, direction.label())
                        .clicked()
                    {
                        playback.direction = direction;
                    }
                }
            });
            ui.add(egui::Slider::new(&mut playback.speed, 0.0..=0.5).text("Speed"));

            ui.separator();
            ui.heading("Particles");
            ui.checkbox(&mut particles.visible, "Visible");
            ui.add(egui::Slider::new(&mut particles.base_size, 1.0..=200.0).text("Base size"));
            egui::Grid::new("particle_grid").num_columns(2).show(ui, |ui| {
                color_edit(ui, "Color", &mut particles.color);
            });

            ui.horizontal(|ui| {
                let is_trajectory = matches!(particles.motion, MotionModel::Trajectory(_));
                if ui.selectable_label(is_trajectory, "Trajectory").clicked() && !is_trajectory {
                    particles.motion = MotionModel::Trajectory(TrajectoryConfig::default());
                }
                if ui.selectable_label(!is_trajectory, "Velocity").clicked() && is_trajectory {
                    particles.motion = MotionModel::Velocity(VelocityConfig::default());
                }
            });

            match &mut particles.motion {
                MotionModel::Trajectory(cfg) => {
                    ui.add(
                        egui::Slider::new(&mut cfg.end_distance, 1.0..=60.0).text("End distance"),
                    );
                    ui.add(
                        egui::Slider::new(&mut cfg.control_distance, 0.0..=30.0)
                            .text("Control distance"),
                    );
                    ui.add(egui::Slider::new(&mut cfg.spin_rate, 0.0..=8.0).text("Spin rate"));
                }
                MotionModel::Velocity(cfg) => {
                    ui.add(egui::Slider::new(&mut cfg.max_offset, 0.1..=10.0).text("Max offset"));
                    ui.add(egui::Slider::new(&mut cfg.speed, 0.0..=0.2).text("Loop speed"));
                    ui.add(
                        egui::Slider::new(&mut cfg.turbulence_strength, 0.0..=2.0)
                            .text("Turbulence"),
                    );
                }
            }

            ui.separator();
            ui.heading("Glow");
            if let Ok(mut glow) = glows.single_mut() {
                ui.add(egui::Slider::new(&mut glow.threshold, 0.0..=4.0).text("Threshold"));
                ui.add(egui::Slider::new(&mut glow.soft_knee, 0.0..=1.0).text("Soft knee"));
                ui.add(egui::Slider::new(&mut glow.strength, 0.0..=4.0).text("Strength"));
                ui.add(egui::Slider::new(&mut glow.passes, 1..=8).text("Blur passes"));
            }

            ui.separator();
            ui.heading("Presets");
            ui.horizontal_wrapped(|ui| {
                for (name, preset) in default_presets() {
                    if ui.button(name).clicked() {
                        *params = preset.params;
                        *playback = preset.playback;
                        *particles = preset.particles;
                    }
                }
            });

            ui.separator();
            ui.small("Tab: next shape   Space: play/pause   R: reverse");
        });
}

pub struct ControlPanelPlugin;

impl Plugin for ControlPanelPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(EguiPrimaryContextPass, control_panel);
    }
}
