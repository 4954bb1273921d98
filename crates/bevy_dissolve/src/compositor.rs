//! Glow compositor: a post-process node in the Core3d sub-graph.
//!
//! Three fullscreen passes per view: a bright pass extracts pixels above a
//! soft-kneed luminance threshold into a half-resolution target, a separable
//! Gaussian blur ping-pongs between two half-resolution textures, and a
//! combine pass adds the blurred glow back over the scene. Runs between the
//! end of the main pass and tonemapping, so the glow is authored in linear
//! HDR and tonemapped together with the scene.

use bevy::{
    core_pipeline::core_3d::graph::{Core3d, Node3d},
    ecs::query::QueryItem,
    prelude::*,
    render::{
        camera::ExtractedCamera,
        extract_component::{ExtractComponent, ExtractComponentPlugin},
        render_graph::{
            self, RenderGraphContext, RenderGraphExt, RenderLabel, ViewNode, ViewNodeRunner,
        },
        render_resource::binding_types::{sampler, texture_2d, uniform_buffer_sized},
        render_resource::*,
        renderer::{RenderContext, RenderDevice},
        texture::{CachedTexture, TextureCache},
        view::{ExtractedView, ViewTarget},
        Render, RenderApp, RenderSystems,
    },
};

const GLOW_SHADER_SRC: &str = include_str!("shaders/glow.wgsl");

/// Render graph label for the glow compositor node.
#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct GlowLabel;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-camera glow settings. Insert on an HDR 3D camera to enable the
/// compositor for that view; remove to disable it.
#[derive(Component, ExtractComponent, Clone, Copy, Debug, Reflect)]
#[reflect(Component, Default)]
pub struct GlowSettings {
    /// Linear luminance above which a pixel contributes to the glow.
    pub threshold: f32,
    /// Softening of the threshold cutoff, as a fraction of `threshold`.
    pub soft_knee: f32,
    /// Multiplier applied to the blurred glow before it is added back.
    pub strength: f32,
    /// Number of horizontal+vertical blur rounds; more rounds, wider halo.
    pub passes: u32,
}

impl Default for GlowSettings {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            soft_knee: 0.5,
            strength: 0.8,
            passes: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Uniform block shared by all three passes (must match glow.wgsl).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GlowUniform {
    /// Texel size of the texture being sampled.
    texel: [f32; 2],
    /// Blur direction in texels; zero for the bright and combine passes.
    direction: [f32; 2],
    threshold: f32,
    knee: f32,
    strength: f32,
    _pad: f32,
}

/// Cached glow render pipelines and bind group layouts.
#[derive(Resource)]
pub struct GlowPipeline {
    /// Group 0 for bright/blur: source texture, sampler, uniforms.
    pub filter_layout: BindGroupLayout,
    /// Group 0 for combine: scene texture, glow texture, sampler, uniforms.
    pub combine_layout: BindGroupLayout,
    pub bright_pipeline: CachedRenderPipelineId,
    pub blur_pipeline: CachedRenderPipelineId,
    pub combine_pipeline: CachedRenderPipelineId,
    pub sampler: Sampler,
}

impl GlowPipeline {
    pub fn new(
        device: &RenderDevice,
        pipeline_cache: &PipelineCache,
        shader: Handle<Shader>,
    ) -> Self {
        let filter_entries = BindGroupLayoutEntries::sequential(
            ShaderStages::FRAGMENT,
            (
                texture_2d(TextureSampleType::Float { filterable: true }),
                sampler(SamplerBindingType::Filtering),
                uniform_buffer_sized(false, None),
            ),
        );
        let filter_layout =
            device.create_bind_group_layout(Some("glow_filter_layout"), &filter_entries);
        let filter_layout_desc =
            BindGroupLayoutDescriptor::new("glow_filter_layout", &filter_entries);

        // Same first three slots as the filter layout, plus the blurred glow
        // texture, so all passes share one set of shader bindings.
        let combine_entries = BindGroupLayoutEntries::sequential(
            ShaderStages::FRAGMENT,
            (
                texture_2d(TextureSampleType::Float { filterable: true }),
                sampler(SamplerBindingType::Filtering),
                uniform_buffer_sized(false, None),
                texture_2d(TextureSampleType::Float { filterable: true }),
            ),
        );
        let combine_layout =
            device.create_bind_group_layout(Some("glow_combine_layout"), &combine_entries);
        let combine_layout_desc =
            BindGroupLayoutDescriptor::new("glow_combine_layout", &combine_entries);

        let queue_pass = |label: &'static str,
                          layout: BindGroupLayoutDescriptor,
                          entry_point: &'static str| {
            pipeline_cache.queue_render_pipeline(RenderPipelineDescriptor {
                label: Some(label.into()),
                layout: vec![layout],
                push_constant_ranges: vec![],
                vertex: VertexState {
                    shader: shader.clone(),
                    shader_defs: vec![],
                    entry_point: Some("fullscreen_vertex".into()),
                    buffers: vec![],
                },
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: MultisampleState::default(),
                fragment: Some(FragmentState {
                    shader: shader.clone(),
                    shader_defs: vec![],
                    entry_point: Some(entry_point.into()),
                    targets: vec![Some(ColorTargetState {
                        format: ViewTarget::TEXTURE_FORMAT_HDR,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                zero_initialize_workgroup_memory: false,
            })
        };

        let bright_pipeline =
            queue_pass("glow_bright_pipeline", filter_layout_desc.clone(), "bright_pass");
        let blur_pipeline = queue_pass("glow_blur_pipeline", filter_layout_desc, "blur_pass");
        let combine_pipeline =
            queue_pass("glow_combine_pipeline", combine_layout_desc, "combine_pass");

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("glow_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..Default::default()
        });

        Self {
            filter_layout,
            combine_layout,
            bright_pipeline,
            blur_pipeline,
            combine_pipeline,
            sampler,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-view textures
// ---------------------------------------------------------------------------

/// Half-resolution ping-pong targets for one view. Recreated per frame from
/// the texture cache, which reuses allocations when the size is unchanged.
#[derive(Component)]
pub struct GlowTextures {
    pub ping: CachedTexture,
    pub pong: CachedTexture,
    pub half_size: UVec2,
}

/// Allocate the ping-pong textures for every view that has glow enabled.
pub fn prepare_glow_textures(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    mut texture_cache: ResMut<TextureCache>,
    views: Query<(Entity, &ExtractedCamera), (With<GlowSettings>, With<ExtractedView>)>,
) {
    for (entity, camera) in &views {
        let Some(target_size) = camera.physical_target_size else {
            continue;
        };
        let half_size = (target_size / 2).max(UVec2::ONE);

        let descriptor = TextureDescriptor {
            label: Some("glow_half_res"),
            size: Extent3d {
                width: half_size.x,
                height: half_size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: ViewTarget::TEXTURE_FORMAT_HDR,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        };

        let ping = texture_cache.get(&render_device, descriptor.clone());
        let pong = texture_cache.get(&render_device, descriptor);
        commands.entity(entity).insert(GlowTextures {
            ping,
            pong,
            half_size,
        });
    }
}

// ---------------------------------------------------------------------------
// ViewNode
// ---------------------------------------------------------------------------

/// Glow compositor node — runs once per glow-enabled camera view.
#[derive(Default)]
pub struct GlowNode;

impl GlowNode {
    /// One fullscreen filter pass (bright or blur): sample `source`, write
    /// `destination`.
    #[allow(clippy::too_many_arguments)]
    fn filter_pass(
        render_context: &mut RenderContext,
        pipeline: &GlowPipeline,
        render_pipeline: &RenderPipeline,
        label: &'static str,
        source: &TextureView,
        destination: &TextureView,
        uniform: &GlowUniform,
    ) {
        let device = render_context.render_device().clone();
        let uniform_buffer = device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(uniform),
            usage: BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(
            label,
            &pipeline.filter_layout,
            &BindGroupEntries::sequential((
                source,
                &pipeline.sampler,
                uniform_buffer.as_entire_binding(),
            )),
        );

        let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: destination,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Default::default()),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_render_pipeline(render_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

impl ViewNode for GlowNode {
    type ViewQuery = (
        &'static ViewTarget,
        &'static GlowSettings,
        &'static GlowTextures,
    );

    fn run<'w>(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext<'w>,
        (view_target, settings, textures): QueryItem<'w, '_, Self::ViewQuery>,
        world: &'w World,
    ) -> Result<(), render_graph::NodeRunError> {
        // The pipelines target Rgba16Float; skip LDR views outright.
        if view_target.main_texture_format() != ViewTarget::TEXTURE_FORMAT_HDR {
            return Ok(());
        }

        let Some(pipeline) = world.get_resource::<GlowPipeline>() else {
            return Ok(());
        };
        let pipeline_cache = world.resource::<PipelineCache>();
        let (Some(bright), Some(blur), Some(combine)) = (
            pipeline_cache.get_render_pipeline(pipeline.bright_pipeline),
            pipeline_cache.get_render_pipeline(pipeline.blur_pipeline),
            pipeline_cache.get_render_pipeline(pipeline.combine_pipeline),
        ) else {
            return Ok(()); // Pipelines not compiled yet
        };

        // Flip once up front: `source` is the resolved scene, `destination`
        // receives the composited output.
        let post_process = view_target.post_process_write();
        let half_texel = Vec2::ONE / textures.half_size.as_vec2();

        // Pass 1: threshold the scene into the half-res ping target.
        Self::filter_pass(
            render_context,
            pipeline,
            bright,
            "glow_bright_pass",
            post_process.source,
            &textures.ping.default_view,
            &GlowUniform {
                texel: half_texel.to_array(),
                direction: [0.0, 0.0],
                threshold: settings.threshold,
                knee: settings.threshold * settings.soft_knee,
                strength: settings.strength,
                _pad: 0.0,
            },
        );

        // Pass 2: separable blur, ping -> pong -> ping per round. The result
        // always lands back in ping.
        for _ in 0..settings.passes.max(1) {
            for (source, destination, direction) in [
                (&textures.ping, &textures.pong, [1.0, 0.0]),
                (&textures.pong, &textures.ping, [0.0, 1.0]),
            ] {
                Self::filter_pass(
                    render_context,
                    pipeline,
                    blur,
                    "glow_blur_pass",
                    &source.default_view,
                    &destination.default_view,
                    &GlowUniform {
                        texel: half_texel.to_array(),
                        direction,
                        threshold: 0.0,
                        knee: 0.0,
                        strength: 0.0,
                        _pad: 0.0,
                    },
                );
            }
        }

        // Pass 3: scene + strength * glow into the post-process destination.
        let device = render_context.render_device().clone();
        let uniform_buffer = device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("glow_combine_uniform"),
            contents: bytemuck::bytes_of(&GlowUniform {
                texel: half_texel.to_array(),
                direction: [0.0, 0.0],
                threshold: settings.threshold,
                knee: settings.threshold * settings.soft_knee,
                strength: settings.strength,
                _pad: 0.0,
            }),
            usage: BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(
            "glow_combine_bg",
            &pipeline.combine_layout,
            &BindGroupEntries::sequential((
                post_process.source,
                &pipeline.sampler,
                uniform_buffer.as_entire_binding(),
                &textures.ping.default_view,
            )),
        );

        let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("glow_combine_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: post_process.destination,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Default::default()),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_render_pipeline(combine);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Registers the glow compositor: settings extraction, per-view texture
/// preparation, pipelines, and the render graph node.
pub struct GlowPlugin;

impl Plugin for GlowPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<GlowSettings>()
            .add_plugins(ExtractComponentPlugin::<GlowSettings>::default());

        if let Some(render_app) = app.get_sub_app_mut(RenderApp) {
            render_app.add_systems(
                Render,
                prepare_glow_textures.in_set(RenderSystems::Prepare),
            );
        }
    }

    fn finish(&self, app: &mut App) {
        // Load the shader into the main world's Assets<Shader>; the render
        // world has no such resource.
        let shader = {
            let mut shaders = app.world_mut().resource_mut::<Assets<Shader>>();
            shaders.add(Shader::from_wgsl(GLOW_SHADER_SRC.to_string(), "glow.wgsl"))
        };

        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        let render_device = render_app.world().resource::<RenderDevice>().clone();
        let glow_pipeline = {
            let pipeline_cache = render_app.world().resource::<PipelineCache>();
            GlowPipeline::new(&render_device, pipeline_cache, shader)
        };
        render_app.insert_resource(glow_pipeline);

        render_app
            .add_render_graph_node::<ViewNodeRunner<GlowNode>>(Core3d, GlowLabel)
            .add_render_graph_edges(
                Core3d,
                (Node3d::EndMainPass, GlowLabel, Node3d::Tonemapping),
            );
    }
}
