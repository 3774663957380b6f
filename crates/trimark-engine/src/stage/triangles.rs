use std::num::NonZeroU64;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;

use super::flags::{resolve, ResolvedFlags, StageOptions, Strategy};
use super::instances::{Instance, InstanceSet};
use super::partition;
use super::shaders::{self, ShaderVariant};
use super::Stage;

/// Clear color behind the triangle field (mid-gray).
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.5,
    g: 0.5,
    b: 0.5,
    a: 1.0,
};

/// Shared 3-vertex template, `vec4(x, y, z, w)` per vertex.
const TEMPLATE_POSITIONS: [[f32; 4]; 3] = [
    [0.0, 0.1, 0.0, 1.0],
    [-0.1, -0.1, 0.0, 1.0],
    [0.1, -0.1, 0.0, 1.0],
];

/// Per-vertex template colors (red, green, blue).
const TEMPLATE_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
];

/// Floats in one per-draw parameter slot:
/// scale, time, offset_x, offset_y, scalar, scalar_offset.
const SLOT_FLOATS: usize = 6;

/// Byte size of the bound window into a parameter slot.
const SLOT_BYTES: u64 = (SLOT_FLOATS * 4) as u64;

/// Index of the time field inside a parameter slot.
const SLOT_TIME: usize = 1;

/// Floats per instance in a uniform block (two 16-byte rows).
const BLOCK_INSTANCE_FLOATS: usize = 8;

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];

fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 16,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRS,
    }
}

fn color_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 16,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &COLOR_ATTRS,
    }
}

/// One vertex worth of animation parameters for the attributes path.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct TransformVertex {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
    scalar: f32,
    scalar_offset: f32,
}

impl TransformVertex {
    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32, // scale
        3 => Float32, // offset_x
        4 => Float32, // offset_y
        5 => Float32, // scalar
        6 => Float32  // scalar_offset
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TransformVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    fn from_instance(item: &Instance) -> Self {
        Self {
            scale: item.scale,
            offset_x: item.offset_x,
            offset_y: item.offset_y,
            scalar: item.scalar,
            scalar_offset: item.scalar_offset,
        }
    }
}

/// Arguments for one batched triangle record, in wgpu's indirect draw layout.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Pod, Zeroable)]
struct DrawIndirectRecord {
    vertex_count: u32,
    instance_count: u32,
    first_vertex: u32,
    first_instance: u32,
}

/// The triangle benchmark stage.
///
/// Owns a growable triangle workload and renders it with the submission
/// strategy resolved from its options on the first frame. Shader or
/// pipeline rejection at that point is fatal: the failure is logged once
/// and the stage stays inert for the rest of the run.
pub struct TriangleStage {
    options: StageOptions,
    instances: InstanceSet,
    init: InitState,
    start_time: Option<f32>,
}

enum InitState {
    Pending,
    Ready(Box<GpuState>),
    Failed,
}

impl TriangleStage {
    pub fn new(options: StageOptions) -> Self {
        Self::with_instances(options, InstanceSet::new())
    }

    /// Deterministic stage for reproducible runs.
    pub fn with_seed(options: StageOptions, seed: u64) -> Self {
        Self::with_instances(options, InstanceSet::with_seed(seed))
    }

    fn with_instances(options: StageOptions, instances: InstanceSet) -> Self {
        Self {
            options,
            instances,
            init: InitState::Pending,
            start_time: None,
        }
    }

    pub fn options(&self) -> StageOptions {
        self.options
    }

    /// Effective flags after capability normalization.
    ///
    /// `None` until the first frame has initialized the GPU side.
    pub fn resolved(&self) -> Option<ResolvedFlags> {
        match &self.init {
            InitState::Ready(state) => Some(state.flags),
            _ => None,
        }
    }
}

impl Stage for TriangleStage {
    fn tune(&mut self, delta: i64) {
        self.instances.tune(delta);
    }

    fn animate(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, time: FrameTime) {
        if matches!(self.init, InitState::Pending) {
            self.init = match GpuState::build(ctx, self.options) {
                Ok(state) => InitState::Ready(Box::new(state)),
                Err(err) => {
                    log::error!("triangle stage initialization failed: {err:#}");
                    InitState::Failed
                }
            };
        }

        let InitState::Ready(state) = &mut self.init else {
            return;
        };

        let start = *self.start_time.get_or_insert(time.elapsed);
        let elapsed = time.elapsed - start;

        state.sync(ctx, &self.instances);
        state.draw(ctx, target, self.instances.live(), elapsed);
    }

    fn complexity(&self) -> u64 {
        self.instances.live() as u64
    }
}

/// Frame-shared time uniform (group 0 for the attribute and block paths).
struct TimeUniform {
    layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl TimeUniform {
    fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("trimark frame time bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(4),
                },
                count: None,
            }],
        });

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("trimark frame time"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("trimark frame time group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            layout,
            buffer,
            bind_group,
        }
    }
}

/// GPU residency for the resolved strategy.
///
/// The pipeline and layouts are fixed at initialization; capacity-sized
/// resources live in the strategy's `res` slot and are rebuilt whenever the
/// instance-set generation moves.
struct GpuState {
    flags: ResolvedFlags,
    pipeline: wgpu::RenderPipeline,
    strategy: StrategyState,
    synced: Option<u64>,
}

enum StrategyState {
    Uniforms {
        params_layout: wgpu::BindGroupLayout,
        /// Bytes between per-draw slots (the device's dynamic-offset alignment).
        slot_stride: usize,
        positions: wgpu::Buffer,
        colors: wgpu::Buffer,
        res: Option<UniformRes>,
    },
    Attributes {
        time: TimeUniform,
        multi_draw: bool,
        res: Option<AttributeRes>,
    },
    UboMultiDraw {
        time: TimeUniform,
        block_layout: wgpu::BindGroupLayout,
        block_instances: usize,
        res: Option<UboRes>,
    },
}

struct UniformRes {
    params: wgpu::Buffer,
    params_group: wgpu::BindGroup,
    staging: Vec<f32>,
}

struct AttributeRes {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    transforms: wgpu::Buffer,
    indirect: Option<wgpu::Buffer>,
}

struct UboRes {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    blocks: Vec<wgpu::BindGroup>,
    indirect: wgpu::Buffer,
}

impl GpuState {
    /// Resolves the strategy and builds the pipeline for it.
    ///
    /// Module and pipeline creation run inside a validation error scope;
    /// any rejection surfaces here as a hard error.
    fn build(ctx: &RenderCtx<'_>, options: StageOptions) -> Result<Self> {
        let flags = resolve(options, ctx.caps);
        let block_instances = partition::max_block_instances(ctx.caps.max_uniform_block_bytes());

        let variant = match flags.strategy {
            Strategy::Uniforms => ShaderVariant::Uniforms,
            Strategy::Attributes => ShaderVariant::Attributes,
            Strategy::UboMultiDraw => ShaderVariant::Ubos,
        };
        let source = shaders::module_source(variant, block_instances);

        let error_scope = ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("trimark triangle shader"),
            source: wgpu::ShaderSource::Wgsl(source),
        });

        let strategy = match flags.strategy {
            Strategy::Uniforms => {
                let params_layout =
                    ctx.device
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some("trimark triangle params bgl"),
                            entries: &[wgpu::BindGroupLayoutEntry {
                                binding: 0,
                                visibility: wgpu::ShaderStages::VERTEX,
                                ty: wgpu::BindingType::Buffer {
                                    ty: wgpu::BufferBindingType::Uniform,
                                    has_dynamic_offset: true,
                                    min_binding_size: NonZeroU64::new(SLOT_BYTES),
                                },
                                count: None,
                            }],
                        });

                StrategyState::Uniforms {
                    params_layout,
                    slot_stride: ctx.caps.uniform_offset_alignment() as usize,
                    positions: vertex_buffer(ctx, "trimark triangle positions", &TEMPLATE_POSITIONS),
                    colors: vertex_buffer(ctx, "trimark triangle colors", &TEMPLATE_COLORS),
                    res: None,
                }
            }

            Strategy::Attributes => StrategyState::Attributes {
                time: TimeUniform::new(ctx.device),
                multi_draw: flags.multi_draw,
                res: None,
            },

            Strategy::UboMultiDraw => {
                let block_bytes = (block_instances * partition::BYTES_PER_INSTANCE as usize) as u64;
                let block_layout =
                    ctx.device
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some("trimark triangle block bgl"),
                            entries: &[wgpu::BindGroupLayoutEntry {
                                binding: 0,
                                visibility: wgpu::ShaderStages::VERTEX,
                                ty: wgpu::BindingType::Buffer {
                                    ty: wgpu::BufferBindingType::Uniform,
                                    has_dynamic_offset: false,
                                    min_binding_size: NonZeroU64::new(block_bytes),
                                },
                                count: None,
                            }],
                        });

                StrategyState::UboMultiDraw {
                    time: TimeUniform::new(ctx.device),
                    block_layout,
                    block_instances,
                    res: None,
                }
            }
        };

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = match &strategy {
            StrategyState::Uniforms { params_layout, .. } => vec![params_layout],
            StrategyState::Attributes { time, .. } => vec![&time.layout],
            StrategyState::UboMultiDraw {
                time, block_layout, ..
            } => vec![&time.layout, block_layout],
        };

        let vertex_layouts: Vec<wgpu::VertexBufferLayout<'_>> = match flags.strategy {
            Strategy::Uniforms | Strategy::UboMultiDraw => vec![position_layout(), color_layout()],
            Strategy::Attributes => {
                vec![position_layout(), color_layout(), TransformVertex::layout()]
            }
        };

        let pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("trimark triangle pipeline layout"),
                    bind_group_layouts: &bind_group_layouts,
                    immediate_size: 0,
                });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("trimark triangle pipeline"),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &vertex_layouts,
                },

                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),

                multiview_mask: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(error_scope.pop()) {
            anyhow::bail!("shader module or pipeline rejected: {error}");
        }

        log::debug!(
            "triangle stage ready: {:?}, multi_draw: {}, block capacity: {}",
            flags.strategy,
            flags.multi_draw,
            block_instances
        );

        Ok(Self {
            flags,
            pipeline,
            strategy,
            synced: None,
        })
    }

    /// Rebuilds capacity-sized GPU storage when the instance set has been
    /// reallocated since the last sync.
    fn sync(&mut self, ctx: &RenderCtx<'_>, instances: &InstanceSet) {
        if instances.capacity() == 0 || self.synced == Some(instances.generation()) {
            return;
        }

        let capacity = instances.capacity();
        let items = instances.items();

        match &mut self.strategy {
            StrategyState::Uniforms {
                params_layout,
                slot_stride,
                res,
                ..
            } => {
                let staging = uniform_slots(items, *slot_stride / 4);

                let params = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("trimark triangle params"),
                    size: (capacity * *slot_stride) as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let params_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("trimark triangle params group"),
                    layout: params_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &params,
                            offset: 0,
                            size: NonZeroU64::new(SLOT_BYTES),
                        }),
                    }],
                });

                *res = Some(UniformRes {
                    params,
                    params_group,
                    staging,
                });
            }

            StrategyState::Attributes {
                multi_draw, res, ..
            } => {
                let transforms = transform_vertices(items);

                *res = Some(AttributeRes {
                    positions: vertex_buffer(
                        ctx,
                        "trimark triangle positions",
                        &replicate_template(&TEMPLATE_POSITIONS, capacity),
                    ),
                    colors: vertex_buffer(
                        ctx,
                        "trimark triangle colors",
                        &replicate_template(&TEMPLATE_COLORS, capacity),
                    ),
                    transforms: ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("trimark triangle transforms"),
                        contents: bytemuck::cast_slice(&transforms),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
                    indirect: multi_draw
                        .then(|| indirect_buffer(ctx, &indirect_records(capacity, None))),
                });
            }

            StrategyState::UboMultiDraw {
                block_layout,
                block_instances,
                res,
                ..
            } => {
                let blocks = block_data(items, *block_instances)
                    .into_iter()
                    .map(|chunk| {
                        let buffer =
                            ctx.device
                                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                    label: Some("trimark triangle block"),
                                    contents: bytemuck::cast_slice(&chunk),
                                    usage: wgpu::BufferUsages::UNIFORM,
                                });
                        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some("trimark triangle block group"),
                            layout: block_layout,
                            entries: &[wgpu::BindGroupEntry {
                                binding: 0,
                                resource: buffer.as_entire_binding(),
                            }],
                        })
                    })
                    .collect();

                *res = Some(UboRes {
                    positions: vertex_buffer(
                        ctx,
                        "trimark triangle positions",
                        &replicate_template(&TEMPLATE_POSITIONS, capacity),
                    ),
                    colors: vertex_buffer(
                        ctx,
                        "trimark triangle colors",
                        &replicate_template(&TEMPLATE_COLORS, capacity),
                    ),
                    blocks,
                    indirect: indirect_buffer(
                        ctx,
                        &indirect_records(capacity, Some(*block_instances)),
                    ),
                });
            }
        }

        self.synced = Some(instances.generation());
    }

    /// Uploads the frame's time-varying state, then records the draw pass.
    fn draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        live: usize,
        elapsed: f32,
    ) {
        if live == 0 {
            return;
        }

        // Queue writes land before the encoder's submission, so they must
        // all be issued before the pass is recorded.
        match &mut self.strategy {
            StrategyState::Uniforms {
                slot_stride, res, ..
            } => {
                let Some(res) = res.as_mut() else { return };
                let stride_floats = *slot_stride / 4;
                for i in 0..live {
                    res.staging[i * stride_floats + SLOT_TIME] = elapsed;
                }
                ctx.queue.write_buffer(
                    &res.params,
                    0,
                    bytemuck::cast_slice(&res.staging[..live * stride_floats]),
                );
            }
            StrategyState::Attributes { time, .. } | StrategyState::UboMultiDraw { time, .. } => {
                ctx.queue
                    .write_buffer(&time.buffer, 0, bytemuck::bytes_of(&elapsed));
            }
        }

        let mut rpass = target
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("trimark triangle pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

        rpass.set_pipeline(&self.pipeline);

        match &self.strategy {
            StrategyState::Uniforms {
                slot_stride,
                positions,
                colors,
                res,
                ..
            } => {
                let Some(res) = res.as_ref() else { return };
                rpass.set_vertex_buffer(0, positions.slice(..));
                rpass.set_vertex_buffer(1, colors.slice(..));
                for i in 0..live {
                    rpass.set_bind_group(0, &res.params_group, &[(i * *slot_stride) as u32]);
                    rpass.draw(0..3, 0..1);
                }
            }

            StrategyState::Attributes {
                time,
                multi_draw,
                res,
            } => {
                let Some(res) = res.as_ref() else { return };
                rpass.set_bind_group(0, &time.bind_group, &[]);
                rpass.set_vertex_buffer(0, res.positions.slice(..));
                rpass.set_vertex_buffer(1, res.colors.slice(..));
                rpass.set_vertex_buffer(2, res.transforms.slice(..));

                if let (true, Some(indirect)) = (*multi_draw, res.indirect.as_ref()) {
                    rpass.multi_draw_indirect(indirect, 0, live as u32);
                } else {
                    for i in 0..live {
                        let base = (i * 3) as u32;
                        rpass.draw(base..base + 3, 0..1);
                    }
                }
            }

            StrategyState::UboMultiDraw {
                time,
                block_instances,
                res,
                ..
            } => {
                let Some(res) = res.as_ref() else { return };
                rpass.set_bind_group(0, &time.bind_group, &[]);
                rpass.set_vertex_buffer(0, res.positions.slice(..));
                rpass.set_vertex_buffer(1, res.colors.slice(..));

                let record_bytes = std::mem::size_of::<DrawIndirectRecord>();
                for index in 0..partition::block_count(live, *block_instances) {
                    let Some(group) = res.blocks.get(index) else { break };
                    let count = partition::live_in_block(live, *block_instances, index);
                    let offset = (index * *block_instances * record_bytes) as u64;

                    rpass.set_bind_group(1, group, &[]);
                    rpass.multi_draw_indirect(&res.indirect, offset, count as u32);
                }
            }
        }
    }
}

fn vertex_buffer(ctx: &RenderCtx<'_>, label: &str, data: &[[f32; 4]]) -> wgpu::Buffer {
    ctx.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX,
        })
}

fn indirect_buffer(ctx: &RenderCtx<'_>, records: &[DrawIndirectRecord]) -> wgpu::Buffer {
    ctx.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("trimark triangle indirect args"),
            contents: bytemuck::cast_slice(records),
            usage: wgpu::BufferUsages::INDIRECT,
        })
}

/// Packs parameters into per-draw slots of `stride_floats` each.
///
/// The time field (slot index 1) is left zero; it is rewritten for every
/// live slot on every frame.
fn uniform_slots(items: &[Instance], stride_floats: usize) -> Vec<f32> {
    let mut data = vec![0.0; items.len() * stride_floats];
    for (i, item) in items.iter().enumerate() {
        let base = i * stride_floats;
        data[base] = item.scale;
        data[base + 2] = item.offset_x;
        data[base + 3] = item.offset_y;
        data[base + 4] = item.scalar;
        data[base + 5] = item.scalar_offset;
    }
    data
}

/// Replicates the 3-vertex template across `capacity` triangles.
fn replicate_template(template: &[[f32; 4]; 3], capacity: usize) -> Vec<[f32; 4]> {
    let mut data = Vec::with_capacity(capacity * 3);
    for _ in 0..capacity {
        data.extend_from_slice(template);
    }
    data
}

/// Expands instances to one parameter record per vertex (3 per triangle).
fn transform_vertices(items: &[Instance]) -> Vec<TransformVertex> {
    let mut data = Vec::with_capacity(items.len() * 3);
    for item in items {
        let v = TransformVertex::from_instance(item);
        data.extend_from_slice(&[v, v, v]);
    }
    data
}

/// Packs instances into uniform-block chunks of `per_block` each.
///
/// Short tails are zero-padded to the full block: the shader binds a
/// fixed-size array, so every block buffer must span it.
fn block_data(items: &[Instance], per_block: usize) -> Vec<Vec<f32>> {
    items
        .chunks(per_block)
        .map(|chunk| {
            let mut data = vec![0.0f32; per_block * BLOCK_INSTANCE_FLOATS];
            for (i, item) in chunk.iter().enumerate() {
                let base = i * BLOCK_INSTANCE_FLOATS;
                data[base] = item.scale;
                data[base + 1] = item.offset_x;
                data[base + 2] = item.offset_y;
                data[base + 3] = item.scalar;
                data[base + 4] = item.scalar_offset;
            }
            data
        })
        .collect()
}

/// Precomputes one batched record per triangle over the full capacity.
///
/// With `per_block` set, `first_instance` carries the triangle's slot
/// within its uniform block; otherwise the attribute path ignores it.
fn indirect_records(capacity: usize, per_block: Option<usize>) -> Vec<DrawIndirectRecord> {
    (0..capacity)
        .map(|i| DrawIndirectRecord {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: (i * 3) as u32,
            first_instance: match per_block {
                Some(per_block) => (i % per_block) as u32,
                None => 0,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(scale: f32) -> Instance {
        Instance {
            scale,
            offset_x: 0.1,
            offset_y: -0.2,
            scalar: 1.5,
            scalar_offset: 4.0,
        }
    }

    // ── stage surface ─────────────────────────────────────────────────────

    #[test]
    fn complexity_tracks_clamped_tuning() {
        let mut stage = TriangleStage::with_seed(StageOptions::default(), 3);
        assert_eq!(stage.complexity(), 0);

        stage.tune(500);
        assert_eq!(stage.complexity(), 500);

        stage.tune(-1000);
        assert_eq!(stage.complexity(), 0);
    }

    #[test]
    fn resolved_is_none_before_first_frame() {
        let stage = TriangleStage::with_seed(StageOptions::default(), 3);
        assert!(stage.resolved().is_none());
    }

    // ── slot packing ──────────────────────────────────────────────────────

    #[test]
    fn uniform_slots_follow_device_stride() {
        let items = [instance(0.25), instance(0.3)];
        let data = uniform_slots(&items, 64);

        assert_eq!(data.len(), 2 * 64);
        assert_eq!(data[0], 0.25);
        assert_eq!(data[SLOT_TIME], 0.0);
        assert_eq!(data[2], 0.1);
        assert_eq!(data[64], 0.3);
        assert_eq!(data[64 + 5], 4.0);
    }

    #[test]
    fn transform_vertices_replicate_per_vertex() {
        let items = [instance(0.25), instance(0.3)];
        let data = transform_vertices(&items);

        assert_eq!(data.len(), 6);
        assert_eq!(data[0], data[2]);
        assert_eq!(data[3].scale, 0.3);
    }

    #[test]
    fn template_replication_covers_capacity() {
        let data = replicate_template(&TEMPLATE_POSITIONS, 128);
        assert_eq!(data.len(), 128 * 3);
        assert_eq!(data[3], TEMPLATE_POSITIONS[0]);
        assert_eq!(data[128 * 3 - 1], TEMPLATE_POSITIONS[2]);
    }

    // ── block packing ─────────────────────────────────────────────────────

    #[test]
    fn block_data_pads_short_tail() {
        let items = vec![instance(0.25); 5];
        let blocks = block_data(&items, 4);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].len(), 4 * BLOCK_INSTANCE_FLOATS);
        assert_eq!(blocks[1].len(), 4 * BLOCK_INSTANCE_FLOATS);

        // One real instance in the tail block, the rest zeroed.
        assert_eq!(blocks[1][0], 0.25);
        assert_eq!(blocks[1][BLOCK_INSTANCE_FLOATS], 0.0);
    }

    // ── indirect records ──────────────────────────────────────────────────

    #[test]
    fn indirect_records_step_three_vertices() {
        let records = indirect_records(512, None);
        assert_eq!(records.len(), 512);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.vertex_count, 3);
            assert_eq!(r.instance_count, 1);
            assert_eq!(r.first_vertex, (i * 3) as u32);
            assert_eq!(r.first_instance, 0);
        }
    }

    #[test]
    fn indirect_records_wrap_block_slots() {
        let records = indirect_records(10, Some(4));
        let slots: Vec<u32> = records.iter().map(|r| r.first_instance).collect();
        assert_eq!(slots, [0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }
}
