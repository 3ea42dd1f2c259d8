use afterglow_common::Color;
use afterglow_render::ImageBuffer;
use bytemuck::{Pod, Zeroable};

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::shaders;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const BYTES_PER_TEXEL: u32 = 16;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Params {
    blend: f32,
    _pad: [f32; 3],
}

/// Row pitch of a readback buffer, padded to the copy alignment.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_TEXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn float_texture(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// GPU ping-pong accumulator.
///
/// Two `Rgba32Float` textures alternate between "previous average" and
/// "write target"; each [`accumulate`](Self::accumulate) uploads a sample
/// and renders `mix(previous, sample, 1 / window)` into the write target.
pub struct GpuAccumulator {
    width: u32,
    height: u32,
    textures: [wgpu::Texture; 2],
    views: [wgpu::TextureView; 2],
    sample: wgpu::Texture,
    params: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    /// `bind_groups[i]` reads `textures[i]` as the previous average.
    bind_groups: [wgpu::BindGroup; 2],
    write: usize,
    passes: u64,
}

impl GpuAccumulator {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self, GpuError> {
        let max = ctx.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::InvalidSize { width, height });
        }
        let device = &ctx.device;

        let textures = [
            float_texture(device, "accumulation_a", width, height),
            float_texture(device, "accumulation_b", width, height),
        ];
        let views = [
            textures[0].create_view(&Default::default()),
            textures[1].create_view(&Default::default()),
        ];
        let sample = float_texture(device, "accumulation_sample", width, height);
        let sample_view = sample.create_view(&Default::default());

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("accumulation_params"),
            size: std::mem::size_of::<Params>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("accumulation_bind_group_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let bind_group = |previous: &wgpu::TextureView, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(previous),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&sample_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [
            bind_group(&views[0], "accumulation_read_a"),
            bind_group(&views[1], "accumulation_read_b"),
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("accumulation_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("accumulation_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::ACCUMULATE_SHADER.into()),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("accumulation_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_accumulate"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        tracing::debug!(width, height, "GPU accumulator allocated");
        Ok(Self {
            width,
            height,
            textures,
            views,
            sample,
            params,
            pipeline,
            bind_groups,
            write: 1,
            passes: 0,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Accumulate calls since the last clear.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Fill both textures with `color` and start over.
    pub fn clear(&mut self, ctx: &GpuContext, color: Color) {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("accumulation_clear"),
            });
        for view in &self.views {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulation_clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.r as f64,
                            g: color.g as f64,
                            b: color.b as f64,
                            a: color.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));
        self.write = 1;
        self.passes = 0;
    }

    /// Blend `sample` into the running average and flip roles.
    pub fn accumulate(
        &mut self,
        ctx: &GpuContext,
        sample: &ImageBuffer,
        window: f32,
    ) -> Result<(), GpuError> {
        if window.is_nan() || window < 1.0 {
            return Err(GpuError::InvalidBlendWindow(window));
        }
        if sample.size() != self.size() {
            return Err(GpuError::SizeMismatch {
                expected: self.size(),
                actual: sample.size(),
            });
        }

        let texels: Vec<[f32; 4]> = sample.pixels().iter().map(|c| c.to_vec4().to_array()).collect();
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.sample,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * BYTES_PER_TEXEL),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&Params {
                blend: 1.0 / window,
                _pad: [0.0; 3],
            }),
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("accumulation_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulation_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.views[self.write],
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[1 - self.write], &[]);
            pass.draw(0..3, 0..1);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        tracing::trace!(write = self.write, window, "GPU accumulation pass");
        self.write = 1 - self.write;
        self.passes += 1;
        Ok(())
    }

    /// Copy the most recently written texture back to the CPU.
    pub fn read_latest(&self, ctx: &GpuContext) -> Result<ImageBuffer, GpuError> {
        let latest = &self.textures[1 - self.write];
        let bytes_per_row = padded_bytes_per_row(self.width);
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("accumulation_readback"),
            size: (bytes_per_row * self.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("accumulation_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: latest,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = ctx.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| GpuError::ReadbackLost)??;

        let mut image = ImageBuffer::new(self.width, self.height, Color::TRANSPARENT);
        {
            let data = slice.get_mapped_range();
            for y in 0..self.height {
                let start = (y * bytes_per_row) as usize;
                let row = &data[start..start + (self.width * BYTES_PER_TEXEL) as usize];
                for (x, texel) in row.chunks_exact(BYTES_PER_TEXEL as usize).enumerate() {
                    let [r, g, b, a] = bytemuck::pod_read_unaligned::<[f32; 4]>(texel);
                    image.set_texel(x as u32, y, Color { r, g, b, a });
                }
            }
        }
        buffer.unmap();
        Ok(image)
    }
}

impl std::fmt::Debug for GpuAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuAccumulator")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("write", &self.write)
            .field("passes", &self.passes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Option<GpuContext> {
        match GpuContext::headless() {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    fn gradient(width: u32, height: u32) -> ImageBuffer {
        let mut img = ImageBuffer::new(width, height, Color::BLACK);
        for y in 0..height {
            for x in 0..width {
                img.set_texel(x, y, Color::rgba(x as f32, y as f32, 0.5, 1.0));
            }
        }
        img
    }

    #[test]
    fn readback_rows_are_padded() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
    }

    #[test]
    fn clear_fills_both_textures() {
        let Some(ctx) = context() else { return };
        let mut acc = GpuAccumulator::new(&ctx, 5, 3).unwrap();
        let c = Color::rgba(0.25, 0.5, 0.75, 1.0);
        acc.clear(&ctx, c);
        let img = acc.read_latest(&ctx).unwrap();
        assert!(img.pixels().iter().all(|p| p.max_abs_diff(c) < 1e-6));
    }

    #[test]
    fn window_of_one_replaces_and_keeps_texel_order() {
        let Some(ctx) = context() else { return };
        let mut acc = GpuAccumulator::new(&ctx, 5, 3).unwrap();
        acc.clear(&ctx, Color::rgba(9.0, 9.0, 9.0, 1.0));
        let sample = gradient(5, 3);
        acc.accumulate(&ctx, &sample, 1.0).unwrap();
        let img = acc.read_latest(&ctx).unwrap();
        assert!(img.max_abs_diff(&sample) < 1e-5);
        assert_eq!(acc.passes(), 1);
    }

    #[test]
    fn running_average_matches_cpu_blend() {
        let Some(ctx) = context() else { return };
        let mut acc = GpuAccumulator::new(&ctx, 4, 4).unwrap();
        acc.clear(&ctx, Color::BLACK);
        let white = ImageBuffer::new(4, 4, Color::WHITE);
        acc.accumulate(&ctx, &white, 4.0).unwrap();
        assert!((acc.read_latest(&ctx).unwrap().mean().r - 0.25).abs() < 1e-5);
        acc.accumulate(&ctx, &white, 4.0).unwrap();
        assert!((acc.read_latest(&ctx).unwrap().mean().r - 0.4375).abs() < 1e-5);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let Some(ctx) = context() else { return };
        assert!(matches!(
            GpuAccumulator::new(&ctx, 0, 4),
            Err(GpuError::InvalidSize { .. })
        ));
        let mut acc = GpuAccumulator::new(&ctx, 4, 4).unwrap();
        let white = ImageBuffer::new(4, 4, Color::WHITE);
        assert!(matches!(
            acc.accumulate(&ctx, &white, 0.5),
            Err(GpuError::InvalidBlendWindow(_))
        ));
        assert!(matches!(
            acc.accumulate(&ctx, &ImageBuffer::new(2, 4, Color::WHITE), 1.0),
            Err(GpuError::SizeMismatch { .. })
        ));
        assert_eq!(acc.passes(), 0);
    }
}
