// SPDX-License-Identifier: GPL-3.0-only

//! wgpu implementation of the presenter's GPU backend
//!
//! One RGBA texture sized to the current frame, sampled with nearest
//! filtering and clamp-to-edge addressing onto a full-screen quad drawn as a
//! 4-vertex triangle strip. The quad is viewport-relative, so the target may
//! be any size regardless of the frame dimensions.

use super::presenter::GpuBackend;
use crate::errors::PresentError;
use crate::gpu::{GpuContext, wgpu};
use crate::shaders::{QUAD_SHADER, QUAD_VERTICES, QuadVertex};
use std::sync::Arc;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

/// Where the quad is drawn
pub enum RenderTarget {
    /// A private texture of the viewport size (headless rendering)
    Offscreen,
    /// A window surface owned by the embedder
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
}

/// Format used for offscreen targets
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct PipelineResources {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
}

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// [`GpuBackend`] rendering with wgpu
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target: RenderTarget,
    viewport: (u32, u32),
    resources: Option<PipelineResources>,
    frame_texture: Option<FrameTexture>,
    offscreen: Option<wgpu::Texture>,
    frames_rendered: u64,
}

impl WgpuBackend {
    /// Backend drawing into a private texture of `width` x `height`
    pub fn offscreen(context: &GpuContext, width: u32, height: u32) -> Self {
        Self::new(context, RenderTarget::Offscreen, (width, height))
    }

    /// Backend presenting to a configured window surface
    pub fn with_surface(
        context: &GpuContext,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        surface.configure(&context.device, &config);
        let viewport = (config.width, config.height);
        Self::new(context, RenderTarget::Surface { surface, config }, viewport)
    }

    fn new(context: &GpuContext, target: RenderTarget, viewport: (u32, u32)) -> Self {
        Self {
            device: Arc::clone(&context.device),
            queue: Arc::clone(&context.queue),
            target,
            viewport,
            resources: None,
            frame_texture: None,
            offscreen: None,
            frames_rendered: 0,
        }
    }

    fn target_format(&self) -> wgpu::TextureFormat {
        match &self.target {
            RenderTarget::Offscreen => OFFSCREEN_FORMAT,
            RenderTarget::Surface { config, .. } => config.format,
        }
    }

    /// Dimensions of the frame texture, once one has been uploaded
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.frame_texture.as_ref().map(|t| (t.width, t.height))
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// The offscreen target texture, if rendering headless and something was drawn
    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        self.offscreen.as_ref()
    }

    fn create_frame_texture(
        &self,
        resources: &PipelineResources,
        width: u32,
        height: u32,
    ) -> FrameTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera-pipeline frame texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera-pipeline frame bind group"),
            layout: &resources.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&resources.sampler),
                },
            ],
        });

        debug!(width, height, "Frame texture created");
        FrameTexture {
            texture,
            bind_group,
            width,
            height,
        }
    }

    /// View of the offscreen target, recreating it when the viewport changed
    fn offscreen_view(&mut self) -> wgpu::TextureView {
        let (width, height) = (self.viewport.0.max(1), self.viewport.1.max(1));
        let texture = match self.offscreen.take() {
            Some(texture) if texture.width() == width && texture.height() == height => texture,
            _ => self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("camera-pipeline offscreen target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OFFSCREEN_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            }),
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.offscreen = Some(texture);
        view
    }
}

impl GpuBackend for WgpuBackend {
    fn create_resources(&mut self) -> Result<(), PresentError> {
        if self.resources.is_some() {
            return Ok(());
        }

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("camera-pipeline quad shader"),
                source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
            });

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("camera-pipeline frame bind group layout"),
                    entries: &[
                        // RGBA texture
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        // Sampler
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("camera-pipeline quad pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("camera-pipeline quad pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_layout],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.target_format(),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
                cache: None,
            });

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("camera-pipeline frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("camera-pipeline quad vertices"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        self.resources = Some(PipelineResources {
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
        });
        debug!(format = ?self.target_format(), "Quad pipeline created");
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        if let RenderTarget::Surface { surface, config } = &mut self.target {
            config.width = width.max(1);
            config.height = height.max(1);
            surface.configure(&self.device, config);
        }
    }

    fn upload(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<(), PresentError> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| PresentError::GpuInit("upload before resources exist".to_string()))?;

        let needs_texture = self
            .frame_texture
            .as_ref()
            .is_none_or(|t| t.width != width || t.height != height);
        if needs_texture {
            let texture = self.create_frame_texture(resources, width, height);
            self.frame_texture = Some(texture);
        }

        if let Some(frame_texture) = &self.frame_texture {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &frame_texture.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                rgba,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<(), PresentError> {
        if self.resources.is_none() || self.frame_texture.is_none() {
            return Ok(());
        }

        let mut surface_frame = None;
        let view = match &self.target {
            RenderTarget::Offscreen => None,
            RenderTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    surface_frame = Some(frame);
                    Some(view)
                }
                Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                    debug!("Surface outdated, reconfiguring");
                    surface.configure(&self.device, config);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    warn!("Timed out acquiring surface texture, skipping frame");
                    return Ok(());
                }
                Err(e) => return Err(PresentError::Surface(e.to_string())),
            },
        };
        let view = match view {
            Some(view) => view,
            None => self.offscreen_view(),
        };

        let (Some(resources), Some(frame_texture)) = (&self.resources, &self.frame_texture) else {
            return Ok(());
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("camera-pipeline frame encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("camera-pipeline frame render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&resources.pipeline);
            render_pass.set_bind_group(0, &frame_texture.bind_group, &[]);
            render_pass.set_vertex_buffer(0, resources.vertex_buffer.slice(..));
            render_pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        if let Some(frame) = surface_frame {
            frame.present();
        }
        self.frames_rendered += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.frame_texture = None;
        self.offscreen = None;
        self.resources = None;
        debug!(frames_rendered = self.frames_rendered, "wgpu backend released");
    }
}
