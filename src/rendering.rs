//! GPU side of the ocean outputs: textures, sampler, uniform buffer and the
//! bind group the surface renderer uses.

use glam::Vec4;
use half::f16;
use wgpu::util::DeviceExt;

use crate::error::GpuError;
use crate::ocean::{OceanFft, OceanUbo, PatchMesh};
use crate::texture::{MipLevel, Texture, TextureFormat};

/// Bindings of [`OceanGpuResources::bind_group_layout`]
pub mod bindings {
    pub const OCEAN_UBO: u32 = 0;
    pub const HEIGHT_DISPLACEMENT: u32 = 1;
    pub const GRADIENT_JACOBIAN: u32 = 2;
    pub const NORMALS: u32 = 3;
    pub const SAMPLER: u32 = 4;
}

pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
    }
}

/// Half-float texel data of one level, tightly packed
pub fn pack_level(level: &MipLevel, format: TextureFormat) -> Vec<f16> {
    let channels = format.channels();
    level
        .texels
        .iter()
        .flat_map(|texel: &Vec4| texel.to_array().into_iter().take(channels))
        .map(f16::from_f32)
        .collect()
}

/// Headless device for uploads without a window
pub fn request_headless_device() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ocean Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;
        Ok::<_, GpuError>((device, queue))
    })
}

/// A sampled texture mirroring a CPU [`Texture`]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    format: TextureFormat,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, source: &Texture) -> Self {
        let size = source.size();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(source.label()),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: source.mip_count(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(source.format()),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            format: source.format(),
        }
    }

    /// Write every mip level of `source`
    pub fn upload(&self, queue: &wgpu::Queue, source: &Texture) {
        let bytes_per_texel = self.format.channels() as u32 * 2;
        for (level, data) in source.levels().iter().enumerate() {
            let texels = pack_level(data, self.format);
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&texels),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(data.width * bytes_per_texel),
                    rows_per_image: Some(data.height),
                },
                wgpu::Extent3d {
                    width: data.width,
                    height: data.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}

/// Everything the ocean surface pass binds
pub struct OceanGpuResources {
    pub height_displacement: GpuTexture,
    pub gradient_jacobian: GpuTexture,
    pub normals: GpuTexture,
    pub sampler: wgpu::Sampler,
    pub uniform_buffer: wgpu::Buffer,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl OceanGpuResources {
    pub fn new(device: &wgpu::Device, ocean: &OceanFft, mesh: &PatchMesh) -> Self {
        let height_displacement = GpuTexture::new(device, ocean.height_displacement());
        let gradient_jacobian = GpuTexture::new(device, ocean.gradient_jacobian());
        let normals = GpuTexture::new(device, ocean.normals());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ocean Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let ubo = OceanUbo::new(ocean.config());
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ocean Uniform Buffer"),
            contents: ubo.as_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Patch Vertex Buffer"),
            contents: mesh.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Patch Index Buffer"),
            contents: mesh.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ocean Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: bindings::OCEAN_UBO,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(bindings::HEIGHT_DISPLACEMENT),
                texture_entry(bindings::GRADIENT_JACOBIAN),
                texture_entry(bindings::NORMALS),
                wgpu::BindGroupLayoutEntry {
                    binding: bindings::SAMPLER,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ocean Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::OCEAN_UBO,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::HEIGHT_DISPLACEMENT,
                    resource: wgpu::BindingResource::TextureView(&height_displacement.view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::GRADIENT_JACOBIAN,
                    resource: wgpu::BindingResource::TextureView(&gradient_jacobian.view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::NORMALS,
                    resource: wgpu::BindingResource::TextureView(&normals.view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::SAMPLER,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            height_displacement,
            gradient_jacobian,
            normals,
            sampler,
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            bind_group_layout,
            bind_group,
        }
    }

    /// Push this frame's textures and uniforms
    pub fn upload(&self, queue: &wgpu::Queue, ocean: &OceanFft, ubo: &OceanUbo) {
        self.height_displacement
            .upload(queue, ocean.height_displacement());
        self.gradient_jacobian
            .upload(queue, ocean.gradient_jacobian());
        self.normals.upload(queue, ocean.normals());
        queue.write_buffer(&self.uniform_buffer, 0, ubo.as_bytes());
    }
}
