use crate::core::*;
use crate::device::DeviceImage;
use crate::format::PixelFormat;
use crate::stream::Stream;
use crate::util::pop_error_scope;
use log::debug;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, BufferBindingType, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderModuleDescriptor,
    ShaderSource, ShaderStages,
};

/// Local size of the resize shader in both dimensions.
const WORKGROUP_SIZE: u32 = 8;
/// Largest source footprint, in pixels along one axis, a single area average pass reads for
/// one destination pixel.
const MAX_SUPER_FOOTPRINT: u32 = 16;

/// Resizes device images with a compute shader that reads and writes the pitched storage
/// buffers directly.
#[derive(Debug)]
pub struct ComputeResampler {
    layout: BindGroupLayout,
    pipeline: ComputePipeline,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ResizeParams {
    src_pitch: u32,
    src_x: u32,
    src_y: u32,
    src_width: u32,
    src_height: u32,
    dst_pitch: u32,
    dst_x: u32,
    dst_y: u32,
    dst_width: u32,
    dst_height: u32,
    channels: u32,
    mode: u32,
}

impl ComputeResampler {
    /// Creates a new `ComputeResampler`. Once created, it can be used repeatedly to resize
    /// images of any pixel format on any stream of `device`.
    pub fn new(device: &Device) -> Self {
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("wgpu-mipchain-resize"),
            source: ShaderSource::Wgsl(include_str!("shaders/resize.wgsl").into()),
        });
        let layout = bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("wgpu-mipchain-resize-pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        Self { layout, pipeline }
    }
}

impl Resample for ComputeResampler {
    fn resize<F: PixelFormat>(
        &self,
        stream: &mut Stream<'_>,
        src: &DeviceImage<F>,
        src_region: Rect,
        dst: &mut DeviceImage<F>,
        dst_region: Rect,
        mode: Interpolation,
    ) -> Result<(), DeviceError> {
        if !src_region.fits_within(src.size()) {
            return Err(DeviceError::RegionOutOfBounds {
                region: src_region,
                size: src.size(),
            });
        }
        if !dst_region.fits_within(dst.size()) {
            return Err(DeviceError::RegionOutOfBounds {
                region: dst_region,
                size: dst.size(),
            });
        }
        let stages = match mode {
            Interpolation::Super => super_stages(src_region.size(), dst_region.size()),
            _ => Vec::new(),
        };
        if !stages.is_empty() {
            debug!(
                "[ComputeResampler::resize] area average {:?} -> {:?} through {:?}",
                src_region.size(),
                dst_region.size(),
                stages
            );
        }
        // recorded work keeps a dropped scratch image alive until it completes
        let mut scratch: Option<DeviceImage<F>> = None;
        let mut from = src_region;
        for size in stages {
            let next = DeviceImage::<F>::new(stream.device(), size.width, size.height)?;
            let input = scratch.as_ref().unwrap_or(src);
            self.dispatch(stream, input, from, &next, next.extent(), mode)?;
            from = next.extent();
            scratch = Some(next);
        }
        let input = scratch.as_ref().unwrap_or(src);
        self.dispatch(stream, input, from, dst, dst_region, mode)
    }
}

impl ComputeResampler {
    /// Records a single pass of the resize shader. Both regions are already validated.
    fn dispatch<F: PixelFormat>(
        &self,
        stream: &mut Stream<'_>,
        src: &DeviceImage<F>,
        src_region: Rect,
        dst: &DeviceImage<F>,
        dst_region: Rect,
        mode: Interpolation,
    ) -> Result<(), DeviceError> {
        let params = ResizeParams {
            src_pitch: src.pitch() as u32,
            src_x: src_region.x,
            src_y: src_region.y,
            src_width: src_region.width,
            src_height: src_region.height,
            dst_pitch: dst.pitch() as u32,
            dst_x: dst_region.x,
            dst_y: dst_region.y,
            dst_width: dst_region.width,
            dst_height: dst_region.height,
            channels: F::CHANNELS,
            mode: mode.shader_code(),
        };
        // one invocation per destination word touched by the region
        let row_start = dst_region.x * F::CHANNELS;
        let row_end = row_start + dst_region.width * F::CHANNELS;
        let words = (row_end + 3) / 4 - row_start / 4;

        let device = stream.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wgpu-mipchain-resize-params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &self.layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: src.buffer().as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: dst.buffer().as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });
        {
            let mut pass = stream.encoder().begin_compute_pass(&ComputePassDescriptor {
                label: Some("wgpu-mipchain-resize"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                words.div_ceil(WORKGROUP_SIZE),
                dst_region.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        if let Some(err) = pop_error_scope(device) {
            return Err(err.into());
        }
        debug!(
            "[ComputeResampler::dispatch] {} {:?} -> {:?} ({:?})",
            F::NAME,
            src_region,
            dst_region,
            mode
        );
        Ok(())
    }
}

/// Intermediate sizes, largest first, that split an area average from `src` to `dst` into
/// passes whose footprint is at most [`MAX_SUPER_FOOTPRINT`] pixels along each axis.
///
/// Every intermediate is `dst` scaled up by a power of the footprint and clamped to `src`.
fn super_stages(src: Size, dst: Size) -> Vec<Size> {
    let max = MAX_SUPER_FOOTPRINT as u64;
    let fits = |from: Size, to: Size| {
        from.width as u64 <= to.width as u64 * max && from.height as u64 <= to.height as u64 * max
    };
    let grow = |to: u32, from: u32| (to as u64 * max).min(from as u64) as u32;
    let mut stages = Vec::new();
    let mut current = dst;
    while !fits(src, current) {
        current = Size::new(
            grow(current.width, src.width.max(current.width)),
            grow(current.height, src.height.max(current.height)),
        );
        stages.push(current);
    }
    stages.reverse();
    stages
}

fn bind_group_layout(device: &Device) -> BindGroupLayout {
    let storage = |binding, read_only| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("wgpu-mipchain-resize-layout"),
        entries: &[
            storage(0, true),
            storage(1, false),
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}
