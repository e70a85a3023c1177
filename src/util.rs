//! utilities used throughout the project. Not part of the official API.
use crate::core::*;
use crate::format::PixelFormat;
use crate::host::HostImage;
use futures::FutureExt;

/// Row alignment of host images, in bytes.
pub const HOST_ROW_ALIGNMENT: usize = 4;
/// Row alignment of device images, in bytes. Matches the alignment wgpu requires for
/// buffer/texture copies so device rows can be copied without repacking.
pub const DEVICE_ROW_ALIGNMENT: usize = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PitchedDimensions {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
    pub unpadded_bytes_per_row: usize,
    pub padded_bytes_per_row: usize,
}

impl PitchedDimensions {
    /// Computes the row layout of a `width`x`height` image whose rows start on multiples of
    /// `align` bytes.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
        align: usize,
    ) -> Result<Self, AllocationError> {
        if width == 0 || height == 0 {
            return Err(AllocationError::ZeroSized { width, height });
        }
        let overflow = AllocationError::Overflow { width, height };
        let unpadded_bytes_per_row = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or_else(|| overflow.clone())?;
        let padded_bytes_per_row_padding = (align - unpadded_bytes_per_row % align) % align;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .checked_add(padded_bytes_per_row_padding)
            .ok_or_else(|| overflow.clone())?;
        padded_bytes_per_row
            .checked_mul(height as usize)
            .ok_or(overflow)?;
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        })
    }

    /// Total size of the allocation, including the padding of the last row.
    pub fn byte_len(&self) -> usize {
        self.padded_bytes_per_row * self.height as usize
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Copies `rows` rows of `row_bytes` bytes between two pitched buffers.
pub fn copy_rows(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    dst_pitch: usize,
    row_bytes: usize,
    rows: usize,
) {
    for y in 0..rows {
        let src_beg = y * src_pitch;
        let dst_beg = y * dst_pitch;
        dst[dst_beg..dst_beg + row_bytes].copy_from_slice(&src[src_beg..src_beg + row_bytes]);
    }
}

/// The size of mip `level` of an image of `size` when each level halves the previous one.
pub fn halved_size(size: Size, level: u32) -> Size {
    let shrink = |extent: u32| extent.checked_shr(level).unwrap_or(0).max(1);
    Size::new(shrink(size.width), shrink(size.height))
}

/// Number of levels, including the base, needed to halve `size` down to 1x1.
pub fn full_level_count(size: Size) -> u32 {
    let largest = size.width.max(size.height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Pops the innermost error scope.
///
/// Native backends resolve the scope as soon as it is popped, so this never parks the thread and
/// is safe to call from inside an executor. A scope that is still pending reports no error.
pub(crate) fn pop_error_scope(device: &wgpu::Device) -> Option<wgpu::Error> {
    device.pop_error_scope().now_or_never().flatten()
}

#[doc(hidden)]
pub fn checkerboard<F: PixelFormat>(width: u32, height: u32, n: u32) -> HostImage<F> {
    let mut image = HostImage::<F>::new(width, height).expect("checkerboard allocation");
    for y in 0..height {
        let row = image.row_mut(y);
        for x in 0..width {
            let v = (((x / n + y / n) % 2) * 255) as u8;
            let px = &mut row[x as usize * F::BYTES_PER_PIXEL..][..F::BYTES_PER_PIXEL];
            px.fill(v);
            if F::CHANNELS == 4 {
                px[3] = 255;
            }
        }
    }
    image
}

/// Every byte of row `y` set to a value derived from its position, so misplaced or flipped rows
/// are detectable.
#[doc(hidden)]
pub fn gradient<F: PixelFormat>(width: u32, height: u32) -> HostImage<F> {
    let mut image = HostImage::<F>::new(width, height).expect("gradient allocation");
    for y in 0..height {
        for (i, byte) in image.row_mut(y).iter_mut().enumerate() {
            *byte = (i as u32).wrapping_mul(7).wrapping_add(y.wrapping_mul(13)) as u8;
        }
    }
    image
}

/// Requests a compute capable adapter, trying the fallback (software) adapter when no hardware
/// adapter is available.
#[doc(hidden)]
#[allow(dead_code)]
pub(crate) async fn wgpu_setup() -> Option<(wgpu::Instance, wgpu::Adapter, wgpu::Device, wgpu::Queue)>
{
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    for force_fallback_adapter in [false, true] {
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
        {
            Some(adapter) => adapter,
            None => continue,
        };
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            log::warn!("[wgpu_setup] adapter {:?} has no compute support", adapter.get_info().name);
            continue;
        }
        // Create the logical device and command queue
        let (device, queue) = match adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("wgpu-mipchain-test-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("[wgpu_setup] {:?} refused a device: {}", adapter.get_info().name, e);
                continue;
            }
        };
        return Some((instance, adapter, device, queue));
    }
    None
}

/// Device and queue for GPU tests. Panics when no compute capable adapter exists, so a machine
/// without one reports failures instead of silently passing.
#[cfg(test)]
pub(crate) async fn test_device() -> (wgpu::Device, wgpu::Queue) {
    let (_instance, _adapter, device, queue) = wgpu_setup()
        .await
        .expect("Failed to find a compute capable adapter");
    (device, queue)
}
