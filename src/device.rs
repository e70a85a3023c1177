use crate::core::*;
use crate::format::{Gray8, PixelFormat, Rgba8};
use crate::host::HostImage;
use crate::stream::Stream;
use crate::util::{copy_rows, pop_error_scope, PitchedDimensions, DEVICE_ROW_ALIGNMENT};
use log::debug;
use std::marker::PhantomData;

/// A pitched image in device memory, backed by a storage buffer.
///
/// Rows are top-to-bottom and start on
/// [`DEVICE_ROW_ALIGNMENT`](crate::util::DEVICE_ROW_ALIGNMENT) byte boundaries, so the device
/// pitch is usually larger than the pitch of the matching [`HostImage`].
#[derive(Debug)]
pub struct DeviceImage<F: PixelFormat> {
    buffer: wgpu::Buffer,
    dimensions: PitchedDimensions,
    format: PhantomData<F>,
}

/// Single channel device image.
pub type DeviceImageC1 = DeviceImage<Gray8>;
/// Four channel device image.
pub type DeviceImageC4 = DeviceImage<Rgba8>;

impl<F: PixelFormat> DeviceImage<F> {
    /// Buffer usage of every device image.
    pub const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
        .union(wgpu::BufferUsages::COPY_SRC)
        .union(wgpu::BufferUsages::COPY_DST);

    /// Allocates a `width`x`height` image. The contents are zeroed by the device.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, AllocationError> {
        let dimensions =
            PitchedDimensions::new(width, height, F::BYTES_PER_PIXEL, DEVICE_ROW_ALIGNMENT)?;
        let bytes = dimensions.byte_len() as u64;
        let limits = device.limits();
        let limit = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if bytes > limit {
            return Err(AllocationError::TooLarge {
                width,
                height,
                bytes,
                limit,
            });
        }
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("wgpu-mipchain-{}-{}x{}", F::NAME, width, height)),
            size: bytes,
            usage: Self::USAGE,
            mapped_at_creation: false,
        });
        if let Some(err) = pop_error_scope(device) {
            return Err(AllocationError::Device(err.to_string()));
        }
        debug!(
            "[DeviceImage::new] {} {}x{} pitch {}",
            F::NAME,
            width,
            height,
            dimensions.padded_bytes_per_row
        );
        Ok(Self {
            buffer,
            dimensions,
            format: PhantomData,
        })
    }

    /// Allocates an image matching `host` and enqueues an upload of its pixels on `stream`.
    pub fn from_host(stream: &mut Stream<'_>, host: &HostImage<F>) -> Result<Self, Error> {
        let mut image = Self::new(stream.device(), host.width(), host.height())?;
        image.upload(stream, host)?;
        Ok(image)
    }

    /// Enqueues a copy of `host` into this image on `stream`.
    ///
    /// The host rows are repacked at device pitch into a staging buffer right away, so `host`
    /// may be modified or dropped as soon as this returns.
    pub fn upload(&mut self, stream: &mut Stream<'_>, host: &HostImage<F>) -> Result<(), TransferError> {
        self.check_size(host)?;
        let device = stream.device();
        let size = self.dimensions.byte_len() as u64;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wgpu-mipchain-upload"),
            size,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        {
            let mut mapped = staging.slice(..).get_mapped_range_mut();
            copy_rows(
                host.data(),
                host.pitch(),
                &mut mapped,
                self.pitch(),
                self.row_bytes(),
                self.height() as usize,
            );
        }
        staging.unmap();
        stream
            .encoder()
            .copy_buffer_to_buffer(&staging, 0, &self.buffer, 0, size);
        if let Some(err) = pop_error_scope(device) {
            return Err(DeviceError::from(err).into());
        }
        debug!("[DeviceImage::upload] enqueued {} bytes", size);
        Ok(())
    }

    /// Enqueues a copy of this image into `host` on `stream`.
    ///
    /// The returned [`Download`] holds `host` until [`Download::wait`] has synchronized the
    /// stream and written the rows out at host pitch.
    pub fn copy_to<'h>(
        &self,
        stream: &mut Stream<'_>,
        host: &'h mut HostImage<F>,
    ) -> Result<Download<'h, F>, TransferError> {
        self.check_size(host)?;
        let device = stream.device();
        let size = self.dimensions.byte_len() as u64;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wgpu-mipchain-download"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        stream
            .encoder()
            .copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        if let Some(err) = pop_error_scope(device) {
            return Err(DeviceError::from(err).into());
        }
        debug!("[DeviceImage::copy_to] enqueued {} bytes", size);
        Ok(Download {
            staging,
            dimensions: self.dimensions,
            host,
        })
    }

    /// Enqueues a download into a freshly allocated host image.
    pub fn to_host(&self, stream: &mut Stream<'_>) -> Result<HostImage<F>, Error> {
        let mut host = HostImage::new(self.width(), self.height())?;
        self.copy_to(stream, &mut host)?.wait(stream)?;
        Ok(host)
    }

    /// Swaps device memory, size and pitch with `other`.
    ///
    /// Work already enqueued against either image keeps referring to the memory it was
    /// recorded with.
    pub fn exchange(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn size(&self) -> Size {
        self.dimensions.size()
    }

    /// Byte stride between the starts of consecutive rows.
    pub fn pitch(&self) -> usize {
        self.dimensions.padded_bytes_per_row
    }

    pub fn row_bytes(&self) -> usize {
        self.dimensions.unpadded_bytes_per_row
    }

    /// The full extent of the image.
    pub fn extent(&self) -> Rect {
        Rect::from_size(self.size())
    }

    /// The underlying storage buffer, `pitch * height` bytes long.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    fn check_size(&self, host: &HostImage<F>) -> Result<(), TransferError> {
        if host.size() != self.size() {
            return Err(TransferError::SizeMismatch {
                host: host.size(),
                device: self.size(),
            });
        }
        Ok(())
    }
}

/// A download that has been enqueued but not yet observed.
#[must_use = "the host image is not written until `wait` is called"]
#[derive(Debug)]
pub struct Download<'h, F: PixelFormat> {
    staging: wgpu::Buffer,
    dimensions: PitchedDimensions,
    host: &'h mut HostImage<F>,
}

impl<'h, F: PixelFormat> Download<'h, F> {
    /// Synchronizes `stream`, then copies the downloaded rows into the host image.
    ///
    /// `stream` must be the stream the download was enqueued on.
    pub fn wait(self, stream: &mut Stream<'_>) -> Result<(), TransferError> {
        let Download {
            staging,
            dimensions,
            host,
        } = self;
        stream.synchronize()?;
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        stream.device().poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TransferError::Map(e.to_string())),
            Err(_) => return Err(TransferError::Map("map callback was dropped".into())),
        }
        {
            let mapped = slice.get_mapped_range();
            let pitch = host.pitch();
            copy_rows(
                &mapped,
                dimensions.padded_bytes_per_row,
                host.data_mut(),
                pitch,
                dimensions.unpadded_bytes_per_row,
                dimensions.height as usize,
            );
        }
        staging.unmap();
        debug!(
            "[Download::wait] read back {}x{}",
            dimensions.width, dimensions.height
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostImageC1;
    use crate::util::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn round_trip<F: PixelFormat>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        host: &HostImage<F>,
    ) -> HostImage<F> {
        let mut stream = Stream::new(device, queue);
        let image = DeviceImage::from_host(&mut stream, host).unwrap();
        assert!(image.pitch() >= host.row_bytes());
        assert_eq!(image.pitch() % DEVICE_ROW_ALIGNMENT, 0);
        image.to_host(&mut stream).unwrap()
    }

    #[test]
    fn upload_download_identity() {
        init();
        futures::executor::block_on(async {
            let (device, queue) = test_device().await;
            for (width, height) in [(1, 1), (1, 7), (3, 5), (64, 2), (4097, 3)] {
                let gray = gradient::<Gray8>(width, height);
                assert!(round_trip(&device, &queue, &gray).same_pixels(&gray));
                let rgba = gradient::<Rgba8>(width, height);
                assert!(round_trip(&device, &queue, &rgba).same_pixels(&rgba));
            }
        });
    }

    #[test]
    fn allocation_errors() {
        init();
        futures::executor::block_on(async {
            let (device, _queue) = test_device().await;
            assert_eq!(
                DeviceImageC4::new(&device, 0, 16).err(),
                Some(AllocationError::ZeroSized {
                    width: 0,
                    height: 16
                })
            );
            let res = DeviceImageC4::new(&device, 1 << 16, 1 << 16);
            assert!(matches!(res, Err(AllocationError::TooLarge { .. })));
        });
    }

    #[test]
    fn size_mismatch() {
        init();
        futures::executor::block_on(async {
            let (device, queue) = test_device().await;
            let mut stream = Stream::new(&device, &queue);
            let mut image = DeviceImageC1::new(&device, 8, 8).unwrap();
            let host = HostImageC1::new(8, 9).unwrap();
            assert_eq!(
                image.upload(&mut stream, &host).err(),
                Some(TransferError::SizeMismatch {
                    host: Size::new(8, 9),
                    device: Size::new(8, 8)
                })
            );
            let mut host = HostImageC1::new(9, 8).unwrap();
            assert!(image.copy_to(&mut stream, &mut host).is_err());
            assert_eq!(stream.pending(), 0);
        });
    }

    #[test]
    fn exchange_is_its_own_inverse() {
        init();
        futures::executor::block_on(async {
            let (device, queue) = test_device().await;
            let mut stream = Stream::new(&device, &queue);
            let host_a = gradient::<Rgba8>(5, 4);
            let host_b = checkerboard::<Rgba8>(9, 2, 1);
            let mut a = DeviceImage::from_host(&mut stream, &host_a).unwrap();
            let mut b = DeviceImage::from_host(&mut stream, &host_b).unwrap();

            a.exchange(&mut b);
            assert_eq!(a.size(), host_b.size());
            assert!(b.to_host(&mut stream).unwrap().same_pixels(&host_a));

            a.exchange(&mut b);
            assert!(a.to_host(&mut stream).unwrap().same_pixels(&host_a));
            assert!(b.to_host(&mut stream).unwrap().same_pixels(&host_b));
        });
    }

    #[test]
    fn stream_preserves_enqueue_order() {
        init();
        futures::executor::block_on(async {
            let (device, queue) = test_device().await;
            let mut stream = Stream::new(&device, &queue);
            let first = gradient::<Gray8>(16, 16);
            let second = checkerboard::<Gray8>(16, 16, 4);
            let mut image = DeviceImage::from_host(&mut stream, &first).unwrap();
            let mut early = HostImageC1::new(16, 16).unwrap();
            let download = image.copy_to(&mut stream, &mut early).unwrap();
            image.upload(&mut stream, &second).unwrap();
            assert_eq!(stream.pending(), 3);
            download.wait(&mut stream).unwrap();
            assert_eq!(stream.pending(), 0);
            // the download was enqueued before the second upload
            assert!(early.same_pixels(&first));
            assert!(image.to_host(&mut stream).unwrap().same_pixels(&second));
        });
    }
}
