use crate::{device::DeviceImage, format::PixelFormat, stream::Stream};
use std::path::PathBuf;
use thiserror::Error;

/// Width and height of an image or region, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A region of interest, in pixels, relative to the top-left of an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full extent of an image of `size`.
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns true when the region is non-empty and lies entirely inside an image of `size`.
    pub fn fits_within(&self, size: Size) -> bool {
        !self.size().is_empty()
            && self.x as u64 + self.width as u64 <= size.width as u64
            && self.y as u64 + self.height as u64 <= size.height as u64
    }
}

/// Resampling kernel used when resizing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    /// Catmull-Rom bicubic.
    Cubic,
    /// Area average over the source footprint of each destination pixel.
    Super,
}

impl Interpolation {
    pub(crate) fn shader_code(self) -> u32 {
        match self {
            Interpolation::Nearest => 0,
            Interpolation::Linear => 1,
            Interpolation::Cubic => 2,
            Interpolation::Super => 3,
        }
    }
}

/// Resample describes GPU primitives that can resize one region of a device image into a
/// region of another.
pub trait Resample {
    /// Records a resize of `src_region` of `src` into `dst_region` of `dst` on `stream`.
    ///
    /// Nothing is executed until the stream is flushed. Bytes of `dst` outside `dst_region`
    /// are left untouched.
    fn resize<F: PixelFormat>(
        &self,
        stream: &mut Stream<'_>,
        src: &DeviceImage<F>,
        src_region: Rect,
        dst: &mut DeviceImage<F>,
        dst_region: Rect,
        mode: Interpolation,
    ) -> Result<(), DeviceError>;
}

/// Host or device memory could not be provided for an image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("cannot allocate a {width}x{height} image: both dimensions must be positive")]
    ZeroSized { width: u32, height: u32 },
    #[error("a {width}x{height} image overflows the address space")]
    Overflow { width: u32, height: u32 },
    #[error("a {width}x{height} image needs {bytes} bytes, more than the device limit of {limit}")]
    TooLarge {
        width: u32,
        height: u32,
        bytes: u64,
        limit: u64,
    },
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("host allocator could not provide {0} bytes")]
    Host(usize),
    #[error("device allocator failed: {0}")]
    Device(String),
}

/// An opaque failure reported by the device while recording or submitting work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("region {region:?} is out of bounds for a {size:?} image")]
    RegionOutOfBounds { region: Rect, size: Size },
    #[error("device reported: {0}")]
    Reported(String),
    #[error("scratch image allocation failed: {0}")]
    Scratch(#[from] AllocationError),
}

impl From<wgpu::Error> for DeviceError {
    fn from(err: wgpu::Error) -> Self {
        DeviceError::Reported(err.to_string())
    }
}

/// A copy between host and device memory failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("host image is {host:?} but device image is {device:?}")]
    SizeMismatch { host: Size, device: Size },
    #[error("failed to map staging buffer: {0}")]
    Map(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A resize request was invalid or the resample primitive failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResizeError {
    #[error("target size {0:?} must be positive in both dimensions")]
    EmptyTarget(Size),
    #[error("region {region:?} exceeds the {size:?} source image")]
    RegionOutOfBounds { region: Rect, size: Size },
    #[error("mip level {index} of size {size:?} is larger than the {region:?} source region")]
    LevelLargerThanSource { index: u32, size: Size, region: Size },
    #[error("cannot allocate the resized image: {0}")]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A file could not be decoded into a host image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized image format for `{}`", .0.display())]
    UnknownFormat(PathBuf),
    #[error("`{}` holds {found:?} pixels, expected {expected}", .path.display())]
    ChannelMismatch {
        path: PathBuf,
        found: image::ColorType,
        expected: &'static str,
    },
    #[error("i/o error reading `{}`: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("codec error: {0}")]
    Codec(String),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// A host image could not be written to a file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("no encoder for `{}`", .0.display())]
    UnknownFormat(PathBuf),
    #[error("{format:?} files cannot store {color:?} pixels")]
    Unsupported {
        format: image::ImageFormat,
        color: image::ColorType,
    },
    #[error("i/o error writing `{}`: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("codec error: {0}")]
    Codec(String),
}

/// An error that occurred while loading, transferring, resizing or saving images.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Resize(#[from] ResizeError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}
