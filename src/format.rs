//! The fixed set of 8-bit pixel formats a buffer can hold.
use image::{ColorType, DynamicImage};
use std::fmt::Debug;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Gray8 {}
    impl Sealed for super::Rgba8 {}
}

/// Marker for the pixel layout of a buffer. Implemented by [`Gray8`] and [`Rgba8`] only.
pub trait PixelFormat: sealed::Sealed + Copy + Debug + Send + Sync + 'static {
    /// Number of interleaved 8-bit channels per pixel.
    const CHANNELS: u32;
    const BYTES_PER_PIXEL: usize = Self::CHANNELS as usize;
    /// The codec color type matching this layout.
    const COLOR_TYPE: ColorType;
    const NAME: &'static str;

    /// Extracts tightly packed rows from a decoded image, or `None` when the image's native
    /// layout cannot be represented without a lossy conversion this format refuses.
    #[doc(hidden)]
    fn packed_from(image: DynamicImage) -> Option<Vec<u8>>;
}

/// Single channel, 8 bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Gray8;

/// Four interleaved 8-bit channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rgba8;

impl PixelFormat for Gray8 {
    const CHANNELS: u32 = 1;
    const COLOR_TYPE: ColorType = ColorType::L8;
    const NAME: &'static str = "Gray8";

    fn packed_from(image: DynamicImage) -> Option<Vec<u8>> {
        // grayscale loaders only accept natively 8-bit single channel files
        match image {
            DynamicImage::ImageLuma8(buffer) => Some(buffer.into_raw()),
            _ => None,
        }
    }
}

impl PixelFormat for Rgba8 {
    const CHANNELS: u32 = 4;
    const COLOR_TYPE: ColorType = ColorType::Rgba8;
    const NAME: &'static str = "Rgba8";

    fn packed_from(image: DynamicImage) -> Option<Vec<u8>> {
        Some(image.into_rgba8().into_raw())
    }
}
