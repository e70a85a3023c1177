use crate::core::*;
use crate::format::{Gray8, PixelFormat, Rgba8};
use crate::util::{copy_rows, PitchedDimensions, HOST_ROW_ALIGNMENT};
use std::marker::PhantomData;

/// A pitched image in host memory. Rows are top-to-bottom and start on
/// [`HOST_ROW_ALIGNMENT`](crate::util::HOST_ROW_ALIGNMENT) byte boundaries.
///
/// The image is the sole owner of its pixels. It is never cloned implicitly; use
/// [`exchange`](HostImage::exchange) to move contents between two images.
#[derive(Debug, PartialEq, Eq)]
pub struct HostImage<F: PixelFormat> {
    data: Vec<u8>,
    dimensions: PitchedDimensions,
    format: PhantomData<F>,
}

/// Single channel host image.
pub type HostImageC1 = HostImage<Gray8>;
/// Four channel host image.
pub type HostImageC4 = HostImage<Rgba8>;

impl<F: PixelFormat> HostImage<F> {
    /// Allocates a zeroed `width`x`height` image.
    pub fn new(width: u32, height: u32) -> Result<Self, AllocationError> {
        let dimensions =
            PitchedDimensions::new(width, height, F::BYTES_PER_PIXEL, HOST_ROW_ALIGNMENT)?;
        let len = dimensions.byte_len();
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| AllocationError::Host(len))?;
        data.resize(len, 0);
        Ok(Self {
            data,
            dimensions,
            format: PhantomData,
        })
    }

    /// Allocates an image and fills it from tightly packed rows.
    pub fn from_packed(width: u32, height: u32, pixels: &[u8]) -> Result<Self, AllocationError> {
        let mut image = Self::new(width, height)?;
        let row_bytes = image.dimensions.unpadded_bytes_per_row;
        let expected = row_bytes * height as usize;
        if pixels.len() != expected {
            return Err(AllocationError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        let pitch = image.pitch();
        copy_rows(
            pixels,
            row_bytes,
            &mut image.data,
            pitch,
            row_bytes,
            height as usize,
        );
        Ok(image)
    }

    /// Swaps pixels, size and pitch with `other`. Exchanging twice restores both images.
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

    /// Number of meaningful bytes in each row.
    pub fn row_bytes(&self) -> usize {
        self.dimensions.unpadded_bytes_per_row
    }

    /// All `pitch * height` bytes, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The meaningful bytes of row `y`.
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height(), "row index out of bounds");
        let start = y as usize * self.pitch();
        &self.data[start..start + self.row_bytes()]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height(), "row index out of bounds");
        let start = y as usize * self.pitch();
        let row_bytes = self.row_bytes();
        &mut self.data[start..start + row_bytes]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height()).map(move |y| self.row(y))
    }

    /// Copies the image into tightly packed rows, dropping the padding.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(self.row_bytes() * self.height() as usize);
        for row in self.rows() {
            packed.extend_from_slice(row);
        }
        packed
    }

    /// True when both images have the same size and identical meaningful bytes in every row.
    pub fn same_pixels(&self, other: &Self) -> bool {
        self.size() == other.size() && self.rows().eq(other.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::gradient;

    #[test]
    fn pitch_covers_row() {
        for width in [1, 2, 3, 5, 4097] {
            let gray = HostImageC1::new(width, 3).unwrap();
            assert!(gray.pitch() >= width as usize);
            assert_eq!(gray.pitch() % HOST_ROW_ALIGNMENT, 0);
            // last byte of the last padded row is inside the allocation
            assert_eq!(gray.data()[gray.pitch() * 3 - 1], 0);
            let rgba = HostImageC4::new(width, 3).unwrap();
            assert!(rgba.pitch() >= width as usize * 4);
            assert_eq!(rgba.data().len(), rgba.pitch() * 3);
        }
    }

    #[test]
    fn zero_size_fails() {
        assert_eq!(
            HostImageC1::new(0, 10),
            Err(AllocationError::ZeroSized {
                width: 0,
                height: 10
            })
        );
        assert!(HostImageC4::new(10, 0).is_err());
    }

    #[test]
    fn packed_round_trip() {
        let packed: Vec<u8> = (0..3 * 2).collect();
        let image = HostImageC1::from_packed(3, 2, &packed).unwrap();
        assert_eq!(image.pitch(), 4);
        assert_eq!(image.row(0), &[0, 1, 2]);
        assert_eq!(image.row(1), &[3, 4, 5]);
        assert_eq!(image.to_packed(), packed);
    }

    #[test]
    fn packed_length_mismatch() {
        assert_eq!(
            HostImageC4::from_packed(2, 2, &[0; 15]),
            Err(AllocationError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn exchange_is_its_own_inverse() {
        let mut a = gradient::<Rgba8>(7, 5);
        let mut b = HostImageC4::new(3, 9).unwrap();
        let a_packed = a.to_packed();
        let b_packed = b.to_packed();

        a.exchange(&mut b);
        assert_eq!(a.size(), Size::new(3, 9));
        assert_eq!(b.size(), Size::new(7, 5));
        assert_eq!(b.to_packed(), a_packed);

        a.exchange(&mut b);
        assert_eq!(a.size(), Size::new(7, 5));
        assert_eq!(a.to_packed(), a_packed);
        assert_eq!(b.to_packed(), b_packed);
    }

    #[test]
    fn same_pixels_ignores_padding() {
        let mut a = gradient::<Gray8>(3, 2);
        let b = gradient::<Gray8>(3, 2);
        let pitch = a.pitch();
        a.data_mut()[pitch - 1] = 0xAB;
        assert!(a.same_pixels(&b));
        a.row_mut(1)[0] ^= 1;
        assert!(!a.same_pixels(&b));
    }
}
