//! Loading and saving images through the `image` crate.
//!
//! Host images are always top-to-bottom. Containers that store the bottom scan-line first
//! (BMP) are flipped by the codec on the way in and out; this module only translates between
//! the codec's tightly packed rows and host pitch.
use crate::core::*;
use crate::device::DeviceImage;
use crate::format::PixelFormat;
use crate::host::HostImage;
use crate::stream::Stream;
use image::{ColorType, ImageError, ImageFormat};
use std::path::Path;

/// Decodes the file at `path` into a host image of format `F`.
///
/// The container is detected from the file signature, falling back to the extension.
/// [`Gray8`](crate::Gray8) only accepts natively 8-bit single channel files;
/// [`Rgba8`](crate::Rgba8) converts any supported color type.
pub fn decode<F: PixelFormat>(path: impl AsRef<Path>) -> Result<HostImage<F>, DecodeError> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .map_err(|e| DecodeError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        })?
        .with_guessed_format()
        .map_err(|e| DecodeError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat(path.to_owned()));
    }
    let decoded = reader.decode().map_err(|e| decode_error(path, e))?;
    let (width, height, color) = (decoded.width(), decoded.height(), decoded.color());
    let pixels = F::packed_from(decoded).ok_or_else(|| DecodeError::ChannelMismatch {
        path: path.to_owned(),
        found: color,
        expected: F::NAME,
    })?;
    let image = HostImage::from_packed(width, height, &pixels)?;
    log::debug!(
        "[decode] {} {}x{} from `{}`",
        F::NAME,
        width,
        height,
        path.display()
    );
    Ok(image)
}

/// Encodes `host` to `path`. The container is chosen from the extension.
///
/// Only containers that decode back to the same pixel format are accepted. BMP has no
/// grayscale layout, so [`Gray8`](crate::Gray8) images cannot be written as BMP.
pub fn encode<F: PixelFormat>(host: &HostImage<F>, path: impl AsRef<Path>) -> Result<(), EncodeError> {
    let path = path.as_ref();
    let format =
        ImageFormat::from_path(path).map_err(|_| EncodeError::UnknownFormat(path.to_owned()))?;
    if !stores_natively(format, F::COLOR_TYPE) {
        return Err(EncodeError::Unsupported {
            format,
            color: F::COLOR_TYPE,
        });
    }
    let packed = host.to_packed();
    image::save_buffer_with_format(
        path,
        &packed,
        host.width(),
        host.height(),
        F::COLOR_TYPE,
        format,
    )
    .map_err(|e| match e {
        ImageError::IoError(e) => EncodeError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        },
        ImageError::Unsupported(_) => EncodeError::Unsupported {
            format,
            color: F::COLOR_TYPE,
        },
        e => EncodeError::Codec(e.to_string()),
    })?;
    log::debug!(
        "[encode] {} {}x{} to `{}`",
        F::NAME,
        host.width(),
        host.height(),
        path.display()
    );
    Ok(())
}

/// Decodes `path` and enqueues an upload of it on `stream`.
pub fn load_device<F: PixelFormat>(
    path: impl AsRef<Path>,
    stream: &mut Stream<'_>,
) -> Result<DeviceImage<F>, Error> {
    let host = decode::<F>(path)?;
    DeviceImage::from_host(stream, &host)
}

/// Downloads `image`, synchronizing `stream`, and encodes it to `path`.
pub fn save_device<F: PixelFormat>(
    image: &DeviceImage<F>,
    path: impl AsRef<Path>,
    stream: &mut Stream<'_>,
) -> Result<(), Error> {
    let host = image.to_host(stream)?;
    encode(&host, path)?;
    Ok(())
}

/// Whether `format` can hold `color` pixels without a palette or conversion.
fn stores_natively(format: ImageFormat, color: ColorType) -> bool {
    // 8-bit BMPs are paletted and come back as Rgb8
    !matches!((format, color), (ImageFormat::Bmp, ColorType::L8))
}

fn decode_error(path: &Path, err: ImageError) -> DecodeError {
    match err {
        ImageError::IoError(e) => DecodeError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        },
        ImageError::Unsupported(_) => DecodeError::UnknownFormat(path.to_owned()),
        e => DecodeError::Codec(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Gray8, Rgba8};
    use crate::util::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn gray_round_trip() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let image = gradient::<Gray8>(33, 17);
        for name in ["gray.png", "gray.pgm"] {
            let path = dir.path().join(name);
            encode(&image, &path).unwrap();
            let decoded = decode::<Gray8>(&path).unwrap();
            assert!(decoded.same_pixels(&image), "{}", name);
        }
        // a bmp could only hold the image as a palette, which decodes as color
        let path = dir.path().join("gray.bmp");
        assert_eq!(
            encode(&image, &path),
            Err(EncodeError::Unsupported {
                format: ImageFormat::Bmp,
                color: ColorType::L8,
            })
        );
        assert!(!path.exists());
    }

    #[test]
    fn rgba_round_trip() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let image = gradient::<Rgba8>(1, 5);
        for name in ["rgba.png", "rgba.bmp"] {
            let path = dir.path().join(name);
            encode(&image, &path).unwrap();
            let decoded = decode::<Rgba8>(&path).unwrap();
            assert!(decoded.same_pixels(&image), "{}", name);
        }
    }

    #[test]
    fn bmp_rows_are_stored_bottom_up() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flip.bmp");
        let (width, height) = (3, 4);
        let image = gradient::<Rgba8>(width, height);
        encode(&image, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let offset = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;
        let stored_height = i32::from_le_bytes([bytes[22], bytes[23], bytes[24], bytes[25]]);
        assert_eq!(stored_height, height as i32);
        // the first stored scan-line is the visual bottom row, in BGRA order
        let bottom = image.row(height - 1);
        let first = &bytes[offset..offset + 4];
        assert_eq!(first, [bottom[2], bottom[1], bottom[0], bottom[3]]);

        // and decoding puts the visual top row back at row 0
        let decoded = decode::<Rgba8>(&path).unwrap();
        assert_eq!(decoded.row(0), image.row(0));
    }

    #[test]
    fn gray_loader_rejects_color_file() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        encode(&gradient::<Rgba8>(4, 4), &path).unwrap();
        assert_eq!(
            decode::<Gray8>(&path),
            Err(DecodeError::ChannelMismatch {
                path: path.clone(),
                found: image::ColorType::Rgba8,
                expected: "Gray8",
            })
        );
        // the four channel loader converts instead
        assert!(decode::<Rgba8>(&path).is_ok());
    }

    #[test]
    fn rgba_loader_converts_gray_file() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        let gray = gradient::<Gray8>(5, 2);
        encode(&gray, &path).unwrap();
        let rgba = decode::<Rgba8>(&path).unwrap();
        for y in 0..2 {
            for (x, px) in rgba.row(y).chunks(4).enumerate() {
                let v = gray.row(y)[x];
                assert_eq!(px, [v, v, v, 255]);
            }
        }
    }

    #[test]
    fn decode_failures() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(matches!(
            decode::<Rgba8>(&missing),
            Err(DecodeError::Io { .. })
        ));
        let garbage = dir.path().join("garbage.xyz");
        std::fs::write(&garbage, b"definitely not an image").unwrap();
        assert_eq!(
            decode::<Rgba8>(&garbage),
            Err(DecodeError::UnknownFormat(garbage.clone()))
        );
    }

    #[test]
    fn encode_failures() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let image = gradient::<Gray8>(4, 4);
        let unknown = dir.path().join("out.xyz");
        assert_eq!(
            encode(&image, &unknown),
            Err(EncodeError::UnknownFormat(unknown.clone()))
        );
        let unwritable = dir.path().join("no-such-dir").join("out.png");
        assert!(matches!(
            encode(&image, &unwritable),
            Err(EncodeError::Io { .. })
        ));
    }

    #[test]
    fn device_round_trip_through_file() {
        init();
        futures::executor::block_on(async {
            let (device, queue) = test_device().await;
            let dir = tempfile::tempdir().unwrap();
            let input = dir.path().join("in.png");
            let output = dir.path().join("out.png");
            let image = gradient::<Rgba8>(70, 9);
            encode(&image, &input).unwrap();

            let mut stream = Stream::new(&device, &queue);
            let on_device = load_device::<Rgba8>(&input, &mut stream).unwrap();
            save_device(&on_device, &output, &mut stream).unwrap();
            assert!(decode::<Rgba8>(&output).unwrap().same_pixels(&image));
        });
    }
}
