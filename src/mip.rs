use crate::core::*;
use crate::device::DeviceImage;
use crate::format::PixelFormat;
use crate::stream::Stream;
use crate::util::{full_level_count, halved_size};
use log::{debug, warn};

/// Enqueues a resample of `source_region` of `source` (the full image when `None`) into a new
/// `target`-sized device image.
///
/// The returned image can be used for further enqueuing right away; its contents are only
/// valid once `stream` has been synchronized. Every failure, including running out of device
/// memory for the new image, is a [`ResizeError`].
pub fn generate<F: PixelFormat, R: Resample>(
    resampler: &R,
    stream: &mut Stream<'_>,
    source: &DeviceImage<F>,
    source_region: Option<Rect>,
    target: Size,
    mode: Interpolation,
) -> Result<DeviceImage<F>, ResizeError> {
    if target.is_empty() {
        return Err(ResizeError::EmptyTarget(target));
    }
    let region = source_region.unwrap_or_else(|| source.extent());
    if !region.fits_within(source.size()) {
        return Err(ResizeError::RegionOutOfBounds {
            region,
            size: source.size(),
        });
    }
    let mut image = DeviceImage::new(stream.device(), target.width, target.height)?;
    let extent = image.extent();
    resampler.resize(stream, source, region, &mut image, extent, mode)?;
    Ok(image)
}

/// Which image each generated mip level is resampled from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum MipSource {
    /// Every level is an independent resample of the source region.
    #[default]
    Original,
    /// Every level is resampled from the level before it. Cheaper for long chains, but
    /// resampling error compounds from level to level.
    Cascade,
}

#[derive(Debug)]
enum LevelImage<'s, F: PixelFormat> {
    Source(&'s DeviceImage<F>),
    Generated(DeviceImage<F>),
}

/// One level of a [`MipChain`].
#[derive(Debug)]
pub struct MipLevel<'s, F: PixelFormat> {
    index: u32,
    image: LevelImage<'s, F>,
}

impl<'s, F: PixelFormat> MipLevel<'s, F> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> Size {
        self.image().size()
    }

    pub fn image(&self) -> &DeviceImage<F> {
        match &self.image {
            LevelImage::Source(image) => image,
            LevelImage::Generated(image) => image,
        }
    }

    /// True for level 0, which borrows the source image instead of owning a resample.
    pub fn is_source(&self) -> bool {
        matches!(self.image, LevelImage::Source(_))
    }
}

/// Levels ordered by strictly increasing index and non-increasing area. Never empty: level 0
/// is always the source image.
#[derive(Debug)]
pub struct MipChain<'s, F: PixelFormat> {
    levels: Vec<MipLevel<'s, F>>,
}

impl<'s, F: PixelFormat> MipChain<'s, F> {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false; a chain holds at least its source level.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[MipLevel<'s, F>] {
        &self.levels
    }

    pub fn get(&self, index: usize) -> Option<&MipLevel<'s, F>> {
        self.levels.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MipLevel<'s, F>> {
        self.levels.iter()
    }

    pub fn source(&self) -> &DeviceImage<F> {
        self.levels[0].image()
    }

    /// Releases the borrow of the source and returns the owned levels 1..N in order.
    pub fn into_generated(self) -> Vec<DeviceImage<F>> {
        self.levels
            .into_iter()
            .filter_map(|level| match level.image {
                LevelImage::Source(_) => None,
                LevelImage::Generated(image) => Some(image),
            })
            .collect()
    }
}

impl<'a, 's, F: PixelFormat> IntoIterator for &'a MipChain<'s, F> {
    type Item = &'a MipLevel<'s, F>;
    type IntoIter = std::slice::Iter<'a, MipLevel<'s, F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Targets {
    Sizes(Vec<Size>),
    Halving(u32),
    HalvingFull,
}

/// Describes the mip chain to build from a source device image.
///
/// ```text
/// MipChainBuilder::new()
///     .halving(3)
///     .interpolation(Interpolation::Super)
///     .build(&resampler, &mut stream, &source)?
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipChainBuilder {
    targets: Targets,
    region: Option<Rect>,
    interpolation: Interpolation,
    source: MipSource,
}

impl Default for MipChainBuilder {
    fn default() -> Self {
        Self {
            targets: Targets::Sizes(Vec::new()),
            region: None,
            interpolation: Interpolation::default(),
            source: MipSource::default(),
        }
    }
}

impl MipChainBuilder {
    /// A builder producing a chain with only the source level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit level sizes. Levels are indexed by non-increasing area regardless of the order
    /// given here.
    pub fn sizes<I: IntoIterator<Item = Size>>(mut self, sizes: I) -> Self {
        self.targets = Targets::Sizes(sizes.into_iter().collect());
        self
    }

    /// `levels` generated levels, each half the size of the one before, floored and clamped
    /// to 1.
    pub fn halving(mut self, levels: u32) -> Self {
        self.targets = Targets::Halving(levels);
        self
    }

    /// Halving levels down to 1x1.
    pub fn halving_full(mut self) -> Self {
        self.targets = Targets::HalvingFull;
        self
    }

    /// Resample only this region of the source. Defaults to the full image.
    pub fn region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn source(mut self, source: MipSource) -> Self {
        self.source = source;
        self
    }

    /// Resolves and validates the sizes of levels 1..N for a source of `source_size`.
    pub fn plan(&self, source_size: Size) -> Result<Vec<Size>, ResizeError> {
        let region = self.region.unwrap_or(Rect::from_size(source_size));
        if !region.fits_within(source_size) {
            return Err(ResizeError::RegionOutOfBounds {
                region,
                size: source_size,
            });
        }
        let base = region.size();
        let mut sizes = match &self.targets {
            Targets::Sizes(sizes) => sizes.clone(),
            Targets::Halving(levels) => (1..=*levels).map(|l| halved_size(base, l)).collect(),
            Targets::HalvingFull => (1..full_level_count(base))
                .map(|l| halved_size(base, l))
                .collect(),
        };
        sizes.sort_by_key(|size| std::cmp::Reverse(size.area()));
        for (i, &size) in sizes.iter().enumerate() {
            let index = i as u32 + 1;
            if size.is_empty() {
                return Err(ResizeError::EmptyTarget(size));
            }
            if size.width > base.width || size.height > base.height {
                return Err(ResizeError::LevelLargerThanSource {
                    index,
                    size,
                    region: base,
                });
            }
        }
        Ok(sizes)
    }

    /// Enqueues every level on `stream` back to back and returns the chain without waiting.
    ///
    /// The chain borrows `source` as level 0. If any level fails, including failing to allocate
    /// it, every level generated by this call is released and the [`ResizeError`] is returned;
    /// no partial chain is produced.
    pub fn build<'s, F: PixelFormat, R: Resample>(
        &self,
        resampler: &R,
        stream: &mut Stream<'_>,
        source: &'s DeviceImage<F>,
    ) -> Result<MipChain<'s, F>, ResizeError> {
        let sizes = self.plan(source.size()).map_err(|e| {
            warn!("[MipChainBuilder::build] rejected before enqueuing: {}", e);
            e
        })?;
        let region = self.region.unwrap_or_else(|| source.extent());
        let mut levels = Vec::with_capacity(sizes.len() + 1);
        levels.push(MipLevel {
            index: 0,
            image: LevelImage::Source(source),
        });
        for (i, size) in sizes.into_iter().enumerate() {
            let index = i as u32 + 1;
            let generated = match (self.source, levels.last()) {
                (MipSource::Cascade, Some(previous)) if !previous.is_source() => {
                    let previous = previous.image();
                    generate(
                        resampler,
                        stream,
                        previous,
                        None,
                        size,
                        self.interpolation,
                    )
                }
                _ => generate(
                    resampler,
                    stream,
                    source,
                    Some(region),
                    size,
                    self.interpolation,
                ),
            };
            let image = generated.map_err(|e| {
                warn!(
                    "[MipChainBuilder::build] level {} failed, discarding {} enqueued levels: {}",
                    index,
                    levels.len() - 1,
                    e
                );
                e
            })?;
            debug!(
                "[MipChainBuilder::build] enqueued level {} at {}x{}",
                index, size.width, size.height
            );
            levels.push(MipLevel {
                index,
                image: LevelImage::Generated(image),
            });
        }
        Ok(MipChain { levels })
    }
}
