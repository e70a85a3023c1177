/*!
Pitched host/device image buffers and mip chain generation for
[wgpu](https://github.com/gfx-rs/wgpu).

## Usage

Add this to your `Cargo.toml`:

```toml
[dependencies]
wgpu-mipchain = "0.1"
```

Example usage:

```rust,no_run
use wgpu_mipchain::*;
fn example(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<(), Error> {
    // create a resampler once and reuse it for every chain
    let resampler = ComputeResampler::new(device);
    // every upload, resample and download is enqueued on a stream
    let mut stream = Stream::new(device, queue);
    let source = load_device::<Rgba8>("cat.png", &mut stream)?;
    // level 0 is the source itself, levels 1..=3 halve it each time
    let chain = MipChainBuilder::new()
        .halving(3)
        .interpolation(Interpolation::Linear)
        .build(&resampler, &mut stream, &source)?;
    for level in &chain {
        save_device(level.image(), format!("cat-{}.png", level.index()), &mut stream)?;
    }
    Ok(())
}
```
*/
mod backends;
mod codec;
mod core;
mod device;
mod format;
mod host;
mod mip;
mod stream;

#[doc(hidden)]
pub mod util;

#[doc(inline)]
pub use crate::backends::ComputeResampler;

#[doc(inline)]
pub use crate::codec::{decode, encode, load_device, save_device};
#[doc(inline)]
pub use crate::core::*;
#[doc(inline)]
pub use crate::device::{DeviceImage, DeviceImageC1, DeviceImageC4, Download};
#[doc(inline)]
pub use crate::format::{Gray8, PixelFormat, Rgba8};
#[doc(inline)]
pub use crate::host::{HostImage, HostImageC1, HostImageC4};
#[doc(inline)]
pub use crate::mip::{generate, MipChain, MipChainBuilder, MipLevel, MipSource};
#[doc(inline)]
pub use crate::stream::Stream;
