#[cfg(feature = "debug")]
use renderdoc::{RenderDoc, V110};
use wgpu_mipchain::*;

fn main() {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: mipchain <image> [output-prefix]");
    let prefix = std::env::args().nth(2).unwrap_or_else(|| "mip".to_string());

    #[cfg(feature = "debug")]
    let mut rd: RenderDoc<V110> = RenderDoc::new().expect("Unable to connect");
    #[cfg(feature = "debug")]
    rd.start_frame_capture(std::ptr::null(), std::ptr::null());

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    futures::executor::block_on(async {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find an appropiate adapter");
        // Create the logical device and command queue
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let resampler = ComputeResampler::new(&device);
        let mut stream = Stream::new(&device, &queue);
        let source = load_device::<Rgba8>(&path, &mut stream).expect("Failed to load image");
        let chain = MipChainBuilder::new()
            .halving_full()
            .interpolation(Interpolation::Super)
            .build(&resampler, &mut stream, &source)
            .expect("Failed to build mip chain");

        // Write the different mip levels as files
        for level in &chain {
            let size = level.size();
            let file = format!("{}-{}.png", prefix, level.index());
            save_device(level.image(), &file, &mut stream).expect("Failed to save level");
            println!("{} {}x{}", file, size.width, size.height);
        }
    });

    #[cfg(feature = "debug")]
    rd.end_frame_capture(std::ptr::null(), std::ptr::null());
}
