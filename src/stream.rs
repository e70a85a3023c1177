use crate::core::*;
use crate::util::pop_error_scope;

/// An ordered command queue token.
///
/// Uploads, downloads and resamples record into a single pending command encoder, so they
/// execute in the order they were enqueued. Nothing reaches the device until
/// [`flush`](Stream::flush) or [`synchronize`](Stream::synchronize) is called. Work on two
/// streams sharing a queue is ordered only by the order in which the streams are flushed.
///
/// A `Stream` is supplied by the surrounding application; this crate never creates one for you.
pub struct Stream<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,
    enqueued: usize,
}

impl<'a> Stream<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            encoder: None,
            enqueued: 0,
        }
    }

    pub fn device(&self) -> &'a wgpu::Device {
        self.device
    }

    pub fn queue(&self) -> &'a wgpu::Queue {
        self.queue
    }

    /// Number of operations enqueued since the last flush.
    pub fn pending(&self) -> usize {
        self.enqueued
    }

    /// The encoder operations are recorded into. Every call counts as one enqueued operation.
    pub(crate) fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.enqueued += 1;
        let device = self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("wgpu-mipchain-stream"),
            })
        })
    }

    /// Submits everything enqueued so far without waiting for it to complete.
    pub fn flush(&mut self) -> Result<(), DeviceError> {
        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => return Ok(()),
        };
        log::debug!("[Stream::flush] submitting {} operations", self.enqueued);
        self.enqueued = 0;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.submit(std::iter::once(encoder.finish()));
        match pop_error_scope(self.device) {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Submits everything enqueued so far and blocks until the device has completed it.
    ///
    /// This is the only point at which results of enqueued work become observable from the
    /// host. The wait is unbounded.
    pub fn synchronize(&mut self) -> Result<(), DeviceError> {
        self.flush()?;
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}

impl Drop for Stream<'_> {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            log::warn!(
                "[Stream::drop] discarding {} enqueued operations that were never flushed",
                self.enqueued
            );
        }
    }
}

impl std::fmt::Debug for Stream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("pending", &self.enqueued)
            .finish()
    }
}
