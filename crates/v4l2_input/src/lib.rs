//! V4L2 camera capture.
//!
//! Opens a camera device, negotiates interleaved RGB frames at a fixed size,
//! and streams them as [`RawFramePacket`]s over memory-mapped buffers.

use anyhow::{bail, Context, Result};
use common_io::{FrameMeta, PixelFormat, RawFramePacket};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

const RGB3: &[u8; 4] = b"RGB3";
const BUFFER_COUNT: u32 = 4;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
}

pub fn expected_frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// RAII wrapper around an opened camera device with a negotiated format.
pub struct CaptureSession {
    dev: Device,
    config: CaptureConfig,
}

impl CaptureSession {
    /// Open the device and negotiate RGB at the requested size.
    ///
    /// Fails if the driver adjusts the format away from the request; the
    /// pipeline topology is fixed and cannot adapt at runtime.
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let dev = Device::with_path(&config.device)
            .with_context(|| format!("Failed to open capture device {}", config.device))?;

        let mut fmt = dev.format().context("Failed to query capture format")?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(RGB3);
        let actual = dev
            .set_format(&fmt)
            .context("Failed to set capture format")?;

        if actual.width != config.width
            || actual.height != config.height
            || actual.fourcc != FourCC::new(RGB3)
        {
            bail!(
                "Device {} negotiated {}x{} {}, wanted {}x{} RGB3",
                config.device,
                actual.width,
                actual.height,
                actual.fourcc,
                config.width,
                config.height
            );
        }

        Ok(Self { dev, config })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Pull frames until `on_frame` returns false or the stream errors out.
    ///
    /// Each delivered packet owns its bytes; the mmap buffer is recycled as
    /// soon as the copy is made.
    pub fn run(self, mut on_frame: impl FnMut(RawFramePacket) -> bool) -> Result<()> {
        let mut stream = Stream::with_buffers(&self.dev, Type::VideoCapture, BUFFER_COUNT)
            .context("Failed to start capture stream")?;

        let frame_len = expected_frame_len(self.config.width, self.config.height);
        let mut frame_idx: u64 = 0;

        loop {
            let (buf, _meta) = stream.next().context("Capture stream error")?;
            if buf.len() < frame_len {
                bail!(
                    "Short capture buffer: {} bytes, need {}",
                    buf.len(),
                    frame_len
                );
            }

            let packet = RawFramePacket {
                meta: FrameMeta {
                    source_id: 0,
                    width: self.config.width,
                    height: self.config.height,
                    pixfmt: PixelFormat::Rgb8,
                    frame_idx,
                    t_capture_ns: telemetry::now_ns(),
                },
                data: buf[..frame_len].to_vec(),
            };
            frame_idx += 1;

            if !on_frame(packet) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_frame_len() {
        assert_eq!(expected_frame_len(640, 480), 640 * 480 * 3);
        assert_eq!(expected_frame_len(0, 480), 0);
    }
}
