//! Display/encode half of the pipeline.
//!
//! Two typed sinks consume the processed side-by-side frames: a preview
//! window and an H.264/MP4 file writer. Both implement [`FrameSink`] so the
//! output loop can tee one frame into each.

mod display;
mod encoder;
mod ffi;
mod file_sink;
mod muxer;

pub use display::DisplaySink;
pub use encoder::{EncodedPacket, H264Encoder};
pub use file_sink::VideoFileSink;
pub use muxer::Mp4Muxer;

use common_io::{PipelineError, ProcessedFramePacket};

/// A consumer of processed frames on the output side.
pub trait FrameSink {
    fn push_frame(&mut self, frame: &ProcessedFramePacket) -> Result<(), PipelineError>;
}
