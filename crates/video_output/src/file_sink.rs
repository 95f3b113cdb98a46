//! Encode-to-file sink: x264 encode + MP4 mux behind one [`FrameSink`].

use crate::encoder::H264Encoder;
use crate::muxer::Mp4Muxer;
use crate::FrameSink;
use common_io::{PipelineError, ProcessedFramePacket};

pub struct VideoFileSink {
    encoder: H264Encoder,
    muxer: Mp4Muxer,
    frames_written: u64,
}

impl VideoFileSink {
    pub fn new(
        path: &str,
        width: u32,
        height: u32,
        fps: u32,
        speed_preset: u32,
        tune: u32,
    ) -> Result<Self, PipelineError> {
        let encoder = H264Encoder::new(width, height, fps, speed_preset, tune)?;
        let muxer = Mp4Muxer::new(
            path,
            width,
            height,
            fps,
            encoder.time_base(),
            &encoder.extradata(),
        )?;
        Ok(Self {
            encoder,
            muxer,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush the encoder, write the remaining packets and the trailer.
    pub fn finish(mut self) -> Result<u64, PipelineError> {
        for packet in self.encoder.finish()? {
            self.muxer.write_packet(&packet)?;
        }
        self.muxer.finish()?;
        Ok(self.frames_written)
    }
}

impl FrameSink for VideoFileSink {
    fn push_frame(&mut self, frame: &ProcessedFramePacket) -> Result<(), PipelineError> {
        for packet in self.encoder.encode(&frame.data)? {
            self.muxer.write_packet(&packet)?;
        }
        self.frames_written += 1;
        Ok(())
    }
}
