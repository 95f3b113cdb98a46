//! Preview window sink.

use crate::FrameSink;
use common_io::{PipelineError, ProcessedFramePacket};
use minifb::{Window, WindowOptions};

pub struct DisplaySink {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl DisplaySink {
    pub fn new(title: &str, width: u32, height: u32, fps: u32) -> Result<Self, PipelineError> {
        let mut window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .map_err(|e| PipelineError::Display(format!("Failed to create window: {e}")))?;
        window.set_target_fps(fps as usize);

        Ok(Self {
            window,
            buffer: vec![0u32; width as usize * height as usize],
            width: width as usize,
            height: height as usize,
        })
    }

    /// The run loop stops when the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }
}

impl FrameSink for DisplaySink {
    fn push_frame(&mut self, frame: &ProcessedFramePacket) -> Result<(), PipelineError> {
        let expected = self.width * self.height * 3;
        if frame.data.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: frame.data.len(),
            });
        }

        for (dst, rgb) in self.buffer.iter_mut().zip(frame.data.chunks_exact(3)) {
            *dst = (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| PipelineError::Display(format!("Window update failed: {e}")))
    }
}
