//! Per-frame processing core.
//!
//! `FrameProcessor::process` is a pure function of (frame bytes, dimensions,
//! engine): no channels, no logging, no globals. The run loop owns the side
//! effects of pushing downstream and appending the timing row.

use common_io::{InferenceEngine, PipelineError, PixelFormat, ProcessedFramePacket, RawFramePacket};
use config::AppConfig;
use telemetry::{epoch_ms, now_ns, since_ms, FrameTimings};

#[derive(Debug, Clone, Copy)]
pub struct FrameProcessor {
    input_width: u32,
    input_height: u32,
    model_width: u32,
    model_height: u32,
    /// Depth pane dimensions in the side-by-side output.
    pane_width: u32,
    pane_height: u32,
    smooth_input: bool,
}

impl FrameProcessor {
    pub fn new(
        input: (u32, u32),
        model: (u32, u32),
        pane: (u32, u32),
        smooth_input: bool,
    ) -> Result<Self, PipelineError> {
        if pane.1 != input.1 {
            return Err(PipelineError::DimensionMismatch(format!(
                "output pane height {} must match input height {}",
                pane.1, input.1
            )));
        }
        Ok(Self {
            input_width: input.0,
            input_height: input.1,
            model_width: model.0,
            model_height: model.1,
            pane_width: pane.0,
            pane_height: pane.1,
            smooth_input,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, PipelineError> {
        Self::new(
            (cfg.video.input.width, cfg.video.input.height),
            (cfg.model.input_size.width, cfg.model.input_size.height),
            (cfg.video.output.width, cfg.video.output.height),
            cfg.smooth_input(),
        )
    }

    /// Dimensions of the concatenated output frame.
    pub fn output_dims(&self) -> (u32, u32) {
        (self.input_width + self.pane_width, self.input_height)
    }

    /// Run one captured frame through resize, inference and depth
    /// visualization. Returns the side-by-side frame and the stage timings;
    /// any error means the frame is dropped and nothing goes downstream.
    pub fn process<E: InferenceEngine>(
        &self,
        engine: &mut E,
        packet: &RawFramePacket,
    ) -> Result<(ProcessedFramePacket, FrameTimings), PipelineError> {
        let t_start = now_ns();

        if packet.meta.pixfmt != PixelFormat::Rgb8 {
            return Err(PipelineError::Processing(format!(
                "expected RGB frame, got {:?}",
                packet.meta.pixfmt
            )));
        }
        if packet.meta.width != self.input_width || packet.meta.height != self.input_height {
            return Err(PipelineError::DimensionMismatch(format!(
                "frame is {}x{}, pipeline configured for {}x{}",
                packet.meta.width, packet.meta.height, self.input_width, self.input_height
            )));
        }
        if packet.data.len() != packet.expected_len() {
            return Err(PipelineError::SizeMismatch {
                expected: packet.expected_len(),
                actual: packet.data.len(),
            });
        }

        // Preprocess: wrap, optional smoothing, resize to the model input.
        let t_preprocess = now_ns();
        let original = vision::wrap_rgb(packet.data.clone(), self.input_width, self.input_height)?;
        let model_input = if self.smooth_input {
            vision::resize_rgb(
                &vision::box_smooth(&original),
                self.model_width,
                self.model_height,
            )
        } else {
            vision::resize_rgb(&original, self.model_width, self.model_height)
        };
        let preprocess_ms = since_ms(t_preprocess);

        // Inference: synchronous, blocks for the device round-trip.
        let t_infer = now_ns();
        let raw_depth = engine.infer_frame(model_input.as_raw())?;
        let infer_ms = since_ms(t_infer);

        if raw_depth.is_empty() {
            return Err(PipelineError::Inference("Output buffer is empty".into()));
        }

        // Postprocess: decode, normalize, colormap, reorder, resize, concat.
        let t_postprocess = now_ns();
        let depth = vision::decode_i8(&raw_depth, self.model_width, self.model_height)?;
        let normalized = vision::normalize_minmax(&depth);
        let mut colored = vision::apply_magma(&normalized);
        vision::swap_rb(&mut colored);
        let pane = vision::resize_rgb(&colored, self.pane_width, self.pane_height);
        let side_by_side = vision::hconcat(&original, &pane)?;
        let postprocess_ms = since_ms(t_postprocess);

        let (out_width, out_height) = self.output_dims();
        let output = ProcessedFramePacket {
            from: packet.meta,
            width: out_width,
            height: out_height,
            data: side_by_side.into_raw(),
        };

        let timings = FrameTimings {
            timestamp_ms: epoch_ms(),
            preprocess_ms,
            infer_ms,
            postprocess_ms,
            total_ms: since_ms(t_start),
        };
        Ok((output, timings))
    }
}
