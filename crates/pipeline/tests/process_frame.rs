//! End-to-end checks for the per-frame processing core with a mock engine.

use common_io::{
    FrameMeta, InferenceEngine, PipelineError, PixelFormat, RawFramePacket,
};
use pipeline::FrameProcessor;

/// Engine that enforces the declared input size and returns a fixed
/// signed-byte depth map, like the device path does.
struct MockEngine {
    frame_size: usize,
    output: Vec<u8>,
    calls: u64,
}

impl MockEngine {
    fn with_gradient(model_width: u32, model_height: u32) -> Self {
        let pixels = (model_width * model_height) as usize;
        // Signed values sweeping the full range.
        let output = (0..pixels)
            .map(|i| ((i % 256) as i64 - 128) as i8 as u8)
            .collect();
        Self {
            frame_size: pixels * 3,
            output,
            calls: 0,
        }
    }
}

impl InferenceEngine for MockEngine {
    fn input_frame_size(&self) -> usize {
        self.frame_size
    }

    fn infer_frame(&mut self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.calls += 1;
        if input.len() != self.frame_size {
            return Err(PipelineError::SizeMismatch {
                expected: self.frame_size,
                actual: input.len(),
            });
        }
        Ok(self.output.clone())
    }
}

struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn input_frame_size(&self) -> usize {
        256 * 256 * 3
    }

    fn infer_frame(&mut self, _input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::Inference("Inference failed (status 4)".into()))
    }
}

fn camera_frame(width: u32, height: u32) -> RawFramePacket {
    RawFramePacket {
        meta: FrameMeta {
            source_id: 0,
            width,
            height,
            pixfmt: PixelFormat::Rgb8,
            frame_idx: 0,
            t_capture_ns: 0,
        },
        data: (0..width as usize * height as usize * 3)
            .map(|i| (i % 251) as u8)
            .collect(),
    }
}

#[test]
fn test_side_by_side_output_dimensions() {
    // 640x480 camera, 256x256 model, 640x480 depth pane -> 1280x480 output
    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), false).unwrap();
    let mut engine = MockEngine::with_gradient(256, 256);

    let (output, timings) = processor
        .process(&mut engine, &camera_frame(640, 480))
        .unwrap();

    assert_eq!((output.width, output.height), (1280, 480));
    assert_eq!(output.data.len(), 1280 * 480 * 3);
    assert_eq!(engine.calls, 1);
    assert!(timings.total_ms >= 0.0);
    assert!(timings.timestamp_ms > 0);
}

#[test]
fn test_original_pixels_preserved_on_left() {
    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), false).unwrap();
    let mut engine = MockEngine::with_gradient(256, 256);
    let frame = camera_frame(640, 480);

    let (output, _) = processor.process(&mut engine, &frame).unwrap();

    // Row 0 of the output starts with row 0 of the input, untouched.
    assert_eq!(&output.data[..640 * 3], &frame.data[..640 * 3]);
}

#[test]
fn test_engine_failure_aborts_frame() {
    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), false).unwrap();
    let mut engine = FailingEngine;

    let err = processor
        .process(&mut engine, &camera_frame(640, 480))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
}

#[test]
fn test_undersized_buffer_is_rejected() {
    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), false).unwrap();
    let mut engine = MockEngine::with_gradient(256, 256);

    let mut frame = camera_frame(640, 480);
    frame.data.truncate(100);
    let err = processor.process(&mut engine, &frame).unwrap_err();
    assert!(matches!(err, PipelineError::SizeMismatch { .. }));
    assert_eq!(engine.calls, 0);
}

#[test]
fn test_input_size_mismatch_with_engine() {
    // Processor resizes to 128x128 but the engine expects 256x256x3 bytes;
    // the engine must report the mismatch instead of producing output.
    let processor =
        FrameProcessor::new((640, 480), (128, 128), (640, 480), false).unwrap();
    let mut engine = MockEngine::with_gradient(256, 256);

    let err = processor
        .process(&mut engine, &camera_frame(640, 480))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SizeMismatch {
            expected,
            actual
        } if expected == 256 * 256 * 3 && actual == 128 * 128 * 3
    ));
}

#[test]
fn test_wrong_output_size_is_rejected() {
    struct ShortOutputEngine;
    impl InferenceEngine for ShortOutputEngine {
        fn input_frame_size(&self) -> usize {
            256 * 256 * 3
        }
        fn infer_frame(&mut self, _input: &[u8]) -> Result<Vec<u8>, PipelineError> {
            Ok(vec![0u8; 100])
        }
    }

    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), false).unwrap();
    let err = processor
        .process(&mut ShortOutputEngine, &camera_frame(640, 480))
        .unwrap_err();
    assert!(matches!(err, PipelineError::SizeMismatch { .. }));
}

#[test]
fn test_pane_height_must_match_input() {
    assert!(FrameProcessor::new((640, 480), (256, 256), (640, 360), false).is_err());
}

#[test]
fn test_smoothing_keeps_output_contract() {
    let processor =
        FrameProcessor::new((640, 480), (256, 256), (640, 480), true).unwrap();
    let mut engine = MockEngine::with_gradient(256, 256);
    let (output, _) = processor
        .process(&mut engine, &camera_frame(640, 480))
        .unwrap();
    assert_eq!(output.data.len(), 1280 * 480 * 3);
}
