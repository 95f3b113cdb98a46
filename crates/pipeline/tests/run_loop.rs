//! Run-loop behavior: drop-and-continue on failure, nothing pushed on error.

use common_io::{FrameMeta, InferenceEngine, PipelineError, PixelFormat, RawFramePacket};
use pipeline::{run_processing_loop, FrameProcessor, LatestFrameSlot};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;

struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn input_frame_size(&self) -> usize {
        64 * 64 * 3
    }
    fn infer_frame(&mut self, _input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::Inference("Inference failed (status 4)".into()))
    }
}

struct FlatEngine;

impl InferenceEngine for FlatEngine {
    fn input_frame_size(&self) -> usize {
        64 * 64 * 3
    }
    fn infer_frame(&mut self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        assert_eq!(input.len(), self.input_frame_size());
        Ok(vec![0u8; 64 * 64])
    }
}

fn frame(idx: u64) -> RawFramePacket {
    RawFramePacket {
        meta: FrameMeta {
            source_id: 0,
            width: 64,
            height: 64,
            pixfmt: PixelFormat::Rgb8,
            frame_idx: idx,
            t_capture_ns: 0,
        },
        data: vec![128u8; 64 * 64 * 3],
    }
}

fn temp_log(tag: &str) -> String {
    let dir = std::env::temp_dir().join("depthcam_runloop_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{}_{}.csv", tag, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path.to_str().unwrap().to_string()
}

#[test]
fn test_failed_frames_push_nothing_downstream() {
    let slot = LatestFrameSlot::new();
    slot.put(frame(0));
    slot.close();

    let processor = FrameProcessor::new((64, 64), (64, 64), (64, 64), false).unwrap();
    let mut logger = telemetry::TimingLogger::open(&temp_log("failures")).unwrap();
    let (tx, rx) = mpsc::sync_channel(4);
    let running = AtomicBool::new(true);

    let stats = run_processing_loop(
        &slot,
        &processor,
        &mut FailingEngine,
        &mut logger,
        &tx,
        &running,
    );

    assert_eq!(stats.frames_processed, 0);
    assert_eq!(stats.frames_failed, 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_successful_frames_are_forwarded_and_logged() {
    let slot = LatestFrameSlot::new();
    slot.put(frame(0));
    slot.close();

    let processor = FrameProcessor::new((64, 64), (64, 64), (64, 64), false).unwrap();
    let log_path = temp_log("success");
    let mut logger = telemetry::TimingLogger::open(&log_path).unwrap();
    let (tx, rx) = mpsc::sync_channel(4);
    let running = AtomicBool::new(true);

    let stats = run_processing_loop(
        &slot,
        &processor,
        &mut FlatEngine,
        &mut logger,
        &tx,
        &running,
    );
    drop(logger);

    assert_eq!(stats.frames_processed, 1);
    assert_eq!(stats.frames_failed, 0);

    let output = rx.try_recv().unwrap();
    assert_eq!((output.width, output.height), (128, 64));
    assert_eq!(output.data.len(), 128 * 64 * 3);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.starts_with(telemetry::TIMING_HEADER));
}
