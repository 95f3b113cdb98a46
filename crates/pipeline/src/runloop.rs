//! Processing-thread run loop: slot in, bounded channel out.

use crate::{FrameProcessor, LatestFrameSlot};
use common_io::{InferenceEngine, ProcessedFramePacket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use telemetry::TimingLogger;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    pub frames_failed: u64,
}

/// Pull frames from the slot until it closes (or `running` clears), run each
/// through the processor, push results downstream and append one timing row
/// per processed frame.
///
/// Per-frame failures are reported to stderr and the frame is dropped; the
/// loop keeps going. A closed output channel means the display half has shut
/// down and ends the loop.
pub fn run_processing_loop<E: InferenceEngine>(
    slot: &LatestFrameSlot,
    processor: &FrameProcessor,
    engine: &mut E,
    logger: &mut TimingLogger,
    out_tx: &SyncSender<ProcessedFramePacket>,
    running: &AtomicBool,
) -> ProcessingStats {
    let mut stats = ProcessingStats::default();

    while running.load(Ordering::SeqCst) {
        let Some(frame) = slot.take() else {
            break;
        };

        match processor.process(engine, &frame) {
            Ok((output, timings)) => {
                if out_tx.send(output).is_err() {
                    break;
                }
                if let Err(e) = logger.log_frame(&timings) {
                    eprintln!("Timing log write failed: {e}");
                }
                println!(
                    "⏱️  preprocess: {:.1}ms | infer: {:.1}ms | postprocess: {:.1}ms | total: {:.1}ms",
                    timings.preprocess_ms,
                    timings.infer_ms,
                    timings.postprocess_ms,
                    timings.total_ms
                );
                stats.frames_processed += 1;
            }
            Err(e) => {
                eprintln!("Frame {} dropped: {e}", frame.meta.frame_idx);
                stats.frames_failed += 1;
            }
        }
    }

    stats
}
