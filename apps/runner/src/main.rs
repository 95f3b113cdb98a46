//! Depth Camera Runner
//!
//! Live depth estimation on a USB camera:
//! capture → resize → NPU inference → colormapped depth → side-by-side view,
//! teed to a preview window and an H.264/MP4 file.
//!
//! Configuration is loaded from config.toml in the working directory; there
//! are no command-line flags. Initialization failures exit with the NPU
//! runtime's status code; the run loop ends on end-of-stream, a fatal sink
//! error, or the preview window closing.

use anyhow::{Context, Result};
use common_io::ProcessedFramePacket;
use config::AppConfig;
use hailo_infer::{HailoError, HailoEstimator, NetworkGroup, Shim, VDevice};
use pipeline::{run_processing_loop, FrameProcessor, LatestFrameSlot, ProcessingStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use v4l2_input::{CaptureConfig, CaptureSession};
use video_output::{DisplaySink, FrameSink, VideoFileSink};

const CONFIG_PATH: &str = "config.toml";
const OUTPUT_QUEUE_DEPTH: usize = 4;

fn main() {
    let cfg = match config::load_config(CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    let engine = match init_engine(&cfg) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("NPU initialization failed: {e}");
            std::process::exit(e.status_code());
        }
    };

    if let Err(e) = run(&cfg, engine) {
        eprintln!("Fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_engine(cfg: &AppConfig) -> Result<HailoEstimator, HailoError> {
    println!("🔧 [1/4] NPU Runtime");
    let shim = Shim::load(&cfg.model.shim_lib)?;
    let vdevice = VDevice::create(&shim)?;
    let network = NetworkGroup::configure(&vdevice, &cfg.model.hef_path)?;
    println!("  ✓ Configured {}", cfg.model.hef_path);

    for info in network.input_infos() {
        println!(
            "  Input vstream '{}': {}x{}x{} ({} bytes/frame)",
            info.name, info.height, info.width, info.features, info.frame_size
        );
    }
    for info in network.output_infos() {
        println!(
            "  Output vstream '{}': {}x{}x{} ({} bytes/frame)",
            info.name, info.height, info.width, info.features, info.frame_size
        );
    }

    Ok(HailoEstimator::new(network))
}

fn run(cfg: &AppConfig, mut engine: HailoEstimator) -> Result<()> {
    let processor = FrameProcessor::from_config(cfg)?;
    let (out_width, out_height) = processor.output_dims();

    let mut logger = telemetry::TimingLogger::open(&cfg.logging.timing_log)?;

    println!("📹 [2/4] Camera Capture");
    let capture = CaptureSession::open(CaptureConfig {
        device: cfg.device.clone(),
        width: cfg.video.input.width,
        height: cfg.video.input.height,
    })?;
    println!(
        "  ✓ {} at {}x{}",
        cfg.device, cfg.video.input.width, cfg.video.input.height
    );

    println!("🖥️  [3/4] Preview Window");
    let mut display = DisplaySink::new(
        "Depth Estimation (camera | depth)",
        out_width,
        out_height,
        cfg.video.framerate,
    )?;
    println!("  ✓ {}x{}", out_width, out_height);

    println!("🎬 [4/4] Video File Sink");
    let mut file_sink = VideoFileSink::new(
        &cfg.video.output.file,
        out_width,
        out_height,
        cfg.video.framerate,
        cfg.encoder.speed_preset,
        cfg.encoder.tune,
    )?;
    println!(
        "  ✓ {} ({} fps, preset {}, tune {})",
        cfg.video.output.file, cfg.video.framerate, cfg.encoder.speed_preset, cfg.encoder.tune
    );
    println!();

    let slot = Arc::new(LatestFrameSlot::new());
    let running = Arc::new(AtomicBool::new(true));
    let (out_tx, out_rx) = mpsc::sync_channel::<ProcessedFramePacket>(OUTPUT_QUEUE_DEPTH);

    // Capture thread: camera -> slot (latest frame wins).
    let capture_handle = {
        let slot = Arc::clone(&slot);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let result = capture.run(|packet| {
                slot.put(packet);
                running.load(Ordering::SeqCst)
            });
            if let Err(e) = result {
                eprintln!("Capture stopped: {e:#}");
            }
            // Either way the stream is over for the consumer.
            slot.close();
        })
    };

    // Processing thread: slot -> inference -> output channel.
    let processing_handle = {
        let slot = Arc::clone(&slot);
        let running = Arc::clone(&running);
        thread::spawn(move || -> ProcessingStats {
            run_processing_loop(&slot, &processor, &mut engine, &mut logger, &out_tx, &running)
        })
    };

    // Output loop on the main thread: tee to display and file.
    let mut frames_out: u64 = 0;
    loop {
        if !display.is_open() {
            println!("Preview window closed");
            break;
        }
        match out_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => {
                if let Err(e) = display.push_frame(&frame) {
                    eprintln!("Display error: {e}");
                    break;
                }
                if let Err(e) = file_sink.push_frame(&frame) {
                    eprintln!("Encode error: {e}");
                    break;
                }
                frames_out += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                println!("End of stream");
                break;
            }
        }
    }

    // Shutdown: stop the producers, drain, finalize the container.
    running.store(false, Ordering::SeqCst);
    slot.close();
    // Unblocks a processing thread waiting on a full output queue.
    drop(out_rx);
    let stats = processing_handle.join().unwrap_or_default();
    if capture_handle.join().is_err() {
        eprintln!("Capture thread panicked");
    }
    let frames_encoded = file_sink.finish().context("Failed to finalize video file")?;

    println!();
    println!("📊 Session Summary");
    println!("  Processed: {} frames", stats.frames_processed);
    println!("  Failed:    {} frames", stats.frames_failed);
    println!("  Skipped:   {} frames (camera ahead of inference)", slot.dropped_frames());
    println!("  Output:    {} frames shown, {} frames encoded", frames_out, frames_encoded);

    Ok(())
}
