//! Single-slot frame handoff between the capture and processing threads.
//!
//! Depth-1 queue with drop-oldest semantics: a new frame replaces an
//! unconsumed one, so the processing side always sees the most recent
//! capture and never falls behind the camera.

use common_io::RawFramePacket;
use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct SlotState {
    frame: Option<RawFramePacket>,
    closed: bool,
    dropped: u64,
}

pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    available: Condvar,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            available: Condvar::new(),
        }
    }

    /// Deposit a frame, replacing (and counting) any unconsumed one.
    /// Frames put after `close` are discarded.
    pub fn put(&self, frame: RawFramePacket) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if state.frame.replace(frame).is_some() {
            state.dropped += 1;
        }
        self.available.notify_one();
    }

    /// Block until a frame is available or the slot is closed.
    /// Returns `None` once closed and drained.
    pub fn take(&self) -> Option<RawFramePacket> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(frame) = state.frame.take() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Wake any waiting consumer and refuse further frames.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.available.notify_all();
    }

    /// Frames replaced before the consumer could take them.
    pub fn dropped_frames(&self) -> u64 {
        self.state.lock().unwrap().dropped
    }
}

impl Default for LatestFrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_io::{FrameMeta, PixelFormat};

    fn frame(idx: u64) -> RawFramePacket {
        RawFramePacket {
            meta: FrameMeta {
                source_id: 0,
                width: 2,
                height: 2,
                pixfmt: PixelFormat::Rgb8,
                frame_idx: idx,
                t_capture_ns: 0,
            },
            data: vec![0u8; 12],
        }
    }

    #[test]
    fn test_take_returns_latest() {
        let slot = LatestFrameSlot::new();
        slot.put(frame(1));
        slot.put(frame(2));
        let got = slot.take().unwrap();
        assert_eq!(got.meta.frame_idx, 2);
        assert_eq!(slot.dropped_frames(), 1);
    }

    #[test]
    fn test_close_unblocks_consumer() {
        let slot = std::sync::Arc::new(LatestFrameSlot::new());
        let consumer = {
            let slot = slot.clone();
            std::thread::spawn(move || slot.take())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        slot.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_pending_frame_survives_close() {
        let slot = LatestFrameSlot::new();
        slot.put(frame(7));
        slot.close();
        assert_eq!(slot.take().unwrap().meta.frame_idx, 7);
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_put_after_close_is_discarded() {
        let slot = LatestFrameSlot::new();
        slot.close();
        slot.put(frame(1));
        assert!(slot.take().is_none());
    }
}
