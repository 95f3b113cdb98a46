//! Shared packet types and the inference seam for the depth pipeline.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit interleaved RGB, 3 bytes per pixel.
    Rgb8,
    /// 8-bit interleaved BGR, 3 bytes per pixel.
    Bgr8,
    /// 8-bit single-channel.
    Gray8,
    /// Signed 8-bit single-channel (raw NPU output before decode).
    GrayI8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Gray8 | PixelFormat::GrayI8 => 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrameMeta {
    pub source_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixfmt: PixelFormat,
    pub frame_idx: u64,
    pub t_capture_ns: u64,
}

/// One captured frame. The camera side fills `data` with exactly
/// `width * height * bytes_per_pixel` bytes.
#[derive(Clone, Debug)]
pub struct RawFramePacket {
    pub meta: FrameMeta,
    pub data: Vec<u8>,
}

impl RawFramePacket {
    pub fn expected_len(&self) -> usize {
        self.meta.width as usize * self.meta.height as usize * self.meta.pixfmt.bytes_per_pixel()
    }
}

/// Final side-by-side frame pushed to the display/encode half.
#[derive(Clone, Debug)]
pub struct ProcessedFramePacket {
    pub from: FrameMeta,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Seam between the frame-processing core and the accelerator runtime.
///
/// `infer_frame` is synchronous: it returns only once the device has
/// produced the raw output bytes for this frame.
pub trait InferenceEngine {
    /// Declared byte size of one input frame on the primary input stream.
    fn input_frame_size(&self) -> usize;

    /// Run one frame through the model and return the first output
    /// stream's raw bytes.
    fn infer_frame(&mut self, input: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// Generic pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Inference error: {0}")]
    Inference(String),
    #[error("Processing error: {0}")]
    Processing(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Mux error: {0}")]
    Mux(String),
    #[error("Display error: {0}")]
    Display(String),
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
