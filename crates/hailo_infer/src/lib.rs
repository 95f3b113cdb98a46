//! NPU runtime binding for the depth pipeline.
//!
//! Wraps the vendor runtime's C shim with RAII handles: a [`VDevice`] is the
//! process-wide accelerator handle, a [`NetworkGroup`] is one configured
//! model (the execution handle), and [`HailoEstimator`] adapts a group to the
//! pipeline's [`InferenceEngine`] seam.

mod shim;

pub use shim::{RawVStreamInfo, Shim, HAILO_SUCCESS};

use common_io::{InferenceEngine, PipelineError};
use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

/// Every transfer runs a single frame through the device; the runtime's
/// buffer arithmetic below assumes it.
pub const FRAMES_COUNT: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum HailoError {
    #[error("Failed to load NPU shim library '{path}': {source}")]
    ShimLoad {
        path: String,
        source: libloading::Error,
    },
    #[error("Missing symbol {name} in NPU shim: {source}")]
    MissingSymbol {
        name: &'static str,
        source: libloading::Error,
    },
    #[error("Virtual device creation failed (status {status})")]
    DeviceCreate { status: i32 },
    #[error("Failed to configure HEF '{path}' (status {status})")]
    Configure { path: String, status: i32 },
    #[error("Invalid amount of network groups: {count}, expected exactly 1")]
    NetworkGroupCount { count: i32 },
    #[error("No {direction} vstreams found")]
    NoVStreams { direction: &'static str },
    #[error("VStream info query failed (status {status})")]
    VStreamInfo { status: i32 },
    #[error("Missing input buffer for stream '{name}'")]
    MissingInput { name: String },
    #[error("Input '{name}' size mismatch: expected {expected} bytes, got {actual}")]
    InputSize {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Inference failed (status {status})")]
    Infer { status: i32 },
    #[error("Output buffer is empty")]
    EmptyOutput,
}

impl HailoError {
    /// Process exit code for initialization failures: the shim status where
    /// one exists, otherwise a stable per-variant code.
    pub fn status_code(&self) -> i32 {
        match self {
            HailoError::DeviceCreate { status }
            | HailoError::Configure { status, .. }
            | HailoError::VStreamInfo { status }
            | HailoError::Infer { status } => *status,
            HailoError::ShimLoad { .. } => 10,
            HailoError::MissingSymbol { .. } => 11,
            HailoError::NetworkGroupCount { .. } => 12,
            HailoError::NoVStreams { .. } => 13,
            HailoError::MissingInput { .. } => 14,
            HailoError::InputSize { .. } => 15,
            HailoError::EmptyOutput => 16,
        }
    }
}

impl From<HailoError> for PipelineError {
    fn from(e: HailoError) -> Self {
        PipelineError::Inference(e.to_string())
    }
}

/// One input or output virtual stream boundary: name, per-frame byte size,
/// and tensor shape. Fixed for the lifetime of a configured group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VStreamInfo {
    pub name: String,
    pub frame_size: usize,
    pub height: u32,
    pub width: u32,
    pub features: u32,
}

impl From<&RawVStreamInfo> for VStreamInfo {
    fn from(raw: &RawVStreamInfo) -> Self {
        Self {
            name: raw.name_string(),
            frame_size: raw.frame_size,
            height: raw.height,
            width: raw.width,
            features: raw.features,
        }
    }
}

struct VDeviceInner {
    shim: Shim,
    handle: *mut c_void,
}

impl Drop for VDeviceInner {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.shim.vdevice_release)(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

// The shim serializes access to the device internally; the raw handle is
// only ever used behind &mut NetworkGroup or during create/release.
unsafe impl Send for VDeviceInner {}
unsafe impl Sync for VDeviceInner {}

/// Process-wide accelerator handle.
#[derive(Clone)]
pub struct VDevice {
    inner: Arc<VDeviceInner>,
}

impl VDevice {
    pub fn create(shim: &Shim) -> Result<Self, HailoError> {
        let mut handle: *mut c_void = ptr::null_mut();
        let status = unsafe { (shim.vdevice_create)(&mut handle) };
        if status != HAILO_SUCCESS || handle.is_null() {
            return Err(HailoError::DeviceCreate { status });
        }
        Ok(Self {
            inner: Arc::new(VDeviceInner {
                shim: shim.clone(),
                handle,
            }),
        })
    }
}

/// Configured execution handle: one model bound to one device.
pub struct NetworkGroup {
    // Keeps the device (and through it the shim library) alive.
    vdevice: VDevice,
    handle: *mut c_void,
    inputs: Vec<VStreamInfo>,
    outputs: Vec<VStreamInfo>,
}

unsafe impl Send for NetworkGroup {}

impl NetworkGroup {
    /// Load and configure a HEF on the device.
    ///
    /// Fails if the artifact cannot be configured or does not resolve to
    /// exactly one network group. No retry; callers abort on failure.
    pub fn configure(vdevice: &VDevice, hef_path: &str) -> Result<Self, HailoError> {
        let shim = &vdevice.inner.shim;
        let c_path = CString::new(hef_path).map_err(|_| HailoError::Configure {
            path: hef_path.to_string(),
            status: -1,
        })?;

        let mut handle: *mut c_void = ptr::null_mut();
        let mut group_count: i32 = 0;
        let status = unsafe {
            (shim.configure_hef)(
                vdevice.inner.handle,
                c_path.as_ptr(),
                &mut handle,
                &mut group_count,
            )
        };
        if status != HAILO_SUCCESS || handle.is_null() {
            return Err(HailoError::Configure {
                path: hef_path.to_string(),
                status,
            });
        }
        let mut group = Self {
            vdevice: vdevice.clone(),
            handle,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        if group_count != 1 {
            return Err(HailoError::NetworkGroupCount { count: group_count });
        }

        group.inputs = group.query_vstreams(true)?;
        group.outputs = group.query_vstreams(false)?;
        if group.inputs.is_empty() {
            return Err(HailoError::NoVStreams { direction: "input" });
        }
        if group.outputs.is_empty() {
            return Err(HailoError::NoVStreams {
                direction: "output",
            });
        }
        Ok(group)
    }

    fn query_vstreams(&self, input: bool) -> Result<Vec<VStreamInfo>, HailoError> {
        let shim = &self.vdevice.inner.shim;
        let count = unsafe {
            if input {
                (shim.input_vstream_count)(self.handle)
            } else {
                (shim.output_vstream_count)(self.handle)
            }
        };
        if count < 0 {
            return Err(HailoError::VStreamInfo { status: count });
        }
        let mut infos = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut raw = RawVStreamInfo::default();
            let status = unsafe {
                if input {
                    (shim.input_vstream_info)(self.handle, index, &mut raw)
                } else {
                    (shim.output_vstream_info)(self.handle, index, &mut raw)
                }
            };
            if status != HAILO_SUCCESS {
                return Err(HailoError::VStreamInfo { status });
            }
            infos.push(VStreamInfo::from(&raw));
        }
        Ok(infos)
    }

    pub fn input_infos(&self) -> &[VStreamInfo] {
        &self.inputs
    }

    pub fn output_infos(&self) -> &[VStreamInfo] {
        &self.outputs
    }

    /// Synchronous named-buffer transfer: every declared input stream must be
    /// present in `inputs` at its declared size, every declared output comes
    /// back filled. Blocks until the device completes.
    pub fn infer(
        &mut self,
        inputs: &HashMap<String, Vec<u8>>,
        frames_count: usize,
    ) -> Result<HashMap<String, Vec<u8>>, HailoError> {
        let shim = self.vdevice.inner.shim.clone();

        // Gather input buffers in declared stream order.
        let mut in_names: Vec<CString> = Vec::with_capacity(self.inputs.len());
        let mut in_ptrs: Vec<*const u8> = Vec::with_capacity(self.inputs.len());
        let mut in_lens: Vec<usize> = Vec::with_capacity(self.inputs.len());
        for info in &self.inputs {
            let buffer = inputs.get(&info.name).ok_or_else(|| {
                HailoError::MissingInput {
                    name: info.name.clone(),
                }
            })?;
            let expected = info.frame_size * frames_count;
            if buffer.len() != expected {
                return Err(HailoError::InputSize {
                    name: info.name.clone(),
                    expected,
                    actual: buffer.len(),
                });
            }
            in_names.push(CString::new(info.name.as_str()).expect("stream name has no NUL"));
            in_ptrs.push(buffer.as_ptr());
            in_lens.push(buffer.len());
        }

        // Allocate one buffer per declared output stream.
        let mut out_names: Vec<CString> = Vec::with_capacity(self.outputs.len());
        let mut out_buffers: Vec<Vec<u8>> = Vec::with_capacity(self.outputs.len());
        for info in &self.outputs {
            out_names.push(CString::new(info.name.as_str()).expect("stream name has no NUL"));
            out_buffers.push(vec![0u8; info.frame_size * frames_count]);
        }
        let out_ptrs: Vec<*mut u8> = out_buffers.iter_mut().map(|b| b.as_mut_ptr()).collect();
        let out_lens: Vec<usize> = out_buffers.iter().map(|b| b.len()).collect();

        let in_name_ptrs: Vec<*const c_char> = in_names.iter().map(|n| n.as_ptr()).collect();
        let out_name_ptrs: Vec<*const c_char> = out_names.iter().map(|n| n.as_ptr()).collect();

        let status = unsafe {
            (shim.infer)(
                self.handle,
                in_name_ptrs.as_ptr(),
                in_ptrs.as_ptr(),
                in_lens.as_ptr(),
                in_name_ptrs.len(),
                out_name_ptrs.as_ptr(),
                out_ptrs.as_ptr(),
                out_lens.as_ptr(),
                out_name_ptrs.len(),
                frames_count,
            )
        };
        if status != HAILO_SUCCESS {
            return Err(HailoError::Infer { status });
        }

        Ok(self
            .outputs
            .iter()
            .zip(out_buffers)
            .map(|(info, buffer)| (info.name.clone(), buffer))
            .collect())
    }
}

impl Drop for NetworkGroup {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.vdevice.inner.shim.group_release)(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

/// [`InferenceEngine`] adapter over a configured [`NetworkGroup`].
///
/// Marshals one camera frame into the primary input stream, zero-fills any
/// secondary inputs, and hands back the first output stream's bytes.
pub struct HailoEstimator {
    network: NetworkGroup,
}

impl HailoEstimator {
    pub fn new(network: NetworkGroup) -> Self {
        Self { network }
    }
}

impl InferenceEngine for HailoEstimator {
    fn input_frame_size(&self) -> usize {
        self.network.inputs[0].frame_size
    }

    fn infer_frame(&mut self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let expected = self.input_frame_size() * FRAMES_COUNT;
        if input.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: input.len(),
            });
        }

        let mut buffers = HashMap::with_capacity(self.network.inputs.len());
        buffers.insert(self.network.inputs[0].name.clone(), input.to_vec());
        for info in self.network.inputs.iter().skip(1) {
            buffers.insert(info.name.clone(), vec![0u8; info.frame_size * FRAMES_COUNT]);
        }

        let mut outputs = self.network.infer(&buffers, FRAMES_COUNT)?;
        let first = &self.network.outputs[0].name;
        let result = outputs.remove(first).ok_or(HailoError::EmptyOutput)?;
        if result.is_empty() {
            return Err(HailoError::EmptyOutput.into());
        }
        Ok(result)
    }
}
