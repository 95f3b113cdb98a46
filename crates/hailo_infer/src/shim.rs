//! Raw C ABI of the NPU runtime shim library.
//!
//! The shim wraps the vendor runtime behind a small status-code C API
//! (virtual device, HEF configuration, virtual stream queries, synchronous
//! inference). Every symbol is looked up once at load time and cached as a
//! plain function pointer; the `Library` handle is kept alive alongside them.

use crate::HailoError;
use libloading::{Library, Symbol};
use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::Arc;

pub const HAILO_SUCCESS: i32 = 0;

/// Virtual stream descriptor as reported by the shim.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawVStreamInfo {
    pub name: [c_char; 96],
    pub frame_size: usize,
    pub height: u32,
    pub width: u32,
    pub features: u32,
}

impl Default for RawVStreamInfo {
    fn default() -> Self {
        Self {
            name: [0; 96],
            frame_size: 0,
            height: 0,
            width: 0,
            features: 0,
        }
    }
}

impl RawVStreamInfo {
    pub fn name_string(&self) -> String {
        let bytes: Vec<u8> = self
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

type VDeviceCreateFn = unsafe extern "C" fn(out_vdevice: *mut *mut c_void) -> i32;
type VDeviceReleaseFn = unsafe extern "C" fn(vdevice: *mut c_void);
type ConfigureHefFn = unsafe extern "C" fn(
    vdevice: *mut c_void,
    hef_path: *const c_char,
    out_group: *mut *mut c_void,
    out_group_count: *mut i32,
) -> i32;
type GroupReleaseFn = unsafe extern "C" fn(group: *mut c_void);
type VStreamCountFn = unsafe extern "C" fn(group: *mut c_void) -> i32;
type VStreamInfoFn =
    unsafe extern "C" fn(group: *mut c_void, index: i32, out: *mut RawVStreamInfo) -> i32;
type InferFn = unsafe extern "C" fn(
    group: *mut c_void,
    in_names: *const *const c_char,
    in_buffers: *const *const u8,
    in_lens: *const usize,
    in_count: usize,
    out_names: *const *const c_char,
    out_buffers: *const *mut u8,
    out_lens: *const usize,
    out_count: usize,
    frames_count: usize,
) -> i32;

/// Loaded shim library with every entry point resolved up front.
#[derive(Clone)]
pub struct Shim {
    // Library handle (keep alive; the cached pointers borrow from it)
    _lib: Arc<Library>,
    pub(crate) vdevice_create: VDeviceCreateFn,
    pub(crate) vdevice_release: VDeviceReleaseFn,
    pub(crate) configure_hef: ConfigureHefFn,
    pub(crate) group_release: GroupReleaseFn,
    pub(crate) input_vstream_count: VStreamCountFn,
    pub(crate) output_vstream_count: VStreamCountFn,
    pub(crate) input_vstream_info: VStreamInfoFn,
    pub(crate) output_vstream_info: VStreamInfoFn,
    pub(crate) infer: InferFn,
}

macro_rules! load_symbol {
    ($lib:expr, $name:literal, $ty:ty) => {{
        let sym: Symbol<$ty> = $lib.get($name.as_bytes()).map_err(|e| {
            HailoError::MissingSymbol {
                name: $name,
                source: e,
            }
        })?;
        *sym
    }};
}

impl Shim {
    pub fn load(path: &str) -> Result<Self, HailoError> {
        unsafe {
            let raw_lib = Library::new(path).map_err(|e| HailoError::ShimLoad {
                path: path.to_string(),
                source: e,
            })?;
            let lib = Arc::new(raw_lib);

            let vdevice_create =
                load_symbol!(lib, "hailo_shim_vdevice_create", VDeviceCreateFn);
            let vdevice_release =
                load_symbol!(lib, "hailo_shim_vdevice_release", VDeviceReleaseFn);
            let configure_hef = load_symbol!(lib, "hailo_shim_configure_hef", ConfigureHefFn);
            let group_release =
                load_symbol!(lib, "hailo_shim_network_group_release", GroupReleaseFn);
            let input_vstream_count =
                load_symbol!(lib, "hailo_shim_input_vstream_count", VStreamCountFn);
            let output_vstream_count =
                load_symbol!(lib, "hailo_shim_output_vstream_count", VStreamCountFn);
            let input_vstream_info =
                load_symbol!(lib, "hailo_shim_input_vstream_info", VStreamInfoFn);
            let output_vstream_info =
                load_symbol!(lib, "hailo_shim_output_vstream_info", VStreamInfoFn);
            let infer = load_symbol!(lib, "hailo_shim_infer", InferFn);

            Ok(Self {
                _lib: lib,
                vdevice_create,
                vdevice_release,
                configure_hef,
                group_release,
                input_vstream_count,
                output_vstream_count,
                input_vstream_info,
                output_vstream_info,
                infer,
            })
        }
    }
}
