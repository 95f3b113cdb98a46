//! FFmpeg FFI helpers — error translation and safe string conversion.

use std::ffi::CString;

/// Translate an FFmpeg return code into an error string.
///
/// On success (`ret >= 0`) returns the code unchanged. On failure,
/// `av_strerror` is called to produce a human-readable message.
pub fn check(ret: i32, context: &str) -> Result<i32, String> {
    if ret >= 0 {
        return Ok(ret);
    }

    let mut buf = [0 as std::ffi::c_char; 256];
    // SAFETY: buf is a valid mutable buffer of known length.
    unsafe {
        ffmpeg_sys_next::av_strerror(ret, buf.as_mut_ptr(), buf.len());
    }
    let message = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8 as char)
        .collect::<String>();
    Err(format!("{}: {} (code {})", context, message, ret))
}

pub fn to_cstring(s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| format!("Interior NUL in string '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_nonnegative() {
        assert_eq!(check(0, "op").unwrap(), 0);
        assert_eq!(check(17, "op").unwrap(), 17);
    }

    #[test]
    fn test_check_reports_context() {
        let err = check(-22, "avcodec_open2").unwrap_err();
        assert!(err.contains("avcodec_open2"));
        assert!(err.contains("-22"));
    }

    #[test]
    fn test_to_cstring_rejects_nul() {
        assert!(to_cstring("ok").is_ok());
        assert!(to_cstring("bad\0path").is_err());
    }
}
