//! libx264 encoder — RGB24 frames in, H.264 packets out.
//!
//! The configuration's `speed_preset` index and `tune` bitmask map onto the
//! x264 preset/tune option strings before the codec is opened.

use crate::ffi::{check, to_cstring};
use common_io::PipelineError;
use ffmpeg_sys_next::*;
use std::ptr;

// POSIX EAGAIN — used with AVERROR() for "try again" semantics.
const EAGAIN: i32 = 11;

// x264 speed presets by index; 1 = ultrafast .. 10 = placebo.
const PRESET_NAMES: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

// x264 tune bitmask.
const TUNE_STILLIMAGE: u32 = 0x1;
const TUNE_FASTDECODE: u32 = 0x2;
const TUNE_ZEROLATENCY: u32 = 0x4;

pub(crate) fn preset_name(speed_preset: u32) -> &'static str {
    let index = speed_preset.clamp(1, PRESET_NAMES.len() as u32) as usize - 1;
    PRESET_NAMES[index]
}

pub(crate) fn tune_string(tune: u32) -> String {
    let mut parts = Vec::new();
    if tune & TUNE_STILLIMAGE != 0 {
        parts.push("stillimage");
    }
    if tune & TUNE_FASTDECODE != 0 {
        parts.push("fastdecode");
    }
    if tune & TUNE_ZEROLATENCY != 0 {
        parts.push("zerolatency");
    }
    parts.join(",")
}

/// One encoded H.264 packet with encoder-time_base timestamps.
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub pts: i64,
    pub dts: i64,
    pub keyframe: bool,
}

/// H.264 encoder over libx264 with an RGB24 -> YUV420P conversion in front.
pub struct H264Encoder {
    codec_ctx: *mut AVCodecContext,
    sws: *mut SwsContext,
    frame: *mut AVFrame,
    pkt: *mut AVPacket,
    width: u32,
    height: u32,
    next_pts: i64,
}

// SAFETY: all FFmpeg state is owned by this struct and only touched from the
// thread currently holding &mut self.
unsafe impl Send for H264Encoder {}

impl H264Encoder {
    pub fn new(
        width: u32,
        height: u32,
        fps: u32,
        speed_preset: u32,
        tune: u32,
    ) -> Result<Self, PipelineError> {
        unsafe {
            let codec_name = to_cstring("libx264").map_err(PipelineError::Encode)?;
            let codec = avcodec_find_encoder_by_name(codec_name.as_ptr());
            if codec.is_null() {
                return Err(PipelineError::Encode("libx264 encoder not available".into()));
            }

            let mut codec_ctx = avcodec_alloc_context3(codec);
            if codec_ctx.is_null() {
                return Err(PipelineError::Encode("Failed to allocate codec context".into()));
            }

            (*codec_ctx).width = width as i32;
            (*codec_ctx).height = height as i32;
            (*codec_ctx).time_base = AVRational {
                num: 1,
                den: fps as i32,
            };
            (*codec_ctx).framerate = AVRational {
                num: fps as i32,
                den: 1,
            };
            (*codec_ctx).pix_fmt = AVPixelFormat::AV_PIX_FMT_YUV420P;
            (*codec_ctx).gop_size = fps as i32;
            // The muxer needs SPS/PPS in codecpar, not inline.
            (*codec_ctx).flags |= AV_CODEC_FLAG_GLOBAL_HEADER as i32;

            let preset_key = to_cstring("preset").map_err(PipelineError::Encode)?;
            let preset_val = to_cstring(preset_name(speed_preset)).map_err(PipelineError::Encode)?;
            av_opt_set(
                (*codec_ctx).priv_data,
                preset_key.as_ptr(),
                preset_val.as_ptr(),
                0,
            );

            let tunes = tune_string(tune);
            if !tunes.is_empty() {
                let tune_key = to_cstring("tune").map_err(PipelineError::Encode)?;
                let tune_val = to_cstring(&tunes).map_err(PipelineError::Encode)?;
                av_opt_set(
                    (*codec_ctx).priv_data,
                    tune_key.as_ptr(),
                    tune_val.as_ptr(),
                    0,
                );
            }

            if let Err(e) = check(
                avcodec_open2(codec_ctx, codec, ptr::null_mut()),
                "avcodec_open2",
            ) {
                avcodec_free_context(&mut codec_ctx);
                return Err(PipelineError::Encode(e));
            }

            let mut frame = av_frame_alloc();
            if frame.is_null() {
                avcodec_free_context(&mut codec_ctx);
                return Err(PipelineError::Encode("Failed to allocate frame".into()));
            }
            (*frame).format = AVPixelFormat::AV_PIX_FMT_YUV420P as i32;
            (*frame).width = width as i32;
            (*frame).height = height as i32;
            if let Err(e) = check(av_frame_get_buffer(frame, 0), "av_frame_get_buffer") {
                av_frame_free(&mut frame);
                avcodec_free_context(&mut codec_ctx);
                return Err(PipelineError::Encode(e));
            }

            let mut pkt = av_packet_alloc();
            if pkt.is_null() {
                av_frame_free(&mut frame);
                avcodec_free_context(&mut codec_ctx);
                return Err(PipelineError::Encode("Failed to allocate packet".into()));
            }

            let sws = sws_getContext(
                width as i32,
                height as i32,
                AVPixelFormat::AV_PIX_FMT_RGB24,
                width as i32,
                height as i32,
                AVPixelFormat::AV_PIX_FMT_YUV420P,
                SWS_BILINEAR as i32,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
            );
            if sws.is_null() {
                av_packet_free(&mut pkt);
                av_frame_free(&mut frame);
                avcodec_free_context(&mut codec_ctx);
                return Err(PipelineError::Encode("Failed to create scaler context".into()));
            }

            Ok(Self {
                codec_ctx,
                sws,
                frame,
                pkt,
                width,
                height,
                next_pts: 0,
            })
        }
    }

    /// SPS/PPS extradata produced at open time, for the container stream.
    pub fn extradata(&self) -> Vec<u8> {
        unsafe {
            let size = (*self.codec_ctx).extradata_size;
            if size <= 0 || (*self.codec_ctx).extradata.is_null() {
                return Vec::new();
            }
            std::slice::from_raw_parts((*self.codec_ctx).extradata, size as usize).to_vec()
        }
    }

    pub fn time_base(&self) -> AVRational {
        unsafe { (*self.codec_ctx).time_base }
    }

    /// Encode one RGB24 frame. Returns zero or more packets (the encoder
    /// buffers frames internally).
    pub fn encode(&mut self, rgb: &[u8]) -> Result<Vec<EncodedPacket>, PipelineError> {
        let expected = self.width as usize * self.height as usize * 3;
        if rgb.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: rgb.len(),
            });
        }

        unsafe {
            check(av_frame_make_writable(self.frame), "av_frame_make_writable")
                .map_err(PipelineError::Encode)?;

            let src_slices: [*const u8; 1] = [rgb.as_ptr()];
            let src_strides: [i32; 1] = [self.width as i32 * 3];
            sws_scale(
                self.sws,
                src_slices.as_ptr(),
                src_strides.as_ptr(),
                0,
                self.height as i32,
                (*self.frame).data.as_ptr() as *const *mut u8,
                (*self.frame).linesize.as_ptr(),
            );

            (*self.frame).pts = self.next_pts;
            self.next_pts += 1;

            check(
                avcodec_send_frame(self.codec_ctx, self.frame),
                "avcodec_send_frame",
            )
            .map_err(PipelineError::Encode)?;

            self.drain_packets()
        }
    }

    /// Flush the encoder at end of stream.
    pub fn finish(&mut self) -> Result<Vec<EncodedPacket>, PipelineError> {
        unsafe {
            check(
                avcodec_send_frame(self.codec_ctx, ptr::null()),
                "avcodec_send_frame(flush)",
            )
            .map_err(PipelineError::Encode)?;
            self.drain_packets()
        }
    }

    unsafe fn drain_packets(&mut self) -> Result<Vec<EncodedPacket>, PipelineError> {
        let again = AVERROR(EAGAIN);
        let mut packets = Vec::new();
        loop {
            let ret = avcodec_receive_packet(self.codec_ctx, self.pkt);
            if ret == again || ret == AVERROR_EOF {
                return Ok(packets);
            }
            check(ret, "avcodec_receive_packet").map_err(PipelineError::Encode)?;

            let data =
                std::slice::from_raw_parts((*self.pkt).data, (*self.pkt).size as usize).to_vec();
            packets.push(EncodedPacket {
                data,
                pts: (*self.pkt).pts,
                dts: (*self.pkt).dts,
                keyframe: (*self.pkt).flags & AV_PKT_FLAG_KEY as i32 != 0,
            });
            av_packet_unref(self.pkt);
        }
    }
}

impl Drop for H264Encoder {
    fn drop(&mut self) {
        unsafe {
            sws_freeContext(self.sws);
            av_packet_free(&mut self.pkt);
            av_frame_free(&mut self.frame);
            avcodec_free_context(&mut self.codec_ctx);
        }
    }
}
