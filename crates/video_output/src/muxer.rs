//! MP4 container muxer for the encoded H.264 stream.
//!
//! The container format is auto-detected from the file extension; packet
//! timestamps are rescaled from the encoder time base to whatever the
//! container negotiates at header-write time.

use crate::encoder::EncodedPacket;
use crate::ffi::{check, to_cstring};
use common_io::PipelineError;
use ffmpeg_sys_next::*;
use std::ptr;

pub struct Mp4Muxer {
    fmt_ctx: *mut AVFormatContext,
    stream_index: i32,
    /// Stream time_base (set after avformat_write_header).
    stream_time_base: AVRational,
    /// Encoder time_base packets arrive in.
    encoder_time_base: AVRational,
    pkt: *mut AVPacket,
    trailer_written: bool,
}

// SAFETY: all FFmpeg operations happen on the output thread.
unsafe impl Send for Mp4Muxer {}

impl Mp4Muxer {
    pub fn new(
        path: &str,
        width: u32,
        height: u32,
        fps: u32,
        encoder_time_base: AVRational,
        extradata: &[u8],
    ) -> Result<Self, PipelineError> {
        let c_path = to_cstring(path).map_err(PipelineError::Mux)?;

        unsafe {
            let mut fmt_ctx: *mut AVFormatContext = ptr::null_mut();
            let ret = avformat_alloc_output_context2(
                &mut fmt_ctx,
                ptr::null(),
                ptr::null(),
                c_path.as_ptr(),
            );
            if ret < 0 || fmt_ctx.is_null() {
                return Err(PipelineError::Mux(format!(
                    "Failed to create output context for {path}"
                )));
            }

            let stream = avformat_new_stream(fmt_ctx, ptr::null());
            if stream.is_null() {
                avformat_free_context(fmt_ctx);
                return Err(PipelineError::Mux("Failed to create output stream".into()));
            }

            let par = (*stream).codecpar;
            (*par).codec_type = AVMediaType::AVMEDIA_TYPE_VIDEO;
            (*par).codec_id = AVCodecID::AV_CODEC_ID_H264;
            (*par).width = width as i32;
            (*par).height = height as i32;
            (*stream).time_base = AVRational {
                num: 1,
                den: fps as i32,
            };

            if !extradata.is_empty() {
                let buf =
                    av_mallocz(extradata.len() + AV_INPUT_BUFFER_PADDING_SIZE as usize) as *mut u8;
                if buf.is_null() {
                    avformat_free_context(fmt_ctx);
                    return Err(PipelineError::Mux("Failed to allocate extradata".into()));
                }
                ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len());
                (*par).extradata = buf;
                (*par).extradata_size = extradata.len() as i32;
            }

            let needs_file = (*(*fmt_ctx).oformat).flags & AVFMT_NOFILE as i32 == 0;
            if needs_file {
                let ret = avio_open(&mut (*fmt_ctx).pb, c_path.as_ptr(), AVIO_FLAG_WRITE as i32);
                if let Err(e) = check(ret, "avio_open") {
                    avformat_free_context(fmt_ctx);
                    return Err(PipelineError::Mux(e));
                }
            }

            if let Err(e) = check(
                avformat_write_header(fmt_ctx, ptr::null_mut()),
                "avformat_write_header",
            ) {
                if needs_file {
                    avio_closep(&mut (*fmt_ctx).pb);
                }
                avformat_free_context(fmt_ctx);
                return Err(PipelineError::Mux(e));
            }

            let pkt = av_packet_alloc();
            if pkt.is_null() {
                avio_closep(&mut (*fmt_ctx).pb);
                avformat_free_context(fmt_ctx);
                return Err(PipelineError::Mux("Failed to allocate packet".into()));
            }

            let stream_time_base = (*stream).time_base;
            Ok(Self {
                fmt_ctx,
                stream_index: (*stream).index,
                stream_time_base,
                encoder_time_base,
                pkt,
                trailer_written: false,
            })
        }
    }

    pub fn write_packet(&mut self, packet: &EncodedPacket) -> Result<(), PipelineError> {
        unsafe {
            check(
                av_new_packet(self.pkt, packet.data.len() as i32),
                "av_new_packet",
            )
            .map_err(PipelineError::Mux)?;
            ptr::copy_nonoverlapping(packet.data.as_ptr(), (*self.pkt).data, packet.data.len());

            (*self.pkt).pts = packet.pts;
            (*self.pkt).dts = packet.dts;
            (*self.pkt).stream_index = self.stream_index;
            if packet.keyframe {
                (*self.pkt).flags |= AV_PKT_FLAG_KEY as i32;
            }
            av_packet_rescale_ts(self.pkt, self.encoder_time_base, self.stream_time_base);

            let ret = av_interleaved_write_frame(self.fmt_ctx, self.pkt);
            av_packet_unref(self.pkt);
            check(ret, "av_interleaved_write_frame").map_err(PipelineError::Mux)?;
        }
        Ok(())
    }

    /// Write the container trailer and close the file.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        if self.trailer_written {
            return Ok(());
        }
        unsafe {
            check(av_write_trailer(self.fmt_ctx), "av_write_trailer")
                .map_err(PipelineError::Mux)?;
        }
        self.trailer_written = true;
        Ok(())
    }
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        unsafe {
            if !self.trailer_written {
                let _ = av_write_trailer(self.fmt_ctx);
            }
            av_packet_free(&mut self.pkt);
            if !(*self.fmt_ctx).pb.is_null() {
                avio_closep(&mut (*self.fmt_ctx).pb);
            }
            avformat_free_context(self.fmt_ctx);
        }
    }
}
