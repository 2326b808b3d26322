/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use super::DecodedFrame;
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use std::time::Instant;

/// FFmpeg解码过滤器: 摄像头流 → RGBA帧 → 主循环通道
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<DecodedFrame>,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize, // 丢弃的帧数
    pub total_frames: usize,   // 总帧数
    frame_id: u64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<DecodedFrame>) -> Self {
        Self {
            tx,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
            frame_id: 0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        println!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            self.total_frames += 1;

            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.total_frames);
                }
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;

            // 检查分辨率合法性
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: 非法分辨率 {}x{}", self.total_frames, w, h);
                }
                return Ok(None);
            }

            // 检查 FFmpeg 的错误标志位 (缺少参考帧、无效比特流)
            let decode_error_flags = (*frame.as_ptr()).decode_error_flags;
            if decode_error_flags & 0x03 != 0 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!(
                        "⚠️ 丢弃帧 #{}: 解码错误标志=0x{:02x}",
                        self.total_frames, decode_error_flags
                    );
                }
                return Ok(None);
            }

            // YUV420P数据指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: YUV指针为空", self.total_frames);
                }
                return Ok(None);
            }

            if y_stride < w as usize || uv_stride < (w as usize / 2) {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!(
                        "⚠️ 丢弃帧 #{}: 步长异常 y_stride={} uv_stride={}",
                        self.total_frames, y_stride, uv_stride
                    );
                }
                return Ok(None);
            }

            self.count += 1;
            self.frame_id += 1;

            // YUV420P → RGBA (BT.601 整数近似)
            let pixel_count = (w * h) as usize;
            let mut rgba_data = vec![255u8; pixel_count * 4]; // 预填充alpha=255
            yuv420p_to_rgba(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut rgba_data,
                w as usize,
                h as usize,
            );

            // 计算FPS
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let elapsed = self.last.elapsed().as_secs_f64();
                self.current_fps = self.count as f64 / elapsed;
                let drop_rate = self.dropped_frames as f64 / self.total_frames as f64 * 100.0;

                // 每秒打印一次解码统计
                println!(
                    "📺 解码统计: 解码{}帧 | 实际{:.1}fps | 总帧{} | 丢弃{} ({:.1}%)",
                    self.count, self.current_fps, self.total_frames, self.dropped_frames, drop_rate
                );

                self.last = Instant::now();
                self.count = 0;
            }

            let decoded = DecodedFrame {
                rgba_data,
                width: w,
                height: h,
                frame_id: self.frame_id,
                decode_fps: self.current_fps,
            };

            // 队列满时丢帧而不是阻塞解码线程 (主循环永远拿到较新的帧)
            let _ = self.tx.try_send(decoded);

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        println!("✅ 解码线程退出");
    }
}

/// 标量版本YUV转换
#[inline]
unsafe fn yuv420p_to_rgba(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 4;
        }
    }
}
