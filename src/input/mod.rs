/// 摄像头输入系统 (Camera Input System)
///
/// 独立工作线程,负责摄像头解码与帧分发
/// - CameraDecoder: 本地摄像头解码器 (DirectShow/AVFoundation/V4L2)
/// - DecodeFilter:  帧校验 + YUV420P→RGBA 转换 + 帧分发
/// - FrameSource:   主循环侧的帧入口, capture(timeout) 语义
pub mod camera;
pub mod decode_filter;
pub mod frame_source;

pub use camera::{get_camera_devices, CameraDecoder};
pub use decode_filter::DecodeFilter;
pub use frame_source::FrameSource;

/// 已解码帧 (解码线程 → 主循环)
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_id: u64, // 帧序号
    pub decode_fps: f64,
}
