//! 帧源 (Frame Source)
//!
//! 主循环侧的帧入口: `capture(timeout)` 返回一帧或超时返回 None。
//! 解码发生在独立线程,通过有界通道交付,本模块不做任何解码工作。

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

use super::camera::{get_camera_devices, CameraDecoder};
use super::decode_filter::DecodeFilter;
use super::DecodedFrame;

pub struct FrameSource {
    rx: Receiver<DecodedFrame>,
}

impl FrameSource {
    /// 打开摄像头并启动解码线程
    pub fn open(device_index: usize, width: u32, height: u32, mjpeg: bool) -> Self {
        // dshow 需要设备名而不是索引
        let device_name = get_camera_devices()
            .into_iter()
            .find(|(index, _)| *index == device_index)
            .map(|(_, name)| name)
            .unwrap_or_default();

        // 队列容量2: 主循环处理慢时宁可丢帧,也不积压过期帧
        let (tx, rx) = bounded(2);
        thread::spawn(move || {
            let filter = DecodeFilter::new(tx);
            CameraDecoder::new(device_index, device_name, width, height, mjpeg).run(filter);
        });
        Self { rx }
    }

    /// 捕获一帧;超时或解码线程退出时返回 None,由调用方跳过本次迭代
    pub fn capture(&self, timeout: Duration) -> Option<DecodedFrame> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// 摄像头预热: 打开后传感器需要时间稳定曝光
    pub fn warm_up(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;

    fn source_with_channel() -> (Sender<DecodedFrame>, FrameSource) {
        let (tx, rx) = bounded(2);
        (tx, FrameSource { rx })
    }

    fn test_frame(id: u64) -> DecodedFrame {
        DecodedFrame {
            rgba_data: vec![255; 16],
            width: 2,
            height: 2,
            frame_id: id,
            decode_fps: 30.0,
        }
    }

    #[test]
    fn test_capture_times_out_without_frames() {
        let (_tx, source) = source_with_channel();
        assert!(source.capture(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_capture_returns_queued_frame() {
        let (tx, source) = source_with_channel();
        tx.send(test_frame(7)).unwrap();
        let frame = source.capture(Duration::from_millis(20)).unwrap();
        assert_eq!(frame.frame_id, 7);
        assert_eq!(frame.width, 2);
    }

    #[test]
    fn test_capture_after_decoder_exit() {
        // 解码线程退出(通道断开)同样按"未捕获到帧"处理,不会panic
        let (tx, source) = source_with_channel();
        drop(tx);
        assert!(source.capture(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_capture_preserves_frame_order() {
        let (tx, source) = source_with_channel();
        tx.send(test_frame(1)).unwrap();
        tx.send(test_frame(2)).unwrap();
        assert_eq!(source.capture(Duration::from_millis(20)).unwrap().frame_id, 1);
        assert_eq!(source.capture(Duration::from_millis(20)).unwrap().frame_id, 2);
    }
}
