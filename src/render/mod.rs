//! 监控画面渲染 (Monitor Display)
//!
//! macroquad 渲染: 视频帧纹理 + 骨架/关键点叠加 + 违规横幅 + 底部状态栏。
//! 主循环每帧调用 update_frame → draw,is_streaming 为 false 时退出。

use std::time::Instant;

use macroquad::prelude::*;

use crate::input::DecodedFrame;
use crate::{Point2, PoseResult, SKELETON};

/// 底部状态栏高度 (像素)
const STATUS_BAR_HEIGHT: f32 = 28.0;

pub struct Monitor {
    texture: Option<Texture2D>,
    frame_w: f32,
    frame_h: f32,
    status: String,
    stopped: bool,

    // 渲染统计
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl Monitor {
    pub fn new() -> Self {
        println!("✅ 渲染器启动");
        // 拦截窗口关闭事件,让主循环自行退出并完成清理
        prevent_quit();
        Self {
            texture: None,
            frame_w: 0.0,
            frame_h: 0.0,
            status: String::new(),
            stopped: false,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 显示是否仍在运行 (窗口未关闭且未按ESC)
    pub fn is_streaming(&mut self) -> bool {
        if is_quit_requested() || is_key_down(KeyCode::Escape) {
            self.stopped = true;
        }
        !self.stopped
    }

    /// 更新当前帧纹理
    pub fn update_frame(&mut self, frame: &DecodedFrame) {
        let texture =
            Texture2D::from_rgba8(frame.width as u16, frame.height as u16, &frame.rgba_data);
        texture.set_filter(FilterMode::Linear);
        self.texture = Some(texture);
        self.frame_w = frame.width as f32;
        self.frame_h = frame.height as f32;
    }

    /// 更新底部状态栏文本
    pub fn set_status(&mut self, status: String) {
        self.status = status;
    }

    /// 画面坐标 → 屏幕坐标的等比映射
    fn view_transform(&self) -> (f32, f32, f32) {
        let view_h = screen_height() - STATUS_BAR_HEIGHT;
        let scale = (screen_width() / self.frame_w).min(view_h / self.frame_h);
        let offset_x = (screen_width() - self.frame_w * scale) / 2.0;
        let offset_y = (view_h - self.frame_h * scale) / 2.0;
        (scale, offset_x, offset_y)
    }

    /// 渲染一帧: 视频 + 姿态叠加 + 髋部中点 + 违规横幅 + 状态栏
    pub fn draw(&mut self, result: &PoseResult, centers: &[Point2], violation: bool) {
        clear_background(BLACK);

        let Some(texture) = &self.texture else {
            draw_text("Waiting for camera...", 20.0, 40.0, 30.0, GRAY);
            return;
        };

        let (scale, offset_x, offset_y) = self.view_transform();
        draw_texture_ex(
            texture,
            offset_x,
            offset_y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(self.frame_w * scale, self.frame_h * scale)),
                ..Default::default()
            },
        );

        let to_screen = |p: &Point2| (offset_x + p.x() * scale, offset_y + p.y() * scale);

        // 姿态叠加: 检测框 + 骨架 + 关键点
        for (bbox, kpts) in result.bboxes().iter().zip(result.keypoints().iter()) {
            draw_rectangle_lines(
                offset_x + bbox.xmin() * scale,
                offset_y + bbox.ymin() * scale,
                bbox.width() * scale,
                bbox.height() * scale,
                2.0,
                GREEN,
            );

            for &(a, b) in SKELETON.iter() {
                let (Some(pa), Some(pb)) = (kpts.get(a), kpts.get(b)) else {
                    continue;
                };
                if !pa.is_present() || !pb.is_present() {
                    continue;
                }
                let (x1, y1) = to_screen(pa);
                let (x2, y2) = to_screen(pb);
                draw_line(x1, y1, x2, y2, 2.0, YELLOW);
            }

            for kpt in kpts.iter().filter(|k| k.is_present()) {
                let (x, y) = to_screen(kpt);
                draw_circle(x, y, 3.0, SKYBLUE);
            }
        }

        // 髋部中点: 距离检查的参考点
        let center_color = if violation { RED } else { LIME };
        for center in centers {
            let (x, y) = to_screen(center);
            draw_circle(x, y, 6.0, center_color);
        }

        // 违规横幅
        if violation {
            draw_rectangle(
                0.0,
                0.0,
                screen_width(),
                48.0,
                Color::new(1.0, 0.0, 0.0, 0.35),
            );
            draw_text("SOCIAL DISTANCING VIOLATION", 20.0, 34.0, 36.0, RED);
        }

        // 底部状态栏
        draw_rectangle(
            0.0,
            screen_height() - STATUS_BAR_HEIGHT,
            screen_width(),
            STATUS_BAR_HEIGHT,
            Color::new(0.0, 0.0, 0.0, 0.75),
        );
        draw_text(
            &self.status,
            10.0,
            screen_height() - 8.0,
            22.0,
            WHITE,
        );

        // 渲染FPS统计
        self.render_count += 1;
        if self.render_last.elapsed().as_secs_f64() >= 1.0 {
            self.render_fps = self.render_count as f64 / self.render_last.elapsed().as_secs_f64();
            self.render_count = 0;
            self.render_last = Instant::now();
        }
    }

    pub fn render_fps(&self) -> f64 {
        self.render_fps
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
