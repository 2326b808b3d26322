/// 距离卫兵 (Distance Sentinel)
///
/// 社交距离实时监控系统
///
/// 单线程同步主循环,一帧处理到底:
/// 1. 捕获: FrameSource::capture(timeout), 超时跳帧重试
/// 2. 推理: YOLOv8-pose 提取每个人的17个关键点
/// 3. 检查: 髋部中点两两距离 < 阈值 → 违规告警
/// 4. 渲染: 视频帧 + 姿态叠加 + 状态栏
///
/// 运行: cargo run --bin sentinel --release -- --threshold 150
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use fast_image_resize as fr;
use image::{DynamicImage, RgbImage};
use macroquad::prelude::{next_frame, Conf};
use mimalloc::MiMalloc;

use distancing_rs::distancing::{detect_violation, person_centers};
use distancing_rs::input::{get_camera_devices, DecodedFrame, FrameSource};
use distancing_rs::render::Monitor;
use distancing_rs::{gen_time_string, Args, Bbox, Model, Point2, PoseEstimator, PoseResult};

// 高性能内存分配器
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "距离卫兵 - Distance Sentinel".to_owned(),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        // 基础设施故障 (模型加载/摄像头/渲染) 无恢复策略: 记录后干净退出
        eprintln!("❌ 致命错误: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("🚀 距离卫兵系统启动");
    println!("📦 姿态模型: {}", args.model);
    println!(
        "📹 摄像头: 设备{} | {}x{}{}",
        args.camera_index,
        args.cap_width,
        args.cap_height,
        if args.mjpeg { " | MJPEG" } else { "" }
    );
    if args.no_distancing {
        println!("⚠️ 距离检查已禁用 (基线模式: 仅渲染姿态并打印原始输出)");
    } else {
        println!("📏 距离阈值: {:.0}px", args.threshold);
    }
    println!();

    // ========== 加载姿态模型 ==========
    let mut model = PoseEstimator::new(args.clone())?;
    model.summary();
    let (inf_w, inf_h) = (model.width(), model.height());

    // ========== 打开摄像头 ==========
    let devices = get_camera_devices();
    for (index, name) in &devices {
        println!("📷 可用设备 {}: {}", index, name);
    }
    let frames = FrameSource::open(args.camera_index, args.cap_width, args.cap_height, args.mjpeg);
    // 摄像头预热
    frames.warm_up(Duration::from_secs(2));

    // ========== 主循环 ==========
    let mut monitor = Monitor::new();
    let timeout = Duration::from_millis(args.timeout_ms);

    let mut infer_count = 0u64;
    let mut infer_last = Instant::now();
    let mut infer_fps = 0.0f64;

    println!("✅ 系统就绪,开始监控...\n");

    while monitor.is_streaming() {
        // 1. 捕获 (超时跳帧,不中止)
        let Some(frame) = frames.capture(timeout) else {
            println!("⚠️ 未捕获到帧,跳过本次循环...");
            // 保持窗口响应,重绘上一帧画面
            monitor.draw(&PoseResult::default(), &[], false);
            next_frame().await;
            continue;
        };

        // 2. 缩放到推理尺寸并推理
        let t_infer = Instant::now();
        let result = match resize_for_inference(&frame, inf_w, inf_h) {
            Some(img) => model
                .forward(&[img])
                .unwrap_or_default()
                .into_iter()
                .next()
                .unwrap_or_default(),
            None => {
                eprintln!("❌ RGBA图像转换失败");
                PoseResult::default()
            }
        };
        let inference_ms = t_infer.elapsed().as_secs_f64() * 1000.0;

        // 坐标还原到摄像头帧空间
        let scale_x = frame.width as f32 / inf_w as f32;
        let scale_y = frame.height as f32 / inf_h as f32;
        let result = scale_result(result, scale_x, scale_y);

        // 3. 距离检查
        let centers = if args.no_distancing {
            Vec::new()
        } else {
            person_centers(result.keypoints())
        };
        let violation = detect_violation(&centers, args.threshold);

        if violation {
            println!(
                "🚨 [{}] Social Distancing Violation Detected! ({}人)",
                gen_time_string(":"),
                centers.len()
            );
        }
        if args.no_distancing && !result.is_empty() {
            // 基线模式: 每帧打印原始姿态输出
            println!("{:?}", result);
        }

        // 推理FPS统计
        infer_count += 1;
        if infer_last.elapsed().as_secs_f64() >= 1.0 {
            infer_fps = infer_count as f64 / infer_last.elapsed().as_secs_f64();
            infer_count = 0;
            infer_last = Instant::now();
        }

        // 4. 渲染
        monitor.update_frame(&frame);
        monitor.set_status(format!(
            "Social Distancing Detection | {} person(s) | {:.1} FPS | {:.1}ms{}",
            result.bboxes().len(),
            infer_fps,
            inference_ms,
            if args.no_distancing {
                " | distancing OFF".to_string()
            } else if violation {
                " | VIOLATION".to_string()
            } else {
                format!(" | OK (<{:.0}px)", args.threshold)
            },
        ));
        monitor.draw(&result, &centers, violation);

        next_frame().await;
    }

    println!("✅ 显示已停止,监控结束");
    Ok(())
}

/// 摄像头帧 → 推理尺寸 (Nearest 拉伸缩放, 实时路径用速度换质量)
fn resize_for_inference(frame: &DecodedFrame, inf_w: u32, inf_h: u32) -> Option<DynamicImage> {
    let src = fr::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba_data.clone(),
        fr::PixelType::U8x4,
    )
    .ok()?;
    let mut dst = fr::images::Image::new(inf_w, inf_h, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest),
        )
        .ok()?;

    // RGBA → RGB
    let dst_pixels = dst.buffer();
    let mut rgb_data = Vec::with_capacity((inf_w * inf_h * 3) as usize);
    for chunk in dst_pixels.chunks_exact(4) {
        rgb_data.push(chunk[0]);
        rgb_data.push(chunk[1]);
        rgb_data.push(chunk[2]);
    }

    RgbImage::from_raw(inf_w, inf_h, rgb_data).map(DynamicImage::ImageRgb8)
}

/// 推理坐标 → 摄像头帧坐标
fn scale_result(result: PoseResult, scale_x: f32, scale_y: f32) -> PoseResult {
    let bboxes = result
        .bboxes()
        .iter()
        .map(|b| {
            Bbox::new(
                b.xmin() * scale_x,
                b.ymin() * scale_y,
                b.width() * scale_x,
                b.height() * scale_y,
                b.id(),
                b.confidence(),
            )
        })
        .collect();
    let keypoints = result
        .keypoints()
        .iter()
        .map(|kpts| {
            kpts.iter()
                .map(|k| {
                    if k.is_present() {
                        Point2::new_with_conf(k.x() * scale_x, k.y() * scale_y, k.confidence())
                    } else {
                        Point2::default()
                    }
                })
                .collect()
        })
        .collect();
    PoseResult::new(bboxes, keypoints)
}
