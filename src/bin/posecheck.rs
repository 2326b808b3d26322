/// 图片模式检测 (Pose Check)
///
/// 对静态图片执行姿态估计 + 社交距离检查:
/// 打印每个人的髋部中点与违规判定,并保存标注后的图片。
///
/// 运行: cargo run --bin posecheck -- --source demo.jpg --threshold 150
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use clap::Parser;
use image::Rgb;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;

use distancing_rs::distancing::{detect_violation, hip_center, person_centers};
use distancing_rs::{gen_time_string, Args, Model, Point2, PoseEstimator, PoseResult, SKELETON};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const CYAN: Rgb<u8> = Rgb([0, 255, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const LIME: Rgb<u8> = Rgb([128, 255, 0]);

fn main() -> Result<()> {
    let args = Args::parse();
    if args.source.is_empty() {
        bail!("no input images, pass --source <image> (repeatable)");
    }

    let mut model = PoseEstimator::new(args.clone())?;
    model.summary();

    // 输出目录: runs/<时间戳>
    let out_dir = PathBuf::from("runs").join(gen_time_string("-"));
    std::fs::create_dir_all(&out_dir)?;

    // 标注字体 (缺失时仅画几何图形,不画文字)
    let font = load_font();
    if font.is_none() {
        println!("⚠️ 未找到字体文件,标注图将不含文字");
    }

    for source in &args.source {
        let img = image::open(source).with_context(|| format!("failed to open {source}"))?;
        let results = model.forward(&[img.clone()])?;
        let result = results.into_iter().next().unwrap_or_default();

        let centers = person_centers(result.keypoints());
        let violation = !args.no_distancing && detect_violation(&centers, args.threshold);

        println!(
            "🖼️ {}: 检测到{}人, {}个有效髋部中点",
            source,
            result.bboxes().len(),
            centers.len()
        );
        for (i, kpts) in result.keypoints().iter().enumerate() {
            match hip_center(kpts) {
                Some(c) => println!(
                    "   👤 人{}: 髋部中点 ({:.0}, {:.0}) conf={:.2}",
                    i + 1,
                    c.x(),
                    c.y(),
                    c.confidence()
                ),
                None => println!("   👤 人{}: 髋部缺失,不参与距离检查", i + 1),
            }
        }
        if violation {
            println!("🚨 Social Distancing Violation Detected!");
        } else if !args.no_distancing {
            println!("✅ 距离正常 (阈值{:.0}px)", args.threshold);
        }

        // 标注并保存
        let mut canvas = img.to_rgb8();
        annotate(&mut canvas, &result, &centers, violation, font.as_ref());
        let stem = Path::new(source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let out_path = out_dir.join(format!("{stem}.png"));
        canvas.save(&out_path)?;
        println!("💾 已保存: {}\n", out_path.display());
    }

    Ok(())
}

/// 在图片上叠加检测框、骨架、关键点、髋部中点与违规标记
fn annotate(
    canvas: &mut image::RgbImage,
    result: &PoseResult,
    centers: &[Point2],
    violation: bool,
    font: Option<&FontVec>,
) {
    for (bbox, kpts) in result.bboxes().iter().zip(result.keypoints().iter()) {
        if bbox.width() >= 1.0 && bbox.height() >= 1.0 {
            let rect = Rect::at(bbox.xmin() as i32, bbox.ymin() as i32)
                .of_size(bbox.width() as u32, bbox.height() as u32);
            draw_hollow_rect_mut(canvas, rect, GREEN);
        }

        for &(a, b) in SKELETON.iter() {
            let (Some(pa), Some(pb)) = (kpts.get(a), kpts.get(b)) else {
                continue;
            };
            if !pa.is_present() || !pb.is_present() {
                continue;
            }
            draw_line_segment_mut(canvas, (pa.x(), pa.y()), (pb.x(), pb.y()), YELLOW);
        }

        for kpt in kpts.iter().filter(|k| k.is_present()) {
            draw_filled_circle_mut(canvas, (kpt.x() as i32, kpt.y() as i32), 3, CYAN);
        }
    }

    let center_color = if violation { RED } else { LIME };
    for center in centers {
        draw_filled_circle_mut(canvas, (center.x() as i32, center.y() as i32), 6, center_color);
    }

    if violation {
        if let Some(font) = font {
            draw_text_mut(
                canvas,
                RED,
                10,
                10,
                32.0,
                font,
                "SOCIAL DISTANCING VIOLATION",
            );
        }
    }
}

/// 加载标注字体,按常见路径逐个尝试
fn load_font() -> Option<FontVec> {
    const CANDIDATES: [&str; 3] = [
        "assets/font/msyh.ttc",
        "assets/font/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ];
    for path in CANDIDATES {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                return Some(font);
            }
        }
    }
    None
}
