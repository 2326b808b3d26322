// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8-pose 完整模型实现
// 包含: 模型加载、预处理、推理、关键点后处理

use anyhow::{bail, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};

use crate::ort_backend::fetch_model;
use crate::{
    non_max_suppression, Batch, Bbox, OrtBackend, OrtConfig, OrtEP, Point2, PoseResult, YOLOTask,
};

/// YOLOv8-pose 完整模型结构
pub struct PoseEstimator {
    engine: OrtBackend,
    nc: u32,
    nk: u32,
    height: u32,
    width: u32,
    batch: u32,
    conf: f32,
    kconf: f32,
    iou: f32,
    names: Vec<String>,
    profile: bool,
}

impl PoseEstimator {
    /// 从配置创建姿态模型
    pub fn new(config: crate::Args) -> Result<Self> {
        // execution provider
        let ep = if config.trt {
            OrtEP::Trt(config.device_id)
        } else if config.cuda {
            OrtEP::CUDA(config.device_id)
        } else {
            OrtEP::CPU
        };

        // batch
        let batch = Batch {
            opt: config.batch,
            min: config.batch_min,
            max: config.batch_max,
        };

        // build ort engine
        let model_path = fetch_model(&config.model, config.model_url.as_deref())?;
        let ort_args = OrtConfig {
            f: model_path.to_string_lossy().into_owned(),
            task: config.task,
            ep,
            batch,
            trt_fp16: config.fp16,
            image_size: (config.height, config.width),
        };
        let engine = OrtBackend::build(ort_args)?;

        // 仅支持姿态估计任务
        let task = engine.task();
        if task != YOLOTask::Pose {
            bail!("model task is {:?}, expected a pose model (yolov8*-pose.onnx)", task);
        }

        let (batch, height, width) = (engine.batch(), engine.height(), engine.width());
        let nk = match engine.nk().or(config.nk) {
            Some(nk) => nk,
            None => bail!("failed to get num_keypoints, make it explicit with `--nk`"),
        };
        // 姿态模型只有 person 一个类别
        let nc = engine.nc().or(config.nc).unwrap_or(1);

        // class names
        let names = engine.names().unwrap_or(vec!["person".to_string()]);

        Ok(Self {
            engine,
            names,
            conf: config.conf,
            kconf: config.kconf,
            iou: config.iou,
            profile: config.profile,
            nc,
            nk,
            height,
            width,
            batch,
        })
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    pub fn preprocess(&mut self, xs: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
        let mut ys =
            Array::ones((xs.len(), 3, self.height() as usize, self.width() as usize)).into_dyn();
        ys.fill(144.0 / 255.0);
        for (idx, x) in xs.iter().enumerate() {
            let (w0, h0) = x.dimensions();
            let w0 = w0 as f32;
            let h0 = h0 as f32;
            let (_, w_new, h_new) =
                self.scale_wh(w0, h0, self.width() as f32, self.height() as f32);
            let img = x.resize_exact(
                w_new as u32,
                h_new as u32,
                image::imageops::FilterType::Triangle,
            );

            for (x, y, rgb) in img.pixels() {
                let x = x as usize;
                let y = y as usize;
                let [r, g, b, _] = rgb.0;
                ys[[idx, 0, y, x]] = (r as f32) / 255.0;
                ys[[idx, 1, y, x]] = (g as f32) / 255.0;
                ys[[idx, 2, y, x]] = (b as f32) / 255.0;
            }
        }

        Ok(ys)
    }

    pub fn run(&mut self, xs: &[DynamicImage]) -> Result<Vec<PoseResult>> {
        let t_pre = std::time::Instant::now();
        let xs_ = self.preprocess(xs)?;
        if self.profile {
            println!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = std::time::Instant::now();
        let ys = self.engine.run(xs_, self.profile)?;
        if self.profile {
            println!("[Model Inference]: {:?}", t_run.elapsed());
        }

        let t_post = std::time::Instant::now();
        let ys = self.postprocess(ys, xs)?;
        if self.profile {
            println!("[Model Postprocess]: {:?}", t_post.elapsed());
        }

        Ok(ys)
    }

    pub fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<PoseResult>> {
        const CXYWH_OFFSET: usize = 4;
        const KPT_STEP: usize = 3;

        let preds = &xs[0];
        let mut ys = Vec::new();
        for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
            let width_original = xs0[idx].width() as f32;
            let height_original = xs0[idx].height() as f32;
            let ratio = (self.width() as f32 / width_original)
                .min(self.height() as f32 / height_original);

            let mut data: Vec<(Bbox, Vec<Point2>)> = Vec::new();
            for pred in anchor.axis_iter(Axis(1)) {
                let bbox = pred.slice(s![0..CXYWH_OFFSET]);
                let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.nc() as usize]);
                let kpts = pred.slice(s![pred.len() - KPT_STEP * self.nk() as usize..]);

                let (id, &confidence) = clss
                    .into_iter()
                    .enumerate()
                    .reduce(|max, x| if x.1 > max.1 { x } else { max })
                    .unwrap();

                if confidence < self.conf {
                    continue;
                }

                let cx = bbox[0] / ratio;
                let cy = bbox[1] / ratio;
                let w = bbox[2] / ratio;
                let h = bbox[3] / ratio;
                let x = cx - w / 2.;
                let y = cy - h / 2.;
                let y_bbox = Bbox::new(
                    x.max(0.0f32).min(width_original),
                    y.max(0.0f32).min(height_original),
                    w,
                    h,
                    id,
                    confidence,
                );

                // 关键点解码: 低于 kconf 的关键点记为缺失 (Point2::default)
                let mut y_kpts = Vec::with_capacity(self.nk() as usize);
                for i in 0..self.nk() as usize {
                    let kx = kpts[KPT_STEP * i] / ratio;
                    let ky = kpts[KPT_STEP * i + 1] / ratio;
                    let kconf = kpts[KPT_STEP * i + 2];
                    if kconf < self.kconf {
                        y_kpts.push(Point2::default());
                    } else {
                        y_kpts.push(Point2::new_with_conf(
                            kx.max(0.0f32).min(width_original),
                            ky.max(0.0f32).min(height_original),
                            kconf,
                        ));
                    }
                }

                data.push((y_bbox, y_kpts));
            }

            non_max_suppression(&mut data, self.iou);

            let mut y_bboxes: Vec<Bbox> = Vec::new();
            let mut y_kpts: Vec<Vec<Point2>> = Vec::new();
            for (bbox, kpts) in data.into_iter() {
                y_bboxes.push(bbox);
                y_kpts.push(kpts);
            }

            ys.push(PoseResult::new(y_bboxes, y_kpts));
        }

        Ok(ys)
    }

    pub fn summary(&self) {
        println!(
            "\nSummary:\n\
            > Task: Pose{}\n\
            > EP: {:?} {}\n\
            > Dtype: {:?}\n\
            > Batch: {} ({}), Height: {} ({}), Width: {} ({})\n\
            > nc: {} nk: {}, conf: {}, kconf: {}, iou: {}\n\
            ",
            match self.engine.author().zip(self.engine.version()) {
                Some((author, ver)) => format!(" ({} {})", author, ver),
                None => String::from(""),
            },
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            self.engine.dtype(),
            self.batch(),
            if self.engine.is_batch_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.height(),
            if self.engine.is_height_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.width(),
            if self.engine.is_width_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.nc(),
            self.nk(),
            self.conf,
            self.kconf,
            self.iou,
        );
    }

    pub fn engine(&self) -> &OrtBackend {
        &self.engine
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn kconf(&self) -> f32 {
        self.kconf
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn nc(&self) -> u32 {
        self.nc
    }

    pub fn nk(&self) -> u32 {
        self.nk
    }

    pub fn names(&self) -> &Vec<String> {
        &self.names
    }
}

// 实现统一的 Model trait
impl super::Model for PoseEstimator {
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        let batch = PoseEstimator::preprocess(self, images)?;
        Ok(vec![batch])
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs[0].clone(), profile)
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<PoseResult>> {
        PoseEstimator::postprocess(self, xs, xs0)
    }

    fn summary(&self) {
        PoseEstimator::summary(self)
    }

    fn supports_task(&self, task: YOLOTask) -> bool {
        matches!(task, YOLOTask::Pose)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_letterbox_scale_wh() {
        // scale_wh 的纯计算部分: 640x480 → 640x640 等比缩放
        let (w0, h0, w1, h1) = (640.0f32, 480.0f32, 640.0f32, 640.0f32);
        let r = (w1 / w0).min(h1 / h0);
        assert_eq!(r, 1.0);
        assert_eq!((w0 * r).round(), 640.0);
        assert_eq!((h0 * r).round(), 480.0);

        // 1920x1080 → 640x640
        let (w0, h0) = (1920.0f32, 1080.0f32);
        let r = (w1 / w0).min(h1 / h0);
        assert!((r - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!((w0 * r).round(), 640.0);
        assert_eq!((h0 * r).round(), 360.0);
    }
}
