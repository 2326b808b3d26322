// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎封装
// 负责: 会话构建、输入输出自省、模型元数据解析、f32/f16 推理

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use half::f16;
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::{
    CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;
use regex::Regex;

/// YOLO task type, read from model metadata unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YOLOTask {
    Classify,
    Detect,
    Pose,
    Segment,
}

/// Execution provider selection.
#[derive(Debug, Clone, Copy)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// Batch size bounds for models with a dynamic batch axis.
#[derive(Debug, Clone, Copy)]
pub struct Batch {
    pub opt: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            opt: 1,
            min: 1,
            max: 1,
        }
    }
}

/// Backend build configuration.
pub struct OrtConfig {
    /// Model file path
    pub f: String,
    pub task: Option<YOLOTask>,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    pub batch: Batch,
    /// (height, width) fallback for dynamic axes
    pub image_size: (Option<u32>, Option<u32>),
}

/// ONNX Runtime backend: session + introspected model facts.
pub struct OrtBackend {
    session: Session,
    task: YOLOTask,
    ep: OrtEP,
    batch: Batch,
    dtype: TensorElementType,
    input_name: String,
    input_shape: Vec<i64>,
    output_names: Vec<String>,
    batch_size: u32,
    height: u32,
    width: u32,
    names: Option<Vec<String>>,
    kpt_shape: Option<(u32, u32)>,
    author: Option<String>,
    version: Option<i64>,
}

// 元数据中 names 形如 {0: 'person', 1: 'bicycle', ...}
static NAMES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'([^']+)'"#).unwrap());
// kpt_shape 形如 [17, 3]
static KPT_SHAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let mut ep = config.ep;
        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

        match ep {
            OrtEP::CUDA(device_id) => {
                let cuda = CUDAExecutionProvider::default().with_device_id(device_id);
                if cuda.is_available().unwrap_or(false) {
                    builder = builder.with_execution_providers([cuda.build()])?;
                } else {
                    eprintln!("⚠️ CUDA不可用, 回退到CPU");
                    ep = OrtEP::CPU;
                }
            }
            OrtEP::Trt(device_id) => {
                let trt = TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .with_fp16(config.trt_fp16);
                if trt.is_available().unwrap_or(false) {
                    builder = builder.with_execution_providers([trt.build()])?;
                } else {
                    eprintln!("⚠️ TensorRT不可用, 回退到CPU");
                    ep = OrtEP::CPU;
                }
            }
            OrtEP::CPU => {}
        }

        let session = builder.commit_from_file(&config.f)?;

        // input introspection
        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("model has no inputs: {}", config.f))?;
        let input_name = input.name.clone();
        let input_shape: Vec<i64> = input
            .input_type
            .tensor_dimensions()
            .ok_or_else(|| anyhow!("model input is not a tensor: {}", config.f))?
            .clone();
        if input_shape.len() != 4 {
            bail!("expected NCHW model input, got shape {:?}", input_shape);
        }
        let dtype = input
            .input_type
            .tensor_type()
            .ok_or_else(|| anyhow!("model input has no element type"))?;
        match dtype {
            TensorElementType::Float32 | TensorElementType::Float16 => {}
            t => bail!("unsupported model input dtype: {:?}", t),
        }

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        // dynamic axes fall back to the configured sizes
        let batch_size = if input_shape[0] > 0 {
            input_shape[0] as u32
        } else {
            config.batch.opt
        };
        let height = if input_shape[2] > 0 {
            input_shape[2] as u32
        } else {
            config.image_size.0.unwrap_or(640)
        };
        let width = if input_shape[3] > 0 {
            input_shape[3] as u32
        } else {
            config.image_size.1.unwrap_or(640)
        };

        // model metadata
        let (author, version, names, kpt_shape, meta_task) = {
            let metadata = session.metadata()?;
            let author = metadata.producer().ok().filter(|s| !s.is_empty());
            let version = metadata.version().ok();
            let names = metadata.custom("names").ok().flatten().map(|raw| {
                NAMES_RE
                    .captures_iter(&raw)
                    .map(|c| c[1].to_string())
                    .collect::<Vec<_>>()
            });
            let kpt_shape = metadata.custom("kpt_shape").ok().flatten().and_then(|raw| {
                let dims: Vec<u32> = KPT_SHAPE_RE
                    .find_iter(&raw)
                    .filter_map(|m| m.as_str().parse().ok())
                    .collect();
                match dims[..] {
                    [nk, step, ..] => Some((nk, step)),
                    _ => None,
                }
            });
            let meta_task = metadata
                .custom("task")
                .ok()
                .flatten()
                .and_then(|raw| match raw.as_str() {
                    "classify" => Some(YOLOTask::Classify),
                    "detect" => Some(YOLOTask::Detect),
                    "pose" => Some(YOLOTask::Pose),
                    "segment" => Some(YOLOTask::Segment),
                    _ => None,
                });
            (author, version, names, kpt_shape, meta_task)
        };
        let task = match meta_task.or(config.task) {
            Some(task) => task,
            None => bail!("task not found in model metadata, make it explicit with `--task`"),
        };

        Ok(Self {
            session,
            task,
            ep,
            batch: config.batch,
            dtype,
            input_name,
            input_shape,
            output_names,
            batch_size,
            height,
            width,
            names,
            kpt_shape,
            author,
            version,
        })
    }

    /// 推理: NCHW f32 张量 → 模型各输出 (统一还原为 f32)
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = Instant::now();
        let outputs = match self.dtype {
            TensorElementType::Float16 => {
                let xs = xs.mapv(f16::from_f32);
                self.session
                    .run(ort::inputs![self.input_name.as_str() => Tensor::from_array(xs)?])?
            }
            _ => self
                .session
                .run(ort::inputs![self.input_name.as_str() => Tensor::from_array(xs)?])?,
        };
        if profile {
            println!("[Ort Inference]: {:?}", t.elapsed());
        }

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let y = match self.dtype {
                TensorElementType::Float16 => outputs[name.as_str()]
                    .try_extract_array::<f16>()?
                    .mapv(f32::from)
                    .into_dyn(),
                _ => outputs[name.as_str()]
                    .try_extract_array::<f32>()?
                    .to_owned()
                    .into_dyn(),
            };
            ys.push(y);
        }
        Ok(ys)
    }

    pub fn task(&self) -> YOLOTask {
        self.task
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn dtype(&self) -> TensorElementType {
        self.dtype
    }

    pub fn batch(&self) -> u32 {
        self.batch_size
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_batch_dynamic(&self) -> bool {
        self.input_shape[0] < 1
    }

    pub fn is_height_dynamic(&self) -> bool {
        self.input_shape[2] < 1
    }

    pub fn is_width_dynamic(&self) -> bool {
        self.input_shape[3] < 1
    }

    pub fn batch_bounds(&self) -> Batch {
        self.batch
    }

    /// Number of classes, from the metadata names map.
    pub fn nc(&self) -> Option<u32> {
        self.names.as_ref().map(|names| names.len() as u32)
    }

    /// Number of keypoints, from the metadata kpt_shape.
    pub fn nk(&self) -> Option<u32> {
        self.kpt_shape.map(|(nk, _)| nk)
    }

    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    pub fn author(&self) -> Option<String> {
        self.author.clone()
    }

    pub fn version(&self) -> Option<i64> {
        self.version
    }
}

/// Resolve the model file, downloading into the user cache dir when a URL
/// was provided and the file is missing locally.
pub fn fetch_model(f: &str, url: Option<&str>) -> Result<PathBuf> {
    let path = PathBuf::from(f);
    if path.is_file() {
        return Ok(path);
    }

    let Some(url) = url else {
        bail!("model not found: {f} (pass --model-url to download it)");
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("invalid model path: {f}"))?
        .to_owned();
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("distancing-rs")
        .join("models");
    std::fs::create_dir_all(&cache_dir)?;
    let target = cache_dir.join(file_name);
    if target.is_file() {
        return Ok(target);
    }

    println!("⏬ 下载模型: {} → {}", url, target.display());
    let resp = ureq::get(url).call()?;
    let mut reader = resp.into_reader();
    let mut out = std::fs::File::create(&target)?;
    std::io::copy(&mut reader, &mut out)?;
    println!("✅ 模型下载完成");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_metadata_parsing() {
        let raw = "{0: 'person', 1: 'bicycle', 2: 'traffic light'}";
        let names: Vec<String> = NAMES_RE
            .captures_iter(raw)
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(names, vec!["person", "bicycle", "traffic light"]);
    }

    #[test]
    fn test_kpt_shape_metadata_parsing() {
        let dims: Vec<u32> = KPT_SHAPE_RE
            .find_iter("[17, 3]")
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        assert_eq!(dims, vec![17, 3]);
    }

    #[test]
    fn test_fetch_model_local_file_missing_without_url() {
        assert!(fetch_model("definitely/not/there.onnx", None).is_err());
    }
}
