// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;

use crate::YOLOTask;

/// Runtime configuration, built once at startup and passed around read-only.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ONNX pose model path (e.g. models/yolov8n-pose.onnx)
    #[arg(long, default_value = "models/yolov8n-pose.onnx")]
    pub model: String,

    /// Download URL used when the model file is missing locally
    #[arg(long)]
    pub model_url: Option<String>,

    /// Input image path(s), image mode only
    #[arg(long)]
    pub source: Vec<String>,

    /// Camera device index
    #[arg(long, default_value_t = 0)]
    pub camera_index: usize,

    /// Camera capture width
    #[arg(long, default_value_t = 640)]
    pub cap_width: u32,

    /// Camera capture height
    #[arg(long, default_value_t = 480)]
    pub cap_height: u32,

    /// Request MJPEG from the camera instead of raw frames
    #[arg(long, default_value_t = true)]
    pub mjpeg: bool,

    /// Frame capture timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Social distancing threshold in pixels
    #[arg(long, default_value_t = 150.0)]
    pub threshold: f32,

    /// Disable the distancing check, render poses and print raw output only
    #[arg(long)]
    pub no_distancing: bool,

    /// GPU device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Use CUDA execution provider
    #[arg(long)]
    pub cuda: bool,

    /// Use TensorRT execution provider
    #[arg(long)]
    pub trt: bool,

    /// TensorRT fp16 mode
    #[arg(long)]
    pub fp16: bool,

    /// Batch size
    #[arg(long, default_value_t = 1)]
    pub batch: u32,

    /// Dynamic batch minimum (TensorRT)
    #[arg(long, default_value_t = 1)]
    pub batch_min: u32,

    /// Dynamic batch maximum (TensorRT)
    #[arg(long, default_value_t = 4)]
    pub batch_max: u32,

    /// YOLO task override, normally read from model metadata
    #[arg(long, value_enum)]
    pub task: Option<YOLOTask>,

    /// Number of classes, normally read from model metadata
    #[arg(long)]
    pub nc: Option<u32>,

    /// Number of keypoints, normally read from model metadata
    #[arg(long)]
    pub nk: Option<u32>,

    /// Inference input width, required for models with dynamic axes
    #[arg(long)]
    pub width: Option<u32>,

    /// Inference input height, required for models with dynamic axes
    #[arg(long)]
    pub height: Option<u32>,

    /// Class confidence threshold
    #[arg(long, default_value_t = 0.15)]
    pub conf: f32,

    /// Keypoint confidence threshold, below it a keypoint counts as missing
    #[arg(long, default_value_t = 0.55)]
    pub kconf: f32,

    /// NMS IoU threshold
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Print per-stage timings
    #[arg(long)]
    pub profile: bool,
}
