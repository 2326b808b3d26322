/// 姿态模型统一接口与实现
///
/// # 架构说明
///
/// ## 完整模型实现 (Full Model Implementation)
/// - **PoseEstimator**: 包含完整的 struct + impl Model trait
///   - 模型加载 (new)
///   - 预处理 (preprocess)
///   - 推理 (run)
///   - 后处理 (postprocess)
///   - 文件: `pose.rs`
///
/// ## Model Trait
/// 统一的模型接口，定义标准流程: preprocess → run → postprocess
use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array, IxDyn};

use crate::{PoseResult, YOLOTask};

/// 统一的深度学习模型接口
///
/// ## 核心流程
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 姿态结果
/// ```
pub trait Model {
    /// 预处理: 图片 → NCHW格式张量
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 推理: 执行模型前向传播, 返回原始输出(未解码)
    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 姿态结果 (xs0 为原始图片,用于坐标还原)
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<PoseResult>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<PoseResult>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, images)
    }

    /// 打印模型信息
    fn summary(&self);

    /// 检查模型是否支持指定任务
    fn supports_task(&self, task: YOLOTask) -> bool;
}

// 各模型的具体实现
pub mod pose; // YOLOv8-pose 完整模型 + 实现 Model trait

// Re-exports
pub use pose::PoseEstimator;
