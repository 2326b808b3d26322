#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 运行参数
pub mod distancing; // 社交距离检查 (核心逻辑)
pub mod input; // 摄像头输入系统
pub mod models; // 姿态模型接口与实现
pub mod render; // 监控画面渲染

pub mod ort_backend;

pub use crate::config::Args;
pub use crate::models::{Model, PoseEstimator};
pub use crate::ort_backend::{Batch, OrtBackend, OrtConfig, OrtEP, YOLOTask};

pub fn non_max_suppression(xs: &mut Vec<(Bbox, Vec<Point2>)>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.0.confidence().partial_cmp(&b1.0.confidence()).unwrap());

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].0.iou(&xs[index].0);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let offset = chrono::FixedOffset::east_opt(8 * 60 * 60).unwrap(); // Beijing
    let t_now = chrono::Utc::now().with_timezone(&offset);
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

/// COCO 17关键点索引: 11-左髋, 12-右髋
pub const LEFT_HIP: usize = 11;
pub const RIGHT_HIP: usize = 12;

pub const KEYPOINT_NAMES: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Pose estimation results of an image.
///
/// `bboxes` and `keypoints` run in parallel: entry i of both belongs to
/// person i of the frame.
#[derive(Clone, PartialEq, Default)]
pub struct PoseResult {
    pub bboxes: Vec<Bbox>,
    pub keypoints: Vec<Vec<Point2>>,
}

impl std::fmt::Debug for PoseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseResult")
            .field("Persons", &self.bboxes.len())
            .field("Bboxes", &self.bboxes)
            .field("Keypoints", &self.keypoints)
            .finish()
    }
}

impl PoseResult {
    pub fn new(bboxes: Vec<Bbox>, keypoints: Vec<Vec<Point2>>) -> Self {
        Self { bboxes, keypoints }
    }

    pub fn bboxes(&self) -> &[Bbox] {
        &self.bboxes
    }

    pub fn keypoints(&self) -> &[Vec<Point2>] {
        &self.keypoints
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Point2 {
    // A point2d with x, y, conf
    x: f32,
    y: f32,
    confidence: f32,
}

impl Point2 {
    pub fn new_with_conf(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// 关键点是否被检测到 (confidence=0 表示该点缺失)
    pub fn is_present(&self) -> bool {
        self.confidence > 0.0
    }

    /// Euclidean distance to another point, in pixels.
    pub fn distance(&self, another: &Point2) -> f32 {
        let dx = self.x - another.x;
        let dy = self.y - another.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Arithmetic midpoint; confidence is the weaker of the two.
    pub fn midpoint(&self, another: &Point2) -> Point2 {
        Point2::new_with_conf(
            (self.x + another.x) / 2.,
            (self.y + another.y) / 2.,
            self.confidence.min(another.confidence),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn cxcy(&self) -> Point2 {
        Point2::new(self.xmin + self.width / 2., self.ymin + self.height / 2.)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = (self.xmin + self.width).min(another.xmin + another.width);
        let t = self.ymin.max(another.ymin);
        let b = (self.ymin + self.height).min(another.ymin + another.height);
        (r - l + 1.).max(0.) * (b - t + 1.).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        self.intersection_area(another) / self.union(another)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn test_point_midpoint() {
        let a = Point2::new_with_conf(10.0, 20.0, 0.9);
        let b = Point2::new_with_conf(30.0, 40.0, 0.6);
        let m = a.midpoint(&b);
        assert_eq!(m.x(), 20.0);
        assert_eq!(m.y(), 30.0);
        assert_eq!(m.confidence(), 0.6);
    }

    #[test]
    fn test_point_presence() {
        assert!(!Point2::default().is_present());
        assert!(!Point2::new(5.0, 5.0).is_present());
        assert!(Point2::new_with_conf(5.0, 5.0, 0.8).is_present());
    }

    #[test]
    fn test_bbox_iou_self() {
        let b = Bbox::new(10.0, 10.0, 100.0, 50.0, 0, 0.9);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_iou_disjoint() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(100.0, 100.0, 10.0, 10.0, 0, 0.9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        // 两个高度重叠的框,仅保留置信度更高的一个
        let mut boxes = vec![
            (Bbox::new(0.0, 0.0, 100.0, 100.0, 0, 0.5), vec![]),
            (Bbox::new(2.0, 2.0, 100.0, 100.0, 0, 0.9), vec![]),
        ];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].0.confidence(), 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let mut boxes = vec![
            (Bbox::new(0.0, 0.0, 50.0, 50.0, 0, 0.5), vec![]),
            (Bbox::new(300.0, 300.0, 50.0, 50.0, 0, 0.9), vec![]),
        ];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 2);
        // 排序后置信度降序
        assert!(boxes[0].0.confidence() >= boxes[1].0.confidence());
    }
}
