//! 社交距离检查 (Social Distancing Check)
//!
//! 系统的核心原创逻辑: 对一帧画面内所有人的髋部中点做两两像素距离检查,
//! 任意一对距离严格小于阈值即判定违规。
//!
//! 纯函数,无状态: 每帧的判定只依赖当帧的中点集合与固定阈值,
//! 不做时序平滑/迟滞/消抖。

use crate::{Point2, LEFT_HIP, RIGHT_HIP};

/// 从一个人的关键点序列推导髋部中点 (PersonCenter)。
///
/// 左髋(11)或右髋(12)任一缺失时返回 None, 该人不参与本帧距离检查。
/// 两点都在时返回算术中点,置信度取两髋中较低者。
pub fn hip_center(keypoints: &[Point2]) -> Option<Point2> {
    let left = keypoints.get(LEFT_HIP)?;
    let right = keypoints.get(RIGHT_HIP)?;
    if !left.is_present() || !right.is_present() {
        return None;
    }
    Some(left.midpoint(right))
}

/// 一帧内全部人的髋部中点,缺失髋部的人被静默跳过。
pub fn person_centers(poses: &[Vec<Point2>]) -> Vec<Point2> {
    poses.iter().filter_map(|kpts| hip_center(kpts)).collect()
}

/// 距离违规判定: 任意无序点对的欧氏距离严格小于 threshold 即违规。
///
/// - 不足两点永不违规
/// - 距离恰好等于阈值不算违规 (严格小于)
/// - 重合点 (距离0) 在 threshold > 0 时违规
/// - 负阈值是退化输入: 没有距离小于负数,恒为 false
pub fn detect_violation(centers: &[Point2], threshold: f32) -> bool {
    for i in 0..centers.len() {
        for j in (i + 1)..centers.len() {
            if centers[i].distance(&centers[j]) < threshold {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 150.0;

    fn p(x: f32, y: f32) -> Point2 {
        Point2::new(x, y)
    }

    /// 完整的17关键点序列,双髋在指定位置
    fn person_with_hips(left: Option<(f32, f32)>, right: Option<(f32, f32)>) -> Vec<Point2> {
        let mut kpts = vec![Point2::new_with_conf(0.0, 0.0, 0.9); 17];
        kpts[LEFT_HIP] = match left {
            Some((x, y)) => Point2::new_with_conf(x, y, 0.8),
            None => Point2::default(),
        };
        kpts[RIGHT_HIP] = match right {
            Some((x, y)) => Point2::new_with_conf(x, y, 0.7),
            None => Point2::default(),
        };
        kpts
    }

    #[test]
    fn test_empty_never_violates() {
        assert!(!detect_violation(&[], THRESHOLD));
        assert!(!detect_violation(&[], 0.0));
    }

    #[test]
    fn test_single_point_never_violates() {
        assert!(!detect_violation(&[p(10.0, 10.0)], THRESHOLD));
        assert!(!detect_violation(&[p(10.0, 10.0)], f32::MAX));
    }

    #[test]
    fn test_pair_below_threshold_violates() {
        // 距离100 < 150
        assert!(detect_violation(&[p(0.0, 0.0), p(100.0, 0.0)], THRESHOLD));
    }

    #[test]
    fn test_pair_above_threshold_ok() {
        // 距离200 ≥ 150
        assert!(!detect_violation(&[p(0.0, 0.0), p(200.0, 0.0)], THRESHOLD));
    }

    #[test]
    fn test_exact_threshold_is_not_violation() {
        // 距离恰好150: 严格小于,不违规
        assert!(!detect_violation(&[p(0.0, 0.0), p(150.0, 0.0)], THRESHOLD));
    }

    #[test]
    fn test_any_close_pair_triggers() {
        // 第三个人离得再远也不影响判定
        let centers = [p(0.0, 0.0), p(10.0, 0.0), p(500.0, 500.0)];
        assert!(detect_violation(&centers, THRESHOLD));
    }

    #[test]
    fn test_coincident_points_violate() {
        assert!(detect_violation(&[p(42.0, 42.0), p(42.0, 42.0)], 1.0));
        assert!(!detect_violation(&[p(42.0, 42.0), p(42.0, 42.0)], 0.0));
    }

    #[test]
    fn test_negative_threshold_never_violates() {
        assert!(!detect_violation(&[p(0.0, 0.0), p(1.0, 0.0)], -1.0));
    }

    #[test]
    fn test_diagonal_distance() {
        // 3-4-5 直角三角形: 距离恰为5
        assert!(detect_violation(&[p(0.0, 0.0), p(3.0, 4.0)], 5.1));
        assert!(!detect_violation(&[p(0.0, 0.0), p(3.0, 4.0)], 5.0));
    }

    #[test]
    fn test_permutation_invariance() {
        let a = [p(0.0, 0.0), p(100.0, 0.0), p(500.0, 500.0)];
        let b = [p(500.0, 500.0), p(0.0, 0.0), p(100.0, 0.0)];
        let c = [p(100.0, 0.0), p(500.0, 500.0), p(0.0, 0.0)];
        let r = detect_violation(&a, THRESHOLD);
        assert_eq!(r, detect_violation(&b, THRESHOLD));
        assert_eq!(r, detect_violation(&c, THRESHOLD));
    }

    #[test]
    fn test_monotonic_in_threshold() {
        // 阈值增大只会把 false 变 true,不会反向
        let centers = [p(0.0, 0.0), p(120.0, 0.0), p(400.0, 0.0)];
        let mut prev = false;
        for t in [0.0, 50.0, 119.0, 121.0, 300.0, 1000.0] {
            let cur = detect_violation(&centers, t);
            assert!(cur >= prev, "violation flipped back at threshold {t}");
            prev = cur;
        }
    }

    #[test]
    fn test_idempotent() {
        let centers = [p(0.0, 0.0), p(100.0, 0.0)];
        let first = detect_violation(&centers, THRESHOLD);
        let second = detect_violation(&centers, THRESHOLD);
        assert_eq!(first, second);
    }

    #[test]
    fn test_hip_center_midpoint() {
        let kpts = person_with_hips(Some((100.0, 200.0)), Some((140.0, 210.0)));
        let center = hip_center(&kpts).unwrap();
        assert_eq!(center.x(), 120.0);
        assert_eq!(center.y(), 205.0);
        // 置信度取两髋较低者
        assert_eq!(center.confidence(), 0.7);
    }

    #[test]
    fn test_hip_center_missing_left() {
        let kpts = person_with_hips(None, Some((140.0, 210.0)));
        assert!(hip_center(&kpts).is_none());
    }

    #[test]
    fn test_hip_center_missing_right() {
        let kpts = person_with_hips(Some((100.0, 200.0)), None);
        assert!(hip_center(&kpts).is_none());
    }

    #[test]
    fn test_hip_center_short_keypoint_list() {
        // 关键点数量不足时同样视为缺失,不报错
        assert!(hip_center(&[]).is_none());
        assert!(hip_center(&vec![Point2::new_with_conf(1.0, 1.0, 0.9); 5]).is_none());
    }

    #[test]
    fn test_person_centers_skips_incomplete() {
        let poses = vec![
            person_with_hips(Some((0.0, 0.0)), Some((10.0, 0.0))),
            person_with_hips(Some((300.0, 0.0)), None), // 右髋缺失,被跳过
            person_with_hips(Some((600.0, 0.0)), Some((610.0, 0.0))),
        ];
        let centers = person_centers(&poses);
        assert_eq!(centers.len(), 2);
        assert_eq!(centers[0].x(), 5.0);
        assert_eq!(centers[1].x(), 605.0);
    }

    #[test]
    fn test_single_remaining_center_never_violates() {
        // 一人髋部缺失后只剩一个中点 → 无违规
        let poses = vec![
            person_with_hips(Some((0.0, 0.0)), Some((10.0, 0.0))),
            person_with_hips(None, Some((5.0, 0.0))),
        ];
        let centers = person_centers(&poses);
        assert_eq!(centers.len(), 1);
        assert!(!detect_violation(&centers, THRESHOLD));
    }
}
