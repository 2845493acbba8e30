//! 定位结果数据结构

use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D 坐标（地图单位）
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// 与另一点的欧几里得距离
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// 逐轴加权混合: `weight * self + (1 - weight) * other`
    pub fn blend(&self, other: &Point, weight: f64) -> Point {
        Point {
            x: weight * self.x + (1.0 - weight) * other.x,
            y: weight * self.y + (1.0 - weight) * other.y,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// 可定位区域的外接矩形，计算结果超出时钳位到边界
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Bounds {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.clamp(self.min_x, self.max_x),
            y: point.y.clamp(self.min_y, self.max_y),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        // 8 x 8 房间外扩 1 个单位
        Bounds::new(-1.0, 9.0, -1.0, 9.0)
    }
}

/// 产生估计结果的策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// 近场覆盖：向最近信标收拢
    NearField,
    /// 三边定位与加权质心混合
    Hybrid,
    /// 仅三边定位
    Trilateration,
    /// 仅加权质心
    WeightedCentroid,
}

impl fmt::Display for EstimateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimateMethod::NearField => "近场覆盖",
            EstimateMethod::Hybrid => "混合定位",
            EstimateMethod::Trilateration => "三边定位",
            EstimateMethod::WeightedCentroid => "加权质心",
        };
        f.write_str(name)
    }
}

/// 单个周期的定位结果
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PositionEstimate {
    pub point: Point,
    pub method: EstimateMethod,
}

impl PositionEstimate {
    pub fn new(point: Point, method: EstimateMethod) -> Self {
        PositionEstimate { point, method }
    }
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.point, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_blend_per_axis() {
        let a = Point::new(0.0, 7.0);
        let b = Point::new(5.0, 2.0);
        let p = a.blend(&b, 0.8);
        assert!((p.x - 1.0).abs() < 1e-9);
        assert!((p.y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = Bounds::default();
        assert_eq!(bounds.clamp(Point::new(12.0, -3.5)), Point::new(9.0, -1.0));
        assert_eq!(bounds.clamp(Point::new(2.0, 3.0)), Point::new(2.0, 3.0));
        assert!(!Bounds::new(1.0, 0.0, 0.0, 1.0).is_valid());
    }
}
