//! 定位算法实现
//!
//! 支持：
//! - 三边定位（三个最近信标的闭式解）
//! - 加权质心（稳健的回退方案）
//! - 混合定位（含近场覆盖）

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithms::{
    AnchorSet, Bounds, EstimateMethod, Point, PositionEstimate, Reading, sort_by_distance,
};
use crate::error::ConfigError;

/// 定位算法参数（经验值，均可调）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    /// 最近信标距离低于该值时触发近场覆盖（地图单位）
    pub near_field_threshold: f64,
    /// 近场覆盖时最近信标坐标的权重
    pub near_field_anchor_weight: f64,
    /// 常规混合时三边定位的权重，其余给加权质心
    pub trilateration_weight: f64,
    /// 加权质心的距离指数
    pub centroid_exponent: f64,
    /// 加权质心的加性常数，避免除零
    pub centroid_epsilon: f64,
    /// 行列式低于该值视为几何退化
    pub degenerate_epsilon: f64,
    /// 结果钳位范围
    pub bounds: Bounds,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        EstimatorParams {
            near_field_threshold: 2.0,
            near_field_anchor_weight: 0.8,
            trilateration_weight: 0.6,
            centroid_exponent: 3.0,
            centroid_epsilon: 0.01,
            degenerate_epsilon: 1e-4,
            bounds: Bounds::default(),
        }
    }
}

impl EstimatorParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("estimator.near_field_anchor_weight", self.near_field_anchor_weight),
            ("estimator.trilateration_weight", self.trilateration_weight),
        ];
        for (name, value) in weights {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        let positive = [
            ("estimator.centroid_exponent", self.centroid_exponent),
            ("estimator.centroid_epsilon", self.centroid_epsilon),
            ("estimator.degenerate_epsilon", self.degenerate_epsilon),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        if self.near_field_threshold.is_nan() {
            return Err(ConfigError::InvalidParameter {
                name: "estimator.near_field_threshold",
                value: self.near_field_threshold,
            });
        }
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds);
        }
        Ok(())
    }
}

/// 位置估计器
#[derive(Clone, Debug, Default)]
pub struct PositionEstimator {
    params: EstimatorParams,
}

impl PositionEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        PositionEstimator { params }
    }

    /// 三边定位 - 使用前三条读数（调用方保证已按距离升序）
    ///
    /// 三个圆方程两两相减消去二次项，得到 2x2 线性方程组，用克莱姆法则求解。
    ///
    /// # 返回
    /// - 钳位后的坐标；读数不足三条或几何退化时返回 None，调用方应回退到加权质心
    pub fn trilaterate(&self, readings: &[Reading], anchors: &AnchorSet) -> Option<Point> {
        if readings.len() < 3 {
            return None;
        }

        let circle = |reading: &Reading| {
            let anchor = anchors.get(reading.anchor);
            (anchor.x, anchor.y, reading.distance)
        };
        let (x1, y1, r1) = circle(&readings[0]);
        let (x2, y2, r2) = circle(&readings[1]);
        let (x3, y3, r3) = circle(&readings[2]);

        // 圆1 - 圆2
        let a = 2.0 * (x2 - x1);
        let b = 2.0 * (y2 - y1);
        let c = r1 * r1 - r2 * r2 - x1 * x1 + x2 * x2 - y1 * y1 + y2 * y2;
        // 圆2 - 圆3
        let d = 2.0 * (x3 - x2);
        let e = 2.0 * (y3 - y2);
        let f = r2 * r2 - r3 * r3 - x2 * x2 + x3 * x3 - y2 * y2 + y3 * y3;

        let det = a * e - b * d;
        if det.abs() < self.params.degenerate_epsilon {
            debug!("三边定位行列式 {:.2e} 过小，几何退化", det);
            return None;
        }

        let x = (c * e - f * b) / det;
        let y = (a * f - c * d) / det;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }

        Some(self.params.bounds.clamp(Point::new(x, y)))
    }

    /// 加权质心 - 权重 1 / (d^k + ε)，近处信标占绝对主导
    pub fn weighted_centroid(&self, readings: &[Reading], anchors: &AnchorSet) -> Option<Point> {
        let mut x_sum = 0.0;
        let mut y_sum = 0.0;
        let mut total_weight = 0.0;

        for reading in readings {
            let anchor = anchors.get(reading.anchor);
            let distance = reading.distance.max(0.0);
            let weight =
                1.0 / (distance.powf(self.params.centroid_exponent) + self.params.centroid_epsilon);

            x_sum += anchor.x * weight;
            y_sum += anchor.y * weight;
            total_weight += weight;
        }

        if !(total_weight > 0.0) || !total_weight.is_finite() {
            return None;
        }

        Some(Point::new(x_sum / total_weight, y_sum / total_weight))
    }

    /// 混合定位 - 对外入口
    ///
    /// 1. 按距离升序排序
    /// 2. 最近信标距离低于近场阈值且三边定位成功：向该信标坐标收拢
    /// 3. 否则混合三边定位与加权质心；只有一个成功则直接使用
    ///
    /// 读数不足三条或所有策略都失败时返回 None
    pub fn estimate(&self, readings: &[Reading], anchors: &AnchorSet) -> Option<PositionEstimate> {
        if readings.len() < 3 {
            return None;
        }

        let mut ranked = readings.to_vec();
        sort_by_distance(&mut ranked);

        let nearest = &ranked[0];
        let trilateration = self.trilaterate(&ranked, anchors);

        if nearest.distance < self.params.near_field_threshold {
            if let Some(tri) = trilateration {
                let anchor = anchors.get(nearest.anchor).position();
                let point = anchor.blend(&tri, self.params.near_field_anchor_weight);
                return Some(self.finish(point, EstimateMethod::NearField));
            }
        }

        let centroid = self.weighted_centroid(&ranked, anchors);

        match (trilateration, centroid) {
            (Some(tri), Some(wc)) => {
                let point = tri.blend(&wc, self.params.trilateration_weight);
                Some(self.finish(point, EstimateMethod::Hybrid))
            }
            (Some(tri), None) => Some(self.finish(tri, EstimateMethod::Trilateration)),
            (None, Some(wc)) => Some(self.finish(wc, EstimateMethod::WeightedCentroid)),
            (None, None) => None,
        }
    }

    fn finish(&self, point: Point, method: EstimateMethod) -> PositionEstimate {
        PositionEstimate::new(self.params.bounds.clamp(point), method)
    }
}
