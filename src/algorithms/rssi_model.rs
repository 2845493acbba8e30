//! RSSI 到距离转换模型
//!
//! 对数距离路径损耗模型，距离以"地图单位"输出（每单位对应 `unit_scale_m` 米）

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// 对数距离路径损耗模型
///
/// 公式: d(m) = 10^((A - RSSI) / (10 * n))，再除以单位比例得到地图单位
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossModel {
    /// 参考功率 A (dBm) - 参考距离处测得的 RSSI
    pub reference_rssi: f64,
    /// 路径损耗指数 n（> 0，室内狭小空间通常 1.6 ~ 3.0）
    pub path_loss_exponent: f64,
    /// 每个地图单位对应的实际米数
    pub unit_scale_m: f64,
    /// 低于该值的信号视为极弱，不再外推模型
    pub very_weak_rssi: f64,
    /// 极弱信号返回的固定"远距离"哨兵值（地图单位）
    pub far_distance: f64,
}

impl PathLossModel {
    /// 创建模型，极弱阈值与哨兵值使用默认值
    pub fn new(reference_rssi: f64, path_loss_exponent: f64, unit_scale_m: f64) -> Self {
        PathLossModel {
            reference_rssi,
            path_loss_exponent,
            unit_scale_m,
            ..Self::default()
        }
    }

    /// 根据 RSSI 计算距离（地图单位）
    ///
    /// 全函数：极弱信号返回 `far_distance`，不会出错。
    /// 模型结果不超过 `far_distance`，保证信号越弱距离不会变近
    pub fn distance_from_signal(&self, rssi: f64) -> f64 {
        if rssi.is_nan() || rssi < self.very_weak_rssi {
            return self.far_distance;
        }

        let exponent = (self.reference_rssi - rssi) / (10.0 * self.path_loss_exponent);
        let meters = 10_f64.powf(exponent);
        (meters / self.unit_scale_m).min(self.far_distance)
    }

    /// 整数 RSSI 的便捷版本
    pub fn distance_from_rssi(&self, rssi: i16) -> f64 {
        self.distance_from_signal(rssi as f64)
    }

    /// 反解：距离（地图单位）对应的 RSSI
    pub fn distance_to_signal(&self, distance: f64) -> f64 {
        let meters = self.units_to_meters(distance);
        if meters <= 0.0 {
            return f64::INFINITY;
        }
        self.reference_rssi - 10.0 * self.path_loss_exponent * meters.log10()
    }

    /// 地图单位 -> 米
    pub fn units_to_meters(&self, distance: f64) -> f64 {
        distance * self.unit_scale_m
    }

    /// 生成 RSSI -> 距离对照表，用于现场校准检查
    ///
    /// 从 `from` 开始以 `step` 递减到 `to`（包含）
    pub fn lookup_table(&self, from: i16, to: i16, step: i16) -> Vec<(i16, f64)> {
        let step = step.max(1);
        let mut table = Vec::new();
        let mut rssi = from;
        while rssi >= to {
            table.push((rssi, self.distance_from_rssi(rssi)));
            rssi = match rssi.checked_sub(step) {
                Some(next) => next,
                None => break,
            };
        }
        table
    }

    /// 验证模型参数的合理性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.path_loss_exponent > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "calibration.path_loss_exponent",
                value: self.path_loss_exponent,
            });
        }
        if !(self.unit_scale_m > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "calibration.unit_scale_m",
                value: self.unit_scale_m,
            });
        }
        if !(self.far_distance > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "calibration.far_distance",
                value: self.far_distance,
            });
        }
        Ok(())
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        // 0.5 m 处实测约 -50 dBm，狭小室内环境
        PathLossModel {
            reference_rssi: -50.0,
            path_loss_exponent: 1.8,
            unit_scale_m: 0.2,
            very_weak_rssi: -95.0,
            far_distance: 20.0,
        }
    }
}

impl fmt::Display for PathLossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "路径损耗模型 - A={:.1} dBm, n={:.2}, 比例: {} m/单位",
            self.reference_rssi, self.path_loss_exponent, self.unit_scale_m
        )
    }
}
