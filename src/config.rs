//! 定位系统配置
//!
//! JSON 文件，所有字段均有默认值，默认值对应 8 x 8 单位、四个房间、三个信标的布局

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::algorithms::{
    AggregationParams, Anchor, AnchorSet, EstimatorParams, PathLossModel, PositionEstimator,
    Region, ScanAggregator, ZoneMap,
};
use crate::error::ConfigError;

/// 扫描窗口设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 每个周期的扫描时长（毫秒）
    pub window_ms: u64,
    /// 广播名称过滤正则
    pub name_pattern: String,
    /// 样本通道容量
    pub channel_capacity: usize,
}

impl ScanConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn name_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.name_pattern)?)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            window_ms: 3000,
            name_pattern: "^DHT20_".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// 系统配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    /// 信标表（标识 -> 坐标）
    pub anchors: Vec<Anchor>,
    /// 区域表，按顺序匹配
    pub regions: Vec<Region>,
    /// 不在任何区域内时的标签
    pub outside_label: String,
    pub calibration: PathLossModel,
    pub aggregation: AggregationParams,
    pub estimator: EstimatorParams,
    pub scan: ScanConfig,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        PositioningConfig {
            anchors: vec![
                Anchor::new("DHT20_1", 0.0, 7.0),
                Anchor::new("DHT20_2", 8.0, 7.0),
                Anchor::new("DHT20_3", 8.0, 0.0),
            ],
            regions: vec![
                Region::new("Room 1", 0.0, 4.0, 0.0, 4.0),
                Region::new("Room 2", 4.0, 8.0, 0.0, 4.0),
                Region::new("Room 3", 4.0, 8.0, 4.0, 8.0),
                Region::new("Room 4", 0.0, 4.0, 4.0, 8.0),
            ],
            outside_label: "Outside".to_string(),
            calibration: PathLossModel::default(),
            aggregation: AggregationParams::default(),
            estimator: EstimatorParams::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl PositioningConfig {
    /// 从 JSON 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: PositioningConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 校验所有配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.anchor_set()?;
        self.zone_map()?;
        self.validate_params()
    }

    /// 校验信标表与区域表以外的参数
    pub fn validate_params(&self) -> Result<(), ConfigError> {
        self.calibration.validate()?;
        self.estimator.validate()?;

        if self.aggregation.max_distance.is_nan() {
            return Err(ConfigError::InvalidParameter {
                name: "aggregation.max_distance",
                value: self.aggregation.max_distance,
            });
        }
        if self.scan.window_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "scan.window_ms",
                value: 0.0,
            });
        }
        if self.scan.channel_capacity == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "scan.channel_capacity",
                value: 0.0,
            });
        }
        self.scan.name_regex()?;
        Ok(())
    }

    pub fn anchor_set(&self) -> Result<AnchorSet, ConfigError> {
        AnchorSet::new(self.anchors.clone())
    }

    pub fn zone_map(&self) -> Result<ZoneMap, ConfigError> {
        ZoneMap::new(self.regions.clone(), self.outside_label.clone())
    }

    pub fn aggregator(&self) -> ScanAggregator {
        ScanAggregator::new(self.calibration.clone(), self.aggregation.clone())
    }

    pub fn estimator(&self) -> PositionEstimator {
        PositionEstimator::new(self.estimator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PositioningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan.window(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PositioningConfig::from_json_str(
            r#"{ "calibration": { "path_loss_exponent": 2.2 }, "scan": { "window_ms": 1500 } }"#,
        )
        .unwrap();
        assert_eq!(config.calibration.path_loss_exponent, 2.2);
        assert_eq!(config.calibration.reference_rssi, -50.0);
        assert_eq!(config.scan.window_ms, 1500);
        assert_eq!(config.anchors.len(), 3);
        assert_eq!(config.estimator.near_field_threshold, 2.0);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PositioningConfig::default();
        let text = config.to_json_pretty().unwrap();
        assert_eq!(PositioningConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_empty_regions_rejected() {
        let err = PositioningConfig::from_json_str(r#"{ "regions": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoRegions));
    }

    #[test]
    fn test_bad_name_pattern_rejected() {
        let err = PositioningConfig::from_json_str(r#"{ "scan": { "name_pattern": "(" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NamePattern(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = PositioningConfig::from_json_str(r#"{ "scan": { "window_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "scan.window_ms", .. }));
    }
}
