//! 房间区域划分

use serde::{Deserialize, Serialize};

use crate::algorithms::Point;
use crate::error::ConfigError;

/// 轴对齐矩形区域，四条边均包含在内
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Region {
    pub fn new(name: impl Into<String>, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Region {
            name: name.into(),
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.min_x <= point.x && point.x <= self.max_x && self.min_y <= point.y && point.y <= self.max_y
    }
}

/// 有序区域表，首个匹配的区域胜出
#[derive(Clone, Debug)]
pub struct ZoneMap {
    regions: Vec<Region>,
    outside_label: String,
}

impl ZoneMap {
    pub fn new(regions: Vec<Region>, outside_label: impl Into<String>) -> Result<Self, ConfigError> {
        if regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        for region in &regions {
            let finite = [region.min_x, region.max_x, region.min_y, region.max_y]
                .iter()
                .all(|v| v.is_finite());
            if !finite || region.min_x > region.max_x || region.min_y > region.max_y {
                return Err(ConfigError::InvalidRegion(region.name.clone()));
            }
        }

        Ok(ZoneMap {
            regions,
            outside_label: outside_label.into(),
        })
    }

    /// 点 -> 区域名称；不在任何区域内时返回区域外标签
    pub fn classify(&self, point: &Point) -> &str {
        self.regions
            .iter()
            .find(|region| region.contains(point))
            .map_or(self.outside_label.as_str(), |region| region.name.as_str())
    }

    pub fn outside_label(&self) -> &str {
        &self.outside_label
    }
}
