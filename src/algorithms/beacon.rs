//! 锚点信标定义和信标表

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::algorithms::Point;
use crate::error::ConfigError;

/// 单个锚点信标（坐标固定，单位为地图单位）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// 信标广播名称，如 "DHT20_1"
    pub id: String,
    /// X 坐标
    pub x: f64,
    /// Y 坐标
    pub y: f64,
}

impl Anchor {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Anchor { id: id.into(), x, y }
    }

    /// 获取信标的 2D 坐标
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// 信标表中的稠密索引，只能由 [`AnchorSet::resolve`] 产生
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AnchorKey(usize);

impl AnchorKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 固定信标表
///
/// 启动时从配置构建并校验，之后只读。未知标识解析为 `None`。
#[derive(Clone, Debug)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
    by_id: HashMap<String, AnchorKey>,
}

impl AnchorSet {
    /// 三边定位需要的最少信标数
    pub const MIN_ANCHORS: usize = 3;

    /// 从信标向量创建并校验
    pub fn new(anchors: Vec<Anchor>) -> Result<Self, ConfigError> {
        if anchors.len() < Self::MIN_ANCHORS {
            return Err(ConfigError::TooFewAnchors {
                found: anchors.len(),
                required: Self::MIN_ANCHORS,
            });
        }

        let mut by_id = HashMap::with_capacity(anchors.len());
        for (index, anchor) in anchors.iter().enumerate() {
            if !anchor.x.is_finite() || !anchor.y.is_finite() {
                return Err(ConfigError::InvalidAnchorPosition(anchor.id.clone()));
            }
            if by_id.insert(anchor.id.clone(), AnchorKey(index)).is_some() {
                return Err(ConfigError::DuplicateAnchor(anchor.id.clone()));
            }
        }

        Ok(AnchorSet { anchors, by_id })
    }

    /// 标识 -> 索引
    pub fn resolve(&self, id: &str) -> Option<AnchorKey> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, key: AnchorKey) -> &Anchor {
        &self.anchors[key.0]
    }

    /// 按标识查找信标
    pub fn find(&self, id: &str) -> Option<&Anchor> {
        self.resolve(id).map(|key| self.get(key))
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// 按配置顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = (AnchorKey, &Anchor)> {
        self.anchors
            .iter()
            .enumerate()
            .map(|(index, anchor)| (AnchorKey(index), anchor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> Vec<Anchor> {
        vec![
            Anchor::new("DHT20_1", 0.0, 7.0),
            Anchor::new("DHT20_2", 8.0, 7.0),
            Anchor::new("DHT20_3", 8.0, 0.0),
        ]
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let set = AnchorSet::new(three()).unwrap();
        let key = set.resolve("DHT20_2").unwrap();
        assert_eq!(key.index(), 1);
        assert_eq!(set.get(key).position(), Point::new(8.0, 7.0));
        assert!(set.resolve("RFstar_C5D6").is_none());
    }

    #[test]
    fn test_rejects_duplicate_anchor() {
        let mut anchors = three();
        anchors.push(Anchor::new("DHT20_1", 4.0, 4.0));
        assert!(matches!(
            AnchorSet::new(anchors),
            Err(ConfigError::DuplicateAnchor(id)) if id == "DHT20_1"
        ));
    }

    #[test]
    fn test_rejects_too_few_anchors() {
        let mut anchors = three();
        anchors.pop();
        assert!(matches!(
            AnchorSet::new(anchors),
            Err(ConfigError::TooFewAnchors { found: 2, required: 3 })
        ));
    }

    #[test]
    fn test_iter_keeps_configuration_order() {
        let set = AnchorSet::new(three()).unwrap();
        let ids: Vec<_> = set.iter().map(|(_, a)| a.id.as_str()).collect();
        assert_eq!(ids, ["DHT20_1", "DHT20_2", "DHT20_3"]);
    }
}
