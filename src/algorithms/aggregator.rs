//! 扫描窗口聚合
//!
//! 一个扫描窗口内的原始广播样本 -> 每个信标一条 [`Reading`]，按距离升序

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::algorithms::{AnchorKey, AnchorSet, PathLossModel, SensorPayload};

/// 扫描协作者提供的单个原始样本
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// 发射端标识（广播名称）
    pub id: String,
    /// RSSI (dBm)
    pub rssi: i16,
    /// 原始厂商数据（可选）
    #[serde(default)]
    pub payload: Option<Vec<u8>>,
    /// 窗口内的到达序号
    #[serde(default)]
    pub arrival: u64,
}

impl RawSample {
    pub fn new(id: impl Into<String>, rssi: i16, arrival: u64) -> Self {
        RawSample {
            id: id.into(),
            rssi,
            payload: None,
            arrival,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// 单个信标在一个周期内的聚合结果
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    #[serde(skip)]
    pub anchor: AnchorKey,
    /// 信标标识
    pub id: String,
    /// 中位数 RSSI
    pub rssi: f64,
    /// 推算距离（地图单位）
    pub distance: f64,
    /// 参与聚合的样本数
    pub sample_count: usize,
    /// 最近一次成功解码的温湿度
    pub payload: Option<SensorPayload>,
}

/// 聚合阈值
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// 低于该 RSSI 的样本视为未收到
    pub min_rssi: i16,
    /// 超过该距离的结果视为不可靠（地图单位）
    pub max_distance: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        AggregationParams {
            min_rssi: -80,
            // 15 单位 = 3 m
            max_distance: 15.0,
        }
    }
}

#[derive(Default)]
struct Group {
    rssi: Vec<i16>,
    payload: Option<(u64, SensorPayload)>,
}

/// 扫描聚合器
#[derive(Clone, Debug)]
pub struct ScanAggregator {
    model: PathLossModel,
    params: AggregationParams,
}

impl ScanAggregator {
    pub fn new(model: PathLossModel, params: AggregationParams) -> Self {
        ScanAggregator { model, params }
    }

    /// 聚合一个窗口的样本
    ///
    /// 样本顺序任意；返回值按距离升序，每个信标至多一条
    pub fn aggregate<I>(&self, samples: I, anchors: &AnchorSet, window: Duration) -> Vec<Reading>
    where
        I: IntoIterator<Item = RawSample>,
    {
        let mut groups: Vec<Group> = (0..anchors.len()).map(|_| Group::default()).collect();
        let mut accepted = 0usize;
        let mut ignored = 0usize;

        for sample in samples {
            let Some(key) = anchors.resolve(&sample.id) else {
                ignored += 1;
                continue;
            };
            if sample.rssi < self.params.min_rssi {
                ignored += 1;
                continue;
            }

            let group = &mut groups[key.index()];
            group.rssi.push(sample.rssi);
            accepted += 1;

            if let Some(payload) = sample.payload.as_deref().and_then(SensorPayload::decode) {
                let newer = group
                    .payload
                    .is_none_or(|(arrival, _)| sample.arrival >= arrival);
                if newer {
                    group.payload = Some((sample.arrival, payload));
                }
            }
        }

        let seconds = window.as_secs_f64();
        if seconds > 0.0 {
            debug!(
                "窗口 {:.1}s: 接受 {} 个样本 ({:.1}/s)，忽略 {} 个",
                seconds,
                accepted,
                accepted as f64 / seconds,
                ignored
            );
        }

        let mut readings: Vec<Reading> = anchors
            .iter()
            .zip(groups)
            .filter_map(|((key, anchor), mut group)| {
                let rssi = median(&mut group.rssi)?;
                let distance = self.model.distance_from_signal(rssi);
                if distance > self.params.max_distance {
                    debug!("{}: 距离 {:.2} 超过上限，丢弃", anchor.id, distance);
                    return None;
                }
                Some(Reading {
                    anchor: key,
                    id: anchor.id.clone(),
                    rssi,
                    distance,
                    sample_count: group.rssi.len(),
                    payload: group.payload.map(|(_, payload)| payload),
                })
            })
            .collect();

        sort_by_distance(&mut readings);
        readings
    }
}

/// 按距离升序排序，距离相同按信标配置顺序
pub fn sort_by_distance(readings: &mut [Reading]) {
    readings.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.anchor.cmp(&b.anchor))
    });
}

/// 中位数；偶数个取中间两个的平均值
fn median(values: &mut [i16]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] as f64 + values[mid] as f64) / 2.0)
    }
}
