//! 定位周期控制
//!
//! 每个周期：打开扫描窗口 -> 收集样本 -> 关闭窗口 -> 聚合 -> 定位 -> 区域判定 -> 输出。
//! 周期之间不保留任何样本，仅共享只读配置。

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::algorithms::{
    AnchorSet, PositionEstimate, PositionEstimator, RawSample, Reading, ScanAggregator, ZoneMap,
};
use crate::config::PositioningConfig;
use crate::error::{ConfigError, ScanError};
use crate::scanner::SampleSource;

/// 单个周期的输出，交给渲染/日志协作者
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    /// 周期序号，从 1 开始
    pub cycle: u64,
    pub timestamp: DateTime<Local>,
    /// 窗口内收到的原始样本数
    pub sample_count: usize,
    /// 按距离升序的读数
    pub readings: Vec<Reading>,
    /// 本周期无法定位时为 None
    pub estimate: Option<PositionEstimate>,
    pub zone: Option<String>,
}

impl CycleReport {
    /// 读数足够但所有定位策略都未给出结果
    pub fn estimate_failed(&self) -> bool {
        self.estimate.is_none() && self.readings.len() >= AnchorSet::MIN_ANCHORS
    }
}

/// 周期结果
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// 窗口等待期间被取消，本周期数据丢弃
    Cancelled,
}

/// 周期输出的接收方
pub trait CycleSink {
    fn emit(&mut self, report: &CycleReport) -> io::Result<()>;
}

/// 以日志形式输出，附带实际米数
pub struct LogSink {
    unit_scale_m: f64,
}

impl LogSink {
    pub fn new(unit_scale_m: f64) -> Self {
        LogSink { unit_scale_m }
    }
}

impl CycleSink for LogSink {
    fn emit(&mut self, report: &CycleReport) -> io::Result<()> {
        let time = report.timestamp.format("%H:%M:%S");

        for reading in &report.readings {
            let info = reading
                .payload
                .map(|payload| payload.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            debug!(
                "  {}: RSSI={:.0}dBm -> {:.2}u ({:.2}m) x{} [{}]",
                reading.id,
                reading.rssi,
                reading.distance,
                reading.distance * self.unit_scale_m,
                reading.sample_count,
                info
            );
        }

        match (&report.estimate, &report.zone) {
            (Some(estimate), Some(zone)) => {
                let point = estimate.point;
                info!(
                    "[{}] {:<10} ({:.2}, {:.2}) = [{:.2}m, {:.2}m] {}",
                    time,
                    zone,
                    point.x,
                    point.y,
                    point.x * self.unit_scale_m,
                    point.y * self.unit_scale_m,
                    estimate.method
                );
            }
            _ if report.estimate_failed() => {
                warn!("[{}] 定位计算失败 ({} 个节点)，本周期无定位结果", time, report.readings.len());
            }
            _ => {
                info!("[{}] 信号不足 ({} 个节点)，本周期无定位结果", time, report.readings.len());
            }
        }
        Ok(())
    }
}

/// 每个周期输出一行 JSON
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CycleSink for JsonLinesSink<W> {
    fn emit(&mut self, report: &CycleReport) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

/// 打开的扫描窗口
///
/// 正常路径通过 `close` 等待 `stop`；若持有它的 future 在关闭前被丢弃，
/// 在 `Drop` 中调用 `release`。
struct OpenScan<'a, S: SampleSource> {
    source: &'a mut S,
    open: bool,
}

impl<'a, S: SampleSource> OpenScan<'a, S> {
    fn new(source: &'a mut S) -> Self {
        OpenScan { source, open: true }
    }

    async fn close(&mut self) -> Result<(), ScanError> {
        let result = self.source.stop().await;
        self.open = false;
        result
    }
}

impl<S: SampleSource> Drop for OpenScan<'_, S> {
    fn drop(&mut self) {
        if self.open {
            debug!("扫描窗口未正常关闭，释放扫描");
            self.source.release();
        }
    }
}

/// 定位周期控制器
pub struct CycleController<S> {
    anchors: AnchorSet,
    zones: ZoneMap,
    aggregator: ScanAggregator,
    estimator: PositionEstimator,
    window: Duration,
    channel_capacity: usize,
    source: S,
    cycle: u64,
}

impl<S: SampleSource> CycleController<S> {
    pub fn new(config: &PositioningConfig, source: S) -> Result<Self, ConfigError> {
        let anchors = config.anchor_set()?;
        let zones = config.zone_map()?;
        config.validate_params()?;
        Ok(CycleController {
            anchors,
            zones,
            aggregator: config.aggregator(),
            estimator: config.estimator(),
            window: config.scan.window(),
            channel_capacity: config.scan.channel_capacity,
            source,
            cycle: 0,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 收集一个窗口的样本
    ///
    /// 无论窗口正常结束、被取消、出错还是 future 被丢弃，扫描都会被关闭。取消时返回 None。
    pub async fn collect_window(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<RawSample>>, ScanError> {
        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let mut buffer = Vec::new();
        let window = self.window;
        let mut scan = OpenScan::new(&mut self.source);

        if let Err(err) = scan.source.start(tx).await {
            if let Err(stop_err) = scan.close().await {
                debug!("启动失败后关闭扫描出错: {}", stop_err);
            }
            return Err(err);
        }

        let cancelled = {
            let deadline = sleep(window);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break false,
                    _ = cancel.cancelled() => break true,
                    Some(sample) = rx.recv() => buffer.push(sample),
                }
            }
        };

        scan.close().await?;
        drop(scan);
        while let Ok(sample) = rx.try_recv() {
            buffer.push(sample);
        }

        if cancelled {
            debug!("窗口被取消，丢弃 {} 个样本", buffer.len());
            return Ok(None);
        }
        Ok(Some(buffer))
    }

    /// 同步处理一个窗口的样本：聚合、定位、区域判定
    pub fn process(&mut self, samples: Vec<RawSample>) -> CycleReport {
        self.cycle += 1;
        let sample_count = samples.len();

        let readings = self.aggregator.aggregate(samples, &self.anchors, self.window);
        let estimate = self.estimator.estimate(&readings, &self.anchors);
        let zone = estimate.map(|estimate| self.zones.classify(&estimate.point).to_string());

        CycleReport {
            cycle: self.cycle,
            timestamp: Local::now(),
            sample_count,
            readings,
            estimate,
            zone,
        }
    }

    /// 执行一个完整周期
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome, ScanError> {
        match self.collect_window(cancel).await? {
            Some(samples) => Ok(CycleOutcome::Completed(self.process(samples))),
            None => Ok(CycleOutcome::Cancelled),
        }
    }

    /// 循环执行周期，直到取消或达到 `max_cycles`
    ///
    /// # 返回
    /// - 完成的周期数
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        sinks: &mut [Box<dyn CycleSink + Send>],
        max_cycles: Option<u64>,
    ) -> Result<u64, ScanError> {
        let mut completed = 0u64;

        while max_cycles.is_none_or(|max| completed < max) {
            if cancel.is_cancelled() {
                break;
            }

            let report = match self.run_cycle(cancel).await? {
                CycleOutcome::Completed(report) => report,
                CycleOutcome::Cancelled => break,
            };

            for sink in sinks.iter_mut() {
                if let Err(err) = sink.emit(&report) {
                    warn!("周期 {} 输出失败: {}", report.cycle, err);
                }
            }
            completed += 1;
        }

        info!("定位循环结束，共完成 {} 个周期", completed);
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{EstimateMethod, Point};

    fn report(ids: &[&str], estimate: Option<PositionEstimate>) -> CycleReport {
        let anchors = PositioningConfig::default().anchor_set().unwrap();
        let readings = ids
            .iter()
            .map(|id| Reading {
                anchor: anchors.resolve(id).unwrap(),
                id: id.to_string(),
                rssi: -60.0,
                distance: 5.0,
                sample_count: 1,
                payload: None,
            })
            .collect();
        CycleReport {
            cycle: 1,
            timestamp: Local::now(),
            sample_count: ids.len(),
            readings,
            estimate,
            zone: None,
        }
    }

    #[test]
    fn test_estimate_failed_needs_enough_readings() {
        assert!(report(&["DHT20_1", "DHT20_2", "DHT20_3"], None).estimate_failed());
        assert!(!report(&["DHT20_1", "DHT20_2"], None).estimate_failed());
        assert!(!report(&[], None).estimate_failed());

        let estimate = PositionEstimate::new(Point::new(1.0, 6.0), EstimateMethod::Hybrid);
        assert!(!report(&["DHT20_1", "DHT20_2", "DHT20_3"], Some(estimate)).estimate_failed());
    }

    #[test]
    fn test_log_sink_accepts_every_outcome() {
        let mut sink = LogSink::new(0.2);
        let estimate = PositionEstimate::new(Point::new(1.0, 6.0), EstimateMethod::NearField);
        let mut located = report(&["DHT20_1", "DHT20_2", "DHT20_3"], Some(estimate));
        located.zone = Some("Room 4".to_string());

        assert!(sink.emit(&located).is_ok());
        assert!(sink.emit(&report(&["DHT20_1", "DHT20_2", "DHT20_3"], None)).is_ok());
        assert!(sink.emit(&report(&["DHT20_1"], None)).is_ok());
    }
}
