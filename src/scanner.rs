//! 扫描协作者
//!
//! [`SampleSource`] 在扫描窗口内把原始样本写入通道；
//! [`BleScanner`] 基于 btleplug，[`ReplaySource`] 回放录制的样本

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::algorithms::{RawSample, SENSOR_PAYLOAD_LEN};
use crate::error::ScanError;

/// 样本来源
///
/// `start` 打开扫描并开始投递样本，`stop` 释放扫描资源。
/// 窗口失败或取消后也会调用 `stop`，实现需保证可重复调用。
#[async_trait]
pub trait SampleSource: Send {
    async fn start(&mut self, tx: mpsc::Sender<RawSample>) -> Result<(), ScanError>;

    async fn stop(&mut self) -> Result<(), ScanError>;

    /// 同步释放，用于窗口 future 在 `stop` 之前被丢弃的情况。
    /// 不能等待时尽力而为，下一次 `start` 仍需能够成功。
    fn release(&mut self);
}

/// 蓝牙广播扫描器
pub struct BleScanner {
    /// 适配器由管理器创建时持有管理器，保证其存活期不短于适配器
    #[allow(dead_code)]
    manager: Option<Manager>,
    adapter: Adapter,
    name_filter: Regex,
    listener: Option<JoinHandle<()>>,
}

impl BleScanner {
    pub fn new(adapter: Adapter, name_filter: Regex) -> Self {
        BleScanner {
            manager: None,
            adapter,
            name_filter,
            listener: None,
        }
    }

    /// 使用系统第一个蓝牙适配器
    pub async fn first_adapter(name_filter: Regex) -> Result<Self, ScanError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(ScanError::NoAdapter)?;

        if let Ok(info) = adapter.adapter_info().await {
            info!("使用蓝牙适配器: {}", info);
        }

        let mut scanner = Self::new(adapter, name_filter);
        scanner.manager = Some(manager);
        Ok(scanner)
    }

    fn abort_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[async_trait]
impl SampleSource for BleScanner {
    async fn start(&mut self, tx: mpsc::Sender<RawSample>) -> Result<(), ScanError> {
        self.abort_listener();
        // 上一个窗口可能未正常关闭
        if let Err(err) = self.adapter.stop_scan().await {
            debug!("启动前关闭扫描: {}", err);
        }

        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let name_filter = self.name_filter.clone();
        self.listener = Some(tokio::spawn(async move {
            let mut arrival = 0u64;
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Some(sample) = read_sample(&adapter, &id, &name_filter, arrival).await else {
                    continue;
                };
                arrival += 1;
                if tx.send(sample).await.is_err() {
                    break;
                }
            }
            debug!("广播监听结束，共 {} 个样本", arrival);
        }));

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanError> {
        self.abort_listener();
        self.adapter.stop_scan().await?;
        Ok(())
    }

    fn release(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        listener.abort();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let adapter = self.adapter.clone();
                handle.spawn(async move {
                    if let Err(err) = adapter.stop_scan().await {
                        warn!("释放扫描失败: {}", err);
                    }
                });
            }
            Err(_) => warn!("运行时不可用，扫描未关闭"),
        }
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        self.release();
    }
}

async fn read_sample(
    adapter: &Adapter,
    id: &PeripheralId,
    name_filter: &Regex,
    arrival: u64,
) -> Option<RawSample> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;

    let name = properties.local_name?;
    if !name_filter.is_match(&name) {
        return None;
    }
    let rssi = properties.rssi?;

    Some(RawSample {
        id: name,
        rssi,
        payload: pick_payload(properties.manufacturer_data.values()),
        arrival,
    })
}

/// 选取厂商数据：优先固定长度的传感器数据，否则取第一条
pub fn pick_payload<'a, I>(values: I) -> Option<Vec<u8>>
where
    I: IntoIterator<Item = &'a Vec<u8>>,
{
    let mut first = None;
    for value in values {
        if value.len() == SENSOR_PAYLOAD_LEN {
            return Some(value.clone());
        }
        first.get_or_insert(value);
    }
    first.cloned()
}

/// 回放录制的样本
///
/// 每个窗口依次投递一组样本，用完后从头循环
pub struct ReplaySource {
    windows: Vec<Vec<RawSample>>,
    next: usize,
    starts: usize,
    stops: usize,
    sender: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// 每个窗口都投递同一组样本
    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        Self::from_windows(vec![samples])
    }

    pub fn from_windows(windows: Vec<Vec<RawSample>>) -> Self {
        ReplaySource {
            windows,
            next: 0,
            starts: 0,
            stops: 0,
            sender: None,
        }
    }

    /// 从 JSON 文件加载：样本数组的数组，每个内层数组为一个窗口
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ScanError::ReplayIo {
            path: path.to_path_buf(),
            source,
        })?;
        let windows: Vec<Vec<RawSample>> = serde_json::from_str(&text)?;
        Ok(Self::from_windows(windows))
    }

    /// 扫描是否处于打开状态
    pub fn is_scanning(&self) -> bool {
        self.starts > self.stops
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn start(&mut self, tx: mpsc::Sender<RawSample>) -> Result<(), ScanError> {
        self.starts += 1;
        if self.windows.is_empty() {
            return Ok(());
        }

        let samples = self.windows[self.next].clone();
        self.next = (self.next + 1) % self.windows.len();
        self.sender = Some(tokio::spawn(async move {
            for sample in samples {
                if tx.send(sample).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanError> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(sender) = self.sender.take() {
            sender.abort();
        }
        self.stops = self.starts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_payload_prefers_sensor_length() {
        let short = vec![1u8, 2, 3];
        let sensor = vec![0u8; SENSOR_PAYLOAD_LEN];
        assert_eq!(pick_payload([&short, &sensor]), Some(sensor.clone()));
        assert_eq!(pick_payload([&short]), Some(short.clone()));
        assert_eq!(pick_payload(std::iter::empty()), None);
    }

    #[tokio::test]
    async fn test_replay_source_cycles_windows() {
        let mut source = ReplaySource::from_windows(vec![
            vec![RawSample::new("DHT20_1", -50, 0)],
            vec![RawSample::new("DHT20_2", -60, 0), RawSample::new("DHT20_3", -61, 1)],
        ]);

        for expected in [1usize, 2, 1] {
            let (tx, mut rx) = mpsc::channel(8);
            source.start(tx).await.unwrap();
            assert!(source.is_scanning());

            let mut received = Vec::new();
            while let Some(sample) = rx.recv().await {
                received.push(sample);
            }
            source.stop().await.unwrap();
            assert!(!source.is_scanning());
            assert_eq!(received.len(), expected);
        }
    }

    #[tokio::test]
    async fn test_replay_source_release_without_stop() {
        let mut source = ReplaySource::from_samples(vec![RawSample::new("DHT20_1", -50, 0)]);
        let (tx, _rx) = mpsc::channel(1);
        source.start(tx).await.unwrap();
        assert!(source.is_scanning());

        source.release();
        assert!(!source.is_scanning());
        assert!(source.sender.is_none());

        let (tx, mut rx) = mpsc::channel(8);
        source.start(tx).await.unwrap();
        assert_eq!(rx.recv().await.map(|s| s.rssi), Some(-50));
        source.stop().await.unwrap();
        assert_eq!(source.starts(), 2);
        assert_eq!(source.stops(), 2);
    }

    #[test]
    fn test_replay_source_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");
        fs::write(
            &path,
            r#"[[{ "id": "DHT20_1", "rssi": -52 }, { "id": "DHT20_2", "rssi": -64, "arrival": 1 }]]"#,
        )
        .unwrap();

        let source = ReplaySource::load(&path).unwrap();
        assert_eq!(source.windows.len(), 1);
        assert_eq!(source.windows[0][1].rssi, -64);
        assert!(source.windows[0][0].payload.is_none());
    }
}
