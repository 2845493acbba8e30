//! 蓝牙信标室内房间定位
//!
//! - `algorithms`: RSSI 模型、窗口聚合、定位算法、区域划分
//! - `positioning`: 扫描周期控制与结果输出
//! - `scanner`: btleplug 扫描器与回放源
//! - `config`: JSON 配置

pub mod algorithms;
pub mod config;
pub mod error;
pub mod positioning;
pub mod scanner;

pub use config::PositioningConfig;
pub use error::{ConfigError, ScanError};
pub use positioning::{CycleController, CycleOutcome, CycleReport, CycleSink, JsonLinesSink, LogSink};
