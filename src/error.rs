//! 错误类型
//!
//! 几何退化、数据不足等正常情况用 `Option` 表示，不属于错误

use std::path::PathBuf;
use thiserror::Error;

/// 配置错误，启动时校验，致命
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("信标数量不足: 需要至少 {required} 个，配置了 {found} 个")]
    TooFewAnchors { found: usize, required: usize },

    #[error("信标 {0} 重复配置")]
    DuplicateAnchor(String),

    #[error("信标 {0} 坐标无效")]
    InvalidAnchorPosition(String),

    #[error("区域表为空")]
    NoRegions,

    #[error("区域 {0} 边界无效")]
    InvalidRegion(String),

    #[error("定位范围无效")]
    InvalidBounds,

    #[error("参数 {name} 取值无效: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("设备名称正则无效: {0}")]
    NamePattern(#[from] regex::Error),
}

/// 扫描协作者错误
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("蓝牙错误: {0}")]
    Bluetooth(#[from] btleplug::Error),

    #[error("未找到蓝牙适配器")]
    NoAdapter,

    #[error("读取回放文件 {path} 失败: {source}")]
    ReplayIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("回放文件解析失败: {0}")]
    ReplayParse(#[from] serde_json::Error),
}
