//! 定位算法模块
//!
//! 该模块提供室内房间级定位的纯计算部分：
//! - RSSI 转距离模型
//! - 扫描窗口聚合（中位数去噪）
//! - 多种定位算法（三边定位、加权质心、混合定位）
//! - 房间区域划分

pub mod aggregator;
pub mod beacon;
pub mod location_algorithms;
pub mod payload;
pub mod results;
pub mod rssi_model;
pub mod zone;

pub use aggregator::*;
pub use beacon::*;
pub use location_algorithms::*;
pub use payload::*;
pub use results::*;
pub use rssi_model::*;
pub use zone::*;
