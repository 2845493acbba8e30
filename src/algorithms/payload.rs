//! 信标厂商数据解码
//!
//! 节点固件在 Manufacturer Specific Data 中携带 8 字节小端数据:
//! `u32` 标签 + `i16` 温度 ×100 + `i16` 湿度 ×100

use serde::Serialize;
use std::fmt;

/// 厂商数据固定长度
pub const SENSOR_PAYLOAD_LEN: usize = 8;

/// 解码后的温湿度数据
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SensorPayload {
    /// 节点标签（定位逻辑不使用）
    pub tag: u32,
    /// 温度 (°C)
    pub temperature_c: f64,
    /// 相对湿度 (%)
    pub humidity_pct: f64,
}

impl SensorPayload {
    /// 尽力解码：长度不符返回 `None`，不报错
    pub fn decode(data: &[u8]) -> Option<Self> {
        let bytes: &[u8; SENSOR_PAYLOAD_LEN] = data.try_into().ok()?;

        let tag = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let raw_temp = i16::from_le_bytes([bytes[4], bytes[5]]);
        let raw_hum = i16::from_le_bytes([bytes[6], bytes[7]]);

        Some(SensorPayload {
            tag,
            temperature_c: raw_temp as f64 / 100.0,
            humidity_pct: raw_hum as f64 / 100.0,
        })
    }
}

impl fmt::Display for SensorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C | {:.1}%", self.temperature_c, self.humidity_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian_fields() {
        let mut data = Vec::new();
        data.extend_from_slice(&22_446_001u32.to_le_bytes());
        data.extend_from_slice(&2550i16.to_le_bytes());
        data.extend_from_slice(&(-130i16).to_le_bytes());

        let payload = SensorPayload::decode(&data).unwrap();
        assert_eq!(payload.tag, 22_446_001);
        assert!((payload.temperature_c - 25.5).abs() < 1e-9);
        assert!((payload.humidity_pct - (-1.3)).abs() < 1e-9);
        assert_eq!(payload.to_string(), "25.5°C | -1.3%");
    }

    #[test]
    fn test_wrong_length_is_ignored() {
        assert!(SensorPayload::decode(&[]).is_none());
        assert!(SensorPayload::decode(&[0u8; 7]).is_none());
        assert!(SensorPayload::decode(&[0u8; 9]).is_none());
    }
}
