//! 单列距离采样编码
//!
//! 编码值 = `coarse * 16 + fine`：
//! - `coarse`：峰值行相对基线行的偏移，钳位到 `[0, 254]`
//! - `fine`：亚像素修正（有符号，可超出 4 位范围）
//!
//! fine 直接加到 `coarse * 16` 上而不做位掩码，因此较大的修正会借位/进位到相邻
//! coarse 单位上。打包时高位取 `value / 16`（向零截断），低 4 位取 `value & 0xF`。

use crate::constants::{FINE_MASK, FINE_SCALE, MAX_COARSE, SENTINEL_COARSE};

/// 单列编码值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedSample(i32);

impl EncodedSample {
    /// “未检测到”：coarse = 254，fine = 0
    pub const NO_DETECTION: Self = Self(SENTINEL_COARSE as i32 * FINE_SCALE);

    /// 由检测结果构造
    ///
    /// # 参数
    /// - `coarse_rows`: 峰值距离行 - 基线行（`peak_row - height / 2`）
    /// - `fine`: 亚像素修正（已按比例放大）
    ///
    /// coarse 超过 254 时钳位到 254，不区分与哨兵的冲突。
    pub fn from_detection(coarse_rows: i32, fine: i32) -> Self {
        let coarse = coarse_rows.clamp(0, MAX_COARSE);
        Self(coarse * FINE_SCALE + fine)
    }

    /// 直接由原始编码值构造（解码端使用）
    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// 原始编码值
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// 高位字节（`value / 16`，向零截断后取低 8 位）
    pub fn high_byte(self) -> u8 {
        (self.0 / FINE_SCALE) as u8
    }

    /// fine 半字节（`value & 0xF`）
    pub fn fine_nibble(self) -> u8 {
        (self.0 & FINE_MASK) as u8
    }

    /// 线上是否会被识别为“未检测到”
    pub fn reads_as_no_detection(self) -> bool {
        self.high_byte() == SENTINEL_COARSE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_detection_layout() {
        let s = EncodedSample::NO_DETECTION;
        assert_eq!(s.raw(), 4064);
        assert_eq!(s.high_byte(), 254);
        assert_eq!(s.fine_nibble(), 0);
        assert!(s.reads_as_no_detection());
    }

    #[test]
    fn test_from_detection_plain() {
        let s = EncodedSample::from_detection(4, 0);
        assert_eq!(s.raw(), 64);
        assert_eq!(s.high_byte(), 4);
        assert_eq!(s.fine_nibble(), 0);
    }

    #[test]
    fn test_fine_borrows_into_coarse() {
        // 4 * 16 + 20 = 84 → 高位 5，低 4 位 4
        let s = EncodedSample::from_detection(4, 20);
        assert_eq!(s.high_byte(), 5);
        assert_eq!(s.fine_nibble(), 4);

        // 4 * 16 - 5 = 59 → 高位 3，低 4 位 11
        let s = EncodedSample::from_detection(4, -5);
        assert_eq!(s.high_byte(), 3);
        assert_eq!(s.fine_nibble(), 11);
    }

    #[test]
    fn test_coarse_clamped() {
        assert_eq!(EncodedSample::from_detection(600, 0).high_byte(), 254);
        assert_eq!(EncodedSample::from_detection(255, 0).high_byte(), 254);
        assert_eq!(EncodedSample::from_detection(-3, 0).raw(), 0);
    }

    #[test]
    fn test_clamped_detection_collides_with_sentinel() {
        // 真实检测被钳位到 254 后与哨兵在线上不可区分（协议固有歧义）
        let detected = EncodedSample::from_detection(300, 0);
        assert_eq!(detected, EncodedSample::NO_DETECTION);
        assert!(detected.reads_as_no_detection());
    }
}
