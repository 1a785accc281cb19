//! 两列 → 3 字节打包
//!
//! 相邻两列（偶数列在前）打包为一个单元：
//!
//! | Byte | 内容 |
//! |------|------|
//! | 0    | Bit 0-3: 偶数列 fine，Bit 4-7: 奇数列 fine |
//! | 1    | 偶数列高位（`value / 16`） |
//! | 2    | 奇数列高位（`value / 16`） |

use crate::constants::{FINE_SCALE, FRAME_DELIMITER, SENTINEL_COARSE, UNIT_LEN};
use crate::{EncodedSample, ProtocolError};
use bilge::prelude::*;

/// Byte 0 位域
///
/// bilge 默认 LSB first：第一个字段占 Bit 0-3。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct FineNibbles {
    pub even: u4, // Bit 0-3: 偶数列 fine
    pub odd: u4,  // Bit 4-7: 奇数列 fine
}

/// 一个 3 字节输出单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedPair {
    pub bytes: [u8; UNIT_LEN],
}

impl PackedPair {
    /// 帧分隔单元
    pub const DELIMITER: Self = Self {
        bytes: FRAME_DELIMITER,
    };

    /// 打包一对列
    pub fn pack(even: EncodedSample, odd: EncodedSample) -> Self {
        let nibbles = FineNibbles::new(u4::new(even.fine_nibble()), u4::new(odd.fine_nibble()));
        Self {
            bytes: [u8::from(nibbles).value(), even.high_byte(), odd.high_byte()],
        }
    }

    /// 从字节切片构造
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; UNIT_LEN] =
            bytes.try_into().map_err(|_| ProtocolError::InvalidLength {
                expected: UNIT_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    /// 是否为帧分隔单元
    pub fn is_delimiter(&self) -> bool {
        self.bytes == FRAME_DELIMITER
    }

    /// 解包为（偶数列，奇数列）
    pub fn unpack(&self) -> (WireColumn, WireColumn) {
        let nibbles = FineNibbles::from(u8::new(self.bytes[0]));
        (
            WireColumn {
                coarse: self.bytes[1],
                fine: nibbles.even().value(),
            },
            WireColumn {
                coarse: self.bytes[2],
                fine: nibbles.odd().value(),
            },
        )
    }
}

/// 接收端看到的单列数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireColumn {
    /// 高位字节
    pub coarse: u8,
    /// 低 4 位
    pub fine: u8,
}

impl WireColumn {
    /// 是否为“未检测到”（coarse == 254）
    pub fn is_no_detection(&self) -> bool {
        self.coarse == SENTINEL_COARSE
    }

    /// 重建编码值 `coarse * 16 + fine`
    pub fn value(&self) -> i32 {
        self.coarse as i32 * FINE_SCALE + self.fine as i32
    }

    /// 检测到时返回编码值，否则 `None`
    pub fn detection(&self) -> Option<i32> {
        (!self.is_no_detection()).then(|| self.value())
    }
}
