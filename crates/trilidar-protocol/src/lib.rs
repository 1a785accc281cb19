//! # Trilidar Protocol
//!
//! 激光三角测距扫描仪的串口线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（哨兵值、帧分隔符）
//! - `command`: 入站控制字节
//! - `sample`: 单列距离采样编码
//! - `packing`: 两列 → 3 字节打包
//! - `decoder`: 接收端流解码
//!
//! ## 线格式
//!
//! ```text
//! [fine_even(低4位) | fine_odd(高4位)] [high_even] [high_odd]   × (width / 2)
//! [0xFF] [0xFF] [0xFF]                                          帧分隔符
//! ```
//!
//! 每列编码值为 `coarse * 16 + fine`，`coarse == 254` 保留为“未检测到”。
//! 协议没有应答、流控或校验，分隔符是唯一的结构。

pub mod command;
pub mod constants;
pub mod decoder;
pub mod packing;
pub mod sample;

// 重新导出常用类型
pub use command::ControlCommand;
pub use constants::*;
pub use decoder::{DecodedProfile, StreamDecoder};
pub use packing::{FineNibbles, PackedPair, WireColumn};
pub use sample::EncodedSample;

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid unit length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Column count must be even, got {columns}")]
    OddColumnCount { columns: usize },

    #[error("Profile exceeded {limit} columns without a frame delimiter")]
    ProfileOverflow { limit: usize },
}
