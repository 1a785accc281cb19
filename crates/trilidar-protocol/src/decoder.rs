//! 接收端流解码
//!
//! 串口是纯字节流，没有长度字段。解码器按 3 字节切分单元，
//! 遇到 `{0xFF, 0xFF, 0xFF}` 时输出一帧。
//!
//! 分隔符丢失会导致后续帧错位，这是协议固有的脆弱性；
//! 超过 `max_columns` 仍未见到分隔符时报告溢出，并丢弃该帧直到下一个分隔符
//! （分隔符本身也不产生输出）。

use crate::constants::UNIT_LEN;
use crate::packing::{PackedPair, WireColumn};
use crate::ProtocolError;

/// 一帧解码结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedProfile {
    /// 每列的线上数据（从左到右）
    pub columns: Vec<WireColumn>,
}

impl DecodedProfile {
    /// 列数
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 是否为空帧
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 每列检测值（`None` 表示 coarse == 254）
    pub fn detections(&self) -> impl Iterator<Item = Option<i32>> + '_ {
        self.columns.iter().map(WireColumn::detection)
    }

    /// 检测到的列数
    pub fn detected_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_no_detection()).count()
    }
}

/// 流式解码器
#[derive(Debug)]
pub struct StreamDecoder {
    partial: [u8; UNIT_LEN],
    partial_len: usize,
    current: Vec<WireColumn>,
    max_columns: usize,
    discarding: bool,
}

impl StreamDecoder {
    /// 默认列数上限（远大于常见相机宽度）
    pub const DEFAULT_MAX_COLUMNS: usize = 8192;

    pub fn new() -> Self {
        Self::with_max_columns(Self::DEFAULT_MAX_COLUMNS)
    }

    pub fn with_max_columns(max_columns: usize) -> Self {
        Self {
            partial: [0; UNIT_LEN],
            partial_len: 0,
            current: Vec::new(),
            max_columns,
            discarding: false,
        }
    }

    /// 输入任意长度的字节块
    ///
    /// 对每个完整帧调用 `on_profile`。溢出时返回错误，但已输入的剩余字节仍会继续处理，
    /// 解码器在下一个分隔符处自动重新同步。
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_profile: F) -> Result<(), ProtocolError>
    where
        F: FnMut(DecodedProfile),
    {
        let mut overflow = None;

        for &byte in bytes {
            self.partial[self.partial_len] = byte;
            self.partial_len += 1;
            if self.partial_len < UNIT_LEN {
                continue;
            }
            self.partial_len = 0;

            let unit = PackedPair {
                bytes: self.partial,
            };
            if unit.is_delimiter() {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                on_profile(DecodedProfile {
                    columns: std::mem::take(&mut self.current),
                });
                continue;
            }

            if self.discarding {
                continue;
            }

            let (even, odd) = unit.unpack();
            self.current.push(even);
            self.current.push(odd);

            if self.current.len() > self.max_columns {
                self.current.clear();
                self.discarding = true;
                overflow = Some(ProtocolError::ProfileOverflow {
                    limit: self.max_columns,
                });
            }
        }

        match overflow {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 便捷接口：收集本次输入产生的所有帧
    ///
    /// 溢出时只返回错误，同一输入块中的完整帧也一并丢弃；需要保留时使用 [`feed`](Self::feed)。
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<DecodedProfile>, ProtocolError> {
        let mut out = Vec::new();
        self.feed(bytes, |p| out.push(p))?;
        Ok(out)
    }

    /// 当前未完成帧中已累积的列数
    pub fn pending_columns(&self) -> usize {
        self.current.len()
    }

    /// 丢弃所有缓冲
    pub fn reset(&mut self) {
        self.partial_len = 0;
        self.current.clear();
        self.discarding = false;
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
