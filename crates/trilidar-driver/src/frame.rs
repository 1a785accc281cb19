//! 单通道强度帧
//!
//! 分辨率在启动时确定，缓冲区只分配一次，之后每帧原地覆盖。

use crate::error::DriverError;
use trilidar_hal::CHANNELS_PER_PIXEL;

/// `width × height` 强度图，行优先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl IntensityFrame {
    /// 分配全零帧
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// 由现成的强度数据构造
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Result<Self, DriverError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(DriverError::InvalidFrame(format!(
                "expected {} samples for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 第 `row` 行的全部样本
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.width;
        &self.data[start..start + self.width]
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.width + col] = value;
    }

    /// 从 `W×H×4` 原始缓冲中抽取一个通道覆盖本帧
    pub fn load_channel(&mut self, raw: &[u8], channel: usize) -> Result<(), DriverError> {
        let expected = self.data.len() * CHANNELS_PER_PIXEL;
        if raw.len() != expected {
            return Err(DriverError::InvalidFrame(format!(
                "raw buffer is {} bytes, expected {} for {}x{}x{}",
                raw.len(),
                expected,
                self.width,
                self.height,
                CHANNELS_PER_PIXEL
            )));
        }
        if channel >= CHANNELS_PER_PIXEL {
            return Err(DriverError::InvalidFrame(format!(
                "channel {} out of range",
                channel
            )));
        }

        for (dst, px) in self.data.iter_mut().zip(raw.chunks_exact(CHANNELS_PER_PIXEL)) {
            *dst = px[channel];
        }
        Ok(())
    }
}
