//! 原始帧回放源
//!
//! 从文件读取连续的 `W×H×4` 原始帧并循环提供，用于在没有相机/GPU 管线时
//! 驱动扫描循环（台架调试、录制回放）。

use crate::{
    CHANNELS_PER_PIXEL, FramePacing, FrameSource, HalDeviceError, HalDeviceErrorKind, HalError,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// 原始帧回放源
#[derive(Debug)]
pub struct ReplayFrameSource {
    data: Vec<u8>,
    width: usize,
    height: usize,
    frame_len: usize,
    frame_count: usize,
    index: usize,
    pacing: FramePacing,
    last_release: Option<Instant>,
    downsample_level: u8,
}

impl ReplayFrameSource {
    /// 从文件加载
    pub fn from_file(
        path: impl AsRef<Path>,
        width: usize,
        height: usize,
        pacing: FramePacing,
    ) -> Result<Self, HalError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| HalDeviceError::from_io(format!("read {}", path.display()), &e))?;
        let source = Self::from_bytes(data, width, height, pacing)?;
        info!(
            "Replay source loaded: {} ({} frames of {}x{})",
            path.display(),
            source.frame_count,
            width,
            height
        );
        Ok(source)
    }

    /// 从内存缓冲构造，长度必须是整帧的倍数
    pub fn from_bytes(
        data: Vec<u8>,
        width: usize,
        height: usize,
        pacing: FramePacing,
    ) -> Result<Self, HalError> {
        let frame_len = width * height * CHANNELS_PER_PIXEL;
        if frame_len == 0 || data.is_empty() || data.len() % frame_len != 0 {
            return Err(HalError::Device(HalDeviceError::new(
                HalDeviceErrorKind::InvalidFrame,
                format!(
                    "replay buffer of {} bytes is not a whole number of {}x{}x{} frames",
                    data.len(),
                    width,
                    height,
                    CHANNELS_PER_PIXEL
                ),
            )));
        }

        Ok(Self {
            frame_count: data.len() / frame_len,
            data,
            width,
            height,
            frame_len,
            index: 0,
            pacing,
            last_release: None,
            downsample_level: 0,
        })
    }

    /// 帧数
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// 最近一次 `end_read` 请求的降采样级别
    pub fn downsample_level(&self) -> u8 {
        self.downsample_level
    }
}

impl FrameSource for ReplayFrameSource {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn begin_read(&mut self) -> Result<Option<&[u8]>, HalError> {
        if let (Some(interval), Some(last)) = (self.pacing.interval, self.last_release)
            && last.elapsed() < interval
        {
            return Ok(None);
        }

        let start = self.index * self.frame_len;
        Ok(Some(&self.data[start..start + self.frame_len]))
    }

    fn end_read(&mut self, downsample_level: u8) -> Result<(), HalError> {
        self.downsample_level = downsample_level;
        self.index = (self.index + 1) % self.frame_count;
        self.last_release = Some(Instant::now());
        Ok(())
    }
}
