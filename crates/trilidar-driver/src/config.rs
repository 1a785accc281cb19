//! # 扫描仪配置
//!
//! 所有参数在启动时确定，运行期间不变。可从 TOML 加载，缺省字段取默认值。
//!
//! ```toml
//! [camera]
//! width = 640
//! height = 480
//!
//! [strobe]
//! frequency_hz = 10.0
//! duty_cycle = 0.4
//!
//! [scan]
//! frame_wait = "backoff"
//! ```

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use trilidar_hal::CHANNELS_PER_PIXEL;

/// 亚像素估计窗口的半宽（7 点窗口）
pub const SUBPIXEL_HALF_WINDOW: usize = 3;

/// 检测判据常数上限
pub const MAX_DETECTION_GAIN: i32 = 4096;

/// 亚像素缩放系数上限
pub const MAX_SUBPIXEL_SCALE: i32 = 1024;

/// 扫描仪配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScannerConfig {
    pub camera: CameraConfig,
    pub strobe: StrobeConfig,
    pub analyzer: AnalyzerConfig,
    pub scan: ScanConfig,
}

impl ScannerConfig {
    /// 从 TOML 文本解析（不做校验）
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("read {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 校验参数组合
    pub fn validate(&self) -> Result<(), DriverError> {
        self.camera.validate()?;
        self.strobe.validate()?;
        self.analyzer.validate(self.camera.height)?;
        self.scan.validate()?;
        Ok(())
    }
}

/// 相机参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// 采集宽度（列数，必须为偶数）
    pub width: usize,
    /// 采集高度（行数）
    pub height: usize,
    /// 标称帧率
    pub fps: u32,
    /// 作为强度读取的通道（RGBA 中的下标）
    pub intensity_channel: usize,
    /// 释放帧时请求的降采样级别
    pub downsample_level: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            intensity_channel: 2,
            downsample_level: 0,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<(), DriverError> {
        if self.width == 0 || self.height == 0 {
            return Err(DriverError::Config(format!(
                "camera resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        // 列按奇偶成对输出
        if self.width % 2 != 0 {
            return Err(DriverError::Config(format!(
                "camera.width must be even, got {}",
                self.width
            )));
        }
        if self.fps == 0 {
            return Err(DriverError::Config("camera.fps must be > 0".to_string()));
        }
        if self.intensity_channel >= CHANNELS_PER_PIXEL {
            return Err(DriverError::Config(format!(
                "camera.intensity_channel must be < {}, got {}",
                CHANNELS_PER_PIXEL, self.intensity_channel
            )));
        }
        Ok(())
    }
}

/// 激光频闪参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobeConfig {
    /// 频闪频率（Hz），默认为相机帧率的三分之一
    pub frequency_hz: f64,
    /// 每个周期内高电平所占比例
    pub duty_cycle: f64,
    /// 暂停时的轮询间隔（毫秒）
    pub idle_poll_ms: u64,
}

impl Default for StrobeConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            duty_cycle: 0.4,
            idle_poll_ms: 1,
        }
    }
}

impl StrobeConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    fn validate(&self) -> Result<(), DriverError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(DriverError::Config(format!(
                "strobe.frequency_hz must be > 0, got {}",
                self.frequency_hz
            )));
        }
        if !(self.duty_cycle > 0.0 && self.duty_cycle < 1.0) {
            return Err(DriverError::Config(format!(
                "strobe.duty_cycle must be in (0, 1), got {}",
                self.duty_cycle
            )));
        }
        Ok(())
    }
}

/// 扫描线分析参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 搜索带两端的边距（行）
    pub edge_margin: usize,
    /// 检测判据常数 K：`max * K > total + variation`
    pub detection_gain: i32,
    /// 亚像素估计的缩放系数
    pub subpixel_scale: i32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            edge_margin: 3,
            detection_gain: 40,
            subpixel_scale: 32,
        }
    }
}

impl AnalyzerConfig {
    fn validate(&self, height: usize) -> Result<(), DriverError> {
        // 峰值行 i 的窗口覆盖 i-3..=i+3，边距不足会越出图像顶部
        if self.edge_margin < SUBPIXEL_HALF_WINDOW {
            return Err(DriverError::Config(format!(
                "analyzer.edge_margin must be >= {}, got {}",
                SUBPIXEL_HALF_WINDOW, self.edge_margin
            )));
        }
        if height / 2 <= 2 * self.edge_margin {
            return Err(DriverError::Config(format!(
                "camera.height {} leaves an empty search band with edge_margin {}",
                height, self.edge_margin
            )));
        }
        if !(1..=MAX_DETECTION_GAIN).contains(&self.detection_gain) {
            return Err(DriverError::Config(format!(
                "analyzer.detection_gain must be in 1..={}, got {}",
                MAX_DETECTION_GAIN, self.detection_gain
            )));
        }
        if !(1..=MAX_SUBPIXEL_SCALE).contains(&self.subpixel_scale) {
            return Err(DriverError::Config(format!(
                "analyzer.subpixel_scale must be in 1..={}, got {}",
                MAX_SUBPIXEL_SCALE, self.subpixel_scale
            )));
        }
        Ok(())
    }
}

/// 等待相机帧就绪的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameWaitKind {
    /// 忙等（最低延迟，占满一个核）
    #[default]
    Spin,
    /// 每次让出时间片
    Yield,
    /// 先忙等，随后逐步退避到让出时间片
    Backoff,
}

/// 扫描循环参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 采集轮转长度
    pub frame_rotation: u32,
    /// 轮转中被分析的槽位
    pub analyze_slot: u32,
    /// 暂停时的轮询间隔（毫秒）
    pub idle_poll_ms: u64,
    /// 帧等待策略
    pub frame_wait: FrameWaitKind,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_rotation: 3,
            analyze_slot: 2,
            idle_poll_ms: 1,
            frame_wait: FrameWaitKind::Spin,
        }
    }
}

impl ScanConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    fn validate(&self) -> Result<(), DriverError> {
        if self.frame_rotation == 0 {
            return Err(DriverError::Config(
                "scan.frame_rotation must be > 0".to_string(),
            ));
        }
        if self.analyze_slot >= self.frame_rotation {
            return Err(DriverError::Config(format!(
                "scan.analyze_slot {} is outside a rotation of {}",
                self.analyze_slot, self.frame_rotation
            )));
        }
        Ok(())
    }
}
