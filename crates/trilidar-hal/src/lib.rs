//! # Trilidar Hardware Abstraction Layer
//!
//! 扫描仪硬件抽象层，驱动层只通过以下三个 trait 访问外部世界：
//!
//! - [`DigitalOutput`]: 激光使能线（只有置高/置低）
//! - [`FrameSource`]: 相机采集（begin read / end read）
//! - [`Transport`]: 全双工字节串口
//!
//! 相机采集、GPU 差分、串口波特率配置都不在本层范围内。

use std::time::Duration;
use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod gpio;
#[cfg(target_os = "linux")]
pub use gpio::SysfsGpioOutput;

pub mod serial;
pub use serial::{DEFAULT_BAUD_RATE, SerialTransport};

pub mod replay;
pub use replay::ReplayFrameSource;

#[cfg(feature = "mock")]
pub mod mock;

/// 每像素通道数（采集缓冲区按 W×H×4 排列）
pub const CHANNELS_PER_PIXEL: usize = 4;

/// 硬件层统一错误类型
#[derive(Error, Debug)]
pub enum HalError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] HalDeviceError),
    #[error("Device closed")]
    Closed,
}

impl HalError {
    /// 是否为致命错误（设备不存在、无权限、已关闭）
    pub fn is_fatal(&self) -> bool {
        match self {
            HalError::Device(e) => e.is_fatal(),
            HalError::Closed => true,
            HalError::Io(_) => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct HalDeviceError {
    pub kind: HalDeviceErrorKind,
    pub message: String,
}

impl HalDeviceError {
    pub fn new(kind: HalDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 由 IO 错误分类（用于打开设备文件失败时）
    pub fn from_io(context: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => HalDeviceErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => HalDeviceErrorKind::AccessDenied,
            std::io::ErrorKind::ResourceBusy => HalDeviceErrorKind::Busy,
            _ => HalDeviceErrorKind::Backend,
        };
        Self::new(kind, format!("{}: {}", context.into(), err))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            HalDeviceErrorKind::NotFound | HalDeviceErrorKind::AccessDenied
        )
    }
}

/// 激光使能线
pub trait DigitalOutput {
    fn set_high(&mut self) -> Result<(), HalError>;
    fn set_low(&mut self) -> Result<(), HalError>;
    fn set(&mut self, high: bool) -> Result<(), HalError> {
        if high { self.set_high() } else { self.set_low() }
    }
}

/// 相机采集
///
/// 缓冲区为 `width × height × 4` 字节，行优先。
pub trait FrameSource {
    /// 采集分辨率（width, height），启动后不变
    fn dimensions(&self) -> (usize, usize);

    /// 尝试获取一帧，`Ok(None)` 表示尚未就绪（不是错误）
    fn begin_read(&mut self) -> Result<Option<&[u8]>, HalError>;

    /// 释放当前帧，可请求降采样级别
    fn end_read(&mut self, downsample_level: u8) -> Result<(), HalError>;
}

/// 全双工字节串口
pub trait Transport {
    /// 写出全部字节（无应答、无重试）
    fn write(&mut self, bytes: &[u8]) -> Result<(), HalError>;

    /// 非阻塞读取单字节，`Ok(None)` 表示当前无数据
    fn try_read_byte(&mut self) -> Result<Option<u8>, HalError>;

    /// 刷新底层缓冲（默认无操作）
    fn flush(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn set_high(&mut self) -> Result<(), HalError> {
        (**self).set_high()
    }
    fn set_low(&mut self) -> Result<(), HalError> {
        (**self).set_low()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn dimensions(&self) -> (usize, usize) {
        (**self).dimensions()
    }
    fn begin_read(&mut self) -> Result<Option<&[u8]>, HalError> {
        (**self).begin_read()
    }
    fn end_read(&mut self, downsample_level: u8) -> Result<(), HalError> {
        (**self).end_read(downsample_level)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        (**self).write(bytes)
    }
    fn try_read_byte(&mut self) -> Result<Option<u8>, HalError> {
        (**self).try_read_byte()
    }
    fn flush(&mut self) -> Result<(), HalError> {
        (**self).flush()
    }
}

/// 帧节流：回放源按固定间隔出帧时使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacing {
    pub interval: Option<Duration>,
}

impl FramePacing {
    pub const UNPACED: Self = Self { interval: None };

    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_classification() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let e = HalDeviceError::from_io("open /dev/ttyAMA0", &io);
        assert_eq!(e.kind, HalDeviceErrorKind::NotFound);
        assert!(e.is_fatal());
        assert!(e.message.contains("/dev/ttyAMA0"));

        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            HalDeviceError::from_io("gpio", &io).kind,
            HalDeviceErrorKind::AccessDenied
        );

        let io = std::io::Error::other("boom");
        assert!(!HalDeviceError::from_io("gpio", &io).is_fatal());
    }

    #[test]
    fn test_hal_error_fatality() {
        assert!(HalError::Closed.is_fatal());
        assert!(!HalError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock)).is_fatal());
        let dev = HalDeviceError::new(HalDeviceErrorKind::InvalidFrame, "short");
        assert!(!HalError::Device(dev).is_fatal());
    }

    struct Recorder(Vec<bool>);

    impl DigitalOutput for Recorder {
        fn set_high(&mut self) -> Result<(), HalError> {
            self.0.push(true);
            Ok(())
        }
        fn set_low(&mut self) -> Result<(), HalError> {
            self.0.push(false);
            Ok(())
        }
    }

    #[test]
    fn test_set_dispatches_through_box() {
        let mut out: Box<Recorder> = Box::new(Recorder(Vec::new()));
        out.set(true).unwrap();
        out.set(false).unwrap();
        assert_eq!(out.0, vec![true, false]);
    }
}
