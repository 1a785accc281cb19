//! 串口传输
//!
//! 基于 `serialport` 打开设备：8N1、无流控、原始模式（无行缓冲、无换行转换）。
//! 读超时很短，`try_read_byte` 先查询接收缓冲，无数据时立即返回。
//!
//! 写入以单元为粒度：一旦写出了单元的第一个字节，就在 [`UNIT_WRITE_DEADLINE`]
//! 内把剩余字节写完，接收端不会看到半个单元。

use crate::{HalDeviceError, HalDeviceErrorKind, HalError, Transport};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 单次读/写的阻塞上限
const PORT_TIMEOUT: Duration = Duration::from_millis(1);

/// 已开始的单元必须在此时间内写完
pub const UNIT_WRITE_DEADLINE: Duration = Duration::from_millis(50);

/// 串口传输
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// 打开串口设备（8N1、无流控、原始模式），失败即致命
    pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self, HalError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let port = serialport::new(&path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| device_error(format!("open {}", path), &e))?;

        info!("Serial transport opened: {} at {} baud", path, baud_rate);
        Ok(Self { port, path })
    }

    /// 设备路径
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// `serialport` 错误分类
fn device_error(context: impl Into<String>, err: &serialport::Error) -> HalDeviceError {
    let kind = match err.kind() {
        serialport::ErrorKind::NoDevice => HalDeviceErrorKind::NotFound,
        serialport::ErrorKind::InvalidInput => HalDeviceErrorKind::UnsupportedConfig,
        serialport::ErrorKind::Io(ErrorKind::NotFound) => HalDeviceErrorKind::NotFound,
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => HalDeviceErrorKind::AccessDenied,
        serialport::ErrorKind::Io(ErrorKind::ResourceBusy) => HalDeviceErrorKind::Busy,
        _ => HalDeviceErrorKind::Backend,
    };
    HalDeviceError::new(kind, format!("{}: {}", context.into(), err))
}

fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        let mut written = 0;
        let mut started: Option<Instant> = None;

        while written < bytes.len() {
            match self.port.write(&bytes[written..]) {
                Ok(0) => return Err(HalError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => {
                    written += n;
                    started.get_or_insert_with(Instant::now);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                // 单元已开始：继续写完，直到截止时间
                Err(e)
                    if is_transient(&e)
                        && started.is_some_and(|t| t.elapsed() < UNIT_WRITE_DEADLINE) => {},
                Err(e) => {
                    if written > 0 {
                        warn!(
                            "Serial write abandoned after {}/{} bytes, receiver will resync at the next delimiter",
                            written,
                            bytes.len()
                        );
                    }
                    return Err(HalError::Io(e));
                },
            }
        }
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>, HalError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| device_error(format!("poll {}", self.path), &e))?;
        if pending == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(HalError::Io(e)),
        }
    }

    fn flush(&mut self) -> Result<(), HalError> {
        self.port.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_fatal() {
        let err = SerialTransport::open("/nonexistent/ttyAMA9", DEFAULT_BAUD_RATE).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_classification() {
        let e = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert_eq!(device_error("open", &e).kind, HalDeviceErrorKind::NotFound);
        let e = serialport::Error::new(serialport::ErrorKind::InvalidInput, "baud");
        assert_eq!(
            device_error("open", &e).kind,
            HalDeviceErrorKind::UnsupportedConfig
        );
        let e = serialport::Error::new(serialport::ErrorKind::Unknown, "?");
        assert!(!device_error("read", &e).is_fatal());
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use super::super::*;
        use std::ffi::CStr;
        use std::fs::File;
        use std::os::fd::FromRawFd;
        use std::path::PathBuf;
        use std::thread;

        /// 打开一对伪终端，返回主端和从端路径
        fn open_pty() -> (File, PathBuf) {
            unsafe {
                let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
                assert!(fd >= 0, "posix_openpt failed");
                assert_eq!(libc::grantpt(fd), 0);
                assert_eq!(libc::unlockpt(fd), 0);
                let mut name = [0 as libc::c_char; 128];
                assert_eq!(libc::ptsname_r(fd, name.as_mut_ptr(), name.len()), 0);
                let path = CStr::from_ptr(name.as_ptr()).to_string_lossy().into_owned();
                (File::from_raw_fd(fd), PathBuf::from(path))
            }
        }

        fn read_with_deadline(transport: &mut SerialTransport) -> Option<u8> {
            let deadline = Instant::now() + Duration::from_secs(1);
            while Instant::now() < deadline {
                if let Some(byte) = transport.try_read_byte().unwrap() {
                    return Some(byte);
                }
                thread::sleep(Duration::from_millis(1));
            }
            None
        }

        #[test]
        fn test_command_byte_arrives_without_newline() {
            let (mut master, path) = open_pty();
            let mut transport = SerialTransport::open(&path, DEFAULT_BAUD_RATE).unwrap();

            assert_eq!(transport.try_read_byte().unwrap(), None);
            master.write_all(b"r").unwrap();
            assert_eq!(read_with_deadline(&mut transport), Some(b'r'));
            master.write_all(b"s").unwrap();
            assert_eq!(read_with_deadline(&mut transport), Some(b's'));
        }

        #[test]
        fn test_line_feed_bytes_are_not_translated() {
            let (mut master, path) = open_pty();
            let mut transport = SerialTransport::open(&path, DEFAULT_BAUD_RATE).unwrap();

            transport.write(&[0x0A, 0x04, 0x0A]).unwrap();
            transport.write(&[0xFF, 0xFF, 0xFF]).unwrap();
            transport.flush().unwrap();

            let mut buf = [0u8; 6];
            master.read_exact(&mut buf).unwrap();
            assert_eq!(buf, [0x0A, 0x04, 0x0A, 0xFF, 0xFF, 0xFF]);
        }
    }
}
