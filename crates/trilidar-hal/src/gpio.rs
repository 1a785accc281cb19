//! sysfs GPIO 激光使能线（Linux）
//!
//! 通过 `/sys/class/gpio` 导出引脚、设置方向为输出，之后每次置位只写 `value` 文件。

use crate::{DigitalOutput, HalDeviceError, HalError};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// sysfs GPIO 根目录
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev 为新导出引脚调整权限需要一点时间
const EXPORT_SETTLE: Duration = Duration::from_millis(50);

/// sysfs GPIO 输出
#[derive(Debug)]
pub struct SysfsGpioOutput {
    pin: u32,
    value: File,
    level: Option<bool>,
}

impl SysfsGpioOutput {
    /// 打开并配置引脚为输出，失败即致命
    pub fn open(pin: u32) -> Result<Self, HalError> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), pin)
    }

    /// 在指定根目录下打开（测试时指向临时目录）
    pub fn open_at(root: &Path, pin: u32) -> Result<Self, HalError> {
        let pin_dir = root.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            debug!("Exporting GPIO {} under {}", pin, root.display());
            write_attr(&root.join("export"), pin.to_string().as_bytes())?;
            thread::sleep(EXPORT_SETTLE);
        }

        write_attr(&pin_dir.join("direction"), b"out")?;

        let value_path = pin_dir.join("value");
        let value = OpenOptions::new()
            .write(true)
            .open(&value_path)
            .map_err(|e| {
                HalDeviceError::from_io(format!("open {}", value_path.display()), &e)
            })?;

        info!("GPIO {} configured as laser output", pin);

        Ok(Self {
            pin,
            value,
            level: None,
        })
    }

    /// 引脚号
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// 最后一次写入的电平
    pub fn level(&self) -> Option<bool> {
        self.level
    }

    fn write_level(&mut self, high: bool) -> Result<(), HalError> {
        self.value.write_all_at(if high { b"1" } else { b"0" }, 0)?;
        self.level = Some(high);
        Ok(())
    }
}

impl DigitalOutput for SysfsGpioOutput {
    fn set_high(&mut self) -> Result<(), HalError> {
        self.write_level(true)
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        self.write_level(false)
    }
}

fn write_attr(path: &Path, content: &[u8]) -> Result<(), HalError> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| HalDeviceError::from_io(format!("open {}", path.display()), &e))?;
    file.write_all_at(content, 0)
        .map_err(|e| HalDeviceError::from_io(format!("write {}", path.display()), &e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_sysfs(pin: u32) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let pin_dir = root.path().join(format!("gpio{}", pin));
        fs::create_dir_all(&pin_dir).unwrap();
        fs::write(pin_dir.join("direction"), b"in").unwrap();
        fs::write(pin_dir.join("value"), b"0").unwrap();
        root
    }

    #[test]
    fn test_open_sets_direction_and_toggles_value() {
        let root = fake_sysfs(18);
        let mut out = SysfsGpioOutput::open_at(root.path(), 18).unwrap();
        assert_eq!(out.pin(), 18);

        let pin_dir = root.path().join("gpio18");
        assert_eq!(fs::read(pin_dir.join("direction")).unwrap(), b"out");

        out.set_high().unwrap();
        assert_eq!(fs::read(pin_dir.join("value")).unwrap(), b"1");
        assert_eq!(out.level(), Some(true));

        out.set_low().unwrap();
        assert_eq!(fs::read(pin_dir.join("value")).unwrap(), b"0");
        assert_eq!(out.level(), Some(false));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = SysfsGpioOutput::open_at(&missing, 4).unwrap_err();
        assert!(err.is_fatal(), "unexpected error: {}", err);
    }
}
