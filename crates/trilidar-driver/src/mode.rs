//! 传感器模式定义
//!
//! 定义扫描仪的工作模式，由串口入站控制字节切换，
//! 频闪线程与扫描循环每轮都会读取。

use std::sync::atomic::{AtomicBool, Ordering};
use trilidar_protocol::ControlCommand;

/// 传感器工作模式
///
/// # 模式说明
///
/// - **Active**: 激光按频率/占空比频闪，扫描循环采集、分析并输出每一帧
/// - **Inactive**: 激光保持低电平，扫描循环不采集，只以固定间隔轮询控制字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorMode {
    /// 工作中（默认，上电即开始扫描）
    #[default]
    Active,

    /// 暂停
    Inactive,
}

impl SensorMode {
    pub fn from_bool(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl From<ControlCommand> for SensorMode {
    fn from(command: ControlCommand) -> Self {
        match command {
            ControlCommand::Resume => Self::Active,
            ControlCommand::Suspend => Self::Inactive,
        }
    }
}

/// 传感器模式（原子版本，用于线程间共享）
///
/// 单写者（扫描循环解析入站字节）、多读者（频闪线程、扫描循环）。
/// 读到上一轮的旧值是可以接受的，因此通常使用 `Relaxed`。
///
/// # 示例
///
/// ```rust
/// use trilidar_driver::mode::{AtomicSensorMode, SensorMode};
/// use std::sync::atomic::Ordering;
///
/// let mode = AtomicSensorMode::new(SensorMode::Active);
/// mode.set(SensorMode::Inactive, Ordering::Relaxed);
/// assert_eq!(mode.get(Ordering::Relaxed), SensorMode::Inactive);
/// ```
#[derive(Debug)]
pub struct AtomicSensorMode {
    active: AtomicBool,
}

impl AtomicSensorMode {
    pub fn new(mode: SensorMode) -> Self {
        Self {
            active: AtomicBool::new(mode.is_active()),
        }
    }

    /// 获取当前模式
    pub fn get(&self, ordering: Ordering) -> SensorMode {
        SensorMode::from_bool(self.active.load(ordering))
    }

    /// 设置模式
    pub fn set(&self, mode: SensorMode, ordering: Ordering) {
        self.active.store(mode.is_active(), ordering);
    }

    /// 设置模式并返回旧值
    pub fn swap(&self, mode: SensorMode, ordering: Ordering) -> SensorMode {
        SensorMode::from_bool(self.active.swap(mode.is_active(), ordering))
    }
}

impl Default for AtomicSensorMode {
    fn default() -> Self {
        Self::new(SensorMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_mode_from_command() {
        assert_eq!(SensorMode::from(ControlCommand::Resume), SensorMode::Active);
        assert_eq!(SensorMode::from(ControlCommand::Suspend), SensorMode::Inactive);
        assert!(SensorMode::Active.is_active());
        assert!(!SensorMode::Inactive.is_active());
    }

    #[test]
    fn test_default_is_active() {
        let mode: SensorMode = Default::default();
        assert_eq!(mode, SensorMode::Active);
        assert_eq!(AtomicSensorMode::default().get(Ordering::Relaxed), SensorMode::Active);
    }

    #[test]
    fn test_atomic_sensor_mode() {
        let mode = AtomicSensorMode::new(SensorMode::Active);

        assert_eq!(mode.swap(SensorMode::Inactive, Ordering::Relaxed), SensorMode::Active);
        assert_eq!(mode.get(Ordering::Relaxed), SensorMode::Inactive);

        mode.set(SensorMode::Active, Ordering::Relaxed);
        assert_eq!(mode.get(Ordering::Relaxed), SensorMode::Active);
    }
}
