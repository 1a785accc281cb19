//! 线程间共享状态
//!
//! 频闪线程和扫描循环在构造时各自拿到同一个 `Arc<SensorContext>`，
//! 不存在进程级全局变量。

use crate::metrics::ScanMetrics;
use crate::mode::{AtomicSensorMode, SensorMode};
use std::sync::atomic::{AtomicBool, Ordering};

/// 扫描仪共享上下文
#[derive(Debug, Default)]
pub struct SensorContext {
    /// 传感器模式（单写者：扫描循环）
    pub mode: AtomicSensorMode,
    shutdown: AtomicBool,
    /// 运行指标
    pub metrics: ScanMetrics,
}

impl SensorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定初始模式创建
    pub fn with_mode(mode: SensorMode) -> Self {
        Self {
            mode: AtomicSensorMode::new(mode),
            ..Self::default()
        }
    }

    /// 当前是否处于工作模式
    pub fn is_active(&self) -> bool {
        self.mode.get(Ordering::Relaxed).is_active()
    }

    /// 设置模式，返回模式是否发生变化
    pub fn set_mode(&self, mode: SensorMode) -> bool {
        self.mode.swap(mode, Ordering::Relaxed) != mode
    }

    /// 请求所有循环退出
    pub fn request_shutdown(&self) {
        // Release: 看到 true 的线程也能看到此前的所有写入
        self.shutdown.store(true, Ordering::Release);
    }

    /// 是否已请求退出
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
