//! 扫描仪运行指标
//!
//! 原子计数器，任意线程都可无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 扫描仪实时指标
///
/// 频闪线程和扫描循环各自只写自己的计数器，全部使用 `Relaxed`。
///
/// ```rust
/// use trilidar_driver::ScanMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ScanMetrics::default();
/// metrics.frames_acquired.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_acquired, 1);
/// ```
#[derive(Debug, Default)]
pub struct ScanMetrics {
    /// 采集到（并已释放）的帧数，含轮转中未分析的帧
    pub frames_acquired: AtomicU64,

    /// 经过分析和编码的帧数
    pub frames_analyzed: AtomicU64,

    /// 检测到激光线的列数（累计）
    pub columns_detected: AtomicU64,

    /// 未检测到的列数（累计，输出哨兵值）
    pub columns_undetected: AtomicU64,

    /// 成功写出的字节数
    pub bytes_written: AtomicU64,

    /// 串口写失败次数（不重试）
    pub transport_write_errors: AtomicU64,

    /// 激光电平翻转次数
    pub strobe_toggles: AtomicU64,

    /// 翻转后发现截止时间已过（来不及睡眠）的次数
    ///
    /// 持续增长说明频闪线程得不到足够的 CPU 时间，可考虑启用 `realtime` feature。
    pub strobe_overruns: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_acquired: self.frames_acquired.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            columns_detected: self.columns_detected.load(Ordering::Relaxed),
            columns_undetected: self.columns_undetected.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            transport_write_errors: self.transport_write_errors.load(Ordering::Relaxed),
            strobe_toggles: self.strobe_toggles.load(Ordering::Relaxed),
            strobe_overruns: self.strobe_overruns.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_acquired: u64,
    pub frames_analyzed: u64,
    pub columns_detected: u64,
    pub columns_undetected: u64,
    pub bytes_written: u64,
    pub transport_write_errors: u64,
    pub strobe_toggles: u64,
    pub strobe_overruns: u64,
}

impl MetricsSnapshot {
    /// 检测率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值，尚无列时返回 0.0。
    pub fn detection_rate(&self) -> f64 {
        let total = self.columns_detected + self.columns_undetected;
        if total == 0 {
            return 0.0;
        }
        (self.columns_detected as f64 / total as f64) * 100.0
    }
}

/// 帧率估计器
///
/// 对相邻帧间隔做指数滑动平均：`avg = avg * 0.99 + sample * 0.01`，初值 33ms。
#[derive(Debug, Clone)]
pub struct FrameRateEstimator {
    avg_interval_ms: f64,
    last_frame: Option<Instant>,
}

impl FrameRateEstimator {
    /// 初始平均帧间隔（毫秒，约 30fps）
    pub const SEED_INTERVAL_MS: f64 = 33.0;
    const SMOOTHING: f64 = 0.99;

    pub fn new() -> Self {
        Self {
            avg_interval_ms: Self::SEED_INTERVAL_MS,
            last_frame: None,
        }
    }

    /// 记录一帧到达（第一帧只建立时间基准）
    pub fn record(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            self.record_interval(now.saturating_duration_since(last));
        }
        self.last_frame = Some(now);
    }

    /// 直接记录一个帧间隔
    pub fn record_interval(&mut self, interval: Duration) {
        let sample_ms = interval.as_secs_f64() * 1000.0;
        self.avg_interval_ms =
            self.avg_interval_ms * Self::SMOOTHING + sample_ms * (1.0 - Self::SMOOTHING);
    }

    /// 平均帧间隔（毫秒）
    pub fn average_interval_ms(&self) -> f64 {
        self.avg_interval_ms
    }

    /// 估计帧率
    pub fn fps(&self) -> f64 {
        if self.avg_interval_ms <= f64::EPSILON {
            return 0.0;
        }
        1000.0 / self.avg_interval_ms
    }
}

impl Default for FrameRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}
