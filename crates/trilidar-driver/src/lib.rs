//! # Trilidar Driver
//!
//! 激光三角测距扫描仪的核心引擎：
//!
//! - 激光频闪线程（[`StrobeController`]），按绝对时间表翻转，不累积漂移
//! - 扫描线分析（[`ScanlineAnalyzer`]），逐列峰值检测与亚像素估计
//! - 距离编码与串口输出（[`DistanceEncoder`]）
//! - 由入站控制字节驱动的工作/暂停模式（[`SensorMode`]）
//! - 主扫描循环（[`ScanLoop`]）与组装入口（[`ScannerBuilder`] / [`Scanner`]）
//!
//! 两个线程之间唯一的共享状态是 [`SensorContext`]：模式标志、退出标志和指标，
//! 全部为原子变量，没有锁。

pub mod analyzer;
mod builder;
pub mod config;
pub mod context;
pub mod encoder;
mod error;
pub mod frame;
pub mod metrics;
pub mod mode;
pub mod pipeline;
mod scanner;
pub mod strobe;

pub use analyzer::{ColumnResult, ScanlineAnalyzer, is_detected, subpixel_offset};
pub use builder::ScannerBuilder;
pub use config::{
    AnalyzerConfig, CameraConfig, FrameWaitKind, MAX_DETECTION_GAIN, MAX_SUBPIXEL_SCALE, ScanConfig,
    ScannerConfig, StrobeConfig,
};
pub use context::SensorContext;
pub use encoder::{DistanceEncoder, EncodeReport, pack_columns};
pub use error::DriverError;
pub use frame::IntensityFrame;
pub use metrics::{FrameRateEstimator, MetricsSnapshot, ScanMetrics};
pub use mode::{AtomicSensorMode, SensorMode};
pub use pipeline::{FrameWait, ScanLoop, StepOutcome};
pub use scanner::Scanner;
pub use strobe::{StrobeController, StrobeSchedule, StrobeTiming, strobe_loop};
