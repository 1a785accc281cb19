//! 扫描循环
//!
//! 主线程循环：轮询入站控制字节 → 等待相机帧 → 按轮转槽位决定是否分析 →
//! 分析并编码输出。暂停时不采集，只以固定间隔轮询控制字节。

use crate::analyzer::ScanlineAnalyzer;
use crate::config::{FrameWaitKind, ScannerConfig};
use crate::context::SensorContext;
use crate::encoder::{DistanceEncoder, EncodeReport};
use crate::error::DriverError;
use crate::frame::IntensityFrame;
use crate::metrics::FrameRateEstimator;
use crate::mode::SensorMode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use trilidar_hal::{FrameSource, Transport};
use trilidar_protocol::ControlCommand;

/// 单次轮询最多处理的入站字节数
const MAX_COMMANDS_PER_POLL: usize = 64;

/// 帧率日志间隔
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Backoff 策略中忙等的最大轮数，之后改为让出时间片
const BACKOFF_SPIN_ROUNDS: u32 = 6;

/// 等待相机帧就绪的轮询策略
///
/// 没有超时：只有帧就绪、采集出错或请求退出时才结束等待。
#[derive(Debug, Clone)]
pub struct FrameWait {
    kind: FrameWaitKind,
    attempt: u32,
}

impl FrameWait {
    pub fn new(kind: FrameWaitKind) -> Self {
        Self { kind, attempt: 0 }
    }

    pub fn kind(&self) -> FrameWaitKind {
        self.kind
    }

    /// 帧就绪后调用，重置退避状态
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// 帧未就绪时调用一次
    pub fn idle(&mut self) {
        match self.kind {
            FrameWaitKind::Spin => std::hint::spin_loop(),
            FrameWaitKind::Yield => thread::yield_now(),
            FrameWaitKind::Backoff => {
                if self.attempt <= BACKOFF_SPIN_ROUNDS {
                    for _ in 0..(1u32 << self.attempt) {
                        std::hint::spin_loop();
                    }
                } else {
                    thread::yield_now();
                }
            },
        }
        self.attempt = self.attempt.saturating_add(1);
    }
}

/// 单次迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 已请求退出
    Shutdown,
    /// 传感器暂停，本轮未采集
    Idle,
    /// 采集了一帧，但不在分析槽位
    Skipped,
    /// 分析并输出了一帧
    Analyzed(EncodeReport),
}

/// 扫描循环
///
/// 持有采集源和串口；强度帧、分析器缓冲在构造时按分辨率分配，之后每帧复用。
pub struct ScanLoop<S, T> {
    source: S,
    transport: T,
    ctx: Arc<SensorContext>,
    frame: IntensityFrame,
    analyzer: ScanlineAnalyzer,
    encoder: DistanceEncoder,
    wait: FrameWait,
    intensity_channel: usize,
    downsample_level: u8,
    frame_rotation: u32,
    analyze_slot: u32,
    slot: u32,
    idle_poll: Duration,
    fps: FrameRateEstimator,
    last_fps_report: Instant,
}

impl<S: FrameSource, T: Transport> ScanLoop<S, T> {
    /// 创建扫描循环
    ///
    /// 校验配置，并要求采集源分辨率与配置一致。
    pub fn new(
        source: S,
        transport: T,
        ctx: Arc<SensorContext>,
        config: &ScannerConfig,
    ) -> Result<Self, DriverError> {
        config.validate()?;

        let (width, height) = (config.camera.width, config.camera.height);
        if source.dimensions() != (width, height) {
            let (w, h) = source.dimensions();
            return Err(DriverError::Config(format!(
                "capture source delivers {}x{}, configured for {}x{}",
                w, h, width, height
            )));
        }

        Ok(Self {
            source,
            transport,
            ctx,
            frame: IntensityFrame::new(width, height),
            analyzer: ScanlineAnalyzer::new(config.analyzer, width, height)?,
            encoder: DistanceEncoder::new(),
            wait: FrameWait::new(config.scan.frame_wait),
            intensity_channel: config.camera.intensity_channel,
            downsample_level: config.camera.downsample_level,
            frame_rotation: config.scan.frame_rotation,
            analyze_slot: config.scan.analyze_slot,
            slot: 0,
            idle_poll: config.scan.idle_poll(),
            fps: FrameRateEstimator::new(),
            last_fps_report: Instant::now(),
        })
    }

    pub fn context(&self) -> &Arc<SensorContext> {
        &self.ctx
    }

    /// 当前轮转槽位
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// 帧率估计
    pub fn fps(&self) -> &FrameRateEstimator {
        &self.fps
    }

    /// 最近一次分析的结果
    pub fn analyzer(&self) -> &ScanlineAnalyzer {
        &self.analyzer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 运行直到请求退出或采集出错
    pub fn run(&mut self) -> Result<(), DriverError> {
        info!("Scan loop started");
        let result = loop {
            match self.step() {
                Ok(StepOutcome::Shutdown) => break Ok(()),
                Ok(_) => {},
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.transport.flush() {
            warn!("Transport flush failed: {}", e);
        }

        match &result {
            Ok(()) => info!("Scan loop stopped"),
            Err(e) => warn!("Scan loop aborted: {}", e),
        }
        result
    }

    /// 执行一次迭代
    pub fn step(&mut self) -> Result<StepOutcome, DriverError> {
        if self.ctx.is_shutdown_requested() {
            return Ok(StepOutcome::Shutdown);
        }

        self.poll_commands()?;

        if !self.ctx.is_active() {
            thread::sleep(self.idle_poll);
            return Ok(StepOutcome::Idle);
        }

        let analyze = self.slot == self.analyze_slot;

        // 等待帧就绪（无超时）
        self.wait.reset();
        let loaded = loop {
            if self.ctx.is_shutdown_requested() {
                return Ok(StepOutcome::Shutdown);
            }
            match self.source.begin_read()? {
                Some(raw) if analyze => break self.frame.load_channel(raw, self.intensity_channel),
                Some(_) => break Ok(()),
                None => self.wait.idle(),
            }
        };
        // 缓冲无效时也先释放帧，槽位照常前进
        self.source.end_read(self.downsample_level)?;

        self.ctx.metrics.frames_acquired.fetch_add(1, Ordering::Relaxed);
        self.slot = (self.slot + 1) % self.frame_rotation;
        self.record_frame_time();
        loaded?;

        if !analyze {
            return Ok(StepOutcome::Skipped);
        }

        let results = self.analyzer.analyze(&self.frame)?;
        let report = self
            .encoder
            .encode_frame(results, &mut self.transport, &self.ctx.metrics)?;
        self.ctx.metrics.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        Ok(StepOutcome::Analyzed(report))
    }

    /// 非阻塞读取入站控制字节并切换模式
    ///
    /// `'r'` 恢复，`'s'` 暂停，其他字节忽略。致命读错误返回给调用方。
    pub fn poll_commands(&mut self) -> Result<(), DriverError> {
        for _ in 0..MAX_COMMANDS_PER_POLL {
            match self.transport.try_read_byte() {
                Ok(Some(byte)) => match ControlCommand::parse(byte) {
                    Some(command) => {
                        let mode = SensorMode::from(command);
                        if self.ctx.set_mode(mode) {
                            info!("Sensor mode -> {:?} (command {:?})", mode, command);
                        }
                    },
                    None => trace!("Ignoring inbound byte 0x{:02X}", byte),
                },
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("Transport read failed: {}", e);
                    break;
                },
            }
        }
        Ok(())
    }

    fn record_frame_time(&mut self) {
        let now = Instant::now();
        self.fps.record(now);
        if now.duration_since(self.last_fps_report) >= FPS_REPORT_INTERVAL {
            debug!(
                "Capture rate: {:.1} fps ({:.2} ms/frame)",
                self.fps.fps(),
                self.fps.average_interval_ms()
            );
            self.last_fps_report = now;
        }
    }
}
