//! Builder 模式实现
//!
//! 提供链式构造 [`Scanner`] 的便捷方式。

use crate::config::ScannerConfig;
use crate::context::SensorContext;
use crate::error::DriverError;
use crate::pipeline::ScanLoop;
use crate::scanner::Scanner;
use crate::strobe::StrobeController;
use std::sync::Arc;
use tracing::info;
use trilidar_hal::{DigitalOutput, FrameSource, Transport};

/// Scanner Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use trilidar_driver::{ScannerBuilder, ScannerConfig};
/// use trilidar_hal::{FramePacing, ReplayFrameSource, SerialTransport, SysfsGpioOutput};
///
/// let config = ScannerConfig::load("scanner.toml").unwrap();
/// let source = ReplayFrameSource::from_file(
///     "capture.raw",
///     config.camera.width,
///     config.camera.height,
///     FramePacing::UNPACED,
/// )
/// .unwrap();
///
/// let scanner = ScannerBuilder::new()
///     .config(config)
///     .build(
///         SysfsGpioOutput::open(18).unwrap(),
///         source,
///         SerialTransport::open("/dev/ttyAMA0", 115_200).unwrap(),
///     )
///     .unwrap();
/// scanner.run().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct ScannerBuilder {
    /// 扫描仪配置（未设置时使用默认值）
    config: Option<ScannerConfig>,
    /// 共享上下文（外部需要提前持有时传入，例如 Ctrl-C 处理）
    context: Option<Arc<SensorContext>>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配置
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 使用外部创建的共享上下文
    pub fn context(mut self, context: Arc<SensorContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// 构建扫描仪并启动频闪线程
    ///
    /// 配置无效、采集分辨率不符、激光输出不可用时返回错误，此时不会留下运行中的线程。
    pub fn build<O, S, T>(
        self,
        output: O,
        source: S,
        transport: T,
    ) -> Result<Scanner<S, T>, DriverError>
    where
        O: DigitalOutput + Send + 'static,
        S: FrameSource,
        T: Transport,
    {
        let config = self.config.unwrap_or_default();
        let ctx = self
            .context
            .unwrap_or_else(|| Arc::new(SensorContext::new()));

        // 先构造扫描循环：它负责完整的配置校验
        let scan = ScanLoop::new(source, transport, ctx.clone(), &config)?;
        let strobe = StrobeController::spawn(output, ctx.clone(), &config.strobe)?;

        info!(
            "Scanner ready: {}x{} @ channel {}, strobe {} Hz / duty {}",
            config.camera.width,
            config.camera.height,
            config.camera.intensity_channel,
            config.strobe.frequency_hz,
            config.strobe.duty_cycle
        );

        Ok(Scanner::new(ctx, strobe, scan))
    }
}
