//! 扫描仪顶层对象
//!
//! 把频闪线程和扫描循环组装在一起：扫描循环在调用线程上运行，
//! 结束后通知频闪线程退出并等待激光被拉低。

use crate::builder::ScannerBuilder;
use crate::config::ScannerConfig;
use crate::context::SensorContext;
use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::ScanLoop;
use crate::strobe::StrobeController;
use std::sync::Arc;
use trilidar_hal::{DigitalOutput, FrameSource, Transport};

/// 扫描仪
pub struct Scanner<S, T> {
    ctx: Arc<SensorContext>,
    strobe: StrobeController,
    scan: ScanLoop<S, T>,
}

impl<S: FrameSource, T: Transport> Scanner<S, T> {
    pub(crate) fn new(
        ctx: Arc<SensorContext>,
        strobe: StrobeController,
        scan: ScanLoop<S, T>,
    ) -> Self {
        Self { ctx, strobe, scan }
    }

    /// 以给定配置构建并启动（等价于 `ScannerBuilder::new().config(config).build(..)`）
    pub fn start<O>(
        config: ScannerConfig,
        output: O,
        source: S,
        transport: T,
    ) -> Result<Self, DriverError>
    where
        O: DigitalOutput + Send + 'static,
    {
        ScannerBuilder::new().config(config).build(output, source, transport)
    }

    /// 共享上下文（用于从其他线程请求退出或切换模式）
    pub fn context(&self) -> &Arc<SensorContext> {
        &self.ctx
    }

    /// 当前指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 频闪线程是否仍在运行
    pub fn is_strobe_running(&self) -> bool {
        self.strobe.is_running()
    }

    /// 请求退出
    pub fn shutdown(&self) {
        self.ctx.request_shutdown();
    }

    /// 在当前线程运行扫描循环直到退出
    ///
    /// 无论扫描循环正常结束还是因采集错误中止，都会先停止频闪线程（激光拉低）再返回。
    pub fn run(mut self) -> Result<MetricsSnapshot, DriverError> {
        let result = self.scan.run();
        self.ctx.request_shutdown();
        self.strobe.stop();
        result.map(|()| self.ctx.metrics.snapshot())
    }
}
