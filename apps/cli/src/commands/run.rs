//! run 命令
//!
//! 频闪激光 + 回放帧 + 串口输出，运行到 Ctrl-C 或采集出错为止

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use trilidar_driver::{MetricsSnapshot, ScannerConfig, SensorContext, SensorMode};
use trilidar_hal::{DEFAULT_BAUD_RATE, FramePacing};

/// 默认串口设备
pub const DEFAULT_PORT: &str = "/dev/ttyAMA0";

/// 默认激光使能引脚（BCM 编号，对应 P1 排针第 12 脚）
pub const DEFAULT_GPIO: u32 = 18;

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// TOML 配置文件（缺省使用内置默认值）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 串口设备
    #[arg(short, long, default_value = DEFAULT_PORT)]
    pub port: PathBuf,

    /// 波特率
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// 激光使能 GPIO（BCM 编号）
    #[arg(short, long, default_value_t = DEFAULT_GPIO)]
    pub gpio: u32,

    /// 原始帧文件（连续的 W×H×4 帧，循环回放）
    #[arg(short, long)]
    pub replay: PathBuf,

    /// 回放出帧间隔（毫秒），缺省按相机帧率，0 表示不节流
    #[arg(long)]
    pub replay_interval_ms: Option<u64>,

    /// 以暂停状态启动，等待串口 'r' 恢复
    #[arg(long)]
    pub suspended: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let config = match &self.config {
            Some(path) => ScannerConfig::load(path)?,
            None => ScannerConfig::default(),
        };

        let mode = if self.suspended {
            SensorMode::Inactive
        } else {
            SensorMode::Active
        };
        let ctx = Arc::new(SensorContext::with_mode(mode));

        let handler_ctx = Arc::clone(&ctx);
        ctrlc::set_handler(move || {
            info!("Received Ctrl-C, shutting down...");
            handler_ctx.request_shutdown();
        })
        .context("install Ctrl-C handler")?;

        let snapshot = self.run_scanner(config, ctx)?;
        print_summary(&snapshot);
        Ok(())
    }

    fn pacing(&self, config: &ScannerConfig) -> FramePacing {
        match self.replay_interval_ms {
            Some(0) => FramePacing::UNPACED,
            Some(ms) => FramePacing::every(Duration::from_millis(ms)),
            None => FramePacing::every(Duration::from_secs_f64(1.0 / config.camera.fps as f64)),
        }
    }

    #[cfg(target_os = "linux")]
    fn run_scanner(
        &self,
        config: ScannerConfig,
        ctx: Arc<SensorContext>,
    ) -> Result<MetricsSnapshot> {
        use trilidar_driver::ScannerBuilder;
        use trilidar_hal::{ReplayFrameSource, SerialTransport, SysfsGpioOutput};

        let source = ReplayFrameSource::from_file(
            &self.replay,
            config.camera.width,
            config.camera.height,
            self.pacing(&config),
        )
        .with_context(|| format!("load replay {}", self.replay.display()))?;
        let transport = SerialTransport::open(&self.port, self.baud)
            .with_context(|| format!("open serial port {}", self.port.display()))?;
        let laser = SysfsGpioOutput::open(self.gpio)
            .with_context(|| format!("open laser GPIO {}", self.gpio))?;

        info!(
            "Starting scanner: {}x{} @ {} fps, laser {} Hz on GPIO {}, output {} @ {} baud",
            config.camera.width,
            config.camera.height,
            config.camera.fps,
            config.strobe.frequency_hz,
            self.gpio,
            self.port.display(),
            self.baud
        );

        let scanner = ScannerBuilder::new()
            .config(config)
            .context(ctx)
            .build(laser, source, transport)?;
        Ok(scanner.run()?)
    }

    #[cfg(not(target_os = "linux"))]
    fn run_scanner(
        &self,
        config: ScannerConfig,
        _ctx: Arc<SensorContext>,
    ) -> Result<MetricsSnapshot> {
        let _ = self.pacing(&config);
        anyhow::bail!("the laser GPIO backend is only available on Linux")
    }
}

fn print_summary(snapshot: &MetricsSnapshot) {
    println!("frames acquired:        {}", snapshot.frames_acquired);
    println!("frames analyzed:        {}", snapshot.frames_analyzed);
    println!("detection rate:         {:.1}%", snapshot.detection_rate());
    println!("bytes written:          {}", snapshot.bytes_written);
    println!("transport write errors: {}", snapshot.transport_write_errors);
    println!("strobe toggles:         {}", snapshot.strobe_toggles);
    println!("strobe overruns:        {}", snapshot.strobe_overruns);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunCommand,
    }

    #[test]
    fn test_defaults_match_board_wiring() {
        let h = Harness::try_parse_from(["test", "--replay", "capture.raw"]).unwrap();
        assert_eq!(h.run.port, PathBuf::from("/dev/ttyAMA0"));
        assert_eq!(h.run.gpio, 18);
        assert_eq!(h.run.baud, 115_200);
        assert!(!h.run.suspended);
    }

    #[test]
    fn test_replay_pacing() {
        let config = ScannerConfig::default();
        let mut h = Harness::try_parse_from(["test", "-r", "x.raw"]).unwrap();
        assert_eq!(
            h.run.pacing(&config).interval,
            Some(Duration::from_secs_f64(1.0 / 30.0))
        );
        h.run.replay_interval_ms = Some(0);
        assert_eq!(h.run.pacing(&config), FramePacing::UNPACED);
    }

    #[test]
    fn test_replay_is_required() {
        assert!(Harness::try_parse_from(["test"]).is_err());
    }
}
