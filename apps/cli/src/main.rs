//! # Trilidar CLI
//!
//! 激光三角测距扫描仪命令行工具。
//!
//! ```bash
//! # 用录制的原始帧驱动扫描仪，输出到串口
//! trilidar-cli run --replay capture.raw --port /dev/ttyAMA0 --gpio 18
//!
//! # 解码串口抓包
//! trilidar-cli decode capture.bin
//!
//! # 打印默认配置
//! trilidar-cli config > scanner.toml
//! ```
//!
//! 日志级别通过 `RUST_LOG` 调整，默认 `trilidar=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, DecodeCommand, RunCommand};

/// Trilidar CLI - 激光三角测距扫描仪工具
#[derive(Parser, Debug)]
#[command(name = "trilidar-cli")]
#[command(about = "Command-line interface for the trilidar laser scanner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行扫描仪直到 Ctrl-C
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 解码串口输出流
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// 打印默认配置（TOML）
    Config {
        #[command(flatten)]
        args: ConfigCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trilidar=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
        Commands::Config { args } => args.execute(),
    }
}
