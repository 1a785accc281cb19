//! config 命令
//!
//! 打印默认配置，或校验并回显一个配置文件

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use trilidar_driver::ScannerConfig;

/// 配置命令参数
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// 校验该文件并打印补全默认值后的完整配置
    #[arg(long)]
    pub check: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        let config = match &self.check {
            Some(path) => ScannerConfig::load(path)
                .with_context(|| format!("invalid configuration {}", path.display()))?,
            None => ScannerConfig::default(),
        };

        print!("{}", config.to_toml_string()?);
        Ok(())
    }
}
