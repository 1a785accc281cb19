//! 驱动层错误类型定义

use thiserror::Error;
use trilidar_hal::HalError;
use trilidar_protocol::ProtocolError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 硬件层错误（激光输出、采集、串口）
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 采集帧与配置分辨率不符
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// 后台线程无法启动
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),
}

impl DriverError {
    /// 是否为致命错误（需要停止扫描）
    pub fn is_fatal(&self) -> bool {
        match self {
            DriverError::Hal(e) => e.is_fatal(),
            DriverError::Protocol(_) => false,
            DriverError::Config(_) | DriverError::InvalidFrame(_) | DriverError::ThreadSpawn(_) => {
                true
            },
        }
    }
}
