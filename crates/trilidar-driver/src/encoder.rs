//! 距离编码与串口输出
//!
//! 每处理完一对列（奇数列）立即写出 3 字节，整帧结束后写出分隔单元。
//! 写失败不重试、不上报给调用方，只计数并记录日志。

use crate::analyzer::ColumnResult;
use crate::error::DriverError;
use crate::metrics::ScanMetrics;
use std::sync::atomic::Ordering;
use tracing::{trace, warn};
use trilidar_hal::Transport;
use trilidar_protocol::{PackedPair, ProtocolError, UNIT_LEN};

/// 单帧输出统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeReport {
    /// 尝试写出的单元数（含分隔单元）
    pub units: usize,
    /// 写失败的单元数
    pub failed_units: usize,
    /// 检测到激光线的列数
    pub detected_columns: usize,
}

impl EncodeReport {
    pub fn bytes_written(&self) -> usize {
        (self.units - self.failed_units) * UNIT_LEN
    }
}

/// 将一帧的列结果按奇偶配对打包
///
/// 列数必须为偶数；末尾不含分隔单元。
pub fn pack_columns(
    results: &[ColumnResult],
) -> Result<impl Iterator<Item = PackedPair> + '_, ProtocolError> {
    if results.len() % 2 != 0 {
        return Err(ProtocolError::OddColumnCount {
            columns: results.len(),
        });
    }
    Ok(results
        .chunks_exact(2)
        .map(|pair| PackedPair::pack(pair[0].encoded, pair[1].encoded)))
}

/// 距离编码器
#[derive(Debug, Default)]
pub struct DistanceEncoder {
    frames: u64,
}

impl DistanceEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已输出的帧数
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 编码并写出一帧
    ///
    /// 只有列数为奇数时返回错误；串口写失败计入 `metrics` 后继续下一单元。
    pub fn encode_frame<T: Transport + ?Sized>(
        &mut self,
        results: &[ColumnResult],
        transport: &mut T,
        metrics: &ScanMetrics,
    ) -> Result<EncodeReport, DriverError> {
        let pairs = pack_columns(results)?;
        let mut report = EncodeReport {
            detected_columns: results.iter().filter(|r| r.detected).count(),
            ..EncodeReport::default()
        };

        for unit in pairs.chain(std::iter::once(PackedPair::DELIMITER)) {
            self.write_unit(&unit, transport, metrics, &mut report);
        }

        self.frames += 1;
        metrics
            .columns_detected
            .fetch_add(report.detected_columns as u64, Ordering::Relaxed);
        metrics.columns_undetected.fetch_add(
            (results.len() - report.detected_columns) as u64,
            Ordering::Relaxed,
        );
        trace!(
            "Frame {} encoded: {} units, {} detected columns",
            self.frames, report.units, report.detected_columns
        );
        Ok(report)
    }

    fn write_unit<T: Transport + ?Sized>(
        &self,
        unit: &PackedPair,
        transport: &mut T,
        metrics: &ScanMetrics,
        report: &mut EncodeReport,
    ) {
        report.units += 1;
        match transport.write(&unit.bytes) {
            Ok(()) => {
                metrics
                    .bytes_written
                    .fetch_add(UNIT_LEN as u64, Ordering::Relaxed);
            },
            Err(e) => {
                metrics.transport_write_errors.fetch_add(1, Ordering::Relaxed);
                // 每帧只记录第一次失败，避免串口断开时刷屏
                if report.failed_units == 0 {
                    warn!("Transport write failed, dropping unit: {}", e);
                }
                report.failed_units += 1;
            },
        }
    }
}
