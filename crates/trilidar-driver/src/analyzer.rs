//! 扫描线分析
//!
//! 对每一列在上半幅图像的搜索带内寻找激光线峰值，判断是否有效，
//! 并用 7 点一阶矩估计亚像素偏移。
//!
//! # 坐标
//!
//! - 图像行 `i`：0 为图像顶部
//! - 距离行 `H - i - 1`：基线位于 `H/2`，距离行越大目标越远
//!
//! 搜索带为图像行 `[DM, H/2 - DM)`，`DM` 为边距。
//!
//! # 缓冲复用
//!
//! 每列的累加器和结果数组在构造时按分辨率分配，之后每帧原地覆盖，
//! 热路径中没有堆分配。

use crate::config::{AnalyzerConfig, SUBPIXEL_HALF_WINDOW};
use crate::error::DriverError;
use crate::frame::IntensityFrame;
use trilidar_protocol::EncodedSample;

/// 单列分析结果（每帧重算，不保留历史）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnResult {
    /// 是否检测到激光线
    pub detected: bool,
    /// 峰值所在的距离行；搜索带内全为 0 时为 `None`
    pub peak_row: Option<usize>,
    /// 亚像素偏移（已乘缩放系数，范围约 ±3×scale）
    pub subpixel_offset: i32,
    /// 搜索带内最大值
    pub max_value: i32,
    /// 搜索带内样本总和
    pub total: i32,
    /// 搜索带内相邻样本差的绝对值之和
    pub total_variation: i32,
    /// 编码后的样本值（未检测到时为哨兵值）
    pub encoded: EncodedSample,
}

impl Default for ColumnResult {
    fn default() -> Self {
        Self {
            detected: false,
            peak_row: None,
            subpixel_offset: 0,
            max_value: 0,
            total: 0,
            total_variation: 0,
            encoded: EncodedSample::NO_DETECTION,
        }
    }
}

/// 检测判据：`max * gain > total + variation`
///
/// 对 `max_value` 单调：固定 `total` 与 `variation` 时，增大峰值只会让结果从未检测变为检测。
/// 在 `i64` 中计算，任意 `i32` 输入都不会溢出。
#[inline]
pub fn is_detected(max_value: i32, total: i32, total_variation: i32, gain: i32) -> bool {
    max_value as i64 * gain as i64 > total as i64 + total_variation as i64
}

/// 7 点窗口的亚像素偏移估计
///
/// `offset = (3·s6 + 2·s5 + s4 − s2 − 2·s1 − 3·s0) · scale / Σs`，整数除法向零截断。
/// 窗口总和为 0 时返回 0。
#[inline]
pub fn subpixel_offset(window: &[i32; 7], scale: i32) -> i32 {
    let w = window.map(i64::from);
    let sum: i64 = w.iter().sum();
    if sum == 0 {
        return 0;
    }
    let moment = 3 * w[6] + 2 * w[5] + w[4] - w[2] - 2 * w[1] - 3 * w[0];
    // 样本非负时 |moment| <= 3·sum，结果落在 ±3·scale 内
    (moment * scale as i64 / sum) as i32
}

/// 扫描线分析器
#[derive(Debug, Clone)]
pub struct ScanlineAnalyzer {
    config: AnalyzerConfig,
    width: usize,
    height: usize,
    max_value: Vec<i32>,
    peak_image_row: Vec<Option<usize>>,
    totals: Vec<i32>,
    variation: Vec<i32>,
    prev: Vec<i32>,
    results: Vec<ColumnResult>,
}

impl ScanlineAnalyzer {
    /// 按分辨率分配缓冲
    ///
    /// 搜索带必须非空，且峰值上下 3 行的窗口不能越出图像。
    pub fn new(config: AnalyzerConfig, width: usize, height: usize) -> Result<Self, DriverError> {
        if config.edge_margin < SUBPIXEL_HALF_WINDOW || height / 2 <= 2 * config.edge_margin {
            return Err(DriverError::Config(format!(
                "edge margin {} does not fit a {}-row frame",
                config.edge_margin, height
            )));
        }

        Ok(Self {
            config,
            width,
            height,
            max_value: vec![0; width],
            peak_image_row: vec![None; width],
            totals: vec![0; width],
            variation: vec![0; width],
            prev: vec![0; width],
            results: vec![ColumnResult::default(); width],
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// 搜索带（图像行，左闭右开）
    pub fn band(&self) -> std::ops::Range<usize> {
        self.config.edge_margin..self.height / 2 - self.config.edge_margin
    }

    /// 最近一次分析的结果
    pub fn results(&self) -> &[ColumnResult] {
        &self.results
    }

    /// 分析一帧，返回每列结果
    pub fn analyze(&mut self, frame: &IntensityFrame) -> Result<&[ColumnResult], DriverError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(DriverError::InvalidFrame(format!(
                "analyzer sized for {}x{}, got {}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height()
            )));
        }

        self.accumulate(frame);

        let half = (self.height / 2) as i32;
        for j in 0..self.width {
            let max_value = self.max_value[j];
            let total = self.totals[j];
            let total_variation = self.variation[j];
            let peak_image_row = self.peak_image_row[j];

            let mut result = ColumnResult {
                peak_row: peak_image_row.map(|i| self.height - i - 1),
                max_value,
                total,
                total_variation,
                ..ColumnResult::default()
            };

            if let Some(i) = peak_image_row
                && is_detected(max_value, total, total_variation, self.config.detection_gain)
            {
                // window[k] 取图像行 i + 3 - k
                let mut window = [0i32; 7];
                for (k, slot) in window.iter_mut().enumerate() {
                    *slot = frame.get(i + SUBPIXEL_HALF_WINDOW - k, j) as i32;
                }
                let offset = subpixel_offset(&window, self.config.subpixel_scale);
                let distance_row = (self.height - i - 1) as i32;

                result.detected = true;
                result.subpixel_offset = offset;
                result.encoded = EncodedSample::from_detection(distance_row - half, offset);
            }

            self.results[j] = result;
        }

        Ok(&self.results)
    }

    // 行在外层，按内存顺序遍历
    fn accumulate(&mut self, frame: &IntensityFrame) {
        self.max_value.fill(0);
        self.peak_image_row.fill(None);
        self.totals.fill(0);
        self.variation.fill(0);

        let band = self.band();
        let first = band.start;
        for i in band {
            let row = frame.row(i);
            for (j, &sample) in row.iter().enumerate() {
                let value = sample as i32;
                self.totals[j] += value;
                if i > first {
                    self.variation[j] += (value - self.prev[j]).abs();
                }
                self.prev[j] = value;
                // 严格大于：并列时取最靠上的行
                if value > self.max_value[j] {
                    self.max_value[j] = value;
                    self.peak_image_row[j] = Some(i);
                }
            }
        }
    }
}
