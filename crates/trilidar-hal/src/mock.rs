//! Mock 硬件（feature = "mock"）
//!
//! 每个 mock 都成对返回：设备本体（交给驱动层）和探针/句柄（留在测试线程）。

use crate::{
    CHANNELS_PER_PIXEL, DigitalOutput, FrameSource, HalDeviceError, HalDeviceErrorKind, HalError,
    Transport,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ============================================================================
// 数字输出
// ============================================================================

#[derive(Debug, Default)]
struct OutputLog {
    level: bool,
    writes: u64,
    transitions: Vec<(Instant, bool)>,
}

/// Mock 激光输出：记录每次电平变化及时间戳
#[derive(Debug)]
pub struct MockOutput {
    log: Arc<Mutex<OutputLog>>,
    fail: Arc<AtomicBool>,
}

/// [`MockOutput`] 的探针
#[derive(Debug, Clone)]
pub struct MockOutputProbe {
    log: Arc<Mutex<OutputLog>>,
    fail: Arc<AtomicBool>,
}

impl MockOutput {
    pub fn new() -> (Self, MockOutputProbe) {
        let log = Arc::new(Mutex::new(OutputLog::default()));
        let fail = Arc::new(AtomicBool::new(false));
        (
            Self {
                log: log.clone(),
                fail: fail.clone(),
            },
            MockOutputProbe { log, fail },
        )
    }

    fn write(&mut self, high: bool) -> Result<(), HalError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(HalError::Device(HalDeviceError::new(
                HalDeviceErrorKind::Backend,
                "mock output failure",
            )));
        }
        let mut log = self.log.lock().map_err(|_| HalError::Closed)?;
        log.writes += 1;
        if log.level != high {
            log.level = high;
            log.transitions.push((Instant::now(), high));
        }
        Ok(())
    }
}

impl DigitalOutput for MockOutput {
    fn set_high(&mut self) -> Result<(), HalError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        self.write(false)
    }
}

impl MockOutputProbe {
    /// 当前电平
    pub fn is_high(&self) -> bool {
        self.log.lock().map(|l| l.level).unwrap_or(false)
    }

    /// 总写入次数（含重复写入同一电平）
    pub fn writes(&self) -> u64 {
        self.log.lock().map(|l| l.writes).unwrap_or(0)
    }

    /// 电平变化次数
    pub fn transition_count(&self) -> usize {
        self.log.lock().map(|l| l.transitions.len()).unwrap_or(0)
    }

    /// 电平变化记录副本
    pub fn transitions(&self) -> Vec<(Instant, bool)> {
        self.log
            .lock()
            .map(|l| l.transitions.clone())
            .unwrap_or_default()
    }

    /// 让后续写入失败
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

// ============================================================================
// 串口
// ============================================================================

/// Mock 串口：记录写出的字节，入站字节由句柄注入
#[derive(Debug)]
pub struct MockTransport {
    written: Arc<Mutex<Vec<u8>>>,
    inbound: Receiver<u8>,
    fail_writes: Arc<AtomicBool>,
    write_calls: Arc<AtomicU64>,
}

/// [`MockTransport`] 的句柄
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    written: Arc<Mutex<Vec<u8>>>,
    inbound: Sender<u8>,
    fail_writes: Arc<AtomicBool>,
    write_calls: Arc<AtomicU64>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = unbounded();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let write_calls = Arc::new(AtomicU64::new(0));
        (
            Self {
                written: written.clone(),
                inbound: rx,
                fail_writes: fail_writes.clone(),
                write_calls: write_calls.clone(),
            },
            MockTransportHandle {
                written,
                inbound: tx,
                fail_writes,
                write_calls,
            },
        )
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(HalError::Io(std::io::Error::from(
                std::io::ErrorKind::WouldBlock,
            )));
        }
        self.written
            .lock()
            .map_err(|_| HalError::Closed)?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>, HalError> {
        match self.inbound.try_recv() {
            Ok(b) => Ok(Some(b)),
            // 句柄全部释放后视为线路安静，而不是错误
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }
}

impl MockTransportHandle {
    /// 注入一个入站字节
    pub fn send_byte(&self, byte: u8) {
        let _ = self.inbound.send(byte);
    }

    /// 已写出字节的副本
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// 取出并清空已写出字节
    pub fn take_written(&self) -> Vec<u8> {
        self.written
            .lock()
            .map(|mut w| std::mem::take(&mut *w))
            .unwrap_or_default()
    }

    /// `write` 调用次数（含失败）
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// 让后续写入失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

// ============================================================================
// 采集
// ============================================================================

/// Mock 采集源：测试线程通过 [`MockFrameFeeder`] 推送原始帧
///
/// 队列为空时报告“未就绪”；所有 feeder 释放且队列取空后报告 [`HalError::Closed`]。
#[derive(Debug)]
pub struct MockFrameSource {
    width: usize,
    height: usize,
    frames: Receiver<Vec<u8>>,
    current: Option<Vec<u8>>,
    released: Arc<AtomicU64>,
    last_downsample: Arc<AtomicU8>,
}

/// [`MockFrameSource`] 的句柄
#[derive(Debug, Clone)]
pub struct MockFrameFeeder {
    width: usize,
    height: usize,
    frames: Sender<Vec<u8>>,
    released: Arc<AtomicU64>,
    last_downsample: Arc<AtomicU8>,
}

impl MockFrameSource {
    pub fn new(width: usize, height: usize) -> (Self, MockFrameFeeder) {
        let (tx, rx) = unbounded();
        let released = Arc::new(AtomicU64::new(0));
        let last_downsample = Arc::new(AtomicU8::new(0));
        (
            Self {
                width,
                height,
                frames: rx,
                current: None,
                released: released.clone(),
                last_downsample: last_downsample.clone(),
            },
            MockFrameFeeder {
                width,
                height,
                frames: tx,
                released,
                last_downsample,
            },
        )
    }
}

impl FrameSource for MockFrameSource {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn begin_read(&mut self) -> Result<Option<&[u8]>, HalError> {
        if self.current.is_none() {
            match self.frames.try_recv() {
                Ok(frame) => self.current = Some(frame),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(HalError::Closed),
            }
        }
        Ok(self.current.as_deref())
    }

    fn end_read(&mut self, downsample_level: u8) -> Result<(), HalError> {
        self.current = None;
        self.released.fetch_add(1, Ordering::Relaxed);
        self.last_downsample.store(downsample_level, Ordering::Relaxed);
        Ok(())
    }
}

impl MockFrameFeeder {
    /// 推送原始 RGBA 帧
    ///
    /// 长度不做检查，便于测试驱动层对截断缓冲的处理。
    pub fn push_raw(&self, frame: Vec<u8>) {
        let _ = self.frames.send(frame);
    }

    /// 推送单通道强度图（行优先，W×H），写入指定通道，其余通道填 0
    pub fn push_intensity(&self, intensity: &[u8], channel: usize) {
        let mut raw = vec![0u8; self.width * self.height * CHANNELS_PER_PIXEL];
        for (i, &v) in intensity.iter().enumerate() {
            raw[i * CHANNELS_PER_PIXEL + channel] = v;
        }
        self.push_raw(raw);
    }

    /// 已释放（end_read）的帧数
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// 队列中尚未被读取的帧数
    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    /// 最近一次 end_read 的降采样级别
    pub fn last_downsample(&self) -> u8 {
        self.last_downsample.load(Ordering::Relaxed)
    }
}
