//! 激光频闪控制
//!
//! 独立线程按频率/占空比翻转激光使能线。每次翻转后，下一个截止时间由
//! **上一个计划时间**加上名义时长得到（而不是测量到的当前时间），
//! 睡眠与调度抖动因此不会累积。
//!
//! 传感器暂停时输出保持低电平，线程以 `idle_poll` 间隔轮询；恢复后从当前时刻
//! 重新建立时间锚点。线程退出前总是把输出拉低。

use crate::config::StrobeConfig;
use crate::context::SensorContext;
use crate::error::DriverError;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use trilidar_hal::DigitalOutput;

/// 线程退出等待上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 一个频闪周期的高/低电平时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrobeTiming {
    on: Duration,
    off: Duration,
}

impl StrobeTiming {
    /// 由频率和占空比计算
    ///
    /// 低电平时长取 `period - on`，一个周期的两段之和严格等于周期。
    pub fn new(frequency_hz: f64, duty_cycle: f64) -> Result<Self, DriverError> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(DriverError::Config(format!(
                "Invalid strobe frequency: {} (must be > 0)",
                frequency_hz
            )));
        }
        if !(duty_cycle > 0.0 && duty_cycle < 1.0) {
            return Err(DriverError::Config(format!(
                "Invalid duty cycle: {} (must be in (0, 1))",
                duty_cycle
            )));
        }

        let period = Duration::from_secs_f64(1.0 / frequency_hz);
        let on = period.mul_f64(duty_cycle);
        Ok(Self {
            on,
            off: period - on,
        })
    }

    pub fn from_config(config: &StrobeConfig) -> Result<Self, DriverError> {
        Self::new(config.frequency_hz, config.duty_cycle)
    }

    pub fn on(&self) -> Duration {
        self.on
    }

    pub fn off(&self) -> Duration {
        self.off
    }

    pub fn period(&self) -> Duration {
        self.on + self.off
    }

    /// 指定电平的保持时长
    pub fn hold(&self, high: bool) -> Duration {
        if high { self.on } else { self.off }
    }
}

/// 频闪时间表
///
/// 保存当前电平和该电平的结束时刻。`advance` 翻转电平，并把截止时间向后累加
/// 新电平的名义时长。
#[derive(Debug, Clone)]
pub struct StrobeSchedule {
    timing: StrobeTiming,
    level: bool,
    deadline: Instant,
    toggles: u64,
}

impl StrobeSchedule {
    /// 在 `anchor` 时刻以高电平开始
    pub fn start(timing: StrobeTiming, anchor: Instant) -> Self {
        Self {
            timing,
            level: true,
            deadline: anchor + timing.on,
            toggles: 0,
        }
    }

    /// 当前应输出的电平
    pub fn level(&self) -> bool {
        self.level
    }

    /// 当前电平的结束时刻
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 自开始以来的翻转次数
    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    /// 翻转到下一电平，返回新电平
    pub fn advance(&mut self) -> bool {
        self.level = !self.level;
        self.deadline += self.timing.hold(self.level);
        self.toggles += 1;
        self.level
    }

    /// 当前电平改为在 `anchor` 结束，之后的截止时间从 `anchor` 起累加
    pub fn reanchor(&mut self, anchor: Instant) {
        self.deadline = anchor;
    }
}

/// 频闪循环
///
/// 在 `running` 为 false 或上下文请求退出时返回；返回前总是拉低输出。
/// 输出写失败时记录错误并退出，不向外传播。
pub fn strobe_loop<O: DigitalOutput>(
    mut output: O,
    timing: StrobeTiming,
    idle_poll: Duration,
    ctx: Arc<SensorContext>,
    running: Arc<AtomicBool>,
) {
    let sleeper = SpinSleeper::default();
    let should_stop = || !running.load(Ordering::Acquire) || ctx.is_shutdown_requested();
    let mut schedule: Option<StrobeSchedule> = None;
    let mut held_low = false;

    loop {
        if should_stop() {
            trace!("Strobe thread: stop requested, exiting");
            break;
        }

        if !ctx.is_active() {
            if schedule.take().is_some() || !held_low {
                debug!("Strobe paused, holding output low");
                if let Err(e) = output.set_low() {
                    error!("Strobe thread: failed to drive output low: {}", e);
                    break;
                }
                held_low = true;
            }
            thread::sleep(idle_poll);
            continue;
        }

        if held_low {
            debug!("Strobe resumed");
            held_low = false;
        }
        let schedule = schedule.get_or_insert_with(|| StrobeSchedule::start(timing, Instant::now()));

        if let Err(e) = output.set(schedule.level()) {
            error!("Strobe thread: failed to set laser output: {}", e);
            break;
        }
        ctx.metrics.strobe_toggles.fetch_add(1, Ordering::Relaxed);

        let deadline = schedule.deadline();
        let now = Instant::now();
        if deadline > now {
            // 分片睡眠，暂停/退出请求在一个轮询间隔内生效
            sleep_until(&sleeper, deadline, idle_poll, || should_stop() || !ctx.is_active());
        } else {
            ctx.metrics.strobe_overruns.fetch_add(1, Ordering::Relaxed);
            let lag = now - deadline;
            if lag > timing.period() {
                // 落后超过一整个周期：从当前时刻重新锚定，不补翻错过的周期
                warn!("Strobe overrun by {:?}, re-anchoring schedule", lag);
                schedule.reanchor(now);
            }
        }

        schedule.advance();
    }

    if let Err(e) = output.set_low() {
        error!("Strobe thread: failed to drive output low on exit: {}", e);
    }
    trace!("Strobe thread: loop exited");
}

/// 睡眠到 `deadline`，每片不超过 `slice`；`interrupted` 返回 true 时提前结束
fn sleep_until(
    sleeper: &SpinSleeper,
    deadline: Instant,
    slice: Duration,
    interrupted: impl Fn() -> bool,
) {
    loop {
        let now = Instant::now();
        if now >= deadline || interrupted() {
            return;
        }
        sleeper.sleep((deadline - now).min(slice));
    }
}

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 频闪控制器
///
/// 持有频闪线程；`stop()` 或 drop 时通知线程退出并等待（最多 2 秒）。
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use trilidar_driver::{SensorContext, StrobeConfig, StrobeController};
/// use trilidar_hal::SysfsGpioOutput;
///
/// let ctx = Arc::new(SensorContext::new());
/// let laser = SysfsGpioOutput::open(18).unwrap();
/// let strobe = StrobeController::spawn(laser, ctx.clone(), &StrobeConfig::default()).unwrap();
/// // ...
/// drop(strobe); // 输出被拉低
/// ```
#[derive(Debug)]
pub struct StrobeController {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    timing: StrobeTiming,
}

impl StrobeController {
    /// 启动频闪线程
    ///
    /// 启动前先把输出拉低；此时访问输出失败视为致命错误并直接返回。
    pub fn spawn<O>(
        mut output: O,
        ctx: Arc<SensorContext>,
        config: &StrobeConfig,
    ) -> Result<Self, DriverError>
    where
        O: DigitalOutput + Send + 'static,
    {
        let timing = StrobeTiming::from_config(config)?;
        output.set_low()?;

        let running = Arc::new(AtomicBool::new(true));
        let idle_poll = config.idle_poll();
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("trilidar-strobe".to_string())
            .spawn(move || {
                #[cfg(feature = "realtime")]
                {
                    use thread_priority::*;

                    match set_current_thread_priority(ThreadPriority::Max) {
                        Ok(_) => {
                            info!("Strobe thread priority set to MAX (realtime)");
                        },
                        Err(e) => {
                            warn!(
                                "Failed to set strobe thread priority: {:?}. \
                                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                                e
                            );
                        },
                    }
                }

                strobe_loop(output, timing, idle_poll, ctx, thread_running);
            })
            .map_err(|e| DriverError::ThreadSpawn(e.to_string()))?;

        info!(
            "Strobe started: on {:?} / off {:?} (period {:?})",
            timing.on(),
            timing.off(),
            timing.period()
        );

        Ok(Self {
            running,
            handle: Some(handle),
            timing,
        })
    }

    pub fn timing(&self) -> StrobeTiming {
        self.timing
    }

    /// 线程是否仍在运行（输出失败时会提前退出）
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止线程并等待其拉低输出后退出
    pub fn stop(&mut self) {
        // Release: 线程看到 false 时也能看到此前的写入
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if let Err(_e) = handle.join_timeout(JOIN_TIMEOUT) {
                error!(
                    "Strobe thread panicked or failed to shut down within {:?}",
                    JOIN_TIMEOUT
                );
            } else {
                info!("Strobe stopped");
            }
        }
    }
}

impl Drop for StrobeController {
    fn drop(&mut self) {
        self.stop();
    }
}
