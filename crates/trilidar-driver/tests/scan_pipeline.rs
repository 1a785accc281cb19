//! 扫描循环端到端测试（mock 采集源 / 串口 / 激光输出）

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use trilidar_driver::{
    CameraConfig, DriverError, ScanLoop, ScannerBuilder, ScannerConfig, SensorContext, StepOutcome,
    StrobeConfig,
};
use trilidar_hal::HalError;
use trilidar_hal::mock::{
    MockFrameFeeder, MockFrameSource, MockOutput, MockTransport, MockTransportHandle,
};
use trilidar_protocol::{EncodedSample, StreamDecoder};

const WIDTH: usize = 8;
const HEIGHT: usize = 20;
const CHANNEL: usize = 2;

fn config() -> ScannerConfig {
    ScannerConfig {
        camera: CameraConfig {
            width: WIDTH,
            height: HEIGHT,
            ..CameraConfig::default()
        },
        strobe: StrobeConfig {
            frequency_hz: 100.0,
            ..StrobeConfig::default()
        },
        ..ScannerConfig::default()
    }
}

/// 第 5 行为 50、其余为 0：每列距离行 14，粗值 4，编码 64
fn stripe_frame() -> Vec<u8> {
    let mut intensity = vec![0u8; WIDTH * HEIGHT];
    for j in 0..WIDTH {
        intensity[5 * WIDTH + j] = 50;
    }
    intensity
}

fn scan_loop() -> (
    ScanLoop<MockFrameSource, MockTransport>,
    MockFrameFeeder,
    MockTransportHandle,
) {
    let (source, feeder) = MockFrameSource::new(WIDTH, HEIGHT);
    let (transport, handle) = MockTransport::new();
    let scan = ScanLoop::new(source, transport, Arc::new(SensorContext::new()), &config()).unwrap();
    (scan, feeder, handle)
}

fn push_rotation(feeder: &MockFrameFeeder, analyzed: &[u8]) {
    let blank = vec![0u8; WIDTH * HEIGHT];
    feeder.push_intensity(&blank, CHANNEL);
    feeder.push_intensity(&blank, CHANNEL);
    feeder.push_intensity(analyzed, CHANNEL);
}

#[test]
fn test_single_stripe_frame_bytes() {
    let (mut scan, feeder, handle) = scan_loop();
    push_rotation(&feeder, &stripe_frame());

    assert_eq!(scan.step().unwrap(), StepOutcome::Skipped);
    assert_eq!(scan.step().unwrap(), StepOutcome::Skipped);
    assert!(handle.written().is_empty());

    let StepOutcome::Analyzed(report) = scan.step().unwrap() else {
        panic!("third frame should be analyzed");
    };
    assert_eq!(report.units, WIDTH / 2 + 1);
    assert_eq!(report.detected_columns, WIDTH);

    let mut expected = Vec::new();
    for _ in 0..WIDTH / 2 {
        expected.extend_from_slice(&[0x00, 4, 4]);
    }
    expected.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
    assert_eq!(handle.written(), expected);
    assert_eq!(feeder.released(), 3);
}

#[test]
fn test_decoder_recovers_profile() {
    let (mut scan, feeder, handle) = scan_loop();
    push_rotation(&feeder, &stripe_frame());
    for _ in 0..3 {
        scan.step().unwrap();
    }

    let profiles = StreamDecoder::new().push(&handle.written()).unwrap();
    assert_eq!(profiles.len(), 1);
    let values: Vec<Option<i32>> = profiles[0].detections().collect();
    assert_eq!(values, vec![Some(64); WIDTH]);
}

#[test]
fn test_blank_frame_emits_sentinels() {
    let (mut scan, feeder, handle) = scan_loop();
    push_rotation(&feeder, &vec![0u8; WIDTH * HEIGHT]);
    for _ in 0..3 {
        scan.step().unwrap();
    }

    let written = handle.written();
    assert_eq!(written.len(), (WIDTH / 2 + 1) * 3);
    for unit in written[..written.len() - 3].chunks(3) {
        assert_eq!(unit, &[0x00, 254, 254]);
    }
    assert_eq!(&written[written.len() - 3..], &[0xFF, 0xFF, 0xFF]);

    let snap = scan.context().metrics.snapshot();
    assert_eq!(snap.columns_undetected, WIDTH as u64);
    assert_eq!(snap.columns_detected, 0);
}

#[test]
fn test_suspend_skips_acquisition_until_resume() {
    let (mut scan, feeder, handle) = scan_loop();
    push_rotation(&feeder, &stripe_frame());

    handle.send_byte(b's');
    assert_eq!(scan.step().unwrap(), StepOutcome::Idle);
    assert_eq!(scan.step().unwrap(), StepOutcome::Idle);
    assert_eq!(feeder.queued(), 3);
    assert_eq!(scan.slot(), 0);

    // 未知字节被忽略
    handle.send_byte(b'?');
    assert_eq!(scan.step().unwrap(), StepOutcome::Idle);

    handle.send_byte(b'r');
    assert_eq!(scan.step().unwrap(), StepOutcome::Skipped);
    assert_eq!(feeder.queued(), 2);
}

#[test]
fn test_capture_error_is_surfaced() {
    let (mut scan, feeder, _handle) = scan_loop();
    drop(feeder);
    let err = scan.run().unwrap_err();
    assert!(matches!(err, DriverError::Hal(HalError::Closed)));
}

#[test]
fn test_truncated_frame_is_rejected() {
    let (mut scan, feeder, _handle) = scan_loop();
    feeder.push_intensity(&vec![0u8; WIDTH * HEIGHT], CHANNEL);
    feeder.push_intensity(&vec![0u8; WIDTH * HEIGHT], CHANNEL);
    feeder.push_raw(vec![0u8; 10]);

    scan.step().unwrap();
    scan.step().unwrap();
    assert!(matches!(scan.step(), Err(DriverError::InvalidFrame(_))));
    // 无效帧也已归还采集源，轮转不受影响
    assert_eq!(feeder.released(), 3);
    assert_eq!(scan.slot(), 0);

    push_rotation(&feeder, &stripe_frame());
    assert_eq!(scan.step().unwrap(), StepOutcome::Skipped);
    assert_eq!(scan.step().unwrap(), StepOutcome::Skipped);
    assert!(matches!(scan.step().unwrap(), StepOutcome::Analyzed(_)));
    assert_eq!(feeder.released(), 6);
}

#[test]
fn test_transport_failures_do_not_stop_scanning() {
    let (mut scan, feeder, handle) = scan_loop();
    handle.set_fail_writes(true);
    push_rotation(&feeder, &stripe_frame());
    push_rotation(&feeder, &stripe_frame());

    for _ in 0..3 {
        scan.step().unwrap();
    }
    handle.set_fail_writes(false);
    for _ in 0..3 {
        scan.step().unwrap();
    }

    let snap = scan.context().metrics.snapshot();
    assert_eq!(snap.frames_analyzed, 2);
    assert_eq!(snap.transport_write_errors, (WIDTH / 2 + 1) as u64);
    assert_eq!(handle.written().len(), (WIDTH / 2 + 1) * 3);
}

#[test]
fn test_scanner_runs_until_shutdown() {
    let (output, probe) = MockOutput::new();
    let (source, feeder) = MockFrameSource::new(WIDTH, HEIGHT);
    let (transport, handle) = MockTransport::new();
    let ctx = Arc::new(SensorContext::new());

    let scanner = ScannerBuilder::new()
        .config(config())
        .context(ctx.clone())
        .build(output, source, transport)
        .unwrap();
    assert!(scanner.is_strobe_running());

    let worker = thread::spawn(move || scanner.run());

    push_rotation(&feeder, &stripe_frame());
    push_rotation(&feeder, &stripe_frame());

    let deadline = Instant::now() + Duration::from_secs(2);
    while ctx.metrics.snapshot().frames_analyzed < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    ctx.request_shutdown();

    let snapshot = worker.join().unwrap().unwrap();
    assert_eq!(snapshot.frames_analyzed, 2);
    assert_eq!(snapshot.frames_acquired, 6);
    assert!(snapshot.strobe_toggles > 0);
    assert!(!probe.is_high(), "laser must be low after shutdown");
    assert_eq!(handle.written().len(), 2 * (WIDTH / 2 + 1) * 3);
}

#[test]
fn test_builder_rejects_invalid_config_without_starting_strobe() {
    let (output, probe) = MockOutput::new();
    let (source, _feeder) = MockFrameSource::new(WIDTH, HEIGHT);
    let (transport, _handle) = MockTransport::new();

    let mut bad = config();
    bad.scan.analyze_slot = 7;
    let result = ScannerBuilder::new().config(bad).build(output, source, transport);
    assert!(matches!(result, Err(DriverError::Config(_))));
    assert_eq!(probe.writes(), 0);
}

#[test]
fn test_detected_value_at_cap_reads_as_no_detection() {
    // 足够高的图像才能让粗值达到 254：峰值在第 3 行，距离行 516，516 - 260 = 256 → 254
    let (width, height) = (2, 520);
    let cfg = ScannerConfig {
        camera: CameraConfig {
            width,
            height,
            ..CameraConfig::default()
        },
        ..ScannerConfig::default()
    };
    let (source, feeder) = MockFrameSource::new(width, height);
    let (transport, handle) = MockTransport::new();
    let mut scan = ScanLoop::new(source, transport, Arc::new(SensorContext::new()), &cfg).unwrap();

    let mut intensity = vec![0u8; width * height];
    intensity[3 * width] = 200;
    feeder.push_intensity(&vec![0u8; width * height], CHANNEL);
    feeder.push_intensity(&vec![0u8; width * height], CHANNEL);
    feeder.push_intensity(&intensity, CHANNEL);
    for _ in 0..3 {
        scan.step().unwrap();
    }

    let column = scan.analyzer().results()[0];
    assert!(column.detected);
    assert_eq!(column.encoded, EncodedSample::NO_DETECTION);

    let profiles = StreamDecoder::new().push(&handle.written()).unwrap();
    assert_eq!(profiles[0].detections().collect::<Vec<_>>(), vec![None, None]);
}
