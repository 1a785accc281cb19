//! 扫描线分析性能基准
//!
//! 全分辨率（640×480）单帧：通道抽取、逐列峰值检测、编码输出。

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trilidar_driver::{AnalyzerConfig, DistanceEncoder, IntensityFrame, ScanMetrics, ScanlineAnalyzer};
use trilidar_hal::{HalError, Transport};

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

/// 丢弃所有写入的串口
struct NullTransport;

impl Transport for NullTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        black_box(bytes);
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>, HalError> {
        Ok(None)
    }
}

/// 低噪声背景上叠加一条缓慢弯曲的激光线
fn build_raw_frame() -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut raw = vec![0u8; WIDTH * HEIGHT * 4];
    for px in raw.chunks_exact_mut(4) {
        px[2] = rng.gen_range(0..6);
    }
    for x in 0..WIDTH {
        let y = 60 + (x as f64 / 40.0).sin().mul_add(30.0, 30.0) as usize;
        for (dy, v) in [(0usize, 120u8), (1, 255), (2, 120)] {
            raw[((y + dy) * WIDTH + x) * 4 + 2] = v;
        }
    }
    raw
}

fn bench_analyze(c: &mut Criterion) {
    let raw = build_raw_frame();
    let mut frame = IntensityFrame::new(WIDTH, HEIGHT);
    let mut analyzer = ScanlineAnalyzer::new(AnalyzerConfig::default(), WIDTH, HEIGHT).unwrap();

    c.bench_function("load_channel_640x480", |b| {
        b.iter(|| frame.load_channel(black_box(&raw), 2).unwrap());
    });

    frame.load_channel(&raw, 2).unwrap();
    c.bench_function("analyze_640x480", |b| {
        b.iter(|| {
            let results = analyzer.analyze(black_box(&frame)).unwrap();
            black_box(results.len());
        });
    });
}

fn bench_analyze_and_encode(c: &mut Criterion) {
    let raw = build_raw_frame();
    let mut frame = IntensityFrame::new(WIDTH, HEIGHT);
    let mut analyzer = ScanlineAnalyzer::new(AnalyzerConfig::default(), WIDTH, HEIGHT).unwrap();
    let mut encoder = DistanceEncoder::new();
    let mut transport = NullTransport;
    let metrics = ScanMetrics::new();

    c.bench_function("full_frame_640x480", |b| {
        b.iter(|| {
            frame.load_channel(black_box(&raw), 2).unwrap();
            let results = analyzer.analyze(&frame).unwrap();
            let report = encoder.encode_frame(results, &mut transport, &metrics).unwrap();
            black_box(report);
        });
    });
}

criterion_group!(benches, bench_analyze, bench_analyze_and_encode);
criterion_main!(benches);
