//! decode 命令
//!
//! 把串口抓到的字节流解码为逐帧的距离剖面，每帧一行

use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::warn;
use trilidar_protocol::{DecodedProfile, StreamDecoder};

/// 解码命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 输入文件，`-` 或缺省时读取标准输入
    pub input: Option<PathBuf>,

    /// 只打印每帧的统计信息
    #[arg(long)]
    pub summary: bool,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let mut reader: Box<dyn Read> = match &self.input {
            Some(path) if path.as_os_str() != "-" => Box::new(
                File::open(path).with_context(|| format!("open {}", path.display()))?,
            ),
            _ => Box::new(io::stdin().lock()),
        };

        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        let mut decoder = StreamDecoder::new();
        let mut buf = [0u8; 4096];
        let mut index = 0usize;

        loop {
            let n = reader.read(&mut buf).context("read input")?;
            if n == 0 {
                break;
            }

            let mut write_result = Ok(());
            let fed = decoder.feed(&buf[..n], |profile| {
                if write_result.is_ok() {
                    write_result = write_profile(&mut out, index, &profile, self.summary);
                }
                index += 1;
            });
            write_result?;
            if let Err(e) = fed {
                warn!("Discarding malformed profile: {}", e);
            }
        }

        if decoder.pending_columns() > 0 {
            warn!(
                "Input ended mid-frame ({} columns without delimiter)",
                decoder.pending_columns()
            );
        }
        out.flush()?;
        Ok(())
    }
}

fn write_profile(
    out: &mut impl Write,
    index: usize,
    profile: &DecodedProfile,
    summary: bool,
) -> io::Result<()> {
    if summary {
        return writeln!(
            out,
            "#{} columns={} detected={}",
            index,
            profile.len(),
            profile.detected_count()
        );
    }

    write!(out, "#{}", index)?;
    for value in profile.detections() {
        match value {
            Some(v) => write!(out, " {}", v)?,
            None => write!(out, " -")?,
        }
    }
    writeln!(out)
}
