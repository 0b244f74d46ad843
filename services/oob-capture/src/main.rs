//! OOB Capture - QPSK-demodulated out-of-band transport stream from a logic analyser
//!
//! Samples the CRX/DRX lines, recovers bits on CRX falling edges, and
//! writes byte-aligned 192-byte transport packets to stdout or a file.

mod capture;
mod config;
mod oob;
mod output;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::Write;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use capture::LogicCapture;
use config::Config;
use output::OutputWriter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout carries the transport stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oob_capture=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let started = chrono::Utc::now();

    info!("===========================================");
    info!("   OOB Capture - Logic Analyser");
    info!("   CRX/DRX transport stream decoder");
    info!("===========================================");

    let config = Config::from_env().context("Invalid configuration")?;
    let capture_config = config
        .capture_config()
        .context("Invalid configuration")?;
    let output_format = config.format()?;

    info!("Configuration:");
    match &config.capture_file {
        Some(path) => info!("  Capture file: {}", path.display()),
        None => {
            info!("  sigrok-cli: {} (driver {})", config.sigrok_cli_path, config.sigrok_driver);
            info!("  Sample rate: {} Hz", config.sample_rate_hz);
        }
    }
    info!("  Sample width: {} byte(s)", config.sample_width);
    info!("  DRX channel: {}, CRX channel: {}", config.drx_channel, config.crx_channel);
    info!("  Output: {} ({:?})", config.output_path, output_format);

    let mut writer = OutputWriter::open(&config.output_path, output_format)?;

    let capture = LogicCapture::new(capture_config);
    let bytes_rx = match capture.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Failed to start capture: {}", e);
            return Err(e);
        }
    };

    // Ctrl+C stops the capture thread; the loop below drains and exits
    let running = capture.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            running.store(false, Ordering::SeqCst);
        }
    });

    info!("===========================================");
    info!("  Starting capture...");
    info!("  Session started {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    forward_output(
        &capture,
        &bytes_rx,
        &mut writer,
        Duration::from_secs(config.stats_interval_secs),
    );

    capture.stop();
    if let Err(e) = writer.finish() {
        warn!("Failed to flush output: {}", e);
    }

    let elapsed = chrono::Utc::now() - started;
    info!("[Stats] {}", capture.stats().snapshot());
    info!(
        "Shutdown complete. Bytes written: {} in {}s",
        writer.bytes_written(),
        elapsed.num_seconds()
    );
    Ok(())
}

/// Write decoded batches until the capture ends or is stopped
fn forward_output<W: Write>(
    capture: &LogicCapture,
    bytes_rx: &Receiver<Vec<u8>>,
    writer: &mut OutputWriter<W>,
    stats_interval: Duration,
) {
    let mut last_stats = Instant::now();

    loop {
        match bytes_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(bytes) => {
                if let Err(e) = writer.write_batch(&bytes) {
                    error!("Failed to write output: {}", e);
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // No decoded data, continue with periodic tasks
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("Capture finished");
                return;
            }
        }

        // The capture thread may be parked in a blocking read
        if !capture.is_running() {
            for bytes in bytes_rx.try_iter() {
                if let Err(e) = writer.write_batch(&bytes) {
                    error!("Failed to write output: {}", e);
                    return;
                }
            }
            info!("Capture no longer running, exiting");
            return;
        }

        if last_stats.elapsed() >= stats_interval {
            info!("[Stats] {}", capture.stats().snapshot());
            last_stats = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::{CaptureConfig, CaptureSource, SampleFormat};
    use oob::ChannelMasks;
    use output::OutputFormat;
    use std::fs::{self, OpenOptions};
    use std::path::PathBuf;

    fn replay_capture(path: PathBuf) -> LogicCapture {
        LogicCapture::new(CaptureConfig {
            source: CaptureSource::File(path),
            format: SampleFormat::Logic8,
            masks: ChannelMasks::default(),
            chunk_size: 64,
        })
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_ends_output_on_idle_source() {
        let path = std::env::temp_dir().join(format!("oob-capture-idle-{}.fifo", std::process::id()));
        fs::remove_file(&path).ok();
        let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());

        // Read+write open does not wait for a reader; the pipe stays quiet
        let quiet = OpenOptions::new().read(true).write(true).open(&path).unwrap();

        let capture = replay_capture(path.clone());
        let rx = capture.start().unwrap();
        assert!(capture.is_running());

        capture.running_flag().store(false, Ordering::SeqCst);
        assert!(!capture.is_running());

        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Binary);
        let started = Instant::now();
        forward_output(&capture, &rx, &mut writer, Duration::from_secs(60));

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(writer.bytes_written(), 0);

        drop(quiet);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_output_drains_finished_replay() {
        let path = std::env::temp_dir().join(format!("oob-capture-drain-{}.bin", std::process::id()));
        let mut packet: Vec<u8> = (0..192).map(|i| i as u8).collect();
        packet[0] = 0x47;
        let mut samples = Vec::new();
        for &b in &packet {
            for i in (0..8).rev() {
                let drx = (b >> i) & 1;
                samples.extend([0x02 | drx; 4]);
                samples.extend([drx; 4]);
            }
        }
        fs::write(&path, &samples).unwrap();

        let capture = replay_capture(path.clone());
        let rx = capture.start().unwrap();
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Binary);
        forward_output(&capture, &rx, &mut writer, Duration::from_secs(60));
        fs::remove_file(&path).ok();

        assert_eq!(writer.into_inner(), packet);
    }
}
