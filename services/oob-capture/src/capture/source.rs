//! Logic-analyser capture via sigrok-cli process or raw sample file
//!
//! Spawns sigrok-cli to stream raw logic samples (binary output format),
//! then pushes every chunk through the OOB decoder on a dedicated thread.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fs::File;
use std::io::{BufRead, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::format::{SampleAssembler, SampleFormat};
use super::stats::CaptureStats;
use crate::oob::{ChannelMasks, DecodeEvent, DecodeSink, OobDecoder};

/// Delay before respawning a capture process that stopped
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Decoded byte batches buffered between capture thread and writer
const CHANNEL_DEPTH: usize = 256;

/// Where raw samples come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Live capture through sigrok-cli
    Process {
        program: String,
        driver: String,
        sample_rate: u32,
    },
    /// Replay of a raw sample file ("-" reads stdin)
    File(PathBuf),
}

impl CaptureSource {
    fn is_live(&self) -> bool {
        matches!(self, CaptureSource::Process { .. })
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    pub format: SampleFormat,
    pub masks: ChannelMasks,
    /// Read size in bytes
    pub chunk_size: usize,
}

/// Build the sigrok-cli command line for continuous binary capture
fn build_command(program: &str, driver: &str, sample_rate: u32) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("--driver").arg(driver)
       .arg("--config").arg(format!("samplerate={}", sample_rate))
       .arg("--continuous")
       .arg("--output-format").arg("binary");
    cmd
}

/// Logs decoder events and collects the bytes of one chunk
struct ChunkSink<'a> {
    bytes: Vec<u8>,
    stats: &'a CaptureStats,
}

impl DecodeSink for ChunkSink<'_> {
    fn on_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn on_event(&mut self, event: DecodeEvent) {
        match event {
            DecodeEvent::SyncAcquired { sync_byte } => {
                info!("Sync OK (sync byte {:#04x})", sync_byte);
            }
            DecodeEvent::SyncLost => {
                warn!("Sync lost, resynchronizing");
            }
            DecodeEvent::ByteRejected { byte } => {
                trace!("Rejected byte {:#04x}, dropping one bit", byte);
            }
        }
        self.stats.record_event(&event);
    }
}

/// Turns raw capture reads into decoded transport-stream bytes
pub struct ChunkProcessor {
    decoder: OobDecoder,
    format: SampleFormat,
    assembler: SampleAssembler,
    words: Vec<u16>,
    stats: Arc<CaptureStats>,
}

impl ChunkProcessor {
    pub fn new(format: SampleFormat, masks: ChannelMasks, stats: Arc<CaptureStats>) -> Self {
        Self {
            decoder: OobDecoder::new(masks),
            format,
            assembler: SampleAssembler::new(),
            words: Vec::new(),
            stats,
        }
    }

    /// Decode one raw read; returns the accepted bytes
    pub fn process(&mut self, raw: &[u8]) -> Vec<u8> {
        let mut sink = ChunkSink {
            bytes: Vec::new(),
            stats: &self.stats,
        };

        let samples = match self.format {
            SampleFormat::Logic8 => {
                self.decoder.feed(raw, &mut sink);
                raw.len()
            }
            SampleFormat::Logic16 => {
                self.words.clear();
                self.assembler.push(raw, &mut self.words);
                self.decoder.feed(&self.words, &mut sink);
                self.words.len()
            }
        };

        self.stats.record_chunk(samples);
        self.stats.record_bytes(sink.bytes.len());
        self.stats.set_packets(self.decoder.stats.packets_completed);

        sink.bytes
    }

    /// Forget a half-received sample from a stream that ended
    pub fn discard_partial(&mut self) {
        if self.assembler.has_pending() {
            debug!("Discarding partial sample from previous capture");
            self.assembler = SampleAssembler::new();
        }
    }

    pub fn decoder(&self) -> &OobDecoder {
        &self.decoder
    }
}

/// Logic capture controller
pub struct LogicCapture {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl LogicCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
        }
    }

    /// Start capturing and return a receiver for decoded byte batches
    pub fn start(&self) -> Result<Receiver<Vec<u8>>> {
        info!("===========================================");
        info!("  Starting OOB Logic Capture");
        info!("===========================================");
        match &self.config.source {
            CaptureSource::Process { program, driver, sample_rate } => {
                info!("  Capture program: {}", program);
                info!("  Driver: {}", driver);
                info!("  Sample rate: {} MHz", *sample_rate as f32 / 1_000_000.0);
            }
            CaptureSource::File(path) => {
                info!("  Replaying: {}", path.display());
            }
        }
        info!("  Sample format: {:?}", self.config.format);
        info!(
            "  DRX mask: {:#06x}, CRX mask: {:#06x}",
            self.config.masks.drx(),
            self.config.masks.crx()
        );

        let (bytes_tx, bytes_rx) = bounded::<Vec<u8>>(CHANNEL_DEPTH);

        let config = self.config.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("oob-capture".to_string())
            .spawn(move || {
                if let Err(e) = run_capture(config, running.clone(), stats, bytes_tx) {
                    error!("Capture error: {:#}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .context("Failed to spawn capture thread")?;

        Ok(bytes_rx)
    }

    /// Stop capturing
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping capture...");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag shared with the capture thread; clearing it stops the capture
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }
}

impl Drop for LogicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_process(program: &str, driver: &str, sample_rate: u32) -> Result<Child> {
    let mut cmd = build_command(program, driver, sample_rate);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    info!("Executing: {:?}", cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}. Make sure sigrok-cli is installed and in PATH", program))?;

    // Relay capture tool messages to the log
    if let Some(stderr) = child.stderr.take() {
        thread::spawn(move || {
            let reader = std::io::BufReader::new(stderr);
            for line in reader.lines().map_while(|line| line.ok()) {
                if !line.trim().is_empty() {
                    info!("[sigrok] {}", line.trim());
                }
            }
        });
    }

    Ok(child)
}

fn open_file(path: &Path) -> Result<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

/// Main capture loop (runs in dedicated thread)
fn run_capture(
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    bytes_tx: Sender<Vec<u8>>,
) -> Result<()> {
    let mut processor = ChunkProcessor::new(config.format, config.masks, stats.clone());
    let lossy = config.source.is_live();

    while running.load(Ordering::SeqCst) {
        let end = match &config.source {
            CaptureSource::File(path) => {
                let mut reader = open_file(path)?;
                let end = pump(&mut reader, &mut processor, config.chunk_size, &running, &bytes_tx, lossy)?;
                info!("Replay finished");
                if end == StreamEnd::Eof {
                    break;
                }
                end
            }
            CaptureSource::Process { program, driver, sample_rate } => {
                let mut child = spawn_process(program, driver, *sample_rate)?;
                let mut stdout = child
                    .stdout
                    .take()
                    .context("Failed to capture sigrok-cli stdout")?;

                let end = match pump(&mut stdout, &mut processor, config.chunk_size, &running, &bytes_tx, lossy) {
                    Ok(end) => end,
                    Err(e) => {
                        error!("Error reading capture data: {:#}", e);
                        StreamEnd::Eof
                    }
                };

                let _ = child.kill();
                let _ = child.wait();
                processor.discard_partial();

                if end == StreamEnd::Eof && running.load(Ordering::SeqCst) {
                    error!(
                        "Capture stopped. It will restart automatically; the data will have gaps."
                    );
                    stats.record_restart();
                    thread::sleep(RESTART_DELAY);
                }
                end
            }
        };

        if end == StreamEnd::OutputClosed {
            warn!("Output channel closed, stopping capture");
            break;
        }
    }

    let decoder = processor.decoder();
    let decoder_stats = &decoder.stats;
    info!("Capture stopped");
    if decoder.is_synchronized() {
        info!("Decoder left synchronized ({:?})", decoder.sync_state());
    } else {
        info!("Decoder left searching for sync");
    }
    info!(
        "Final stats: Samples={}, Bits={}, Bytes={}, Packets={}, Rejected={}, Sync lost={}",
        decoder_stats.samples_processed,
        decoder_stats.bits_received,
        decoder_stats.bytes_emitted,
        decoder_stats.packets_completed,
        decoder_stats.bytes_rejected,
        decoder_stats.sync_lost
    );

    Ok(())
}

/// Why a sample stream stopped being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Eof,
    Stopped,
    OutputClosed,
}

/// Read `reader` to EOF (or until stopped), forwarding decoded bytes.
/// Lossy mode never blocks the reader: batches are dropped when the
/// channel is full.
fn pump<R: Read + ?Sized>(
    reader: &mut R,
    processor: &mut ChunkProcessor,
    chunk_size: usize,
    running: &AtomicBool,
    bytes_tx: &Sender<Vec<u8>>,
    lossy: bool,
) -> Result<StreamEnd> {
    let mut buffer = vec![0u8; chunk_size];
    let mut first_data = true;

    while running.load(Ordering::SeqCst) {
        let n_read = match reader.read(&mut buffer) {
            Ok(0) => {
                warn!("Capture stream closed (EOF)");
                return Ok(StreamEnd::Eof);
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Capture read failed"),
        };

        if first_data {
            info!("First sample data received! ({} bytes)", n_read);
            first_data = false;
        }

        let bytes = processor.process(&buffer[..n_read]);
        if bytes.is_empty() {
            continue;
        }

        if lossy {
            match bytes_tx.try_send(bytes) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    debug!("Output channel full, dropping {} decoded bytes", dropped.len());
                }
                Err(TrySendError::Disconnected(_)) => return Ok(StreamEnd::OutputClosed),
            }
        } else if bytes_tx.send(bytes).is_err() {
            return Ok(StreamEnd::OutputClosed);
        }
    }

    Ok(StreamEnd::Stopped)
}
