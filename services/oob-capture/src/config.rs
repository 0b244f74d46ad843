//! Configuration loaded from environment variables

use std::path::PathBuf;
use thiserror::Error;

use crate::capture::{CaptureConfig, CaptureSource, SampleFormat};
use crate::oob::{ChannelMasks, DecodeError};
use crate::output::OutputFormat;

/// Largest accepted read size
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SAMPLE_WIDTH must be 1 or 2 bytes, got {0}")]
    SampleWidth(u8),
    #[error("{name} channel {channel} does not exist in a {channels}-channel capture")]
    ChannelOutOfRange {
        name: &'static str,
        channel: u8,
        channels: u32,
    },
    #[error("invalid channel assignment: {0}")]
    Channels(#[from] DecodeError),
    #[error("CHUNK_SIZE must be between 1 and 16777216 bytes, got {0}")]
    ChunkSize(usize),
    #[error("SAMPLE_RATE_HZ must be non-zero")]
    SampleRate,
    #[error("unknown OUTPUT_FORMAT '{0}' (expected binary or hex)")]
    OutputFormat(String),
    #[error("STATS_INTERVAL_SECS must be non-zero")]
    StatsInterval,
    #[error("{name}='{value}' is not a valid value")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Raw sample file to replay instead of live capture ("-" = stdin)
    pub capture_file: Option<PathBuf>,

    /// Path to sigrok-cli executable
    pub sigrok_cli_path: String,

    /// sigrok driver for the logic analyser
    pub sigrok_driver: String,

    /// Sample rate in Hz; at least 8x the CRX rate (4 MHz misses edges)
    pub sample_rate_hz: u32,

    /// Bytes per sample (1 = 8 channels, 2 = 16 channels)
    pub sample_width: u8,

    /// DRX (data) channel index
    pub drx_channel: u8,

    /// CRX (strobe) channel index
    pub crx_channel: u8,

    /// Capture read size in bytes
    pub chunk_size: usize,

    /// Output file ("-" = stdout)
    pub output_path: String,

    /// binary or hex
    pub output_format: String,

    /// Stats logging interval in seconds
    pub stats_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_file: None,
            sigrok_cli_path: "sigrok-cli".to_string(),
            sigrok_driver: "fx2lafw".to_string(),
            sample_rate_hz: 8_000_000,
            sample_width: 1,
            drx_channel: 0,
            crx_channel: 1,
            chunk_size: 64 * 1024,
            output_path: "-".to_string(),
            output_format: "binary".to_string(),
            stats_interval_secs: 5,
        }
    }
}

fn env_parse<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable lookup; unset variables keep
    /// their defaults, set but unparsable ones are errors
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            capture_file: lookup("CAPTURE_FILE").map(PathBuf::from),

            sigrok_cli_path: lookup("SIGROK_CLI_PATH")
                .unwrap_or(defaults.sigrok_cli_path),

            sigrok_driver: lookup("SIGROK_DRIVER")
                .unwrap_or(defaults.sigrok_driver),

            sample_rate_hz: env_parse(&lookup, "SAMPLE_RATE_HZ", defaults.sample_rate_hz)?,
            sample_width: env_parse(&lookup, "SAMPLE_WIDTH", defaults.sample_width)?,
            drx_channel: env_parse(&lookup, "DRX_CHANNEL", defaults.drx_channel)?,
            crx_channel: env_parse(&lookup, "CRX_CHANNEL", defaults.crx_channel)?,
            chunk_size: env_parse(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,

            output_path: lookup("OUTPUT_PATH")
                .unwrap_or(defaults.output_path),

            output_format: lookup("OUTPUT_FORMAT")
                .unwrap_or(defaults.output_format),

            stats_interval_secs: env_parse(&lookup, "STATS_INTERVAL_SECS", defaults.stats_interval_secs)?,
        })
    }

    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        SampleFormat::from_width(self.sample_width).ok_or(ConfigError::SampleWidth(self.sample_width))
    }

    pub fn masks(&self) -> Result<ChannelMasks, ConfigError> {
        let channels = self.sample_format()?.channels();
        for (name, channel) in [("DRX", self.drx_channel), ("CRX", self.crx_channel)] {
            if channel as u32 >= channels {
                return Err(ConfigError::ChannelOutOfRange { name, channel, channels });
            }
        }
        Ok(ChannelMasks::from_channels(self.drx_channel, self.crx_channel)?)
    }

    pub fn format(&self) -> Result<OutputFormat, ConfigError> {
        self.output_format.parse().map_err(ConfigError::OutputFormat)
    }

    /// Check every setting; fails on the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.masks()?;
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::SampleRate);
        }
        self.format()?;
        if self.stats_interval_secs == 0 {
            return Err(ConfigError::StatsInterval);
        }
        Ok(())
    }

    /// Capture settings derived from this configuration
    pub fn capture_config(&self) -> Result<CaptureConfig, ConfigError> {
        self.validate()?;

        let source = match &self.capture_file {
            Some(path) => CaptureSource::File(path.clone()),
            None => CaptureSource::Process {
                program: self.sigrok_cli_path.clone(),
                driver: self.sigrok_driver.clone(),
                sample_rate: self.sample_rate_hz,
            },
        };

        Ok(CaptureConfig {
            source,
            format: self.sample_format()?,
            masks: self.masks()?,
            chunk_size: self.chunk_size,
        })
    }
}
