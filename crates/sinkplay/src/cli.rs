use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sinkplay", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Render into a counting null sink instead of the audio host
    #[arg(long)]
    pub null: bool,

    /// Give up if the sink connection is not ready within this many milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Payload bytes per queued buffer
    #[arg(long, default_value_t = 8192)]
    pub buffer_bytes: usize,

    /// Buffers kept circulating between the feeder and the renderer
    #[arg(long, default_value_t = 4)]
    pub queue_depth: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a PCM WAV file
    Play {
        /// Path to the file (16/24-bit integer or 32-bit PCM)
        path: PathBuf,
    },

    /// Play a generated sine tone
    Tone {
        /// Frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        freq: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 2.0)]
        secs: f32,

        /// Sample rate in Hz
        #[arg(long, default_value_t = 48_000)]
        rate: u32,
    },
}
