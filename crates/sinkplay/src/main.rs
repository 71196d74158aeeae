//! sinkplay: queue PCM buffers into the renderer and play them out.
//!
//! ## Flow
//! 1. **Load**: read a WAV file (or synthesize a tone) into interleaved
//!    native-endian PCM.
//! 2. **Queue**: split the payload into buffers on a queue port, recycling
//!    released buffers so only a few are in flight.
//! 3. **Render**: the renderer worker connects to the output sink, creates a
//!    stream matching the port parameters, and writes each buffer out; the
//!    last buffer raises end of stream.

mod cli;
mod runtime;
mod source;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sinkplay=info")),
        )
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    let _ = ctrlc::set_handler(|| {
        std::process::exit(130);
    });

    let Some(cmd) = args.cmd else {
        anyhow::bail!("nothing to play (try `sinkplay play <file>` or `sinkplay tone`)");
    };

    let source = match &cmd {
        cli::Command::Play { path } => source::load_wav(path)?,
        cli::Command::Tone { freq, secs, rate } => source::tone(*freq, *secs, *rate),
    };

    let opts = runtime::RunOptions {
        device: args.device.clone(),
        null: args.null,
        connect_timeout: Duration::from_millis(args.timeout_ms),
        buffer_bytes: args.buffer_bytes,
        queue_depth: args.queue_depth,
    };
    runtime::play(source, &opts)
}
