use std::{
    fs::File,
    io::{self, BufReader},
};

use anyhow::Context;
use clap::Parser;
use itch::decode::StreamDecoder;
use itch_cli::{replay::replay, Args};
use tracing_subscriber::EnvFilter;

const STDIN_SENTINEL: &str = "-";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level())),
        )
        .with_writer(io::stderr)
        .init();
    let config = args.session_config();
    if args.input.as_os_str() == STDIN_SENTINEL {
        replay(
            StreamDecoder::new(
                BufReader::with_capacity(config.read_buffer_capacity, io::stdin().lock()),
                config.framing,
            ),
            &args,
        )
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Unable to open input file '{}'", args.input.display()))?;
        replay(
            StreamDecoder::new(
                BufReader::with_capacity(config.read_buffer_capacity, file),
                config.framing,
            ),
            &args,
        )
    }
}
