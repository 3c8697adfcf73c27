use std::{
    fs::File,
    io::{self, BufWriter},
    num::NonZeroU64,
    path::PathBuf,
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, ValueEnum};

use itch::{pretty::parse_ts, Framing, SessionConfig};

pub mod replay;

/// The message delimiting of the input file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum InputFraming {
    /// Messages back to back with no length prefix
    Raw,
    /// Each message preceded by a 2-byte big-endian length, as in NASDAQ's files
    #[default]
    LengthPrefixed,
}

impl From<InputFraming> for Framing {
    fn from(value: InputFraming) -> Self {
        match value {
            InputFraming::Raw => Framing::Raw,
            InputFraming::LengthPrefixed => Framing::LengthPrefixed,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(version, about)]
#[cfg_attr(test, derive(Default))]
pub struct Args {
    #[clap(
        help = "A decompressed TotalView-ITCH 5.0 file to replay. Pass '-' to read from standard input",
        value_name = "FILE"
    )]
    pub input: PathBuf,
    #[clap(
        short,
        long,
        help = "Saves the result to FILE. If no path is specified, the output will be written to standard output",
        value_name = "FILE"
    )]
    pub output: Option<PathBuf>,
    #[clap(
        short,
        long,
        action = ArgAction::SetTrue,
        default_value = "false",
        help = "Allow overwriting of existing files, such as the output file"
    )]
    pub force: bool,
    #[clap(
        long,
        value_enum,
        default_value_t = InputFraming::LengthPrefixed,
        help = "How messages are delimited in the input"
    )]
    pub framing: InputFraming,
    #[clap(
        short,
        long,
        value_name = "SYMBOL",
        help = "Output the depth of SYMBOL as CSV instead of the replay summary"
    )]
    pub symbol: Option<String>,
    #[clap(
        long,
        value_name = "TIME",
        value_parser = parse_time,
        requires = "symbol",
        help = "Output the depth as of TIME, either HH:MM:SS[.fffffffff] or nanoseconds since midnight. By default the depth at the end of the replay is output"
    )]
    pub at: Option<u64>,
    #[clap(
        short,
        long,
        value_name = "NUM_LEVELS",
        requires = "symbol",
        help = "Limit the depth output to the best NUM_LEVELS levels per side"
    )]
    pub depth: Option<usize>,
    #[clap(
        short = 'l',
        long = "limit",
        value_name = "NUM_MESSAGES",
        help = "Stop replaying after the specified number of messages"
    )]
    pub limit: Option<NonZeroU64>,
    #[clap(
        long,
        action = ArgAction::SetTrue,
        default_value = "false",
        help = "Skip messages of unknown type instead of stopping. Only possible with length-prefixed framing"
    )]
    pub skip_unknown: bool,
    #[clap(
        long,
        value_name = "NANOS",
        default_value_t = 0,
        help = "How many nanoseconds of level changes to retain for historical depth queries"
    )]
    pub history_ns: u64,
    #[clap(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging verbosity. Can be repeated. RUST_LOG takes precedence"
    )]
    pub verbose: u8,
}

impl Args {
    /// Returns the replay settings selected by the arguments.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_framing(self.framing.into())
            .with_history_ns(self.history_ns)
            .with_skip_unknown(self.skip_unknown)
    }

    /// Returns the default log filter directive for the verbosity level.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn parse_time(s: &str) -> Result<u64, String> {
    parse_ts(s).map_err(|e| e.to_string())
}

/// Returns a writeable object where the `itch` output will be directed.
pub fn output_from_args(args: &Args) -> anyhow::Result<Box<dyn io::Write>> {
    if let Some(output) = &args.output {
        let output_file = open_output_file(output, args.force)?;
        Ok(Box::new(BufWriter::new(output_file)))
    } else {
        Ok(Box::new(io::stdout().lock()))
    }
}

fn open_output_file(path: &PathBuf, force: bool) -> anyhow::Result<File> {
    let mut options = File::options();
    options.write(true).truncate(true);
    if force {
        options.create(true);
    } else if path.exists() {
        return Err(anyhow!(
            "Output file exists. Pass --force flag to overwrite the existing file."
        ));
    } else {
        options.create_new(true);
    }
    options
        .open(path)
        .with_context(|| format!("Unable to open output file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(0, "warn")]
    #[case(1, "info")]
    #[case(2, "debug")]
    #[case(5, "trace")]
    fn test_log_level(#[case] verbose: u8, #[case] exp: &str) {
        let args = Args {
            verbose,
            ..Default::default()
        };
        assert_eq!(args.log_level(), exp);
    }

    #[test]
    fn test_session_config() {
        let args = Args {
            framing: InputFraming::Raw,
            history_ns: 5,
            skip_unknown: true,
            ..Default::default()
        };
        let config = args.session_config();
        assert_eq!(config.framing, Framing::Raw);
        assert_eq!(config.history_ns, 5);
        assert!(config.skip_unknown);
    }

    #[rstest]
    #[case("09:30:00", Ok(34_200_000_000_000))]
    #[case("1000", Ok(1_000))]
    #[case("noon", Err(()))]
    fn test_parse_time(#[case] input: &str, #[case] exp: Result<u64, ()>) {
        assert_eq!(parse_time(input).map_err(|_| ()), exp);
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "itch",
            "in.itch",
            "--framing",
            "raw",
            "--symbol",
            "AAPL",
            "--at",
            "09:30:00.5",
            "-d",
            "3",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.framing, InputFraming::Raw);
        assert_eq!(args.symbol.as_deref(), Some("AAPL"));
        assert_eq!(args.at, Some(34_200_500_000_000));
        assert_eq!(args.depth, Some(3));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_at_requires_symbol() {
        assert!(Args::try_parse_from(["itch", "in.itch", "--at", "1"]).is_err());
    }
}
