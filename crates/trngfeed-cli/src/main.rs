//! CLI for trngfeed — feed a serial hardware noise source into the kernel entropy pool.

mod commands;

use clap::{Parser, Subcommand};
use trngfeed_core::{DEFAULT_BAUD, DEFAULT_BLOCK_SIZE};

#[derive(Parser)]
#[command(name = "trngfeed")]
#[command(about = "trngfeed — feed a serial TRNG into the kernel entropy pool")]
#[command(version = trngfeed_core::VERSION)]
struct Cli {
    /// Log verbosity: -v for debug, -vv for per-read/per-write trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuously read blocks from a serial TRNG, condition them and write
    /// them to /dev/trng (or stdout). Runs until an error occurs.
    Feed {
        /// Serial device name or path (basename must carry the platform's serial prefix)
        #[arg(short, long)]
        device: String,

        /// Line rate in bps (9600 to 1000000)
        #[arg(short, long, default_value_t = DEFAULT_BAUD)]
        speed: u32,

        /// Write to stdout instead of /dev/trng; the first block is then kept
        #[arg(short = 'o', long)]
        stdout: bool,

        /// Write to this path instead of /dev/trng
        #[arg(long, conflicts_with = "stdout")]
        output: Option<String>,

        /// Write semantics for --output: latest (rewind before every delivery) or stream
        #[arg(long, default_value = "latest", value_parser = ["latest", "stream"], requires = "output")]
        sink_kind: String,

        /// Forward blocks unchanged instead of SHA-512 conditioning (diagnostics only)
        #[arg(short, long)]
        transparent: bool,

        /// Bytes accumulated per block (1 to 1024)
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,

        /// Deliver the first block instead of discarding it
        #[arg(long)]
        keep_first: bool,

        /// Zero-byte read handling: wait (idle, then retry) or fail
        #[arg(long, default_value = "wait", value_parser = ["wait", "fail"])]
        zero_read: String,

        /// Idle wait in milliseconds after a zero-byte read
        #[arg(long, default_value_t = 10)]
        idle_ms: u64,

        /// Short raw-block write handling: fatal or warn
        #[arg(long, default_value = "fatal", value_parser = ["fatal", "warn"])]
        short_write: String,

        /// Ignore modem control lines (set CLOCAL)
        #[arg(long)]
        local: bool,
    },

    /// Read raw blocks from a serial TRNG and print them as hex. Nothing is
    /// conditioned or written to the entropy sink.
    Probe {
        /// Serial device name or path
        #[arg(short, long)]
        device: String,

        /// Line rate in bps (9600 to 1000000)
        #[arg(short, long, default_value_t = DEFAULT_BAUD)]
        speed: u32,

        /// Bytes per printed block
        #[arg(long, default_value = "16")]
        block_size: usize,

        /// Number of blocks to print
        #[arg(long, default_value = "1")]
        count: usize,

        /// Ignore modem control lines (set CLOCAL)
        #[arg(long)]
        local: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Feed {
            device,
            speed,
            stdout,
            output,
            sink_kind,
            transparent,
            block_size,
            keep_first,
            zero_read,
            idle_ms,
            short_write,
            local,
        } => commands::feed::run(commands::feed::FeedCommandConfig {
            device: &device,
            speed,
            stdout,
            output: output.as_deref(),
            sink_kind: &sink_kind,
            transparent,
            block_size,
            keep_first,
            zero_read: &zero_read,
            idle_ms,
            short_write: &short_write,
            local,
        }),
        Commands::Probe {
            device,
            speed,
            block_size,
            count,
            local,
        } => commands::probe::run(&device, speed, block_size, count, local),
    };

    if let Err(err) = result {
        eprintln!("trngfeed: {}: {err}", err.stage());
        std::process::exit(err.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sink_kind_requires_output() {
        let err = Cli::try_parse_from(["trngfeed", "feed", "-d", "ttyS0", "--sink-kind", "stream"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "trngfeed",
            "feed",
            "-d",
            "ttyS0",
            "--output",
            "/tmp/out",
            "--sink-kind",
            "stream",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Feed { ref sink_kind, .. } if sink_kind == "stream"));
    }

    #[test]
    fn test_default_sink_kind_needs_no_output() {
        let cli = Cli::try_parse_from(["trngfeed", "feed", "-d", "ttyS0"]).unwrap();
        assert!(matches!(cli.command, Commands::Feed { output: None, .. }));
    }
}
