//! Command line interface for the `plugin-runner` binary.
//!
//! Kept free of crate types so `build.rs` can include it to render the man
//! page.

use clap::Parser;

/// Command line arguments for the `plugin-runner` binary.
#[derive(Debug, Parser)]
#[command(
    name = "plugin-runner",
    version,
    about = "External plugin runner listening on a Unix domain socket"
)]
pub struct Cli {
    /// Socket location, optionally prefixed with `unix:`.
    #[arg(
        long,
        env = "APISIX_LISTEN_ADDRESS",
        default_value = "unix:/tmp/runner.sock"
    )]
    pub socket_file: String,

    /// Seconds open connections may run once shutdown begins.
    #[arg(long, default_value_t = 45, value_name = "SECONDS")]
    pub shutdown_deadline: u64,

    /// Octal permission bits applied to the socket file after binding.
    #[arg(long, value_parser = parse_octal_mode, value_name = "MODE")]
    pub socket_mode: Option<u32>,

    /// Largest accepted frame payload in bytes.
    #[arg(long, default_value_t = 0xFF_FFFF, value_name = "BYTES")]
    pub max_frame_length: usize,

    /// Bytes of each read or write included in debug wire logs.
    #[arg(long, default_value_t = 64, value_name = "BYTES")]
    pub hexdump_limit: usize,

    /// Write every received frame back to the gateway.
    #[arg(long)]
    pub echo: bool,
}

fn parse_octal_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(mode) => Err(format!("mode {mode:o} exceeds 7777")),
        Err(e) => Err(format!("invalid octal mode {raw:?}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::Cli;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["plugin-runner", "--socket-file", "unix:/tmp/x.sock"])
            .expect("parse");
        assert_eq!(cli.socket_file, "unix:/tmp/x.sock");
        assert_eq!(cli.shutdown_deadline, 45);
        assert_eq!(cli.socket_mode, None);
        assert_eq!(cli.max_frame_length, 0xFF_FFFF);
        assert!(!cli.echo);
    }

    #[rstest]
    #[case("600", 0o600)]
    #[case("0o766", 0o766)]
    #[case("0700", 0o700)]
    fn parses_octal_mode(#[case] raw: &str, #[case] expected: u32) {
        let cli = Cli::try_parse_from(["plugin-runner", "--socket-mode", raw]).expect("parse");
        assert_eq!(cli.socket_mode, Some(expected));
    }

    #[rstest]
    #[case("9")]
    #[case("17777")]
    fn rejects_bad_mode(#[case] raw: &str) {
        assert!(Cli::try_parse_from(["plugin-runner", "--socket-mode", raw]).is_err());
    }

    #[test]
    fn echo_and_deadline_flags() {
        let cli = Cli::try_parse_from(["plugin-runner", "--echo", "--shutdown-deadline", "3"])
            .expect("parse");
        assert!(cli.echo);
        assert_eq!(cli.shutdown_deadline, 3);
    }
}
