#![forbid(unsafe_code)]

//! Command-line argument parsing for the counter demo.
//!
//! Parses args by hand. Environment variables with the `RSTORE_DEMO_*`
//! prefix provide defaults that explicit flags override.

use std::env;
use std::process;

use rstore::prelude::Sequencing;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
rstore counter demo

Runs a counter store headlessly: one increment, then an increment and a
reset racing each other. Every render of the counter view is logged.

USAGE:
    rstore-demo [OPTIONS]

OPTIONS:
    --delay-ms=N         Simulated latency of each action (default: 2000)
    --sequencing=MODE    'last-resolved' or 'latest-invoked' (default: last-resolved)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    RSTORE_DEMO_DELAY_MS      Override --delay-ms
    RSTORE_DEMO_SEQUENCING    Override --sequencing
    RSTORE_STORE_LABEL        Store name used in log events
    RSTORE_SEQUENCING         Store default when no demo override is given
    RUST_LOG                  Log filter (default: info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Simulated latency of each action in milliseconds.
    pub delay_ms: u64,
    /// Sequencing override; `None` keeps the store configuration.
    pub sequencing: Option<Sequencing>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            sequencing: None,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse process arguments and environment variables, exiting on
    /// `--help`, `--version`, or invalid input.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse_from(&args, |key| env::var(key).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("rstore-demo {VERSION}");
                process::exit(0);
            }
            Err(message) => {
                eprintln!("{message}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with environment lookups through `var`.
    pub fn parse_from(
        args: &[String],
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Command, String> {
        let mut opts = Self::default();

        // Environment first, flags override.
        if let Some(val) = var("RSTORE_DEMO_DELAY_MS")
            && let Ok(n) = val.parse()
        {
            opts.delay_ms = n;
        }
        if let Some(val) = var("RSTORE_DEMO_SEQUENCING")
            && let Ok(mode) = val.parse()
        {
            opts.sequencing = Some(mode);
        }

        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                other => {
                    if let Some(val) = other.strip_prefix("--delay-ms=") {
                        opts.delay_ms = val
                            .parse::<u64>()
                            .map_err(|_| format!("Invalid --delay-ms value: {val}"))?;
                    } else if let Some(val) = other.strip_prefix("--sequencing=") {
                        let mode = val
                            .parse::<Sequencing>()
                            .map_err(|err| format!("Invalid --sequencing: {err}"))?;
                        opts.sequencing = Some(mode);
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        Ok(Command::Run(opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.delay_ms, 2000);
        assert_eq!(opts.sequencing, None);
        assert_eq!(
            Opts::parse_from(&[], no_env),
            Ok(Command::Run(Opts::default()))
        );
    }

    #[test]
    fn flags() {
        let cmd = Opts::parse_from(
            &args(&["--delay-ms=50", "--sequencing=latest-invoked"]),
            no_env,
        );
        assert_eq!(
            cmd,
            Ok(Command::Run(Opts {
                delay_ms: 50,
                sequencing: Some(Sequencing::LatestInvoked),
            }))
        );
    }

    #[test]
    fn flags_override_env() {
        let env = |key: &str| match key {
            "RSTORE_DEMO_DELAY_MS" => Some("10".to_string()),
            "RSTORE_DEMO_SEQUENCING" => Some("latest-invoked".to_string()),
            _ => None,
        };
        let Ok(Command::Run(opts)) = Opts::parse_from(&args(&["--delay-ms=20"]), env) else {
            panic!("expected run");
        };
        assert_eq!(opts.delay_ms, 20);
        assert_eq!(opts.sequencing, Some(Sequencing::LatestInvoked));
    }

    #[test]
    fn invalid_env_is_ignored() {
        let env = |key: &str| (key == "RSTORE_DEMO_DELAY_MS").then(|| "soon".to_string());
        assert_eq!(
            Opts::parse_from(&[], env),
            Ok(Command::Run(Opts::default()))
        );
    }

    #[test]
    fn help_and_version() {
        assert_eq!(Opts::parse_from(&args(&["-h"]), no_env), Ok(Command::Help));
        assert_eq!(
            Opts::parse_from(&args(&["--version", "--bogus"]), no_env),
            Ok(Command::Version)
        );
    }

    #[test]
    fn rejects_bad_input() {
        let err = Opts::parse_from(&args(&["--delay-ms=x"]), no_env).unwrap_err();
        assert!(err.contains("--delay-ms"));
        let err = Opts::parse_from(&args(&["--sequencing=fifo"]), no_env).unwrap_err();
        assert!(err.contains("fifo"));
        let err = Opts::parse_from(&args(&["--turbo"]), no_env).unwrap_err();
        assert_eq!(err, "Unknown argument: --turbo");
    }

    #[test]
    fn help_text_contains_env_vars() {
        assert!(HELP_TEXT.contains("RSTORE_DEMO_DELAY_MS"));
        assert!(HELP_TEXT.contains("RSTORE_DEMO_SEQUENCING"));
        assert!(!VERSION.is_empty());
    }
}
