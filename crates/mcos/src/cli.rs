//! Command-line interface.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments. Every option except `config` overrides a value from
/// the configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the bind host
    pub bind_host: Option<String>,
    /// Optional override for the persona seed file
    pub personas_file: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::from_matches(Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("mcos")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Login, persona and lobby services for legacy NPS game clients")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("HOST")
                    .help("Host every listener binds to (e.g., 0.0.0.0)"),
            )
            .arg(
                Arg::new("personas")
                    .short('p')
                    .long("personas")
                    .value_name("FILE")
                    .help("JSON file with persona records"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    fn from_matches(matches: clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            bind_host: matches.get_one::<String>("bind").cloned(),
            personas_file: matches.get_one::<String>("personas").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::from_matches(CliArgs::command().get_matches_from(["mcos"]));
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert!(args.bind_host.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn test_overrides() {
        let matches = CliArgs::command().get_matches_from([
            "mcos",
            "-c",
            "prod.toml",
            "--bind",
            "127.0.0.1",
            "--personas",
            "personas.json",
            "-l",
            "debug",
            "--json-logs",
        ]);
        let args = CliArgs::from_matches(matches);
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.bind_host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.personas_file, Some(PathBuf::from("personas.json")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
    }
}
