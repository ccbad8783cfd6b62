use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default mount point of the EventSource endpoint.
pub const DEFAULT_EVENT_SOURCE_PATH: &str = "/es";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to open event streams.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Path prefix under which EventSource streams are served.
    #[arg(long, env, default_value = DEFAULT_EVENT_SOURCE_PATH)]
    event_source_path: String,

    /// Seconds between keep-alive comments on idle streams (0 disables them).
    #[arg(long, env, default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// Messages the demo echo handler sends when a stream opens.
    #[arg(long, env, value_delimiter = ',', default_value = "a,b")]
    pub echo_messages: Vec<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        // Built-in defaults (plus environment), never the process arguments.
        Config::parse_from([env!("CARGO_PKG_NAME")])
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    /// `interface:port`, ready to hand to a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }

    /// The EventSource path prefix, normalized to a leading `/` and no trailing `/`.
    pub fn event_source_path(&self) -> String {
        let trimmed = self.event_source_path.trim_matches('/');
        format!("/{trimmed}")
    }

    pub fn set_event_source_path(mut self, path: impl Into<String>) -> Self {
        self.event_source_path = path.into();
        self
    }

    /// Interval between keep-alive comments, `None` when disabled.
    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("beacon").chain(args.iter().copied()))
    }

    #[test]
    fn test_rust_env_parses_case_insensitively() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("nope".parse::<RustEnv>(), Err(RustEnvParseError));
        assert_eq!(RustEnv::Development.to_string(), "development");
    }

    #[test]
    fn test_event_source_path_is_normalized() {
        let config = parse(&["--event-source-path", "streams/"]);
        assert_eq!(config.event_source_path(), "/streams");

        let config = config.set_event_source_path("/");
        assert_eq!(config.event_source_path(), "/");
    }

    #[test]
    fn test_keep_alive_zero_disables() {
        assert_eq!(parse(&["--keep-alive-secs", "0"]).keep_alive(), None);
        assert_eq!(
            parse(&["--keep-alive-secs", "5"]).keep_alive(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_bind_address_and_lists() {
        let config = parse(&[
            "--interface",
            "0.0.0.0",
            "--port",
            "59504",
            "--echo-messages",
            "C,D,E",
            "--log-level-filter",
            "DEBUG",
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:59504");
        assert_eq!(config.echo_messages, vec!["C", "D", "E"]);
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }
}
