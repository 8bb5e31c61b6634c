//! client configuration

pub mod cli {
    //! Parse from either cli or env var

    /// default directory holding the CA bundle and client identity
    pub static DEFAULT_CERT_DIR: &str = "certs/";
    /// default client-to-server port
    pub const DEFAULT_PORT: u16 = xmpp_stream::DEFAULT_PORT;
    /// default time to wait for each response, in milliseconds
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    use std::{path::PathBuf, time::Duration};

    pub use clap::Parser;

    use crate::action::ActionKind;

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "pubsub-client", bin_name = "pubsub-client", about, long_about = None)]
    /// Run one XEP-0060 pub/sub action against a service and disconnect.
    /// A `.env` file in the working directory is loaded as well.
    pub struct Config {
        /// JID of the pub/sub service, e.g. pubsub.example.org
        pub server: String,
        /// action to perform
        #[clap(value_enum)]
        pub action: ActionKind,
        /// node to act on; required by every action except `nodes`
        pub node: Option<String>,
        /// publish payload, item id, or comma separated owner JIDs
        pub data: Option<String>,
        /// only log errors
        #[clap(short, long, overrides_with = "debug")]
        pub quiet: bool,
        /// log debug output
        #[clap(short, long, overrides_with = "quiet")]
        pub debug: bool,
        /// JID to connect as
        #[clap(short, long, env = "PUBSUB_JID")]
        pub jid: Option<String>,
        /// password for SASL PLAIN; without one the client certificate is used
        #[clap(short, long, env = "PUBSUB_PASSWORD", hide_env_values = true)]
        pub password: Option<String>,
        /// directory containing server_ca.pem, client.pem and client.key
        #[clap(long, env = "PUBSUB_CERT_DIR", default_value = DEFAULT_CERT_DIR)]
        pub cert_dir: PathBuf,
        /// host to connect to, defaults to the domain of --jid
        #[clap(long, env = "PUBSUB_HOST")]
        pub host: Option<String>,
        /// port to connect to
        #[clap(long, env = "PUBSUB_PORT", default_value_t = DEFAULT_PORT)]
        pub port: u16,
        /// resource to request when binding
        #[clap(long, env = "PUBSUB_RESOURCE")]
        pub resource: Option<String>,
        /// how long to wait for each response, in milliseconds
        #[clap(long, env = "PUBSUB_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
        pub timeout_ms: u64,
        /// page through `nodes` results this many at a time
        #[clap(long)]
        pub page_size: Option<usize>,
        /// print the outcome as JSON on stdout
        #[clap(long)]
        pub json: bool,
        /// set the log filter directly. All valid RUST_LOG arguments are accepted
        #[clap(long, env = "PUBSUB_LOG")]
        pub log: Option<String>,
    }

    impl Config {
        /// log filter: --log/PUBSUB_LOG, else from -q/-d, else `info`
        pub fn log_level(&self) -> &str {
            match &self.log {
                Some(filter) => filter.as_str(),
                None if self.quiet => "error",
                None if self.debug => "debug",
                None => "info",
            }
        }

        /// response timeout as `Duration`
        pub fn timeout(&self) -> Duration {
            Duration::from_millis(self.timeout_ms)
        }
    }
}

pub mod trace {
    //! tracing configuration
    use std::{fmt, str::FromStr};

    use anyhow::{Result, anyhow};
    use env_parser::parse_var_with_err;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self as layer,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// log as "json", "pretty" or "standard" (unstructured)
    static DEFAULT_LOG_FORMAT: &str = "standard";

    /// output format selected by `LOG_FORMAT`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogFormat {
        /// one line per event with timestamp, level, file and line
        Standard,
        /// multi-line human readable
        Pretty,
        /// one JSON object per event
        Json,
    }

    impl FromStr for LogFormat {
        type Err = UnknownFormat;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_ascii_lowercase().as_str() {
                "standard" => Ok(Self::Standard),
                "pretty" => Ok(Self::Pretty),
                "json" => Ok(Self::Json),
                _ => Err(UnknownFormat(s.to_owned())),
            }
        }
    }

    /// a `LOG_FORMAT` value that isn't recognized
    #[derive(Debug)]
    pub struct UnknownFormat(String);

    impl fmt::Display for UnknownFormat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "unknown log format {:?}, expected standard, pretty or json", self.0)
        }
    }

    impl std::error::Error for UnknownFormat {}

    /// Configuration for logging
    #[derive(Debug)]
    pub struct Config {
        /// formatting to apply to logs
        pub log_frmt: LogFormat,
    }

    impl Config {
        /// Install the global subscriber. `level` is any `RUST_LOG` style
        /// filter; an invalid one falls back to `info`.
        pub fn parse(level: &str) -> Result<Self> {
            let log_frmt: LogFormat = parse_var_with_err("LOG_FORMAT", DEFAULT_LOG_FORMAT)?;

            let filter = EnvFilter::try_new(level).or_else(|_| EnvFilter::try_new("info"))?;

            let installed = match log_frmt {
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer::layer().json())
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        layer::layer()
                            .event_format(Format::default().pretty().with_source_location(true))
                            .fmt_fields(PrettyFields::new()),
                    )
                    .try_init(),
                LogFormat::Standard => tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        layer::layer()
                            .with_file(true)
                            .with_line_number(true)
                            .with_target(false),
                    )
                    .try_init(),
            };
            installed.map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;

            Ok(Self { log_frmt })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn formats_parse() {
            assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
            assert_eq!("standard".parse::<LogFormat>().unwrap(), LogFormat::Standard);
            assert!("xml".parse::<LogFormat>().is_err());
        }
    }
}

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use xmpp_stream::{CertPaths, ConnectConfig, Jid};

use crate::{action::Action, lifecycle::Invocation};

/// Validated configuration for one run
#[derive(Clone)]
pub struct ClientConfig {
    /// pub/sub service addressed
    pub service: Jid,
    /// the action to run
    pub action: Action,
    /// account to connect as
    pub jid: Jid,
    /// SASL PLAIN password
    pub password: Option<String>,
    /// host override
    pub host: Option<String>,
    /// port
    pub port: u16,
    /// resource to request
    pub resource: Option<String>,
    /// where to find certificate material
    pub cert_dir: PathBuf,
    /// response timeout
    pub timeout: Duration,
    /// `nodes` page size
    pub page_size: Option<usize>,
    /// print the report as JSON
    pub json: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("service", &self.service)
            .field("action", &self.action)
            .field("jid", &self.jid)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("resource", &self.resource)
            .field("cert_dir", &self.cert_dir)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("json", &self.json)
            .finish()
    }
}

impl TryFrom<cli::Config> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(cli: cli::Config) -> Result<Self, Self::Error> {
        let Some(jid) = cli.jid.as_deref() else {
            bail!("a JID is required, pass --jid or set PUBSUB_JID");
        };
        let jid = jid
            .parse::<Jid>()
            .with_context(|| format!("invalid JID {jid:?}"))?;
        let service = cli
            .server
            .parse::<Jid>()
            .with_context(|| format!("invalid service JID {:?}", cli.server))?;
        if cli.page_size == Some(0) {
            bail!("--page-size must be greater than zero");
        }

        let action = Action::new(cli.action, cli.node, cli.data);
        action.validate()?;

        Ok(Self {
            service,
            action,
            jid,
            password: cli.password,
            host: cli.host,
            port: cli.port,
            resource: cli.resource,
            cert_dir: cli.cert_dir,
            timeout: Duration::from_millis(cli.timeout_ms),
            page_size: cli.page_size,
            json: cli.json,
        })
    }
}

impl ClientConfig {
    /// stream settings, once the certificate material has been located
    pub fn connect_config(&self, certs: CertPaths) -> ConnectConfig {
        ConnectConfig {
            jid: self.jid.clone(),
            password: self.password.clone(),
            host: self.host.clone(),
            port: self.port,
            resource: self.resource.clone(),
            certs,
            timeout: self.timeout,
        }
    }

    /// what the lifecycle should run
    pub fn invocation(&self) -> Invocation {
        Invocation {
            service: self.service.clone(),
            action: self.action.clone(),
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        cli::{Config, Parser},
        *,
    };
    use crate::action::ActionKind;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("pubsub-client").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn positionals_and_defaults() {
        let cli = parse(&["pubsub.example.org", "get", "n1", "item42", "-j", "a@example.org"]);
        assert_eq!(cli.action, ActionKind::GetItem);
        assert_eq!(cli.node.as_deref(), Some("n1"));
        assert_eq!(cli.data.as_deref(), Some("item42"));
        assert_eq!(cli.cert_dir, PathBuf::from(cli::DEFAULT_CERT_DIR));
        assert_eq!(cli.port, 5222);
        assert_eq!(cli.timeout(), Duration::from_secs(10));
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn unknown_action_rejected_at_parse_time() {
        let err = Config::try_parse_from(["pubsub-client", "pubsub.example.org", "explode"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn verbosity_flags() {
        let cli = parse(&["pubsub.example.org", "nodes", "-q"]);
        assert_eq!(cli.log_level(), "error");
        let cli = parse(&["pubsub.example.org", "nodes", "-q", "-d"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = parse(&["pubsub.example.org", "nodes", "--log", "pubsub_core=trace"]);
        assert_eq!(cli.log_level(), "pubsub_core=trace");
    }

    #[test]
    fn client_config_validates() {
        let cli = parse(&["pubsub.example.org", "create", "-j", "alice@example.org"]);
        let err = ClientConfig::try_from(cli).unwrap_err();
        assert!(err.to_string().contains("requires a node"));

        let cli = parse(&[
            "pubsub.example.org",
            "create",
            "news",
            "-j",
            "alice@example.org",
            "-p",
            "secret",
        ]);
        let config = ClientConfig::try_from(cli).unwrap();
        assert_eq!(config.service.to_string(), "pubsub.example.org");
        assert_eq!(config.action.node().unwrap(), "news");
        assert!(!format!("{config:?}").contains("secret"));
    }
}
