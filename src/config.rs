use std::time::Duration;

use clap::Args;

use crate::broker::BrokerEndpoint;

pub const DEFAULT_BROKER_PORT: u16 = 7843;

#[derive(Debug, Args, Clone)]
pub struct Config {
    /// Broker host name or address.
    #[arg(long, env = "EASYSHELL_HOST", default_value = "localhost")]
    pub host: String,

    /// Broker port.
    #[arg(long, env = "EASYSHELL_PORT", default_value_t = DEFAULT_BROKER_PORT)]
    pub port: u16,

    /// Upper bound on the session-creation request, in seconds.
    #[arg(long, default_value_t = 10)]
    pub request_timeout_secs: u64,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value_t = false)]
    pub json_output: bool,
}

impl Config {
    pub fn broker(&self) -> BrokerEndpoint {
        BrokerEndpoint::new(self.host.trim(), self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn defaults_point_at_local_broker() {
        let cfg = Harness::parse_from(["easyshell"]).config;
        assert_eq!(cfg.port, 7843);
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.json_output);
    }

    #[test]
    fn broker_endpoint_uses_host_and_port() {
        let cfg = Harness::parse_from(["easyshell", "--host", " broker.lan ", "--port", "3000"]).config;
        let broker = cfg.broker();
        assert_eq!(broker.host(), "broker.lan");
        assert_eq!(broker.port(), 3000);
    }

    #[test]
    fn zero_timeout_is_raised_to_one_second() {
        let cfg = Harness::parse_from(["easyshell", "--request-timeout-secs", "0"]).config;
        assert_eq!(cfg.request_timeout().as_secs(), 1);
    }
}
