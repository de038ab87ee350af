use tracing::Level;

const SYSLOG_PORT: &str = "NETPULSE_SYSLOG_PORT";

const DEFAULT_SYSLOG_PORT: u16 = 514;

pub fn get_default_syslog_port() -> u16 {
    DEFAULT_SYSLOG_PORT
}

pub fn get_syslog_port() -> Option<u16> {
    let port_from_env = std::env::var(SYSLOG_PORT);
    port_from_env.ok().and_then(|res| res.parse().ok())
}

const API_TOKEN: &str = "NETPULSE_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(API_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}

const LOG_LEVEL: &str = "NETPULSE_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: Level = Level::DEBUG;

pub fn get_log_level() -> Level {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| {
        res.parse().unwrap_or(DEFAULT_LOG_LEVEL)
    })
}
