use std::{env, str::FromStr, time::Duration};

use checkout_engine::sqlite::db::db_url;
use cpg_common::{helpers::parse_boolean_flag, Money, Secret};
use log::*;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8370;
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;
const DEFAULT_EVENT_BUFFER: usize = 64;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
const DEFAULT_ADD_ON_UNIT_PRICE: i64 = 100;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Upper bound for every call into the payment provider.
    pub gateway_timeout: Duration,
    /// Number of push messages a single WebSocket connection may have queued before further messages are dropped.
    pub subscriber_buffer: usize,
    /// Capacity of the channel feeding the invoice status hook.
    pub event_buffer: usize,
    /// Polling interval advertised to clients that watch an invoice.
    pub poll_interval: Duration,
    /// Price of a single accessory add-on.
    pub add_on_unit_price: Money,
    /// When set, joining an invoice room requires the token handed out when the invoice was created.
    pub room_token_secret: Option<Secret<String>>,
    pub webhook: WebhookConfig,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    /// If false, webhook calls are accepted without a signature. Only ever turn this off during development.
    pub hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            add_on_unit_price: Money::from(DEFAULT_ADD_ON_UNIT_PRICE),
            room_token_secret: None,
            webhook: WebhookConfig { hmac_secret: Secret::default(), hmac_checks: true },
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = parse_env("CPG_PORT", DEFAULT_CPG_PORT);
        let database_url = db_url();
        let gateway_timeout =
            Duration::from_millis(parse_env("CPG_GATEWAY_TIMEOUT_MS", DEFAULT_GATEWAY_TIMEOUT.as_millis() as u64));
        let subscriber_buffer = parse_env("CPG_SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER);
        let event_buffer = parse_env("CPG_EVENT_BUFFER", DEFAULT_EVENT_BUFFER);
        let poll_interval =
            Duration::from_millis(parse_env("CPG_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64));
        let add_on_unit_price = configure_add_on_price();
        let room_token_secret = env::var("CPG_ROOM_TOKEN_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if room_token_secret.is_none() {
            info!("🪛️ CPG_ROOM_TOKEN_SECRET is not set. Anyone who knows an invoice id can join its room.");
        }
        let webhook = WebhookConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            gateway_timeout,
            subscriber_buffer,
            event_buffer,
            poll_interval,
            add_on_unit_price,
            room_token_secret,
            webhook,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = env::var("CPG_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ CPG_WEBHOOK_HMAC_SECRET is not set. Please set it to the signing key shared with your payment \
                 provider."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("CPG_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are disabled. Anyone can settle payment sessions. 🚨️");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn configure_add_on_price() -> Money {
    let price = parse_env("CPG_ADD_ON_UNIT_PRICE", DEFAULT_ADD_ON_UNIT_PRICE);
    if price < 0 {
        warn!("🪛️ CPG_ADD_ON_UNIT_PRICE cannot be negative. Using the default, {DEFAULT_ADD_ON_UNIT_PRICE}, instead.");
        return Money::from(DEFAULT_ADD_ON_UNIT_PRICE);
    }
    Money::from(price)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of the configuration that request handlers need. The only secret in here is the room token secret, since
/// handlers hand out and check room tokens.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub poll_interval: Duration,
    pub room_token_secret: Option<Secret<String>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { poll_interval: config.poll_interval, room_token_secret: config.room_token_secret.clone() }
    }
}
