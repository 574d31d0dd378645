use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub market: MarketConfig,
    pub indicators: IndicatorsConfig,
    pub signal: SignalConfig,
    pub notify: NotifyConfig,
    pub supervisor: SupervisorConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSourceKind {
    /// Scrape the ping table through a WebDriver-controlled browser.
    Webdriver,
    /// Poll a JSON endpoint serving the same rows.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedSourceKind,
    pub page_url: String,
    pub webdriver_url: String,
    pub http_feed_url: String,
    pub quote_asset: String,
    pub min_pings: u32,
    pub refresh_each_poll: bool,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub page_load_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSourceKind::Webdriver,
            page_url: "https://agile-cliffs-23967.herokuapp.com/binance".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            http_feed_url: String::new(),
            quote_asset: "USDT".to_string(),
            min_pings: 4,
            refresh_each_poll: false,
            poll_interval_secs: 60,
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            page_load_timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub rest_base_url: String,
    pub kline_interval: String,
    pub candle_limit: usize,
    /// Always analyzed, whether or not the feed mentions them.
    pub symbols: Vec<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://api.binance.com".to_string(),
            kline_interval: "5m".to_string(),
            candle_limit: 100,
            symbols: Vec::new(),
        }
    }
}

impl MarketConfig {
    pub fn kline_interval_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.kline_interval)
    }

    pub fn watchlist(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    /// Raised to the longest indicator lookback if set lower.
    pub min_candles: Option<usize>,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            ema_short: 9,
            ema_medium: 21,
            ema_long: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            min_candles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub base_confidence: f64,
    pub min_confidence: f64,
    pub stop_atr_mult: f64,
    pub take_profit_atr_mult: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            base_confidence: 0.8,
            min_confidence: 0.6,
            stop_atr_mult: 2.0,
            take_profit_atr_mult: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub telegram_base_url: String,
    pub cooldown_secs: u64,
    pub retention_secs: u64,
    pub send_attempts: u32,
    /// Delay unit for sink retries: attempt `n` waits `retry_base_ms * 2^n`.
    pub retry_base_ms: u64,
    pub price_decimals: usize,
    pub shutdown_notice: bool,
    #[serde(skip)]
    pub telegram_token: String,
    #[serde(skip)]
    pub telegram_chat_id: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_base_url: "https://api.telegram.org".to_string(),
            cooldown_secs: 300,
            retention_secs: 3600,
            send_attempts: 3,
            retry_base_ms: 1000,
            price_decimals: 8,
            shutdown_notice: true,
            telegram_token: String::new(),
            telegram_chat_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    pub max_reconnect_attempts: u32,
    pub market_state_ttl_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff_base_secs: 60,
            backoff_cap_secs: 300,
            max_reconnect_attempts: 5,
            market_state_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:10000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// JSON lines go here when set; otherwise plain text on stdout.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parse a Binance kline interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .with_context(|| format!("{} '{}' is not a URL", field, value))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("{} must be http(s), got '{}'", field, parsed.scheme());
    }
    Ok(())
}

impl Config {
    /// `.env`, then the TOML file, then Telegram secrets from the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("PING_SENTRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;

        config.notify.telegram_token = std::env::var("TELEGRAM_TOKEN")
            .context("TELEGRAM_TOKEN not set in .env or environment")?;
        config.notify.telegram_chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .context("TELEGRAM_CHAT_ID not set in .env or environment")?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        for (name, period) in [
            ("indicators.ema_short", ind.ema_short),
            ("indicators.ema_medium", ind.ema_medium),
            ("indicators.ema_long", ind.ema_long),
            ("indicators.rsi_period", ind.rsi_period),
            ("indicators.macd_fast", ind.macd_fast),
            ("indicators.macd_slow", ind.macd_slow),
            ("indicators.macd_signal", ind.macd_signal),
            ("indicators.bb_period", ind.bb_period),
            ("indicators.atr_period", ind.atr_period),
        ] {
            if period == 0 {
                bail!("{} must be > 0", name);
            }
        }
        if ind.ema_short >= ind.ema_medium {
            bail!(
                "indicators.ema_short ({}) must be shorter than ema_medium ({})",
                ind.ema_short,
                ind.ema_medium
            );
        }
        if ind.macd_fast >= ind.macd_slow {
            bail!(
                "indicators.macd_fast ({}) must be shorter than macd_slow ({})",
                ind.macd_fast,
                ind.macd_slow
            );
        }
        if !(ind.bb_std_dev.is_finite() && ind.bb_std_dev > 0.0) {
            bail!("indicators.bb_std_dev must be a positive number");
        }

        let sig = &self.signal;
        if !(0.0..=100.0).contains(&sig.rsi_oversold)
            || !(0.0..=100.0).contains(&sig.rsi_overbought)
            || sig.rsi_oversold >= sig.rsi_overbought
        {
            bail!(
                "signal RSI bounds must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                sig.rsi_oversold,
                sig.rsi_overbought
            );
        }
        for (name, v) in [
            ("signal.base_confidence", sig.base_confidence),
            ("signal.min_confidence", sig.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                bail!("{} must be within [0, 1], got {}", name, v);
            }
        }
        if sig.stop_atr_mult <= 0.0 || sig.take_profit_atr_mult <= 0.0 {
            bail!("signal ATR multipliers must be > 0");
        }

        if self.feed.poll_interval_secs == 0 {
            bail!("feed.poll_interval_secs must be > 0");
        }
        if self.feed.request_timeout_secs == 0 || self.feed.connect_timeout_secs == 0 {
            bail!("feed timeouts must be > 0");
        }
        match self.feed.source {
            FeedSourceKind::Webdriver => {
                check_url("feed.webdriver_url", &self.feed.webdriver_url)?;
                check_url("feed.page_url", &self.feed.page_url)?;
            }
            FeedSourceKind::Http => check_url("feed.http_feed_url", &self.feed.http_feed_url)?,
        }
        check_url("market.rest_base_url", &self.market.rest_base_url)?;
        check_url("notify.telegram_base_url", &self.notify.telegram_base_url)?;

        self.market
            .kline_interval_ms()
            .context("market.kline_interval is invalid")?;
        if self.market.candle_limit == 0 || self.market.candle_limit > 1000 {
            bail!("market.candle_limit must be within 1..=1000");
        }

        if self.notify.send_attempts == 0 {
            bail!("notify.send_attempts must be > 0");
        }
        if self.notify.retention_secs < self.notify.cooldown_secs {
            bail!(
                "notify.retention_secs ({}) is shorter than cooldown_secs ({})",
                self.notify.retention_secs,
                self.notify.cooldown_secs
            );
        }

        let sup = &self.supervisor;
        if sup.backoff_base_secs > sup.backoff_cap_secs {
            bail!(
                "supervisor.backoff_base_secs ({}) exceeds backoff_cap_secs ({})",
                sup.backoff_base_secs,
                sup.backoff_cap_secs
            );
        }
        Ok(())
    }
}
