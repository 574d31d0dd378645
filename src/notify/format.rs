use crate::model::signal::{Direction, TradingSignal};

/// Numeric fields recovered from a formatted alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertFields {
    pub symbol: String,
    pub direction: Direction,
    pub price: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{} ms", ms))
}

/// HTML alert for the operator channel. Prices use `decimals` places.
pub fn format_signal(signal: &TradingSignal, decimals: usize) -> String {
    let emoji = match signal.direction {
        Direction::Long => "🚀",
        Direction::Short => "🔻",
    };
    let stars = "⭐".repeat((signal.confidence.clamp(0.0, 1.0) * 5.0) as usize);
    let ind = &signal.indicators;

    format!(
        "{emoji} <b>Trading Signal - {symbol}</b>\n\n\
         📊 Type: {direction}\n\
         💰 Price: {price:.d$}\n\
         ✅ Entry: {entry:.d$}\n\
         🛑 Stop Loss: {stop:.d$}\n\
         🎯 Take Profit: {target:.d$}\n\
         📈 Confidence: {stars} ({confidence:.2}%)\n\n\
         📊 Indicators:\n\
         RSI: {rsi:.2}\n\
         MACD: {macd:.d$}\n\
         BB Upper: {bb_upper:.d$}\n\
         BB Lower: {bb_lower:.d$}\n\n\
         ⏰ {time}",
        symbol = escape_html(&signal.symbol),
        direction = signal.direction,
        price = signal.price,
        entry = signal.entry,
        stop = signal.stop_loss,
        target = signal.take_profit,
        confidence = signal.confidence * 100.0,
        rsi = ind.rsi,
        macd = ind.macd,
        bb_upper = ind.bb_upper,
        bb_lower = ind.bb_lower,
        time = format_timestamp(signal.timestamp_ms),
        d = decimals,
    )
}

/// Read the headline fields back out of a message built by [`format_signal`].
pub fn parse_alert_fields(text: &str) -> Option<AlertFields> {
    let mut symbol = None;
    let mut direction = None;
    let mut price = None;
    let mut entry = None;
    let mut stop_loss = None;
    let mut take_profit = None;
    let mut confidence = None;

    for line in text.lines() {
        if let Some(rest) = line.split_once("Trading Signal - ").map(|(_, r)| r) {
            symbol = Some(unescape_html(rest.trim_end_matches("</b>")));
            continue;
        }
        let Some((label, value)) = line.split_once(": ") else {
            continue;
        };
        let value = value.trim();
        if label.ends_with("Type") {
            direction = match value {
                "LONG" => Some(Direction::Long),
                "SHORT" => Some(Direction::Short),
                _ => None,
            };
        } else if label.ends_with("Price") {
            price = value.parse().ok();
        } else if label.ends_with("Entry") {
            entry = value.parse().ok();
        } else if label.ends_with("Stop Loss") {
            stop_loss = value.parse().ok();
        } else if label.ends_with("Take Profit") {
            take_profit = value.parse().ok();
        } else if label.ends_with("Confidence") {
            confidence = value
                .rsplit_once('(')
                .map(|(_, pct)| pct.trim_end_matches(')').trim_end_matches('%'))
                .and_then(|pct| pct.parse::<f64>().ok())
                .map(|pct| pct / 100.0);
        }
    }

    Some(AlertFields {
        symbol: symbol?,
        direction: direction?,
        price: price?,
        entry: entry?,
        stop_loss: stop_loss?,
        take_profit: take_profit?,
        confidence: confidence?,
    })
}

pub fn startup_message(source: &str, symbols_hint: &str) -> String {
    format!(
        "🤖 <b>Trading Bot Started</b>\nFeed: {}\nWatching: {}",
        escape_html(source),
        escape_html(symbols_hint)
    )
}

pub fn shutdown_message(reason: &str) -> String {
    format!("🛑 <b>Trading Bot Stopped</b>\n{}", escape_html(reason))
}
