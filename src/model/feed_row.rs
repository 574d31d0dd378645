use crate::error::AppError;

/// Column order of the ping table: coin, pings, net vol BTC, net vol %,
/// recent total vol BTC, recent vol %, recent net vol, datetime.
pub const FEED_COLUMNS: usize = 8;

/// One scraped row, still as text. Adapters produce these; the change detector parses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeedRow {
    pub cells: Vec<String>,
}

impl RawFeedRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub coin: String,
    pub symbol: String,
    pub ping_count: u32,
    pub net_volume_btc: f64,
    pub net_volume_pct: f64,
    pub recent_total_volume_btc: f64,
    pub recent_volume_pct: f64,
    pub recent_net_volume: f64,
    pub row_timestamp: String,
}

impl FeedRow {
    pub fn parse(raw: &RawFeedRow, quote_asset: &str) -> Result<Self, AppError> {
        if raw.cells.len() < FEED_COLUMNS {
            return Err(AppError::DataFormat(format!(
                "feed row has {} cells, expected {}",
                raw.cells.len(),
                FEED_COLUMNS
            )));
        }
        let coin = raw.cells[0].trim().to_ascii_uppercase();
        if coin.is_empty() || !coin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::DataFormat(format!(
                "invalid coin '{}'",
                raw.cells[0]
            )));
        }
        let ping_count = raw.cells[1].trim().parse::<u32>().map_err(|_| {
            AppError::DataFormat(format!("{}: pings '{}' is not a count", coin, raw.cells[1]))
        })?;
        let row_timestamp = raw.cells[7].trim().to_string();
        if row_timestamp.is_empty() {
            return Err(AppError::DataFormat(format!("{}: missing row timestamp", coin)));
        }

        Ok(Self {
            symbol: format!("{}{}", coin, quote_asset.trim().to_ascii_uppercase()),
            ping_count,
            net_volume_btc: parse_number(&coin, "net volume", &raw.cells[2])?,
            net_volume_pct: parse_number(&coin, "net volume %", &raw.cells[3])?,
            recent_total_volume_btc: parse_number(&coin, "recent total volume", &raw.cells[4])?,
            recent_volume_pct: parse_number(&coin, "recent volume %", &raw.cells[5])?,
            recent_net_volume: parse_number(&coin, "recent net volume", &raw.cells[6])?,
            row_timestamp,
            coin,
        })
    }

    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.symbol, self.row_timestamp)
    }
}

/// Parse a table number, tolerating `%`, thousands separators and a leading `+`.
fn parse_number(coin: &str, field: &str, cell: &str) -> Result<f64, AppError> {
    let cleaned: String = cell
        .trim()
        .trim_end_matches('%')
        .trim_start_matches('+')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::DataFormat(format!(
            "{}: {} '{}' is not numeric",
            coin, field, cell
        ))),
    }
}
