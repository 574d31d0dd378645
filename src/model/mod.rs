pub mod candle;
pub mod feed_row;
pub mod market_state;
pub mod signal;
