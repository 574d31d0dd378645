use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::Config;
use crate::detector::ChangeDetector;
use crate::error::{AppError, ErrorScope};
use crate::event::{CycleReport, Phase, StatusSnapshot, SymbolOutcome};
use crate::indicator::IndicatorEngine;
use crate::lifecycle::{ExitOrchestrator, MarketBook};
use crate::notify::format::{shutdown_message, startup_message};
use crate::notify::{Dispatch, NotificationGate, NotifierSink};
use crate::source::DataSource;
use crate::strategy::{SignalPolicy, TrendConfluencePolicy};

/// Reconnect delay that grows by `base` per consecutive failure, capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    base: Duration,
    cap: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        self.base.saturating_mul(failures).min(self.cap)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub phase: Phase,
    pub consecutive_failures: u32,
    pub last_poll_ms: Option<u64>,
}

/// Why the run loop stopped.
#[derive(Debug)]
pub enum Termination {
    Cancelled,
    ReconnectExhausted { attempts: u32 },
    Fatal(AppError),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Cancelled => "Shutdown requested".to_string(),
            Self::ReconnectExhausted { attempts } => {
                format!("Feed unavailable after {} reconnect attempts", attempts)
            }
            Self::Fatal(e) => format!("Fatal error: {}", e),
        }
    }
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Sleep for `duration` unless shutdown is requested first. Returns true on shutdown.
/// A dropped shutdown sender counts as a request.
pub async fn sleep_or_cancel(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Owns every piece of mutable engine state and drives the
/// poll, detect, analyse, notify cycle.
pub struct Supervisor {
    source: Box<dyn DataSource>,
    sink: Arc<dyn NotifierSink>,
    engine: IndicatorEngine,
    policy: Box<dyn SignalPolicy>,
    gate: NotificationGate,
    detector: ChangeDetector,
    book: MarketBook,
    state: SupervisorState,
    backoff: LinearBackoff,
    max_reconnect_attempts: u32,
    poll_interval: Duration,
    min_pings: u32,
    watchlist: Vec<String>,
    kline_interval: String,
    candle_limit: usize,
    shutdown_notice: bool,
    alerts_sent: u64,
    cycles_completed: u64,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl Supervisor {
    pub fn new(config: &Config, source: Box<dyn DataSource>, sink: Arc<dyn NotifierSink>) -> Self {
        let (status_tx, _) = watch::channel(StatusSnapshot::default());
        let engine = IndicatorEngine::new(&config.indicators);
        // The window must cover the longest lookback even if candle_limit is set lower.
        let candle_limit = config.market.candle_limit.max(engine.min_candles());
        Self {
            source,
            sink,
            engine,
            policy: Box::new(TrendConfluencePolicy::new(&config.signal)),
            gate: NotificationGate::new(&config.notify, config.signal.min_confidence),
            detector: ChangeDetector::new(&config.feed.quote_asset),
            book: MarketBook::new(config.supervisor.market_state_ttl_secs.saturating_mul(1000)),
            state: SupervisorState {
                phase: Phase::Init,
                consecutive_failures: 0,
                last_poll_ms: None,
            },
            backoff: LinearBackoff::new(
                Duration::from_secs(config.supervisor.backoff_base_secs),
                Duration::from_secs(config.supervisor.backoff_cap_secs),
            ),
            max_reconnect_attempts: config.supervisor.max_reconnect_attempts,
            poll_interval: config.feed.poll_interval(),
            min_pings: config.feed.min_pings,
            watchlist: config.market.watchlist(),
            kline_interval: config.market.kline_interval.clone(),
            candle_limit,
            shutdown_notice: config.notify.shutdown_notice,
            alerts_sent: 0,
            cycles_completed: 0,
            status_tx,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn SignalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn book(&self) -> &MarketBook {
        &self.book
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    fn publish(&self) {
        self.status_tx.send_replace(StatusSnapshot {
            phase: self.state.phase,
            consecutive_failures: self.state.consecutive_failures,
            last_poll_ms: self.state.last_poll_ms,
            tracked_symbols: self.book.active_symbols(),
            alerts_sent: self.alerts_sent,
            cycles_completed: self.cycles_completed,
        });
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            tracing::info!(from = %self.state.phase, to = %phase, "Phase change");
            self.state.phase = phase;
        }
        self.publish();
    }

    /// Run until cancelled, out of reconnect attempts, or a fatal error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Termination {
        self.set_phase(Phase::Init);
        if let Err(e) = self.start().await {
            tracing::error!(phase = %self.state.phase, error = %e, "Startup failed");
            let termination = Termination::Fatal(e);
            self.stop(&termination, false).await;
            return termination;
        }
        self.set_phase(Phase::Connected);

        let termination = loop {
            if shutdown_requested(&shutdown) {
                break Termination::Cancelled;
            }
            self.set_phase(Phase::Polling);

            match self.run_cycle(now_ms()).await {
                Ok(report) => {
                    if self.state.consecutive_failures > 0 {
                        tracing::info!(
                            failures = self.state.consecutive_failures,
                            "Feed recovered; failure counter reset"
                        );
                    }
                    self.state.consecutive_failures = 0;
                    self.publish();
                    tracing::info!(
                        rows = report.rows_seen,
                        new_rows = report.new_rows,
                        analysed = report.outcomes.len(),
                        sent = report.sent(),
                        rate_limited = report.rate_limited(),
                        "Cycle complete"
                    );
                }
                Err(e) => match e.scope() {
                    ErrorScope::Fatal => {
                        tracing::error!(phase = %self.state.phase, error = %e, "Fatal error");
                        break Termination::Fatal(e);
                    }
                    ErrorScope::Connection => {
                        if let Err(termination) = self.reconnect(e, &mut shutdown).await {
                            break termination;
                        }
                        continue;
                    }
                    ErrorScope::Item => {
                        tracing::warn!(phase = %self.state.phase, error = %e, "Cycle skipped");
                    }
                },
            }

            if sleep_or_cancel(self.poll_interval, &mut shutdown).await {
                break Termination::Cancelled;
            }
        };

        self.stop(&termination, true).await;
        termination
    }

    /// INIT: acquire the feed, verify the sink, announce startup. Any failure is fatal.
    async fn start(&mut self) -> Result<(), AppError> {
        self.source.acquire().await?;
        let identity = self.sink.verify().await?;
        let hint = if self.watchlist.is_empty() {
            format!("new rows with >= {} pings", self.min_pings)
        } else {
            format!(
                "{} + new rows with >= {} pings",
                self.watchlist.join(", "),
                self.min_pings
            )
        };
        self.sink
            .send(&startup_message(self.source.name(), &hint))
            .await?;
        tracing::info!(source = self.source.name(), bot = %identity, "Engine started");
        Ok(())
    }

    /// RECONNECTING: back off, then release and re-acquire the source.
    async fn reconnect(
        &mut self,
        mut error: AppError,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), Termination> {
        self.set_phase(Phase::Reconnecting);
        loop {
            self.state.consecutive_failures += 1;
            let failures = self.state.consecutive_failures;
            if failures > self.max_reconnect_attempts {
                tracing::error!(
                    failures,
                    max = self.max_reconnect_attempts,
                    error = %error,
                    "Max reconnect attempts exceeded"
                );
                return Err(Termination::ReconnectExhausted {
                    attempts: self.max_reconnect_attempts,
                });
            }

            let delay = self.backoff.delay_for(failures);
            self.publish();
            tracing::warn!(
                phase = %self.state.phase,
                attempt = failures,
                delay_secs = delay.as_secs(),
                error = %error,
                "Feed failure; reconnecting"
            );
            if sleep_or_cancel(delay, shutdown).await {
                return Err(Termination::Cancelled);
            }

            self.source.release().await;
            match self.source.acquire().await {
                Ok(()) => {
                    tracing::info!(attempt = failures, "Source re-acquired");
                    self.set_phase(Phase::Polling);
                    return Ok(());
                }
                Err(e) if e.scope() == ErrorScope::Fatal => return Err(Termination::Fatal(e)),
                Err(e) => error = e,
            }
        }
    }

    async fn stop(&mut self, termination: &Termination, announce: bool) {
        self.source.release().await;
        if announce && self.shutdown_notice {
            if let Err(e) = self.sink.send(&shutdown_message(&termination.reason())).await {
                tracing::warn!(error = %e, "Shutdown notice not delivered");
            }
        }
        self.set_phase(Phase::Terminated);
        if termination.is_success() {
            tracing::info!(reason = %termination.reason(), "Engine stopped");
        } else {
            tracing::error!(reason = %termination.reason(), "Engine terminated");
        }
    }

    /// One poll cycle at `now_ms`. Connection-level and fatal errors abort
    /// the cycle; anything scoped to one row or symbol is contained in the report.
    ///
    /// Row keys are committed to the detector only when the cycle completes,
    /// and rows whose symbol was skipped stay new for the next poll.
    pub async fn run_cycle(&mut self, now_ms: u64) -> Result<CycleReport, AppError> {
        let rows = self.source.poll_feed().await?;
        self.state.last_poll_ms = Some(now_ms);

        let mut detection = self.detector.observe(&rows);
        let mut report = CycleReport {
            rows_seen: detection.total_rows,
            new_rows: detection.new_rows.len(),
            parse_failures: detection.parse_failures.len(),
            ..CycleReport::default()
        };

        let mut symbols: Vec<String> = Vec::new();
        let pinged = detection
            .new_rows
            .iter()
            .filter(|row| row.ping_count >= self.min_pings)
            .map(|row| row.symbol.clone());
        for symbol in pinged
            .chain(self.watchlist.iter().cloned())
            .chain(self.book.active_symbols())
        {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        let mut skipped: Vec<String> = Vec::new();
        for symbol in symbols {
            let outcome = match self.analyse(&symbol, now_ms).await {
                Ok(outcome) => outcome,
                Err(e) if e.scope() != ErrorScope::Item => return Err(e),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Symbol skipped");
                    SymbolOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
            };
            if matches!(outcome, SymbolOutcome::Skipped { .. }) {
                skipped.push(symbol.clone());
            }
            report.outcomes.push((symbol, outcome));
        }

        let retry_keys: Vec<String> = detection
            .new_rows
            .iter()
            .filter(|row| skipped.contains(&row.symbol))
            .map(|row| row.dedup_key())
            .collect();
        for key in &retry_keys {
            detection.keys.remove(key);
        }
        if !retry_keys.is_empty() {
            tracing::debug!(rows = retry_keys.len(), "Skipped rows kept for the next poll");
        }
        self.detector.commit(detection.keys);

        report.purged_records = self.gate.purge(now_ms);
        for (state, trigger) in self.book.sweep(now_ms) {
            let event = ExitOrchestrator::decide(trigger);
            tracing::info!(
                symbol = %state.symbol,
                state_id = %state.state_id,
                event,
                price = state.current_price,
                "Market state closed"
            );
            report.exits.push((state.symbol, event));
        }

        self.cycles_completed += 1;
        self.publish();
        Ok(report)
    }

    async fn analyse(&mut self, symbol: &str, now_ms: u64) -> Result<SymbolOutcome, AppError> {
        let candles = self
            .source
            .fetch_candles(symbol, &self.kline_interval, self.candle_limit)
            .await?;
        let Some(price) = candles.last().map(|c| c.close) else {
            return Ok(SymbolOutcome::Skipped {
                reason: "no candles".to_string(),
            });
        };

        if let Some(trigger) = self.book.on_price(symbol, price) {
            tracing::info!(
                symbol,
                price,
                event = ExitOrchestrator::decide(trigger),
                "Exit level crossed"
            );
        }

        let indicators = match self.engine.evaluate(&candles) {
            Ok(indicators) => indicators,
            Err(e) => {
                tracing::debug!(symbol, candles = candles.len(), reason = %e, "No indicators");
                return Ok(SymbolOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let Some(signal) = self.policy.evaluate(symbol, price, &indicators, now_ms) else {
            return Ok(SymbolOutcome::NoSignal);
        };
        if !self.gate.qualifies(&signal) {
            return Ok(SymbolOutcome::Dispatched(Dispatch::BelowConfidence {
                confidence: signal.confidence,
            }));
        }

        let state_id = self.book.on_signal(&signal, now_ms);
        tracing::info!(
            symbol,
            state_id = %state_id,
            policy = self.policy.name(),
            direction = %signal.direction,
            entry = signal.entry,
            stop_loss = signal.stop_loss,
            take_profit = signal.take_profit,
            risk = signal.risk(),
            reward = signal.reward(),
            "Signal generated"
        );

        match self.gate.dispatch(&signal, &*self.sink, now_ms).await {
            Ok(dispatch) => {
                if dispatch == Dispatch::Sent {
                    self.alerts_sent += 1;
                }
                Ok(SymbolOutcome::Dispatched(dispatch))
            }
            Err(e) => Ok(SymbolOutcome::DeliveryFailed {
                error: e.to_string(),
            }),
        }
    }
}
