use crate::lifecycle::engine::ExitTrigger;

pub struct ExitOrchestrator;

impl ExitOrchestrator {
    pub fn decide(trigger: ExitTrigger) -> &'static str {
        match trigger {
            ExitTrigger::StopLoss => "market.exit.stop_loss",
            ExitTrigger::TakeProfit => "market.exit.take_profit",
            ExitTrigger::Expired => "market.exit.expired",
        }
    }
}
