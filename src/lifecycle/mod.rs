pub mod engine;
pub mod exit_orchestrator;

pub use engine::{ExitTrigger, MarketBook};
pub use exit_orchestrator::ExitOrchestrator;
