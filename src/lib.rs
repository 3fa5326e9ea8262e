// papertrader - AI-assisted trading signals with a paper portfolio
// Signals combine price history, news, a quant delegate and a generative model;
// the portfolio is a cost-basis ledger over an optimistic-concurrency account store.

#![deny(clippy::unwrap_used)]

pub mod config;
pub mod data;
pub mod db;
pub mod llm;
pub mod orchestrator;
pub mod server;
pub mod trading;

// Re-export commonly used items
pub use config::Config;
pub use data::{DataError, Headlines, PriceSeries, TechnicalSummary};
pub use orchestrator::{SignalDecision, SignalOrchestrator, SignalResult};
pub use trading::{Account, AccountManager, LedgerError, Position};
