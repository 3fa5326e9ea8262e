pub mod account;
pub mod ledger;
pub mod pricing;
pub mod retry;
pub mod store;

// Re-export commonly used types
pub use account::{AccountError, AccountManager, TradeReceipt};
pub use ledger::{Account, LedgerError, Position, SellOutcome, Valuation};
pub use pricing::{PriceCheckError, QuoteService};
pub use store::{
    AccountStore, InMemoryAccountStore, PgAccountStore, StoreError, VersionedAccount,
};
