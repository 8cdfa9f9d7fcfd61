mod chat;
mod collector;
mod enricher;
mod fetcher;
mod persister;
mod rate_limit;

pub use chat::*;
pub use collector::*;
pub use enricher::*;
pub use fetcher::*;
pub use persister::*;
pub use rate_limit::*;
