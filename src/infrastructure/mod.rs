mod chat_ollama;
mod clock;
mod collector_sequential;
mod collector_windowed;
mod dataset_merger;
mod enricher_github;
mod fetcher_graphql;
mod fetcher_heritage;
mod fetcher_rate_limiter;
mod fetcher_rest;
mod fetcher_retrier;
mod harvester_keywords;
mod keyword_generator;
mod persister_csv;
mod persister_json;
mod rate_limit_guard;
mod session;

pub use chat_ollama::*;
pub use clock::*;
pub use collector_sequential::*;
pub use collector_windowed::*;
pub use dataset_merger::*;
pub use enricher_github::*;
pub use fetcher_graphql::*;
pub use fetcher_heritage::*;
pub use fetcher_rate_limiter::*;
pub use fetcher_rest::*;
pub use fetcher_retrier::*;
pub use harvester_keywords::*;
pub use keyword_generator::*;
pub use persister_csv::*;
pub use persister_json::*;
pub use rate_limit_guard::*;
pub use session::*;
