//! Paginated, rate-limited collection of repository metadata from GitHub and
//! Software Heritage, with enrichment, persistence and dataset merging.

mod infrastructure;
mod interface;
mod model;

pub use infrastructure::*;
pub use interface::*;
pub use model::*;
