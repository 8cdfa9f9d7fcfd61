mod collection;
mod dataset;
mod entities;
mod error;
mod page;
mod query;

pub use collection::*;
pub use dataset::*;
pub use entities::*;
pub use error::*;
pub use page::*;
pub use query::*;
