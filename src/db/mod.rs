pub mod merge;
mod schema;
pub mod store;

pub use merge::MergeEngine;
pub use store::ShardStore;
