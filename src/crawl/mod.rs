pub mod driver;
pub mod pool;

pub use driver::CrawlDriver;
pub use pool::{jobs_for, run_pool, CrawlJob, PoolReport};
