pub mod aggregation;
pub mod dispatch;
pub mod executor;
mod semaphore;
pub mod types;
pub mod work;
mod worker_pool;

pub use aggregation::{ResultCollector, UnitEvent};
pub use dispatch::ActiveUnits;
pub use executor::*;
pub use types::*;
pub use work::UnitOfWork;
