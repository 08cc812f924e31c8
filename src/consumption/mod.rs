pub mod calculator;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod repository;
pub mod service;
pub mod sweep;
pub mod window;

pub use calculator::*;
pub use decision::*;
pub use error::*;
pub use ledger::*;
pub use metrics::*;
pub use models::*;
pub use policy::*;
pub use repository::*;
pub use service::*;
pub use sweep::*;
pub use window::*;
