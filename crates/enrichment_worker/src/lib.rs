pub mod domain;
pub mod enrichment_worker;
pub mod nats;
pub mod sink;

pub use domain::*;
pub use enrichment_worker::*;
pub use nats::*;
pub use sink::*;
