mod directory_client;
mod enriched_event_sink;
mod telemetry_event_processor;

pub use directory_client::*;
pub use enriched_event_sink::*;
pub use telemetry_event_processor::*;
