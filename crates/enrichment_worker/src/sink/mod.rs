mod log_event_sink;

pub use log_event_sink::*;
