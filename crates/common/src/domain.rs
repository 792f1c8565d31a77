mod enriched;
mod event;
mod registry;
mod result;

pub use enriched::*;
pub use event::*;
pub use registry::*;
pub use result::*;
