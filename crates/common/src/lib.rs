pub mod domain;
pub mod nats;
pub mod telemetry;
pub mod validation;

pub use domain::*;
pub use nats::*;

// Re-export mocks when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRegistry;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEnrichedEventSink;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
