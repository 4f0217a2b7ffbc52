pub mod registry;

pub use registry::{registry, NotificationEvent, NotificationRegistry};
