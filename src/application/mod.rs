//! Application layer - Services wiring ports to domain logic.

pub mod catalog;
pub mod delivery;
pub mod dispatcher;
pub mod encoder;

pub use catalog::CatalogService;
pub use delivery::Delivery;
pub use dispatcher::{DispatchLimits, TransformationDispatcher};
pub use encoder::{EncodeSettings, EncoderService};
