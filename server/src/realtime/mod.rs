pub mod events;
pub mod hub;
pub mod socket;

pub use events::{ClientEvent, ServerEvent};
pub use hub::Hub;
