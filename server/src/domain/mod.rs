pub mod coerce;
pub mod model;
pub mod privacy;
pub mod wizard;
