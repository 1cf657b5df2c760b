#![forbid(unsafe_code)]

pub mod connectivity;
pub mod geo;
pub mod lesson;
pub mod model;
pub mod time;

pub use connectivity::ConnectivityStatus;
pub use time::Clock;
