pub mod body;
pub mod observer;
pub mod tracking;

pub use observer::{TrafficObserver, Transaction};
pub use tracking::track_traffic;
