pub mod aggregator;
pub mod rate;
pub mod snapshot;
pub mod source;
