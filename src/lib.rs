pub mod config;
pub mod environment;
pub mod error;
pub mod learning;
pub mod simulation;
pub mod trace;

pub type Int = i32;

/// Default number of inventory buckets per day in the encoded state.
pub const INVENTORY_BINS: usize = 100;
