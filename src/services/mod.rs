pub mod aggregation;
pub mod entry;
