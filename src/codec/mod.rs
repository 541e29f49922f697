pub mod h264;

// Re-export common types and functions
pub use h264::split_access_unit;
pub use h264::AccessUnitSummary;
pub use h264::NALUnit;
