pub mod analysis;
pub mod api;
pub mod models;
pub mod scan;

pub use models::{ScanRecord, ScanResponse};
pub use scan::{ScanError, ScanOutcome, ScanPipeline};
