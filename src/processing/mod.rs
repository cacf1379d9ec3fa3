pub mod benchmark;
pub mod report;
pub mod result;
pub mod service;
pub mod timings;

pub use benchmark::BenchmarkRunner;
pub use report::BenchmarkReport;
pub use result::ProcessingResult;
pub use service::{ProcessOutcome, ProcessingService, ProcessingServiceBuilder};
pub use timings::{Aggregation, PathTimings};
