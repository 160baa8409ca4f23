/// CSV export of summaries and analysis reports.
pub mod export;
/// JSON input for grids and metadata.
pub mod input;
