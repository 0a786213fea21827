//! Core data models for papers and pipeline search operations.

mod paper;
mod search;

pub use paper::{Author, Paper, PaperBuilder};
pub use search::{
    CompareSearchReport, EnhancedSearchResult, QueryVariants, RankedPaper, SearchComparison,
    SearchMetadata, SearchOptions,
};
