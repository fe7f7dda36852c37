//! Lease legality
//!
//! - **Lease**: lease boundaries, attribute standardization and summaries
//! - **Classifier**: per-polygon overlay against the buffered lease union
//! - **Summary**: compliance and violation statistics

mod classifier;
mod lease;
mod summary;

pub use classifier::{
    classify, classify_cancellable, confidence, ClassificationRecord, ClassificationRecordSet,
    ClassificationStatus, ClassifierParams, LegalityClassifier, OverlappingLease, Severity,
    MIXED_OVERLAP_PERCENT,
};
pub use lease::{LeaseBoundary, LeaseBoundarySet, LeaseSummary};
pub use summary::{SummaryAggregator, SummaryStatistics};
