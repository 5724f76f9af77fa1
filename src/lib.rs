pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod format;
pub mod ingest;
pub mod model;
pub mod normalize;
pub mod search;
pub mod stats;
pub mod store;
pub mod view;
pub mod worker;

pub use config::ExplorerConfig;
pub use error::{ImportError, IngestError, StoreError};
pub use extract::SourceFile;
pub use ingest::{IngestProgress, Ingestion, ingest, ingest_with_progress};
pub use model::{Play, PlayFilters, SearchTerm, SortField, SortSpec, TimelineGrouping};
pub use stats::{AggregateStats, CalculationRequest, CalculationResult, PlayStatistics};
pub use store::{HistoryService, JsonFileStore, MemoryStore, PlayStore};
pub use view::PlayView;
pub use worker::AnalyticsWorker;
