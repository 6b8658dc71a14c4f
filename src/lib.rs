pub mod adapter;
pub mod batch;
pub mod config;
pub mod error;
pub mod input;
pub mod outcome;
pub mod package;
pub mod progress;
pub mod report;
pub mod run;
pub mod track;
pub mod workspace;

// Re-export main types for convenience
pub use adapter::{FetchEncoder, FetchResult, PlaylistListing, YtDlpAdapter};
pub use batch::{BatchOptions, BatchResult, STOPPED_REASON, StopSignal, run_batch};
pub use config::{Bitrate, BundlingMode, RunOptions};
pub use error::{
    DeliveryError, EncoderError, FetchError, PackagingError, PlaylistError, ReportError, RunError,
    WorkspaceError,
};
pub use input::{
    BatchWarning, NormalizedInput, PlaylistLimits, PlaylistSummary, WorkItem, normalize_input,
    parse_url_lines, read_url_file,
};
pub use outcome::{OutcomeRecord, OutcomeStatus, TableRow, format_megabytes, tally};
pub use package::{PackagedArchive, deliver_archives, package};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use report::{RunReport, write_report};
pub use run::{Conversion, Delivery, RunRequest, convert};
pub use workspace::{PurgeReport, Workspace};
