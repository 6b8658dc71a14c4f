// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::outcome::OutcomeRecord;

/// Events emitted during a conversion run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A playlist URL is being expanded
    ResolvingPlaylist { url: String },

    /// A playlist was expanded
    PlaylistResolved {
        title: String,
        /// Videos enqueued from it after deduplication
        videos: usize,
    },

    /// A playlist could not be expanded; the run continues without it
    PlaylistFailed { url: String, error: String },

    /// The batch is about to start
    BatchStarting { total: usize },

    /// An item is being fetched
    ItemStarting {
        /// 0-based position in the batch
        index: usize,
        total: usize,
        url: String,
    },

    /// A transient failure is being retried
    ItemRetrying {
        index: usize,
        /// The attempt about to start, 2 for the first retry
        attempt: u32,
        error: String,
    },

    /// An item finished, successfully or not
    ItemFinished {
        index: usize,
        total: usize,
        /// This item's record, the next row of the progress table
        outcome: Box<OutcomeRecord>,
        /// Running totals including this item
        succeeded: usize,
        failed: usize,
    },

    /// An archive was serialized
    ArchiveReady {
        name: String,
        files: usize,
        bytes: u64,
    },

    /// The workspace was emptied
    WorkspacePurged { removed: usize, failed: usize },

    /// The batch completed
    BatchCompleted {
        succeeded: usize,
        failed: usize,
        stopped: bool,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Collects every event for later assertions
    #[derive(Default)]
    pub struct RecordingReporter {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    use crate::input::WorkItem;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::ResolvingPlaylist {
            url: "https://example.com/playlist?list=PL1".to_string(),
        });
        reporter.report(ProgressEvent::PlaylistResolved {
            title: "Mix".to_string(),
            videos: 3,
        });
        reporter.report(ProgressEvent::PlaylistFailed {
            url: "https://example.com/playlist?list=PL2".to_string(),
            error: "HTTP Error 404".to_string(),
        });
        reporter.report(ProgressEvent::BatchStarting { total: 3 });
        reporter.report(ProgressEvent::ItemStarting {
            index: 0,
            total: 3,
            url: "https://video/A".to_string(),
        });
        reporter.report(ProgressEvent::ItemRetrying {
            index: 0,
            attempt: 2,
            error: "Connection reset".to_string(),
        });
        reporter.report(ProgressEvent::ItemFinished {
            index: 0,
            total: 3,
            outcome: Box::new(OutcomeRecord::failed(
                WorkItem {
                    index: 0,
                    source_url: "https://video/A".to_string(),
                    video_key: "https://video/A".to_string(),
                    playlist_id: None,
                    playlist_index: None,
                },
                "Network failure: reset",
            )),
            succeeded: 0,
            failed: 1,
        });
        reporter.report(ProgressEvent::ArchiveReady {
            name: "bundle.zip".to_string(),
            files: 2,
            bytes: 1024,
        });
        reporter.report(ProgressEvent::WorkspacePurged {
            removed: 2,
            failed: 0,
        });
        reporter.report(ProgressEvent::BatchCompleted {
            succeeded: 2,
            failed: 1,
            stopped: false,
        });
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::default();
        reporter.report(ProgressEvent::BatchStarting { total: 1 });
        reporter.report(ProgressEvent::WorkspacePurged {
            removed: 0,
            failed: 0,
        });

        let events = reporter.events();
        assert!(matches!(events[0], ProgressEvent::BatchStarting { total: 1 }));
        assert!(matches!(events[1], ProgressEvent::WorkspacePurged { .. }));
    }
}
