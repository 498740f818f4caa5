//! Background transcript jobs.

use bridge_traits::{TrackAnalysis, TrackStore};
use core_library::{Library, TrackId};
use core_metadata::TranscriptionPoller;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

/// Run the poller for `track_id` on its own task.
///
/// A finished transcript is persisted on the remote record before it is put
/// on the library track. Failing to persist is logged and does not stop the
/// library update.
pub(crate) fn spawn(
    poller: Arc<TranscriptionPoller>,
    library: Arc<Library>,
    store: Arc<dyn TrackStore>,
    events: EventBus,
    track_id: TrackId,
) -> JoinHandle<()> {
    let span = info_span!("transcription", track_id = %track_id);
    tokio::spawn(
        async move {
            let transcript = match poller.run(track_id.as_str()).await {
                Ok(transcript) => transcript,
                Err(err) => {
                    warn!(error = %err, "No transcript");
                    let _ = events.emit(CoreEvent::Library(LibraryEvent::TranscriptFailed {
                        track_id: track_id.to_string(),
                        reason: err.to_string(),
                    }));
                    return;
                }
            };

            let analysis = TrackAnalysis {
                transcript: Some(transcript.clone()),
            };
            if let Err(err) = store.update_analysis(track_id.as_str(), &analysis).await {
                warn!(error = %err, "Failed to persist transcript");
            }

            let updated = library.update(&track_id, |track| {
                track.transcript = Some(transcript);
            });
            if updated.is_some() {
                info!("Transcript attached");
                let _ = events.emit(CoreEvent::Library(LibraryEvent::TrackUpdated {
                    track_id: track_id.to_string(),
                    change: "transcript".to_string(),
                }));
            }
        }
        .instrument(span),
    )
}
