use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::types::Intent;

/// Pipeline stage notification, serialised as `{"stage": ..., "details": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", content = "details", rename_all = "snake_case")]
pub enum ProgressEvent {
    Classifying {
        intent: Intent,
    },
    Searching {
        queries: Vec<String>,
        /// Set for complex queries, even when they yield a single sub-query.
        multi_query: bool,
    },
    Generating {
        context_hits: usize,
    },
    Complete {
        used_retrieval: bool,
    },
    /// A component took its degraded path; the invocation still completes.
    Warning {
        component: &'static str,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Classifying { .. } => "classifying",
            Self::Searching { .. } => "searching",
            Self::Generating { .. } => "generating",
            Self::Complete { .. } => "complete",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
        }
    }
}

/// Observer for pipeline stages. Emitting must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.send(event);
    }
}

/// Adapts a closure into a [`ProgressSink`].
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.0)(event);
    }
}

pub(crate) fn notify(sink: Option<&dyn ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        tracing::trace!(stage = event.stage(), "progress");
        sink.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn serializes_with_stage_and_details() {
        let event = ProgressEvent::Searching {
            queries: vec!["opd timing".into()],
            multi_query: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "searching");
        assert_eq!(json["details"]["queries"][0], "opd timing");
        assert_eq!(json["details"]["multi_query"], false);
    }

    #[test]
    fn classifying_details_carry_intent() {
        let json = serde_json::to_value(ProgressEvent::Classifying {
            intent: Intent::Greeting,
        })
        .unwrap();
        assert_eq!(json["stage"], "classifying");
        assert_eq!(json["details"]["intent"], "greeting");
    }

    #[test]
    fn stage_names() {
        assert_eq!(ProgressEvent::Generating { context_hits: 0 }.stage(), "generating");
        assert_eq!(
            ProgressEvent::Error {
                message: String::new()
            }
            .stage(),
            "error"
        );
    }

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        notify(Some(&tx), ProgressEvent::Complete { used_retrieval: true });
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::Complete { used_retrieval: true })
        );
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
        drop(rx);
        tx.emit(ProgressEvent::Complete {
            used_retrieval: false,
        });
    }

    #[test]
    fn closure_sink_collects() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = FnSink(move |e: ProgressEvent| seen_clone.lock().unwrap().push(e.stage()));
        notify(Some(&sink), ProgressEvent::Generating { context_hits: 2 });
        notify(None, ProgressEvent::Generating { context_hits: 2 });
        assert_eq!(*seen.lock().unwrap(), vec!["generating"]);
    }
}
