//! Messages marshalled from background reads back onto the controller's owner task

use crate::core::error::ReadError;
use crate::core::models::Person;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(pub u64);

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStyle {
    /// Returns immediately; completion is applied when the owner dispatches it
    Callback,
    /// Suspends the caller until its own completion has been applied
    Direct,
}

impl fmt::Display for FetchStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStyle::Callback => write!(f, "callback"),
            FetchStyle::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug)]
pub enum InboxMessage {
    Progress {
        fetch: FetchId,
        percent: u8,
    },
    Completed {
        fetch: FetchId,
        style: FetchStyle,
        result: Result<Vec<Person>, ReadError>,
    },
    CancelRequested,
}

pub type InboxSender = mpsc::UnboundedSender<InboxMessage>;
pub type InboxReceiver = mpsc::UnboundedReceiver<InboxMessage>;

/// Unbounded so that progress reports from a synchronous sink never block or drop
pub fn create_inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Progress callback handed to a reader for the lifetime of one fetch.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    fetch: FetchId,
    inbox: InboxSender,
}

impl ProgressSink {
    pub fn new(fetch: FetchId, inbox: InboxSender) -> Self {
        Self { fetch, inbox }
    }

    pub fn fetch_id(&self) -> FetchId {
        self.fetch
    }

    pub fn report(&self, percent: u8) {
        // The controller is gone; nobody is left to observe progress
        if self
            .inbox
            .send(InboxMessage::Progress {
                fetch: self.fetch,
                percent,
            })
            .is_err()
        {
            log::debug!("Dropping progress {percent}% for fetch {}", self.fetch);
        }
    }
}
