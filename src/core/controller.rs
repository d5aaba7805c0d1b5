use crate::core::error::{FaultCause, ReadError};
use crate::core::fetch_progress::{
    FetchId, FetchStyle, InboxMessage, InboxReceiver, InboxSender, ProgressSink, create_inbox,
};
use crate::core::models::Person;
use crate::core::reader::PersonReader;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Canceled,
}

impl MessageKind {
    pub fn label(&self) -> &str {
        match self {
            MessageKind::Error => "ERROR",
            MessageKind::Canceled => "CANCELED",
        }
    }
}

/// Fire-and-forget notification raised once per terminal event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub kind: MessageKind,
    pub title: String,
    pub message: String,
}

impl UserMessage {
    fn canceled() -> Self {
        Self {
            kind: MessageKind::Canceled,
            title: MessageKind::Canceled.label().to_string(),
            message: "The fetch was canceled before it completed.".to_string(),
        }
    }

    fn error(cause: &FaultCause) -> Self {
        Self {
            kind: MessageKind::Error,
            title: cause.category.clone(),
            message: cause.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ProgressChanged(u8),
    PeopleChanged(Vec<Person>),
    BusyChanged { style: FetchStyle, busy: bool },
    UserMessage(UserMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded { count: usize },
    Canceled,
    Faulted { causes: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub people: Vec<Person>,
    pub progress: u8,
    pub callback_busy: bool,
    pub direct_busy: bool,
}

struct LiveFetch {
    fetch: FetchId,
    token: CancellationToken,
}

/// Cancels from outside the owner task by posting into the controller's inbox.
///
/// The request takes effect when the owner next applies its inbox, which
/// happens continuously while a direct-style fetch is suspended.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    inbox: InboxSender,
}

impl ControllerHandle {
    pub(crate) fn new(inbox: InboxSender) -> Self {
        Self { inbox }
    }

    pub fn cancel(&self) {
        if self.inbox.send(InboxMessage::CancelRequested).is_err() {
            log::debug!("Cancel requested after the controller was dropped");
        }
    }
}

/// View-model binding a cancellable roster read to observable state.
///
/// State is only touched by the task that owns the controller. Reads run on
/// spawned tasks and post progress and completion back through the inbox.
pub struct FetchController {
    reader: Arc<dyn PersonReader>,
    state: FetchState,
    live: Option<LiveFetch>,
    next_fetch: u64,
    in_flight: usize,
    // Completions applied while a direct-style fetch awaited a different one
    pending_outcomes: Vec<(FetchId, FetchOutcome)>,
    inbox_tx: InboxSender,
    inbox_rx: InboxReceiver,
    events: broadcast::Sender<ControllerEvent>,
}

impl FetchController {
    pub fn new(reader: Arc<dyn PersonReader>, event_capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = create_inbox();
        let (events, _) = broadcast::channel(event_capacity.max(1));

        Self {
            reader,
            state: FetchState::default(),
            live: None,
            next_fetch: 0,
            in_flight: 0,
            pending_outcomes: Vec::new(),
            inbox_tx,
            inbox_rx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(self.inbox_tx.clone())
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn people(&self) -> &[Person] {
        &self.state.people
    }

    pub fn progress(&self) -> u8 {
        self.state.progress
    }

    pub fn is_busy(&self, style: FetchStyle) -> bool {
        match style {
            FetchStyle::Callback => self.state.callback_busy,
            FetchStyle::Direct => self.state.direct_busy,
        }
    }

    /// True when no started fetch is still waiting for its completion to be applied
    #[allow(dead_code)]
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Start a read and return at once. The completion is applied by
    /// [`dispatch_pending`](Self::dispatch_pending), [`dispatch_next`](Self::dispatch_next)
    /// or [`run_until_idle`](Self::run_until_idle).
    pub fn fetch_using_callback_style(&mut self) -> FetchId {
        self.start(FetchStyle::Callback)
    }

    /// Start a read and suspend until it completes. Messages from any other
    /// fetch in flight are applied along the way, and their outcomes are held
    /// for the next [`dispatch_pending`](Self::dispatch_pending),
    /// [`dispatch_next`](Self::dispatch_next) or [`run_until_idle`](Self::run_until_idle).
    pub async fn fetch_using_direct_style(&mut self) -> FetchOutcome {
        let fetch = self.start(FetchStyle::Direct);

        while let Some(message) = self.inbox_rx.recv().await {
            if let Some((completed, outcome)) = self.apply(message) {
                if completed == fetch {
                    return outcome;
                }
                self.pending_outcomes.push((completed, outcome));
            }
        }

        // The controller holds a sender, so the inbox only closes if the
        // runtime is tearing down underneath us.
        log::error!("Inbox closed while direct fetch {fetch} was in flight");
        self.set_busy(FetchStyle::Direct, false);
        FetchOutcome::Canceled
    }

    /// Signal the live cancellation handle, if there is one.
    pub fn cancel(&self) {
        match &self.live {
            Some(live) => {
                if !live.token.is_cancelled() {
                    log::info!("Canceling fetch {}", live.fetch);
                }
                live.token.cancel();
            }
            None => log::debug!("Cancel requested with no fetch owning the handle"),
        }
    }

    /// Apply everything already in the inbox without waiting.
    #[allow(dead_code)]
    pub fn dispatch_pending(&mut self) -> Vec<(FetchId, FetchOutcome)> {
        let mut completed = std::mem::take(&mut self.pending_outcomes);
        while let Ok(message) = self.inbox_rx.try_recv() {
            completed.extend(self.apply(message));
        }
        completed
    }

    /// Return a held outcome, or wait for the next inbox message and apply it.
    /// Waits indefinitely when
    /// nothing is in flight and no handle posts a request.
    #[allow(dead_code)]
    pub async fn dispatch_next(&mut self) -> Option<(FetchId, FetchOutcome)> {
        if !self.pending_outcomes.is_empty() {
            return Some(self.pending_outcomes.remove(0));
        }
        let message = self.inbox_rx.recv().await?;
        self.apply(message)
    }

    /// Apply inbox messages until every started fetch has completed.
    pub async fn run_until_idle(&mut self) -> Vec<(FetchId, FetchOutcome)> {
        let mut completed = std::mem::take(&mut self.pending_outcomes);
        while self.in_flight > 0 {
            match self.inbox_rx.recv().await {
                Some(message) => completed.extend(self.apply(message)),
                None => break,
            }
        }
        completed
    }

    fn start(&mut self, style: FetchStyle) -> FetchId {
        if self.is_busy(style) {
            log::warn!("Starting a {style} fetch while an earlier {style} fetch is still running");
        }

        self.next_fetch += 1;
        let fetch = FetchId(self.next_fetch);
        let token = CancellationToken::new();
        if let Some(previous) = self.live.replace(LiveFetch {
            fetch,
            token: token.clone(),
        }) {
            log::debug!(
                "Fetch {} no longer owns the cancellation handle",
                previous.fetch
            );
        }

        self.set_busy(style, true);
        self.set_people(Vec::new());
        self.set_progress(0);
        self.in_flight += 1;
        log::info!("Starting {style} fetch {fetch}");

        let reader = Arc::clone(&self.reader);
        let inbox = self.inbox_tx.clone();
        let sink = ProgressSink::new(fetch, inbox.clone());
        tokio::spawn(async move {
            let result = AssertUnwindSafe(reader.read(sink, token))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ReadError::fault("Panic", &panic_message(panic.as_ref())))
                });

            if inbox
                .send(InboxMessage::Completed {
                    fetch,
                    style,
                    result,
                })
                .is_err()
            {
                log::debug!("Controller dropped before fetch {fetch} completed");
            }
        });

        fetch
    }

    fn apply(&mut self, message: InboxMessage) -> Option<(FetchId, FetchOutcome)> {
        match message {
            InboxMessage::Progress { fetch, percent } => {
                log::trace!("Fetch {fetch} progress {percent}%");
                self.set_progress(percent);
                None
            }
            InboxMessage::CancelRequested => {
                self.cancel();
                None
            }
            InboxMessage::Completed {
                fetch,
                style,
                result,
            } => Some((fetch, self.complete(fetch, style, result))),
        }
    }

    fn complete(
        &mut self,
        fetch: FetchId,
        style: FetchStyle,
        result: Result<Vec<Person>, ReadError>,
    ) -> FetchOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.live.as_ref().is_some_and(|live| live.fetch == fetch) {
            self.live = None;
        }

        let outcome = match result {
            Ok(people) => {
                let count = people.len();
                log::info!("Fetch {fetch} loaded {count} people");
                self.set_people(people);
                FetchOutcome::Succeeded { count }
            }
            Err(ReadError::Canceled) => {
                log::info!("Fetch {fetch} was canceled");
                self.notify(UserMessage::canceled());
                FetchOutcome::Canceled
            }
            Err(error) => {
                let causes = error.causes();
                log::warn!("Fetch {fetch} failed: {error}");
                for cause in &causes {
                    self.notify(UserMessage::error(cause));
                }
                FetchOutcome::Faulted {
                    causes: causes.len(),
                }
            }
        };

        self.set_busy(style, false);
        outcome
    }

    fn set_people(&mut self, people: Vec<Person>) {
        if self.state.people == people {
            return;
        }
        self.state.people = people;
        self.publish(ControllerEvent::PeopleChanged(self.state.people.clone()));
    }

    fn set_progress(&mut self, percent: u8) {
        if self.state.progress == percent {
            return;
        }
        self.state.progress = percent;
        self.publish(ControllerEvent::ProgressChanged(percent));
    }

    fn set_busy(&mut self, style: FetchStyle, busy: bool) {
        let flag = match style {
            FetchStyle::Callback => &mut self.state.callback_busy,
            FetchStyle::Direct => &mut self.state.direct_busy,
        };
        if *flag == busy {
            return;
        }
        *flag = busy;
        self.publish(ControllerEvent::BusyChanged { style, busy });
    }

    fn notify(&self, message: UserMessage) {
        self.publish(ControllerEvent::UserMessage(message));
    }

    fn publish(&self, event: ControllerEvent) {
        // No subscribers is fine; state is still readable through the accessors
        let _ = self.events.send(event);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "reader panicked".to_string()
    }
}
