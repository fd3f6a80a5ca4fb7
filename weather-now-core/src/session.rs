//! Submit lifecycle for the front-end: `Idle → Loading → {Displayed, ErrorDisplayed}`.
//!
//! Every submit gets a fresh [`Ticket`]. Only the completion carrying the most
//! recent ticket is applied; anything older has been superseded and is dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::{
    model::WeatherResult,
    presentation::{DisplayState, map, present},
    provider::{IconFetcher, WeatherService},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Displayed,
    ErrorDisplayed,
}

/// A finished submit, ready to be offered to the [`Session`].
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub state: DisplayState,
    pub is_error: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    latest: u64,
    phase: Phase,
    current: Option<DisplayState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Any request still in flight is superseded.
    pub fn submit(&mut self) -> Ticket {
        self.latest += 1;
        self.phase = Phase::Loading;
        Ticket(self.latest)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest && self.phase == Phase::Loading
    }

    /// Apply a completion. Returns `false` when it was stale and discarded.
    pub fn complete(&mut self, completion: Completion) -> bool {
        if !self.is_current(completion.ticket) {
            debug!(
                ticket = completion.ticket.0,
                latest = self.latest,
                "discarding superseded result"
            );
            return false;
        }

        self.phase = if completion.is_error { Phase::ErrorDisplayed } else { Phase::Displayed };
        self.current = Some(completion.state);
        true
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&DisplayState> {
        self.current.as_ref()
    }
}

/// Runs submits on background tasks and hands back their completions.
#[derive(Debug)]
pub struct Dispatcher {
    service: Arc<dyn WeatherService>,
    icons: Arc<dyn IconFetcher>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn WeatherService>, icons: Arc<dyn IconFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { service, icons, tx, rx }
    }

    /// Fetch weather (and, on success, the icon) for `city` in the background.
    ///
    /// Every dispatch produces exactly one completion, even if the query task
    /// panics; that case completes as an error.
    pub fn dispatch(&self, ticket: Ticket, city: String) {
        let service = Arc::clone(&self.service);
        let icons = Arc::clone(&self.icons);
        let tx = self.tx.clone();

        let work = tokio::spawn(async move {
            let result = service.fetch(&city).await;
            let state = present(&result, icons.as_ref()).await;
            (state, !result.is_success())
        });

        tokio::spawn(async move {
            let completion = match work.await {
                Ok((state, is_error)) => Completion { ticket, state, is_error },
                Err(err) => {
                    warn!(ticket = ticket.0, error = %err, "query task failed");
                    let (state, _) = map(&WeatherResult::unexpected("request task failed"));
                    Completion { ticket, state, is_error: true }
                }
            };

            if tx.send(completion).is_err() {
                debug!(ticket = ticket.0, "receiver gone, dropping completion");
            }
        });
    }

    /// Next completion in arrival order, stale or not.
    pub async fn next(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Wait until the session accepts a completion and return the displayed state.
    pub async fn settle<'s>(&mut self, session: &'s mut Session) -> Option<&'s DisplayState> {
        while let Some(completion) = self.next().await {
            if session.complete(completion) {
                return session.current();
            }
        }
        None
    }
}
