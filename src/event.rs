use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use crate::browse::hydrate::HydrationResponse;
use crate::browse::scan::ScanResponse;
use crate::browse::ViewId;
use crate::keyspace::backend::BackendError;
use crate::tree::worker::TreeOutcome;

use crate::error::Result;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick; drives debounce deadlines.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// A scan request returned.
    ScanCompleted(ScanResponse),
    /// A metadata batch returned.
    HydrationCompleted(HydrationResponse),
    /// Total key count for a view's sweep.
    KeyCount {
        view: ViewId,
        epoch: u64,
        result: std::result::Result<Option<u64>, BackendError>,
    },
    /// A background tree job finished.
    TreeReady(TreeOutcome),
}

/// Polls crossterm events on a background task and forwards them, together
/// with completions from spawned work, through one channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || loop {
            let forwarded = if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(Event::Key(key)),
                    Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                    _ => Ok(()),
                }
            } else {
                event_tx.send(Event::Tick)
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Sender for spawned tasks to report completions.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (waits until one is available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| crate::error::AppError::Terminal("Event channel closed".into()))
    }
}
