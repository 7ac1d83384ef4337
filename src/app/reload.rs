//! Hot reload: feeds watcher events to the view engines.

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn};

use super::{App, AppInner};
use crate::watcher::{CheckInterval, Event, Watcher};

impl App {
    pub(super) fn start_watcher(&self, interval: Duration) {
        let Some(fsys) = self.inner.fsys.clone() else {
            warn!("watch enabled without a file system");
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("watch needs a tokio runtime, hot reload disabled");
            return;
        }

        let (mut watcher, events, errors) = Watcher::new(fsys, CheckInterval::new(interval));
        if let Err(e) = watcher.add(".") {
            warn!(error = %e, "initial scan failed, hot reload disabled");
            return;
        }
        *self.inner.watcher.lock() = Some(watcher.spawn());

        let consumer = consume(Arc::downgrade(&self.inner), events, errors);
        match &self.inner.dispatch {
            Some(dispatch) => tokio::spawn(consumer.with_subscriber(dispatch.clone())),
            None => tokio::spawn(consumer),
        };
        info!(interval = ?interval, "hot reload enabled");
    }

    /// The live watcher scan period, when watching.
    pub fn check_interval(&self) -> Option<CheckInterval> {
        self.inner
            .watcher
            .lock()
            .as_ref()
            .map(|watcher| watcher.interval().clone())
    }

    /// Offers one event to every engine in order.
    pub(crate) fn apply(&self, event: &Event) {
        let Some(fsys) = &self.inner.fsys else {
            return;
        };
        let mut engines = self.inner.engines.lock();
        for engine in engines.iter_mut() {
            if let Err(e) = engine.file_changed(fsys, self, event) {
                warn!(path = %event.path, op = %event.op, error = %e, "reload failed");
            }
        }
    }
}

// Runs until the watcher's event channel closes or the app is dropped.
async fn consume(
    app: Weak<AppInner>,
    mut events: mpsc::Receiver<Event>,
    mut errors: mpsc::Receiver<io::Error>,
) {
    let mut errors_open = true;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Drain whatever the watcher reported before it stopped.
                    while let Ok(e) = errors.try_recv() {
                        warn!(error = %e, "watcher error");
                    }
                    break;
                };
                let Some(inner) = app.upgrade() else {
                    break;
                };
                App { inner }.apply(&event);
            }
            error = errors.recv(), if errors_open => match error {
                Some(e) => warn!(error = %e, "watcher error"),
                None => errors_open = false,
            },
        }
    }
    debug!("hot reload stopped");
}
