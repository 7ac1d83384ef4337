//! Polling file watcher.
//!
//! A [`Watcher`] rescans its roots on every tick of a [`CheckInterval`] and
//! reports differences against the previous scan as [`Event`]s. Both output
//! channels have capacity 1, so a slow consumer stalls the scan instead of
//! letting events pile up, and events for one file always arrive in the order
//! `Create`, `Write`..., `Remove`.
//!
//! Closing either receiver stops the watcher at its next send.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::fs::{self, FileSystem};

/// Scan period used when none is configured.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// What happened to a file between two scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Write,
    Remove,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Create => "CREATE",
            Op::Write => "WRITE",
            Op::Remove => "REMOVE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub path: String,
    pub op: Op,
}

impl Event {
    pub fn new(path: impl Into<String>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Shared, runtime-tunable scan period.
///
/// Clones observe the same value; a change takes effect from the next tick.
#[derive(Debug, Clone)]
pub struct CheckInterval(Arc<AtomicU64>);

impl CheckInterval {
    pub fn new(interval: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(millis(interval))))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, interval: Duration) {
        self.0.store(millis(interval), Ordering::Relaxed);
    }
}

impl Default for CheckInterval {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_INTERVAL)
    }
}

// A zero interval would spin; clamp to one millisecond.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

struct WatchedFile {
    modified: Option<SystemTime>,
    generation: u64,
}

/// Scans a set of subtrees of a [`FileSystem`] and reports changes.
pub struct Watcher {
    fsys: Arc<dyn FileSystem>,
    roots: Vec<String>,
    files: HashMap<String, WatchedFile>,
    generation: u64,
    interval: CheckInterval,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<io::Error>,
}

impl Watcher {
    /// Creates a watcher and the receiving ends of its event and error
    /// channels.
    pub fn new(
        fsys: Arc<dyn FileSystem>,
        interval: CheckInterval,
    ) -> (Self, mpsc::Receiver<Event>, mpsc::Receiver<io::Error>) {
        let (events, events_rx) = mpsc::channel(1);
        let (errors, errors_rx) = mpsc::channel(1);
        let watcher = Self {
            fsys,
            roots: Vec::new(),
            files: HashMap::new(),
            generation: 0,
            interval,
            events,
            errors,
        };
        (watcher, events_rx, errors_rx)
    }

    /// Starts watching `root`. Files already present are recorded silently;
    /// only later changes produce events. A missing root is watched for
    /// creation.
    ///
    /// # Errors
    ///
    /// Any error other than a missing root from the initial scan.
    pub fn add(&mut self, root: impl Into<String>) -> io::Result<()> {
        let root = root.into();
        let generation = self.generation;
        let files = &mut self.files;
        fs::walk_existing(self.fsys.as_ref(), &root, &mut |path, meta| {
            files.insert(
                path.to_owned(),
                WatchedFile {
                    modified: meta.modified,
                    generation,
                },
            );
            Ok(())
        })?;
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        Ok(())
    }

    /// Runs one scan and delivers its events.
    ///
    /// Returns `false` once a receiver has been dropped.
    pub async fn check(&mut self) -> bool {
        self.generation += 1;
        let generation = self.generation;

        let mut notices = Vec::new();
        let mut failed_roots = Vec::new();
        for root in &self.roots {
            let files = &mut self.files;
            let walked = fs::walk_existing(self.fsys.as_ref(), root, &mut |path, meta| {
                match files.get_mut(path) {
                    None => {
                        files.insert(
                            path.to_owned(),
                            WatchedFile {
                                modified: meta.modified,
                                generation,
                            },
                        );
                        notices.push(Notice::Event(Event::new(path, Op::Create)));
                    }
                    Some(file) => {
                        file.generation = generation;
                        if file.modified != meta.modified {
                            file.modified = meta.modified;
                            notices.push(Notice::Event(Event::new(path, Op::Write)));
                        }
                    }
                }
                Ok(())
            });
            if let Err(e) = walked {
                failed_roots.push(root.clone());
                notices.push(Notice::Error(e));
            }
        }

        // Files under a root whose walk failed may simply not have been
        // reached; keep them until a clean scan.
        let mut removed: Vec<String> = self
            .files
            .iter()
            .filter(|(path, file)| {
                file.generation != generation
                    && !failed_roots.iter().any(|root| under(root, path))
            })
            .map(|(path, _)| path.clone())
            .collect();
        removed.sort();
        for path in removed {
            self.files.remove(&path);
            notices.push(Notice::Event(Event::new(path, Op::Remove)));
        }

        for notice in notices {
            let delivered = match notice {
                Notice::Event(event) => {
                    debug!(path = %event.path, op = %event.op, "file change");
                    self.events.send(event).await.is_ok()
                }
                Notice::Error(e) => self.errors.send(e).await.is_ok(),
            };
            if !delivered {
                return false;
            }
        }
        true
    }

    /// Moves the watcher onto its own task, scanning every interval until
    /// stopped.
    pub fn spawn(self) -> WatcherHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let interval = self.interval.clone();
        let task = tokio::spawn(self.run(shutdown_rx));
        WatcherHandle {
            shutdown,
            interval,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(roots = ?self.roots, interval = ?self.interval.get(), "watcher started");
        loop {
            // Shutdown is polled first so a closed watcher never scans again.
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval.get()) => {}
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                alive = self.check() => {
                    if !alive {
                        debug!("watcher receiver closed");
                        break;
                    }
                }
            }
        }
        info!("watcher stopped");
    }
}

enum Notice {
    Event(Event),
    Error(io::Error),
}

fn under(root: &str, path: &str) -> bool {
    root == "."
        || root.is_empty()
        || path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Controls a spawned [`Watcher`]. Dropping the handle stops the watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    interval: CheckInterval,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// The live scan period.
    pub fn interval(&self) -> &CheckInterval {
        &self.interval
    }

    /// Signals the watcher to stop without waiting for it.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signals the watcher and waits for its task to finish.
    pub async fn stop(self) {
        self.close();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::fs::MapFs;

    fn at(secs: u64) -> Option<SystemTime> {
        Some(UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn setup(fsys: &MapFs) -> (Watcher, mpsc::Receiver<Event>, mpsc::Receiver<io::Error>) {
        let (mut w, events, errors) = Watcher::new(Arc::new(fsys.clone()), CheckInterval::default());
        w.add(".").unwrap();
        (w, events, errors)
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn existing_files_are_silent() {
        let fsys = MapFs::new();
        fsys.insert_with_time("pages/index.html", "x", at(1));
        let (mut w, mut events, _errors) = setup(&fsys);

        assert!(w.check().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn reports_create_write_remove() {
        let fsys = MapFs::new();
        let (mut w, mut events, _errors) = setup(&fsys);

        fsys.insert_with_time("pages/a.html", "1", at(1));
        assert!(w.check().await);
        assert_eq!(events.recv().await.unwrap(), Event::new("pages/a.html", Op::Create));

        fsys.insert_with_time("pages/a.html", "2", at(2));
        assert!(w.check().await);
        assert_eq!(events.recv().await.unwrap(), Event::new("pages/a.html", Op::Write));

        // Same timestamp: not a write.
        fsys.insert_with_time("pages/a.html", "3", at(2));
        assert!(w.check().await);
        assert!(events.try_recv().is_err());

        fsys.remove("pages/a.html");
        assert!(w.check().await);
        assert_eq!(events.recv().await.unwrap(), Event::new("pages/a.html", Op::Remove));
    }

    #[tokio::test]
    async fn events_keep_scan_order() {
        let fsys = MapFs::new();
        fsys.insert_with_time("b", "", at(1));
        let (w, mut events, _errors) = setup(&fsys);
        fsys.insert_with_time("a", "", at(1));
        fsys.insert_with_time("b", "", at(2));
        fsys.insert_with_time("c/d", "", at(1));

        let task = tokio::spawn(async move {
            let mut w = w;
            w.check().await
        });
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(events.recv().await.unwrap());
        }
        assert!(task.await.unwrap());
        assert_eq!(
            seen,
            vec![
                Event::new("a", Op::Create),
                Event::new("b", Op::Write),
                Event::new("c/d", Op::Create),
            ]
        );
    }

    #[tokio::test]
    async fn missing_root_is_watched_for_creation() {
        let fsys = MapFs::new();
        let (mut w, mut events, _errors) = Watcher::new(Arc::new(fsys.clone()), CheckInterval::default());
        w.add("public").unwrap();

        fsys.insert_with_time("public/app.css", "", at(1));
        fsys.insert_with_time("elsewhere.txt", "", at(1));
        assert!(w.check().await);
        assert_eq!(events.recv().await.unwrap(), Event::new("public/app.css", Op::Create));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_receiver_stops_the_scan() {
        let fsys = MapFs::new();
        let (mut w, events, _errors) = setup(&fsys);
        drop(events);
        fsys.insert_with_time("x", "", at(1));
        assert!(!w.check().await);
    }

    // ── Task ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn spawned_watcher_ticks_and_stops() {
        let fsys = MapFs::new();
        let (mut w, mut events, _errors) = Watcher::new(
            Arc::new(fsys.clone()),
            CheckInterval::new(Duration::from_millis(10)),
        );
        w.add(".").unwrap();
        let handle = w.spawn();

        fsys.insert_with_time("late.html", "", at(1));
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Event::new("late.html", Op::Create));

        handle.interval().set(Duration::from_millis(20));
        assert_eq!(handle.interval().get(), Duration::from_millis(20));
        handle.stop().await;
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(CheckInterval::new(Duration::ZERO).get(), Duration::from_millis(1));
        assert_eq!(CheckInterval::default().get(), DEFAULT_CHECK_INTERVAL);
    }
}
