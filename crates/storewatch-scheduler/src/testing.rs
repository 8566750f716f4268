//! In-memory fakes shared by the scheduler tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::{Channel, SnapshotSource};
use storewatch_core::types::{Notification, OutgoingMessage, Record, Snapshot};

pub fn snapshot(keys: &[&str]) -> Snapshot {
    keys.iter().map(|k| (*k, Record::named(format!("Game {k}")))).collect()
}

/// Returns queued results in order, then repeats the last one.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Snapshot>>>,
    last: Mutex<Option<Snapshot>>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Snapshot>>) -> Self {
        Self { script: Mutex::new(script.into()), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    fn name(&self) -> &str { "scripted" }

    async fn fetch(&self) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| WatchError::fetch("script exhausted")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub destination: String,
    pub notification: Notification,
    pub at: tokio::time::Instant,
}

/// Records every delivery. Destinations in `missing` fail resolution;
/// notifications whose footer is in `flaky` fail transiently and those in
/// `revoked` fail with lost access; after `gone_after` successful sends
/// every send reports the destination gone. `offline` channels report
/// themselves disconnected.
#[derive(Default)]
pub struct RecordingChannel {
    pub missing: HashSet<String>,
    pub flaky: HashSet<String>,
    pub revoked: HashSet<String>,
    pub offline: bool,
    pub gone_after: Option<usize>,
    pub sent: Mutex<Vec<Sent>>,
    pub texts: Mutex<Vec<OutgoingMessage>>,
    pub resolutions: AtomicUsize,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn footers(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.notification.footer).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().iter().map(|m| m.content.clone()).collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str { "recording" }

    async fn connect(&mut self) -> Result<()> { Ok(()) }

    fn is_connected(&self) -> bool { !self.offline }

    async fn resolve_destination(&self, destination: &str) -> Result<()> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(destination) {
            return Err(WatchError::unavailable(format!("channel {destination} not found")));
        }
        Ok(())
    }

    async fn send_notification(&self, destination: &str, notification: &Notification) -> Result<()> {
        let mut sent = self.sent.lock().unwrap();
        if self.gone_after.is_some_and(|n| sent.len() >= n) {
            return Err(WatchError::unavailable(format!("channel {destination} deleted")));
        }
        if self.flaky.contains(&notification.footer) {
            return Err(WatchError::dispatch("502 Bad Gateway"));
        }
        if self.revoked.contains(&notification.footer) {
            return Err(WatchError::AuthFailed("401 Unauthorized".into()));
        }
        sent.push(Sent {
            destination: destination.into(),
            notification: notification.clone(),
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.texts.lock().unwrap().push(message);
        Ok(())
    }
}
