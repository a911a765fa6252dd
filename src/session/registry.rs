use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::controller::TurnController;
use super::stats::{SessionStatus, SessionSummary};
use crate::audio::AudioChunk;
use crate::error::SessionError;
use crate::scenario::Scenario;

/// A running session owned by the registry
pub struct SessionHandle {
    session_id: String,
    scenario: Scenario,
    audio_tx: mpsc::Sender<AudioChunk>,
    cancel: CancellationToken,
    status: watch::Receiver<SessionStatus>,
    task: Mutex<Option<JoinHandle<Result<SessionSummary, SessionError>>>>,
}

impl SessionHandle {
    /// Spawn the controller's session task
    ///
    /// `audio_tx` must feed the controller's chunk source.
    pub fn spawn(controller: TurnController, audio_tx: mpsc::Sender<AudioChunk>) -> Self {
        let session_id = controller.session().id().to_string();
        let scenario = controller.session().scenario().clone();
        let cancel = controller.cancellation_token();
        let status = controller.subscribe();

        let task = tokio::spawn(controller.run());

        Self {
            session_id,
            scenario,
            audio_tx,
            cancel,
            status,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Latest published status
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Wait until the status satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionStatus>
    where
        F: FnMut(&SessionStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(predicate)
            .await
            .context("Session task is gone")?;
        Ok(status.clone())
    }

    /// Queue audio for the session's recorder
    pub async fn push_audio(&self, chunks: Vec<AudioChunk>) -> Result<usize> {
        let count = chunks.len();
        for chunk in chunks {
            self.audio_tx
                .send(chunk)
                .await
                .context("Session is no longer accepting audio")?;
        }
        Ok(count)
    }

    /// Cancel the session and wait for its task
    pub async fn stop(&self) -> Result<Option<SessionSummary>> {
        self.cancel.cancel();

        let task = self.task.lock().await.take();
        let Some(task) = task else {
            return Ok(None);
        };

        match task.await {
            Ok(Ok(summary)) => Ok(Some(summary)),
            Ok(Err(e)) => {
                warn!("Session {} ended with error: {}", self.session_id, e);
                Ok(None)
            }
            Err(e) => {
                error!("Session task {} panicked: {}", self.session_id, e);
                Err(e).context("Session task panicked")
            }
        }
    }
}

/// Proof that a session id was reserved; pass to `activate` or `release`
#[must_use]
#[derive(Debug)]
pub struct Reservation {
    session_id: String,
}

impl Reservation {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session {0} already exists")]
    AlreadyExists(String),

    #[error("session {0} was not reserved")]
    NotReserved(String),
}

enum Slot {
    /// Id taken, session still being created
    Pending,
    Active(Arc<SessionHandle>),
}

/// Active sessions keyed by id
///
/// Creation is two-phase: `reserve` takes the id atomically, so concurrent
/// requests for one id cannot both start a session.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `session_id`
    pub async fn reserve(&self, session_id: &str) -> Result<Reservation, RegistryError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(session_id) {
            return Err(RegistryError::AlreadyExists(session_id.to_string()));
        }
        slots.insert(session_id.to_string(), Slot::Pending);

        info!("Reserved session id {}", session_id);
        Ok(Reservation {
            session_id: session_id.to_string(),
        })
    }

    /// Install the running session for a reservation
    ///
    /// A session that ends on its own (termination phrase, device failure)
    /// is removed once its status reports the termination.
    pub async fn activate(
        &self,
        reservation: Reservation,
        handle: SessionHandle,
    ) -> Result<Arc<SessionHandle>, RegistryError> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&reservation.session_id) {
            Some(slot) if matches!(slot, Slot::Pending) => {
                let handle = Arc::new(handle);
                *slot = Slot::Active(Arc::clone(&handle));
                tokio::spawn(reap_when_ended(Arc::clone(&self.slots), Arc::clone(&handle)));
                Ok(handle)
            }
            _ => Err(RegistryError::NotReserved(reservation.session_id)),
        }
    }

    /// Give up a reservation whose session could not be created
    pub async fn release(&self, reservation: Reservation) {
        let mut slots = self.slots.write().await;
        if matches!(slots.get(&reservation.session_id), Some(Slot::Pending)) {
            slots.remove(&reservation.session_id);
            info!("Released session id {}", reservation.session_id);
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let slots = self.slots.read().await;
        match slots.get(session_id) {
            Some(Slot::Active(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Remove an active session (pending reservations stay)
    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let mut slots = self.slots.write().await;
        if !matches!(slots.get(session_id), Some(Slot::Active(_))) {
            return None;
        }
        match slots.remove(session_id) {
            Some(Slot::Active(handle)) => Some(handle),
            _ => None,
        }
    }

    /// Ids of active sessions
    pub async fn active_ids(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Drop `handle` from the registry after its session terminates
async fn reap_when_ended(
    slots: Arc<RwLock<HashMap<String, Slot>>>,
    handle: Arc<SessionHandle>,
) {
    // An error means the task is gone, which ends the session as well
    let _ = handle.wait_for(|s| s.termination.is_some()).await;

    {
        let mut slots = slots.write().await;
        let current = matches!(
            slots.get(handle.session_id()),
            Some(Slot::Active(active)) if Arc::ptr_eq(active, &handle)
        );
        // Stopped sessions were already removed
        if !current {
            return;
        }
        slots.remove(handle.session_id());
    }

    match handle.stop().await {
        Ok(Some(summary)) => info!(
            "Session {} ended ({:?}) and was removed after {} turns",
            summary.session_id,
            summary.reason,
            summary.history.len()
        ),
        Ok(None) => info!("Session {} ended and was removed", handle.session_id()),
        Err(e) => warn!("Session {} ended abnormally: {:#}", handle.session_id(), e),
    }
}
