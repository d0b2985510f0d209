use super::object::{Checkable, CheckableKind, CheckableRef};
use super::signal::{DomainSignal, SignalBus};
use super::{now, Acknowledgement, CheckResult, CheckState, Comment, CommentType, Downtime};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Object store errors
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A previous holder of the object lock panicked
    Poisoned(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Poisoned(name) => write!(f, "lock for object '{}' is poisoned", name),
        }
    }
}

impl std::error::Error for StoreError {}

/// Shared handle to one checkable. The mutex serializes mutations per object.
#[derive(Debug)]
pub struct ObjectHandle {
    reference: CheckableRef,
    inner: Mutex<Checkable>,
}

impl ObjectHandle {
    fn new(checkable: Checkable) -> Self {
        Self {
            reference: checkable.reference.clone(),
            inner: Mutex::new(checkable),
        }
    }

    pub fn kind(&self) -> CheckableKind {
        self.reference.kind()
    }

    pub fn name(&self) -> String {
        self.reference.name()
    }

    pub fn reference(&self) -> &CheckableRef {
        &self.reference
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Checkable>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Poisoned(self.name()))
    }

    /// Point-in-time copy of the object state
    pub fn snapshot(&self) -> Result<Checkable, StoreError> {
        Ok(self.lock()?.clone())
    }
}

/// Result of [`ObjectStore::acknowledge_problem`]
#[derive(Clone, Debug, PartialEq)]
pub enum AckOutcome {
    /// Acknowledgement set; carries the acknowledgement comment
    Acknowledged(Comment),
    /// Nothing to acknowledge; carries the object's OK/UP state
    NotAProblem(CheckState),
}

/// Parameters for a new downtime
#[derive(Clone, Debug, Default)]
pub struct DowntimeRequest {
    pub author: String,
    pub comment: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub fixed: bool,
    pub triggered_by: Option<String>,
}

/// All monitored objects plus the comment/downtime identifier indexes.
///
/// Every mutation emits its domain signals on the [`SignalBus`] after the
/// object lock has been released.
pub struct ObjectStore {
    objects: DashMap<(CheckableKind, String), Arc<ObjectHandle>>,

    /// Opaque comment id -> owning object
    comment_owners: DashMap<String, Arc<ObjectHandle>>,
    /// Legacy comment id -> opaque comment id
    comment_legacy: DashMap<u64, String>,
    next_comment_legacy: AtomicU64,

    downtime_owners: DashMap<String, Arc<ObjectHandle>>,
    downtime_legacy: DashMap<u64, String>,
    next_downtime_legacy: AtomicU64,

    signals: Arc<SignalBus>,
}

impl ObjectStore {
    pub fn new(signals: Arc<SignalBus>) -> Self {
        Self {
            objects: DashMap::new(),
            comment_owners: DashMap::new(),
            comment_legacy: DashMap::new(),
            next_comment_legacy: AtomicU64::new(1),
            downtime_owners: DashMap::new(),
            downtime_legacy: DashMap::new(),
            next_downtime_legacy: AtomicU64::new(1),
            signals,
        }
    }

    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    /// Register an object, replacing any previous one with the same name.
    pub fn insert(&self, checkable: Checkable) -> Arc<ObjectHandle> {
        let key = (checkable.kind(), checkable.name());
        let handle = Arc::new(ObjectHandle::new(checkable));
        self.objects.insert(key, Arc::clone(&handle));
        handle
    }

    pub fn add_host(&self, name: &str) -> Arc<ObjectHandle> {
        self.insert(Checkable::new(CheckableRef::host(name)))
    }

    pub fn add_service(&self, host: &str, service: &str) -> Arc<ObjectHandle> {
        self.insert(Checkable::new(CheckableRef::service(host, service)))
    }

    pub fn get(&self, kind: CheckableKind, name: &str) -> Option<Arc<ObjectHandle>> {
        self.objects
            .get(&(kind, name.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn process_check_result(
        &self,
        object: &ObjectHandle,
        cr: CheckResult,
    ) -> Result<(), StoreError> {
        let signals = {
            let mut checkable = object.lock()?;
            checkable.apply_check_result(cr, now())
        };
        debug!(object = %object.name(), "Processed check result");
        self.signals.emit_all(signals);
        Ok(())
    }

    /// Acknowledge the object's current problem and record the
    /// acknowledgement comment.
    ///
    /// The problem check and both writes happen under one object lock, so
    /// a recovery cannot slip in between them.
    pub fn acknowledge_problem(
        &self,
        object: &Arc<ObjectHandle>,
        ack: Acknowledgement,
    ) -> Result<AckOutcome, StoreError> {
        let comment = {
            let mut checkable = object.lock()?;
            if checkable.state.is_ok() {
                return Ok(AckOutcome::NotAProblem(checkable.state));
            }
            let comment = self.new_comment(
                CommentType::Acknowledgement,
                &ack.author,
                &ack.comment,
                ack.expiry,
            );
            checkable
                .comments
                .insert(comment.id.clone(), comment.clone());
            checkable.acknowledgement = Some(ack.clone());
            comment
        };
        self.index_comment(object, &comment);

        info!(object = %object.name(), comment_id = %comment.id, "Problem acknowledged");
        self.signals.emit(&DomainSignal::CommentAdded {
            checkable: object.reference().clone(),
            comment: comment.clone(),
        });
        self.signals.emit(&DomainSignal::AcknowledgementSet {
            checkable: object.reference().clone(),
            author: ack.author,
            comment: ack.comment,
            kind: ack.kind,
            notify: ack.notify,
            expiry: ack.expiry,
        });
        Ok(AckOutcome::Acknowledged(comment))
    }

    /// Returns whether an acknowledgement was present.
    pub fn clear_acknowledgement(&self, object: &ObjectHandle) -> Result<bool, StoreError> {
        let had_ack = object.lock()?.acknowledgement.take().is_some();
        if had_ack {
            self.signals.emit(&DomainSignal::AcknowledgementCleared {
                checkable: object.reference().clone(),
            });
        }
        Ok(had_ack)
    }

    pub fn add_comment(
        &self,
        object: &Arc<ObjectHandle>,
        entry_type: CommentType,
        author: &str,
        text: &str,
        expire_time: f64,
    ) -> Result<Comment, StoreError> {
        let comment = self.new_comment(entry_type, author, text, expire_time);
        object
            .lock()?
            .comments
            .insert(comment.id.clone(), comment.clone());
        self.index_comment(object, &comment);

        info!(
            object = %object.name(),
            comment_id = %comment.id,
            legacy_id = comment.legacy_id,
            "Comment added"
        );
        self.signals.emit(&DomainSignal::CommentAdded {
            checkable: object.reference().clone(),
            comment: comment.clone(),
        });
        Ok(comment)
    }

    fn new_comment(
        &self,
        entry_type: CommentType,
        author: &str,
        text: &str,
        expire_time: f64,
    ) -> Comment {
        Comment {
            id: Uuid::new_v4().to_string(),
            legacy_id: self.next_comment_legacy.fetch_add(1, Ordering::SeqCst),
            entry_type,
            author: author.to_string(),
            text: text.to_string(),
            entry_time: now(),
            expire_time,
        }
    }

    fn index_comment(&self, object: &Arc<ObjectHandle>, comment: &Comment) {
        self.comment_owners
            .insert(comment.id.clone(), Arc::clone(object));
        self.comment_legacy
            .insert(comment.legacy_id, comment.id.clone());
    }

    pub fn comment_id_from_legacy(&self, legacy_id: u64) -> Option<String> {
        self.comment_legacy
            .get(&legacy_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove a comment by opaque id. `None` if it no longer exists.
    pub fn remove_comment(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        let Some((_, owner)) = self.comment_owners.remove(id) else {
            return Ok(None);
        };
        let removed = owner.lock()?.comments.remove(id);
        if let Some(comment) = &removed {
            self.comment_legacy.remove(&comment.legacy_id);
            info!(object = %owner.name(), comment_id = %id, "Comment removed");
            self.signals.emit(&DomainSignal::CommentRemoved {
                checkable: owner.reference().clone(),
                comment: comment.clone(),
            });
        }
        Ok(removed)
    }

    pub fn remove_all_comments(&self, object: &ObjectHandle) -> Result<usize, StoreError> {
        let ids: Vec<String> = object.lock()?.comments.keys().cloned().collect();
        self.remove_comments(&ids)
    }

    pub fn remove_comments_by_type(
        &self,
        object: &ObjectHandle,
        entry_type: CommentType,
    ) -> Result<usize, StoreError> {
        let ids = object.lock()?.comments_of_type(entry_type);
        self.remove_comments(&ids)
    }

    fn remove_comments(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for id in ids {
            if self.remove_comment(id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn add_downtime(
        &self,
        object: &Arc<ObjectHandle>,
        request: DowntimeRequest,
    ) -> Result<Downtime, StoreError> {
        let downtime = Downtime {
            id: Uuid::new_v4().to_string(),
            legacy_id: self.next_downtime_legacy.fetch_add(1, Ordering::SeqCst),
            author: request.author,
            comment: request.comment,
            entry_time: now(),
            start_time: request.start_time,
            end_time: request.end_time,
            duration: request.duration,
            fixed: request.fixed,
            triggered_by: request.triggered_by,
            trigger_time: None,
        };

        object
            .lock()?
            .downtimes
            .insert(downtime.id.clone(), downtime.clone());
        self.downtime_owners
            .insert(downtime.id.clone(), Arc::clone(object));
        self.downtime_legacy
            .insert(downtime.legacy_id, downtime.id.clone());

        info!(
            object = %object.name(),
            downtime_id = %downtime.id,
            legacy_id = downtime.legacy_id,
            "Downtime added"
        );
        self.signals.emit(&DomainSignal::DowntimeAdded {
            checkable: object.reference().clone(),
            downtime: downtime.clone(),
        });

        let current = now();
        let parent_triggered = match &downtime.triggered_by {
            Some(parent) => self.downtime(parent)?.is_some_and(|d| d.is_triggered()),
            None => false,
        };
        let window_open =
            downtime.fixed && downtime.start_time <= current && current <= downtime.end_time;
        if window_open || parent_triggered {
            self.trigger_downtime(&downtime.id)?;
        }

        Ok(downtime)
    }

    /// Current state of a downtime by opaque id
    pub fn downtime(&self, id: &str) -> Result<Option<Downtime>, StoreError> {
        let Some(owner) = self
            .downtime_owners
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Ok(None);
        };
        let downtime = owner.lock()?.downtimes.get(id).cloned();
        Ok(downtime)
    }

    pub fn downtime_id_from_legacy(&self, legacy_id: u64) -> Option<String> {
        self.downtime_legacy
            .get(&legacy_id)
            .map(|entry| entry.value().clone())
    }

    pub fn remove_downtime(&self, id: &str) -> Result<Option<Downtime>, StoreError> {
        let Some((_, owner)) = self.downtime_owners.remove(id) else {
            return Ok(None);
        };
        let removed = owner.lock()?.downtimes.remove(id);
        if let Some(downtime) = &removed {
            self.downtime_legacy.remove(&downtime.legacy_id);
            info!(object = %owner.name(), downtime_id = %id, "Downtime removed");
            self.signals.emit(&DomainSignal::DowntimeRemoved {
                checkable: owner.reference().clone(),
                downtime: downtime.clone(),
            });
        }
        Ok(removed)
    }

    pub fn remove_all_downtimes(&self, object: &ObjectHandle) -> Result<usize, StoreError> {
        let ids: Vec<String> = object.lock()?.downtimes.keys().cloned().collect();
        let mut removed = 0;
        for id in ids {
            if self.remove_downtime(&id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Trigger a downtime and, transitively, every downtime chained to it.
    ///
    /// Returns the number of downtimes that went from pending to triggered.
    pub fn trigger_downtime(&self, id: &str) -> Result<usize, StoreError> {
        let mut pending = vec![id.to_string()];
        let mut triggered = 0;

        while let Some(current) = pending.pop() {
            let Some(owner) = self
                .downtime_owners
                .get(&current)
                .map(|entry| Arc::clone(entry.value()))
            else {
                continue;
            };

            let fired = {
                let mut checkable = owner.lock()?;
                match checkable.downtimes.get_mut(&current) {
                    Some(downtime) if !downtime.is_triggered() => {
                        downtime.trigger_time = Some(now());
                        Some(downtime.clone())
                    }
                    _ => None,
                }
            };

            let Some(downtime) = fired else {
                continue;
            };
            triggered += 1;
            info!(object = %owner.name(), downtime_id = %current, "Downtime triggered");
            self.signals.emit(&DomainSignal::DowntimeTriggered {
                checkable: owner.reference().clone(),
                downtime,
            });

            pending.extend(self.downtimes_triggered_by(&current)?);
        }

        Ok(triggered)
    }

    fn downtimes_triggered_by(&self, parent: &str) -> Result<Vec<String>, StoreError> {
        let owners: Vec<Arc<ObjectHandle>> = self
            .downtime_owners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut children = Vec::new();
        for owner in owners {
            let checkable = owner.lock()?;
            children.extend(
                checkable
                    .downtimes
                    .values()
                    .filter(|d| d.triggered_by.as_deref() == Some(parent))
                    .map(|d| d.id.clone()),
            );
        }
        children.sort();
        children.dedup();
        Ok(children)
    }

    pub fn request_notifications(
        &self,
        object: &ObjectHandle,
        author: &str,
        text: &str,
        forced: bool,
    ) -> Result<(), StoreError> {
        let check_result = {
            let mut checkable = object.lock()?;
            if forced {
                checkable.force_next_notification = true;
            }
            checkable.last_check_result.clone()
        };
        self.signals.emit(&DomainSignal::NotificationsRequested {
            checkable: object.reference().clone(),
            check_result,
            author: author.to_string(),
            text: text.to_string(),
            forced,
        });
        Ok(())
    }
}
