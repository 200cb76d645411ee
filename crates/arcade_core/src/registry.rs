//! Object registry.
//!
//! The registry is the single source of truth for what exists. Objects are
//! stored in a `BTreeMap` so every iteration is in ascending id order, which
//! keeps behavior evaluation and collision queries deterministic.
//!
//! Mutations requested while a tick is in flight are queued with
//! [`ObjectRegistry::schedule_insert`] / [`ObjectRegistry::schedule_removal`]
//! and only take effect at [`ObjectRegistry::commit`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::object::{Capabilities, InstanceId, ObjectId, ObjectKind, SimObject};

/// A registry mutation waiting for the next commit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum PendingOp {
    Insert(SimObject),
    Remove(ObjectId),
}

/// Mutations applied by a commit, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Ids inserted by this commit.
    pub inserted: Vec<ObjectId>,
    /// Ids removed by this commit.
    pub removed: Vec<ObjectId>,
}

impl CommitReport {
    /// Whether the commit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Storage for all live simulation objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRegistry {
    objects: BTreeMap<ObjectId, SimObject>,
    /// Input source -> player object, kept in step with `objects`.
    players: BTreeMap<InstanceId, ObjectId>,
    pending: Vec<PendingOp>,
    next_id: ObjectId,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    /// Create an empty registry. The first allocated id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            players: BTreeMap::new(),
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Reserve the next object id. Ids are never reused.
    pub fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert an object immediately.
    ///
    /// Objects with id 0 are assigned a fresh id. Inserting an id that is
    /// already registered is an internal inconsistency: debug builds panic,
    /// release builds return [`EngineError::DuplicateIdentity`]. Any other
    /// explicit id below the next free one was used before and is refused
    /// with [`EngineError::StaleIdentity`].
    pub fn add(&mut self, mut object: SimObject) -> Result<ObjectId> {
        if object.id == 0 {
            object.id = self.allocate_id();
        } else if object.id < self.next_id && !self.objects.contains_key(&object.id) {
            tracing::debug!(id = object.id, "refusing retired object identity");
            return Err(EngineError::StaleIdentity(object.id));
        }
        self.insert(object)
    }

    /// Register an object whose id is already reserved.
    fn insert(&mut self, object: SimObject) -> Result<ObjectId> {
        if object.id >= self.next_id {
            self.next_id = object.id + 1;
        }

        let id = object.id;
        if self.objects.contains_key(&id) {
            tracing::error!(id, "duplicate object identity");
            if cfg!(debug_assertions) {
                panic!("duplicate object identity {id}");
            }
            return Err(EngineError::DuplicateIdentity(id));
        }

        if object.kind == ObjectKind::Player {
            if let Some(source) = object.source {
                self.players.insert(source, id);
            }
        }
        self.objects.insert(id, object);
        Ok(id)
    }

    /// Remove an object if present. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: ObjectId) -> Option<SimObject> {
        let object = self.objects.remove(&id)?;
        if let Some(source) = object.source {
            if self.players.get(&source) == Some(&id) {
                self.players.remove(&source);
            }
        }
        Some(object)
    }

    /// Get an object by id.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&SimObject> {
        self.objects.get(&id)
    }

    /// Get a mutable reference to an object by id.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SimObject> {
        self.objects.get_mut(&id)
    }

    /// Like [`get`](Self::get), reporting absence as [`EngineError::UnknownObject`].
    pub fn require(&self, id: ObjectId) -> Result<&SimObject> {
        self.get(id).ok_or(EngineError::UnknownObject(id))
    }

    /// Check if an object is registered.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All live objects in ascending id order.
    ///
    /// The iterator borrows the registry, so it can be restarted freely and
    /// is never invalidated: removals requested meanwhile are only queued.
    pub fn all(&self) -> impl Iterator<Item = &SimObject> + '_ {
        self.objects.values()
    }

    /// Sorted ids of all live objects.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Live objects of one kind, in id order.
    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &SimObject> + '_ {
        self.all().filter(move |o| o.kind == kind)
    }

    /// Live objects carrying every tag in `caps`, in id order.
    pub fn with_caps(&self, caps: Capabilities) -> impl Iterator<Item = &SimObject> + '_ {
        self.all().filter(move |o| o.has(caps))
    }

    /// The player object controlled by `source`, if one is registered.
    #[must_use]
    pub fn player_for(&self, source: InstanceId) -> Option<&SimObject> {
        self.players.get(&source).and_then(|id| self.objects.get(id))
    }

    /// Id of the player object controlled by `source`.
    #[must_use]
    pub fn player_id(&self, source: InstanceId) -> Option<ObjectId> {
        self.players.get(&source).copied()
    }

    /// Whether a player for `source` is queued for insertion.
    #[must_use]
    pub fn has_pending_player(&self, source: InstanceId) -> bool {
        self.pending.iter().any(|op| {
            matches!(op, PendingOp::Insert(o) if o.kind == ObjectKind::Player && o.source == Some(source))
        })
    }

    /// Number of registered player objects.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Queue an object for insertion at the next commit and return the id
    /// it will have.
    pub fn schedule_insert(&mut self, mut object: SimObject) -> ObjectId {
        if object.id >= self.next_id {
            self.next_id = object.id + 1;
        } else {
            if object.id != 0 {
                tracing::debug!(id = object.id, "retired identity replaced on insert");
            }
            object.id = self.allocate_id();
        }
        let id = object.id;
        self.pending.push(PendingOp::Insert(object));
        id
    }

    /// Queue an object for removal at the next commit.
    pub fn schedule_removal(&mut self, id: ObjectId) {
        let queued = self
            .pending
            .iter()
            .any(|op| matches!(op, PendingOp::Remove(other) if *other == id));
        if !queued {
            self.pending.push(PendingOp::Remove(id));
        }
    }

    /// Whether `id` is queued for removal.
    #[must_use]
    pub fn is_removal_scheduled(&self, id: ObjectId) -> bool {
        self.pending
            .iter()
            .any(|op| matches!(op, PendingOp::Remove(other) if *other == id))
    }

    /// Number of queued mutations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply queued mutations in the order they were requested.
    ///
    /// Inserted `SPAWNABLE` objects run their activation transition here.
    pub fn commit(&mut self) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        for op in std::mem::take(&mut self.pending) {
            match op {
                PendingOp::Insert(mut object) => {
                    if object.has(Capabilities::SPAWNABLE) {
                        object.activate();
                    }
                    report.inserted.push(self.insert(object)?);
                }
                PendingOp::Remove(id) => {
                    if self.remove(id).is_some() {
                        report.removed.push(id);
                    }
                }
            }
        }

        Ok(report)
    }
}
