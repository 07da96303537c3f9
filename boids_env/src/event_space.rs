//! Scoped event delivery between simulation entities.
//!
//! ```text
//! Coordinator               EventSpace                   Boid tasks
//!   |                           |                            |
//!   |-- emit(Group("boids")) -->|-- clone per registration ->| mailbox.recv()
//!   |                           |                            |
//!   |<-- send_to(env, Action) --|<---------------------------|
//! ```
//!
//! Mailboxes are unbounded: the tick protocol bounds each entity to a handful
//! of in-flight messages, and an emitter must never block on a slow reader.

use crate::error::EnvError;
use crate::types::EntityId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Addressing scope of an emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Exactly one entity
    Entity(EntityId),

    /// Every entity registered with this tag
    Group(String),

    /// Every registered entity
    All,
}

impl Scope {
    /// Shorthand for `Scope::Group`.
    pub fn group(tag: impl Into<String>) -> Self {
        Scope::Group(tag.into())
    }

    /// Returns true if an entity with the given id and tags is addressed.
    pub fn matches(&self, id: EntityId, tags: &[String]) -> bool {
        match self {
            Scope::Entity(target) => *target == id,
            Scope::Group(tag) => tags.iter().any(|t| t == tag),
            Scope::All => true,
        }
    }
}

/// Receiving end of an entity's registration.
#[derive(Debug)]
pub struct Mailbox<M> {
    id: EntityId,
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> Mailbox<M> {
    /// The id this mailbox was registered under.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Waits for the next event. `None` once the space dropped the sender.
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }
}

struct Registration<M> {
    tags: Vec<String>,
    tx: mpsc::UnboundedSender<M>,
}

/// Registry of entity mailboxes with scoped emission.
pub struct EventSpace<M> {
    registrations: RwLock<HashMap<EntityId, Registration<M>>>,
}

impl<M: Clone + Send + 'static> EventSpace<M> {
    /// Creates an empty space.
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an Arc-wrapped space for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Registers an entity and returns its mailbox.
    ///
    /// Registering an id twice replaces the previous mailbox; the old
    /// receiver sees its channel close.
    pub fn register<I, T>(&self, id: EntityId, tags: I) -> Mailbox<M>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = Registration {
            tags: tags.into_iter().map(Into::into).collect(),
            tx,
        };
        self.write().insert(id, registration);
        Mailbox { id, rx }
    }

    /// Removes an entity. Returns false if it was not registered.
    pub fn unregister(&self, id: EntityId) -> bool {
        self.write().remove(&id).is_some()
    }

    /// Returns true if the entity is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.read().contains_key(&id)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Delivers a copy of `event` to every entity in `scope`.
    ///
    /// Returns the number of mailboxes the event was delivered to.
    /// Registrations whose receiver is gone are pruned.
    pub fn emit(&self, scope: &Scope, event: M) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let registrations = self.read();
            for (id, reg) in registrations.iter() {
                if !scope.matches(*id, &reg.tags) {
                    continue;
                }
                if reg.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }
        if !closed.is_empty() {
            let mut registrations = self.write();
            for id in closed {
                tracing::debug!(entity = %id, "pruning closed mailbox");
                registrations.remove(&id);
            }
        }
        delivered
    }

    /// Delivers `event` to a single entity.
    pub fn send_to(&self, id: EntityId, event: M) -> Result<(), EnvError> {
        let registrations = self.read();
        let reg = registrations.get(&id).ok_or_else(|| EnvError::unknown(id))?;
        reg.tx.send(event).map_err(|_| EnvError::closed(id))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EntityId, Registration<M>>> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EntityId, Registration<M>>> {
        self.registrations.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M: Clone + Send + 'static> Default for EventSpace<M> {
    fn default() -> Self {
        Self::new()
    }
}
