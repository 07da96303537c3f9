//! Message protocol between the world coordinator and entity tasks.
//!
//! Everything travels as one [`Event`] enum through a shared
//! `EventSpace<Event>`. Payloads are either small values or `Arc`s, so the
//! per-recipient clone made by scoped delivery stays cheap.

use crate::body::{BoidState, WallSegment};
use crate::flocking::SteeringConfig;
use boids_env::EntityId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Tag carried by every boid registration.
pub const BOIDS_TAG: &str = "boids";

/// Tag carried by every wall registration.
pub const WALLS_TAG: &str = "walls";

/// Read-only copy of the world handed to every boid for one tick.
#[derive(Debug, Clone, Default)]
pub struct PerceptionSnapshot {
    pub tick: u64,
    pub boids: HashMap<EntityId, BoidState>,
    pub walls: HashMap<EntityId, WallSegment>,
}

impl PerceptionSnapshot {
    pub fn boid(&self, id: &EntityId) -> Option<&BoidState> {
        self.boids.get(id)
    }
}

/// A boid's answer to a perception.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    pub sender: EntityId,

    /// Tick of the perception this action answers
    pub tick: u64,

    /// Force to integrate, before capping
    pub influence: crate::body::Vec2,
}

/// What an entity learns about itself when it is initialized.
#[derive(Debug, Clone)]
pub enum Initialization {
    Boid {
        world: EntityId,
        state: BoidState,
        name: String,
        steering: SteeringConfig,

        /// Wait before each action is submitted
        action_delay: Duration,
    },
    Wall {
        world: EntityId,
        segment: WallSegment,
        name: String,
    },
}

impl Initialization {
    pub fn world(&self) -> EntityId {
        match self {
            Self::Boid { world, .. } | Self::Wall { world, .. } => *world,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Boid { name, .. } | Self::Wall { name, .. } => name,
        }
    }
}

/// Every message the simulation exchanges.
#[derive(Debug, Clone)]
pub enum Event {
    /// Coordinator to entity: your identity and starting state
    Initialize(Initialization),

    /// Bootstrap to coordinator: the buffered pre-start entities
    Start {
        boids: Vec<(BoidState, String)>,
        walls: Vec<(WallSegment, String)>,
    },

    /// Coordinator to boids: the world for one tick
    Perception(Arc<PerceptionSnapshot>),

    /// Boid to coordinator
    Action(ActionMessage),

    /// Stop the receiving entity
    Die,

    /// Bootstrap to coordinator: a boid joining a running world
    Spawned(BoidState, String),

    /// Bootstrap to coordinator: a wall joining a running world
    WallAdded(WallSegment, String),

    /// Entity to coordinator: the entity's task has stopped
    Terminated { entity: EntityId },

    /// Timer to coordinator: the pause after a tick has elapsed
    BroadcastDue { tick: u64 },
}

impl Event {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Initialize(_) => "Initialize",
            Event::Start { .. } => "Start",
            Event::Perception(_) => "Perception",
            Event::Action(_) => "Action",
            Event::Die => "Die",
            Event::Spawned(..) => "Spawned",
            Event::WallAdded(..) => "WallAdded",
            Event::Terminated { .. } => "Terminated",
            Event::BroadcastDue { .. } => "BroadcastDue",
        }
    }
}

/// A published copy of the world, as handed to renderers.
#[derive(Debug, Clone)]
pub struct Frame {
    pub tick: u64,
    pub boids: Arc<HashMap<EntityId, BoidState>>,
    pub walls: Arc<HashMap<EntityId, WallSegment>>,
}

/// Receives the world once at start and once per completed tick.
///
/// Called from the coordinator task, so implementations should return
/// quickly.
pub trait RepaintListener: Send + Sync {
    fn repaint(&self, frame: &Frame);
}
