//! Agent Runtime - the task loops of simulated entities.
//!
//! Every boid and wall is an independent task spawned through the
//! environment context. A task owns its mailbox and its private state and
//! talks to the world coordinator only through the event space.
//!
//! # State machine
//!
//! ```text
//!   Uninitialized ──Initialize──▶ Active ──Die──▶ Terminated
//!        │                                          ▲
//!        └──────────────────Die─────────────────────┘
//! ```
//!
//! Perception before Initialize is ignored, a second Initialize is ignored
//! with a warning, and Terminated is absorbing: the task reports to the
//! world, unregisters its mailbox and exits.

use crate::body::BoidState;
use crate::flocking::{BoidBrain, SteeringConfig};
use crate::protocol::{ActionMessage, Event, Initialization, PerceptionSnapshot};
use boids_env::{EntityId, EventSpace, Mailbox, SimulationContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lifecycle of an entity task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Uninitialized,
    Active,
    Terminated,
}

/// Whether a task keeps running after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Identity assigned at Initialize.
#[derive(Debug, Clone)]
struct Assignment {
    world: EntityId,
    name: String,
}

/// A boid task: answers each perception with an action.
pub struct BoidAgent<Ctx: SimulationContext> {
    id: EntityId,
    context: Arc<Ctx>,
    space: Arc<EventSpace<Event>>,
    mailbox: Mailbox<Event>,
    state: AgentState,
    assignment: Option<Assignment>,

    /// Private copy of the body, refreshed on every perception
    body: Option<BoidState>,
    brain: BoidBrain,
    steering: SteeringConfig,
    action_delay: Duration,
    last_answered: u64,
}

impl<Ctx: SimulationContext> BoidAgent<Ctx> {
    pub fn new(context: Arc<Ctx>, space: Arc<EventSpace<Event>>, mailbox: Mailbox<Event>) -> Self {
        Self {
            id: mailbox.id(),
            context,
            space,
            mailbox,
            state: AgentState::Uninitialized,
            assignment: None,
            body: None,
            brain: BoidBrain::new(),
            steering: SteeringConfig::default(),
            action_delay: Duration::ZERO,
            last_answered: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Processes events until the boid terminates or its mailbox closes.
    pub async fn run(mut self) {
        while let Some(event) = self.mailbox.recv().await {
            if self.handle(event).await == Flow::Exit {
                break;
            }
        }
        self.terminate();
    }

    /// Applies one event to the state machine.
    pub async fn handle(&mut self, event: Event) -> Flow {
        match (self.state, event) {
            (AgentState::Terminated, _) => Flow::Exit,
            (_, Event::Die) => Flow::Exit,
            (AgentState::Uninitialized, Event::Initialize(Initialization::Boid {
                world,
                state,
                name,
                steering,
                action_delay,
            })) => {
                debug!(boid = %self.id, %name, "boid initialized");
                self.assignment = Some(Assignment { world, name });
                self.body = Some(state);
                self.steering = steering;
                self.action_delay = action_delay;
                self.state = AgentState::Active;
                Flow::Continue
            }
            (AgentState::Active, Event::Initialize(init)) => {
                warn!(boid = %self.id, world = %init.world(), name = init.name(), "ignoring second Initialize");
                Flow::Continue
            }
            (AgentState::Active, Event::Perception(snapshot)) => self.perceive(&snapshot).await,
            (AgentState::Uninitialized, Event::Perception(snapshot)) => {
                debug!(boid = %self.id, tick = snapshot.tick, "perception before initialize ignored");
                Flow::Continue
            }
            (_, other) => {
                trace!(boid = %self.id, kind = other.kind(), "event ignored");
                Flow::Continue
            }
        }
    }

    async fn perceive(&mut self, snapshot: &PerceptionSnapshot) -> Flow {
        let Some(world) = self.assignment.as_ref().map(|a| a.world) else {
            return Flow::Continue;
        };
        if snapshot.tick <= self.last_answered {
            debug!(boid = %self.id, tick = snapshot.tick, "perception already answered");
            return Flow::Continue;
        }
        let Some(me) = snapshot.boid(&self.id).cloned() else {
            warn!(boid = %self.id, tick = snapshot.tick, "own body missing from perception");
            return Flow::Continue;
        };

        let influence = self
            .brain
            .think(&me, snapshot.boids.values(), snapshot.walls.values(), &self.steering);
        self.body = Some(me);

        if !self.action_delay.is_zero() {
            self.context.sleep(self.action_delay).await;
        }

        let action = ActionMessage {
            sender: self.id,
            tick: snapshot.tick,
            influence,
        };
        self.last_answered = snapshot.tick;
        match self.space.send_to(world, Event::Action(action)) {
            Ok(()) => Flow::Continue,
            Err(e) => {
                debug!(boid = %self.id, error = %e, "world gone, stopping");
                Flow::Exit
            }
        }
    }

    fn terminate(&mut self) {
        if self.state == AgentState::Terminated {
            return;
        }
        self.state = AgentState::Terminated;
        self.space.unregister(self.id);
        if let Some(assignment) = &self.assignment {
            let position = self.body.as_ref().map(|b| (b.position.x, b.position.y));
            debug!(boid = %self.id, name = %assignment.name, ?position, "boid terminated");
            let _ = self
                .space
                .send_to(assignment.world, Event::Terminated { entity: self.id });
        }
    }
}

/// A wall task. Walls never act; the task only tracks the lifecycle.
pub struct WallAgent {
    id: EntityId,
    space: Arc<EventSpace<Event>>,
    mailbox: Mailbox<Event>,
    state: AgentState,
    assignment: Option<Assignment>,
}

impl WallAgent {
    pub fn new(space: Arc<EventSpace<Event>>, mailbox: Mailbox<Event>) -> Self {
        Self {
            id: mailbox.id(),
            space,
            mailbox,
            state: AgentState::Uninitialized,
            assignment: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub async fn run(mut self) {
        while let Some(event) = self.mailbox.recv().await {
            if self.handle(event) == Flow::Exit {
                break;
            }
        }
        self.state = AgentState::Terminated;
        self.space.unregister(self.id);
        if let Some(assignment) = &self.assignment {
            debug!(wall = %self.id, name = %assignment.name, "wall terminated");
            let _ = self
                .space
                .send_to(assignment.world, Event::Terminated { entity: self.id });
        }
    }

    pub fn handle(&mut self, event: Event) -> Flow {
        match (self.state, event) {
            (AgentState::Terminated, _) | (_, Event::Die) => Flow::Exit,
            (AgentState::Uninitialized, Event::Initialize(Initialization::Wall { world, segment, name })) => {
                debug!(wall = %self.id, %name, points = segment.len(), "wall initialized");
                self.assignment = Some(Assignment { world, name });
                self.state = AgentState::Active;
                Flow::Continue
            }
            (AgentState::Active, Event::Initialize(init)) => {
                warn!(wall = %self.id, world = %init.world(), name = init.name(), "ignoring second Initialize");
                Flow::Continue
            }
            (_, other) => {
                trace!(wall = %self.id, kind = other.kind(), "event ignored");
                Flow::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Vec2, WallSegment};
    use crate::population::{GroupParameters, Rgb};
    use boids_env::TokioContext;
    use std::collections::HashMap;

    fn boid_init(world: EntityId, id: EntityId) -> Initialization {
        let group = Arc::new(GroupParameters::new("red", Rgb::RED));
        Initialization::Boid {
            world,
            state: BoidState::new(id, group, Vec2::zeros(), Vec2::new(0.0, 1.0)),
            name: "Boid0".to_string(),
            steering: SteeringConfig::default(),
            action_delay: Duration::ZERO,
        }
    }

    fn snapshot_with(tick: u64, body: BoidState) -> Arc<PerceptionSnapshot> {
        let mut boids = HashMap::new();
        boids.insert(body.owner, body);
        Arc::new(PerceptionSnapshot {
            tick,
            boids,
            walls: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn test_boid_answers_perception_after_initialize() {
        let space = EventSpace::<Event>::shared();
        let world = EntityId::from_seed(1);
        let id = EntityId::from_seed(2);
        let mut world_box = space.register(world, Vec::<String>::new());
        let mailbox = space.register(id, ["boids"]);
        let mut agent = BoidAgent::new(TokioContext::shared(), Arc::clone(&space), mailbox);

        let init = boid_init(world, id);
        let Initialization::Boid { state, .. } = init.clone() else { unreachable!() };

        // ignored while uninitialized
        assert_eq!(agent.handle(Event::Perception(snapshot_with(1, state.clone()))).await, Flow::Continue);
        assert!(world_box.try_recv().is_none());

        agent.handle(Event::Initialize(init.clone())).await;
        assert_eq!(agent.state(), AgentState::Active);
        agent.handle(Event::Initialize(init)).await;
        assert_eq!(agent.state(), AgentState::Active);

        agent.handle(Event::Perception(snapshot_with(1, state.clone()))).await;
        match world_box.try_recv() {
            Some(Event::Action(action)) => {
                assert_eq!(action.sender, id);
                assert_eq!(action.tick, 1);
                // isolated boid keeps heading +y
                assert!(action.influence.y > 0.0);
            }
            other => panic!("expected action, got {other:?}"),
        }

        // same tick again is not answered twice
        agent.handle(Event::Perception(snapshot_with(1, state))).await;
        assert!(world_box.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_die_reports_termination() {
        let space = EventSpace::<Event>::shared();
        let world = EntityId::from_seed(1);
        let id = EntityId::from_seed(2);
        let mut world_box = space.register(world, Vec::<String>::new());
        let mailbox = space.register(id, ["boids"]);
        let agent = BoidAgent::new(TokioContext::shared(), Arc::clone(&space), mailbox);

        space.send_to(id, Event::Initialize(boid_init(world, id))).unwrap();
        space.send_to(id, Event::Die).unwrap();
        agent.run().await;

        assert!(!space.contains(id));
        assert!(matches!(world_box.try_recv(), Some(Event::Terminated { entity }) if entity == id));
    }

    #[tokio::test]
    async fn test_wall_lifecycle() {
        let space = EventSpace::<Event>::shared();
        let world = EntityId::from_seed(1);
        let id = EntityId::from_seed(3);
        let mut world_box = space.register(world, Vec::<String>::new());
        let mailbox = space.register(id, ["walls"]);
        let mut wall = WallAgent::new(Arc::clone(&space), mailbox);

        let segment = WallSegment::new(id, &[Vec2::zeros(), Vec2::new(0.0, 10.0)], 100.0).unwrap();
        let init = Initialization::Wall {
            world,
            segment,
            name: "Wall0".to_string(),
        };
        assert_eq!(wall.handle(Event::Initialize(init)), Flow::Continue);
        assert_eq!(wall.state(), AgentState::Active);
        assert_eq!(wall.handle(Event::Die), Flow::Exit);

        space.send_to(id, Event::Die).unwrap();
        wall.run().await;
        assert!(!space.contains(id));
        assert!(matches!(world_box.try_recv(), Some(Event::Terminated { .. })));
    }
}
