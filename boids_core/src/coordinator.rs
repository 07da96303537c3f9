//! The world coordinator: a single actor owning all canonical state.
//!
//! The coordinator processes one inbound event at a time. It broadcasts a
//! perception snapshot to every live boid, integrates each action as soon as
//! it arrives, and opens the next tick only once every boid it was waiting
//! on has answered or terminated.
//!
//! ```text
//!   broadcast(N) ──▶ Perception(N) ──▶ boids ──▶ Action(N) ──▶ integrate
//!        ▲                                                        │
//!        └──── pause elapsed (BroadcastDue) ◀── tick N closed ◀───┘
//! ```
//!
//! Actions within a tick are integrated in arrival order, so two runs with
//! identical inputs may diverge.

use crate::agent_runtime::{BoidAgent, Flow, WallAgent};
use crate::body::{BoidState, Vec2, WallSegment};
use crate::error::BoidsError;
use crate::metrics::TickMetrics;
use crate::physics::{integrate, WorldBounds};
use crate::protocol::{
    ActionMessage, Event, Frame, Initialization, PerceptionSnapshot, RepaintListener, BOIDS_TAG, WALLS_TAG,
};
use crate::world::{TickAccounting, WorldConfig};
use boids_env::{EntityId, EventSpace, Mailbox, Scope, SimulationContext};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// The actor that owns a world.
pub struct Coordinator<Ctx: SimulationContext> {
    id: EntityId,
    context: Arc<Ctx>,
    space: Arc<EventSpace<Event>>,
    mailbox: Mailbox<Event>,
    config: WorldConfig,
    bounds: WorldBounds,

    boids: HashMap<EntityId, BoidState>,
    walls: HashMap<EntityId, WallSegment>,
    live: HashSet<EntityId>,
    live_walls: HashSet<EntityId>,

    accounting: TickAccounting,
    tick: u64,
    started: bool,

    /// Tick whose deferred broadcast is pending on a timer
    pending_broadcast: Option<u64>,
    first_mover: Option<EntityId>,

    listeners: Vec<Arc<dyn RepaintListener>>,
    metrics: TickMetrics,
    metrics_tx: watch::Sender<TickMetrics>,
}

impl<Ctx: SimulationContext> Coordinator<Ctx> {
    /// Creates a coordinator and registers its mailbox in `space`.
    pub fn new(context: Arc<Ctx>, space: Arc<EventSpace<Event>>, config: WorldConfig) -> Result<Self, BoidsError> {
        config.validate()?;
        let id = EntityId::new();
        let mailbox = space.register(id, Vec::<String>::new());
        let (metrics_tx, _) = watch::channel(TickMetrics::default());
        Ok(Self {
            id,
            context,
            space,
            mailbox,
            bounds: config.bounds(),
            config,
            boids: HashMap::new(),
            walls: HashMap::new(),
            live: HashSet::new(),
            live_walls: HashSet::new(),
            accounting: TickAccounting::new(),
            tick: 0,
            started: false,
            pending_broadcast: None,
            first_mover: None,
            listeners: Vec::new(),
            metrics: TickMetrics::default(),
            metrics_tx,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn add_listener(&mut self, listener: Arc<dyn RepaintListener>) {
        self.listeners.push(listener);
    }

    /// Subscribes to the metrics this coordinator publishes.
    pub fn metrics(&self) -> watch::Receiver<TickMetrics> {
        self.metrics_tx.subscribe()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn boid(&self, id: &EntityId) -> Option<&BoidState> {
        self.boids.get(id)
    }

    pub fn live_boids(&self) -> usize {
        self.live.len()
    }

    /// Processes events until a `Die` reaches the coordinator.
    pub async fn run(mut self) {
        info!(world = %self.id, seed = self.context.seed(), "world coordinator running");
        while let Some(event) = self.mailbox.recv().await {
            if self.handle(event) == Flow::Exit {
                break;
            }
        }
        self.space.unregister(self.id);
        self.metrics.stopped = true;
        self.publish();
        info!(
            world = %self.id,
            ticks = self.metrics.completed_ticks,
            actions = self.metrics.actions_integrated,
            stale = self.metrics.stale_actions,
            "world coordinator stopped"
        );
    }

    /// Applies one event. Returns `Flow::Exit` once the world should stop.
    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Start { boids, walls } => self.on_start(boids, walls),
            Event::Spawned(state, name) => self.on_spawned(state, name),
            Event::WallAdded(segment, name) => self.launch_wall(segment, name),
            Event::Action(msg) => self.on_action(msg),
            Event::Terminated { entity } => self.on_terminated(entity),
            Event::BroadcastDue { tick } => self.on_broadcast_due(tick),
            Event::Die => {
                info!(world = %self.id, tick = self.tick, "world received Die");
                return Flow::Exit;
            }
            other => debug!(world = %self.id, kind = other.kind(), "unexpected event dropped"),
        }
        Flow::Continue
    }

    fn on_start(&mut self, boids: Vec<(BoidState, String)>, walls: Vec<(WallSegment, String)>) {
        if self.started {
            warn!(error = %BoidsError::AlreadyStarted(self.id), "start ignored");
            return;
        }
        for (segment, name) in walls {
            self.launch_wall(segment, name);
        }
        for (state, name) in boids {
            self.launch_boid(state, name);
        }
        self.started = true;
        self.metrics.started = true;
        info!(
            world = %self.id,
            boids = self.live.len(),
            walls = self.live_walls.len(),
            "world started"
        );
        self.repaint();
        self.broadcast();
    }

    fn on_spawned(&mut self, state: BoidState, name: String) {
        self.launch_boid(state, name);
        if self.is_idle() {
            self.broadcast();
        }
    }

    /// Registers a boid, starts its task and sends its Initialize.
    ///
    /// The boid joins the canonical map at once but is only waited on from
    /// the next broadcast.
    fn launch_boid(&mut self, state: BoidState, name: String) {
        let id = state.owner;
        if self.boids.contains_key(&id) {
            warn!(world = %self.id, boid = %id, "duplicate boid id ignored");
            return;
        }
        let mailbox = self.space.register(id, [BOIDS_TAG, state.group.name.as_str()]);
        let agent = BoidAgent::new(Arc::clone(&self.context), Arc::clone(&self.space), mailbox);
        self.context.spawn(&name, agent.run());

        let init = Initialization::Boid {
            world: self.id,
            state: state.clone(),
            name,
            steering: self.config.steering(),
            action_delay: self.config.action_delay,
        };
        if let Err(e) = self.space.send_to(id, Event::Initialize(init)) {
            warn!(boid = %id, error = %e, "failed to initialize boid");
            return;
        }
        self.boids.insert(id, state);
        self.live.insert(id);
        self.refresh_counts();
    }

    fn launch_wall(&mut self, segment: WallSegment, name: String) {
        let id = segment.id;
        if self.walls.contains_key(&id) {
            warn!(world = %self.id, wall = %id, "duplicate wall id ignored");
            return;
        }
        let mailbox = self.space.register(id, [WALLS_TAG]);
        let agent = WallAgent::new(Arc::clone(&self.space), mailbox);
        self.context.spawn(&name, agent.run());

        let init = Initialization::Wall {
            world: self.id,
            segment: segment.clone(),
            name,
        };
        if let Err(e) = self.space.send_to(id, Event::Initialize(init)) {
            warn!(wall = %id, error = %e, "failed to initialize wall");
            return;
        }
        self.walls.insert(id, segment);
        self.live_walls.insert(id);
        self.refresh_counts();
    }

    /// Applies a raw force to a boid's canonical state.
    pub fn integrate(&mut self, id: EntityId, raw_force: Vec2) -> Result<Vec2, BoidsError> {
        let body = self.boids.get_mut(&id).ok_or(BoidsError::MissingEntity(id))?;
        let applied = integrate(body, raw_force, &self.bounds);
        trace!(boid = %id, x = body.position.x, y = body.position.y, "integrated");
        Ok(applied)
    }

    /// Opens the next tick and sends its perception to every boid.
    pub fn broadcast(&mut self) {
        if self.live.is_empty() {
            debug!(world = %self.id, tick = self.tick, "no live boids, idling");
            return;
        }
        self.tick += 1;
        let snapshot = Arc::new(PerceptionSnapshot {
            tick: self.tick,
            boids: self.boids.clone(),
            walls: self.walls.clone(),
        });
        self.accounting.begin(self.tick, &self.live);
        let delivered = self.space.emit(&Scope::group(BOIDS_TAG), Event::Perception(snapshot));
        trace!(world = %self.id, tick = self.tick, delivered, "perception broadcast");

        if delivered < self.live.len() {
            self.reap_vanished();
        }
    }

    /// Handles an action from a boid.
    pub fn on_action(&mut self, msg: ActionMessage) {
        if !self.boids.contains_key(&msg.sender) {
            warn!(error = %BoidsError::MissingEntity(msg.sender), tick = msg.tick, "action dropped");
            self.metrics.missing_entities += 1;
            self.publish();
            return;
        }
        if let Err(reason) = self.accounting.record(msg.sender, msg.tick) {
            debug!(boid = %msg.sender, tick = msg.tick, current = self.tick, ?reason, "stale action dropped");
            self.metrics.stale_actions += 1;
            self.publish();
            return;
        }

        if self.accounting.answered() == 1 {
            self.first_mover = Some(msg.sender);
        }
        if let Err(e) = self.integrate(msg.sender, msg.influence) {
            warn!(error = %e, "integration failed");
        }
        self.metrics.actions_integrated += 1;

        if self.accounting.is_complete() {
            self.close_tick();
        }
    }

    fn on_terminated(&mut self, entity: EntityId) {
        if self.live_walls.remove(&entity) {
            self.metrics.terminated += 1;
            self.refresh_counts();
            return;
        }
        if !self.live.remove(&entity) {
            return;
        }
        self.metrics.terminated += 1;
        self.accounting.forget(&entity);
        debug!(
            world = %self.id,
            boid = %entity,
            waiting = self.accounting.pending(),
            "boid left the live set"
        );
        self.refresh_counts();
        if self.accounting.is_complete() {
            self.close_tick();
        }
    }

    /// Drops live boids whose mailbox is gone, so the tick cannot wait on
    /// them forever.
    fn reap_vanished(&mut self) {
        let vanished: Vec<EntityId> = self.live.iter().filter(|id| !self.space.contains(**id)).copied().collect();
        for id in vanished {
            warn!(world = %self.id, boid = %id, "boid mailbox vanished");
            self.live.remove(&id);
            self.accounting.forget(&id);
            self.metrics.terminated += 1;
        }
        self.refresh_counts();
        if self.accounting.is_complete() {
            self.close_tick();
        }
    }

    fn close_tick(&mut self) {
        let tick = self.accounting.tick();
        self.accounting.close();
        self.metrics.completed_ticks = tick;
        self.metrics.last_first_mover = self.first_mover.take();
        self.publish();
        debug!(world = %self.id, tick, live = self.live.len(), "tick complete");
        self.repaint();

        if self.config.pause.is_zero() {
            self.broadcast();
            return;
        }
        self.pending_broadcast = Some(tick);
        let context = Arc::clone(&self.context);
        let space = Arc::clone(&self.space);
        let (world, pause) = (self.id, self.config.pause);
        self.context.spawn("broadcast-timer", async move {
            context.sleep(pause).await;
            if space.send_to(world, Event::BroadcastDue { tick }).is_err() {
                trace!(%world, tick, "world gone before deferred broadcast");
            }
        });
    }

    fn on_broadcast_due(&mut self, tick: u64) {
        if self.pending_broadcast != Some(tick) {
            debug!(world = %self.id, tick, "stale broadcast timer");
            return;
        }
        self.pending_broadcast = None;
        self.broadcast();
    }

    fn is_idle(&self) -> bool {
        self.started && !self.accounting.is_open() && self.pending_broadcast.is_none()
    }

    fn repaint(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let frame = Frame {
            tick: self.tick,
            boids: Arc::new(self.boids.clone()),
            walls: Arc::new(self.walls.clone()),
        };
        for listener in &self.listeners {
            listener.repaint(&frame);
        }
    }

    fn refresh_counts(&mut self) {
        self.metrics.live_boids = self.live.len();
        self.metrics.total_boids = self.boids.len();
        self.metrics.walls = self.walls.len();
        self.publish();
    }

    fn publish(&self) {
        self.metrics_tx.send_replace(self.metrics.clone());
    }
}
