//! Simulation - bootstrap and lifecycle of boids worlds.
//!
//! A world is created with its coordinator parked. Boids and walls spawned
//! before `start` are buffered and handed over in one `Start` event; anything
//! spawned afterwards is forwarded to the running coordinator, which counts
//! it from the next tick.

use boids_core::protocol::RepaintListener;
use boids_core::{BoidState, BoidsError, Coordinator, Event, GroupParameters, Population, TickMetrics, Vec2, WallSegment, WorldConfig};
use boids_env::{EntityId, EventSpace, Scope, SimulationContext};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

enum Phase<Ctx: SimulationContext> {
    Pending {
        coordinator: Box<Coordinator<Ctx>>,
        boids: Vec<(BoidState, String)>,
        walls: Vec<(WallSegment, String)>,
    },
    Running,
    Stopped,
}

struct WorldEntry<Ctx: SimulationContext> {
    config: WorldConfig,
    space: Arc<EventSpace<Event>>,
    metrics: watch::Receiver<TickMetrics>,
    phase: Phase<Ctx>,
}

/// Owns every world of a process and the context their tasks run on.
pub struct Simulation<Ctx: SimulationContext> {
    context: Arc<Ctx>,
    worlds: HashMap<EntityId, WorldEntry<Ctx>>,
    boids_spawned: usize,
    walls_spawned: usize,
}

impl<Ctx: SimulationContext> Simulation<Ctx> {
    pub fn new(context: Arc<Ctx>) -> Self {
        Self {
            context,
            worlds: HashMap::new(),
            boids_spawned: 0,
            walls_spawned: 0,
        }
    }

    /// Creates a world and returns its id. The world idles until `start`.
    pub fn create_world(&mut self, config: WorldConfig) -> Result<EntityId, BoidsError> {
        let space = EventSpace::shared();
        let coordinator = Coordinator::new(Arc::clone(&self.context), Arc::clone(&space), config.clone())?;
        let id = coordinator.id();
        info!(world = %id, width = config.width, height = config.height, "world created");
        self.worlds.insert(
            id,
            WorldEntry {
                config,
                space,
                metrics: coordinator.metrics(),
                phase: Phase::Pending {
                    coordinator: Box::new(coordinator),
                    boids: Vec::new(),
                    walls: Vec::new(),
                },
            },
        );
        Ok(id)
    }

    /// Registers a renderer. Only possible before the world starts.
    pub fn add_listener(&mut self, world: EntityId, listener: Arc<dyn RepaintListener>) -> Result<(), BoidsError> {
        match &mut self.entry_mut(world)?.phase {
            Phase::Pending { coordinator, .. } => {
                coordinator.add_listener(listener);
                Ok(())
            }
            _ => Err(BoidsError::AlreadyStarted(world)),
        }
    }

    /// Follows the metrics the world's coordinator publishes.
    pub fn metrics(&self, world: EntityId) -> Result<watch::Receiver<TickMetrics>, BoidsError> {
        Ok(self.entry(world)?.metrics.clone())
    }

    /// Spawns one boid.
    ///
    /// The position is wrapped onto the torus and the velocity is shaped
    /// into a launch velocity (mostly along +y, scaled by the group's max
    /// speed). Without a name the boid is called `Boid{n}`.
    pub fn spawn_boid(
        &mut self,
        world: EntityId,
        group: Arc<GroupParameters>,
        position: Vec2,
        velocity: Vec2,
        name: Option<String>,
    ) -> Result<EntityId, BoidsError> {
        group.validate()?;
        let name = name.unwrap_or_else(|| format!("Boid{}", self.boids_spawned));
        let entry = self.entry_mut(world)?;
        let position = entry.config.bounds().wrap(position);
        let velocity = BoidState::launch_velocity(velocity, group.max_speed);
        let state = BoidState::new(EntityId::new(), group, position, velocity);
        let id = state.owner;

        match &mut entry.phase {
            Phase::Pending { boids, .. } => boids.push((state, name)),
            Phase::Running => entry.space.send_to(world, Event::Spawned(state, name))?,
            Phase::Stopped => return Err(stopped(world)),
        }
        self.boids_spawned += 1;
        debug!(world = %world, boid = %id, "boid spawned");
        Ok(id)
    }

    /// Spawns one wall; the points are resampled to the world's spacing.
    pub fn spawn_wall(&mut self, world: EntityId, points: &[Vec2], name: Option<String>) -> Result<EntityId, BoidsError> {
        let name = name.unwrap_or_else(|| format!("Wall{}", self.walls_spawned));
        let entry = self.entry_mut(world)?;
        let segment = WallSegment::new(EntityId::new(), points, entry.config.wall_spacing)?;
        let id = segment.id;

        match &mut entry.phase {
            Phase::Pending { walls, .. } => walls.push((segment, name)),
            Phase::Running => entry.space.send_to(world, Event::WallAdded(segment, name))?,
            Phase::Stopped => return Err(stopped(world)),
        }
        self.walls_spawned += 1;
        debug!(world = %world, wall = %id, "wall spawned");
        Ok(id)
    }

    /// Spawns a whole population at random positions with random velocities.
    pub fn add_population(&mut self, world: EntityId, population: &Population) -> Result<Vec<EntityId>, BoidsError> {
        let (width, height) = {
            let config = &self.entry(world)?.config;
            (config.width, config.height)
        };
        let mut ids = Vec::with_capacity(population.size);
        for _ in 0..population.size {
            let position = Vec2::new(
                (self.context.random() - 0.5) * width,
                (self.context.random() - 0.5) * height,
            );
            let velocity = Vec2::new(self.context.random() - 0.5, self.context.random() - 0.5);
            ids.push(self.spawn_boid(world, Arc::clone(&population.params), position, velocity, None)?);
        }
        info!(world = %world, group = %population.params.name, size = population.size, "population added");
        Ok(ids)
    }

    /// Starts the world's coordinator with everything spawned so far.
    pub fn start(&mut self, world: EntityId) -> Result<(), BoidsError> {
        let context = Arc::clone(&self.context);
        let entry = self.entry_mut(world)?;
        let (coordinator, boids, walls) = match std::mem::replace(&mut entry.phase, Phase::Running) {
            Phase::Pending { coordinator, boids, walls } => (*coordinator, boids, walls),
            other => {
                entry.phase = other;
                return Err(BoidsError::AlreadyStarted(world));
            }
        };

        info!(world = %world, boids = boids.len(), walls = walls.len(), "starting world");
        entry.space.send_to(world, Event::Start { boids, walls })?;
        context.spawn(&format!("world-{world}"), coordinator.run());
        Ok(())
    }

    /// Sends `Die` to one entity of a running world.
    pub fn kill(&mut self, world: EntityId, entity: EntityId) -> Result<(), BoidsError> {
        let entry = self.entry(world)?;
        if entity == world {
            return Err(BoidsError::config("use stop to end a world"));
        }
        entry.space.send_to(entity, Event::Die)?;
        Ok(())
    }

    /// Stops every entity of the world, coordinator included.
    ///
    /// Stopping a world that never started discards its buffered entities.
    /// Stopping twice is a no-op.
    pub fn stop(&mut self, world: EntityId) -> Result<(), BoidsError> {
        let entry = self.entry_mut(world)?;
        match std::mem::replace(&mut entry.phase, Phase::Stopped) {
            Phase::Running => {
                // The coordinator hears Die before any entity can report back
                if let Err(e) = entry.space.send_to(world, Event::Die) {
                    debug!(world = %world, error = %e, "coordinator already gone");
                }
                let reached = entry.space.emit(&Scope::All, Event::Die);
                info!(world = %world, reached, "world stopping");
            }
            Phase::Pending { boids, walls, .. } => {
                info!(world = %world, boids = boids.len(), walls = walls.len(), "world discarded before start");
                entry.space.unregister(world);
            }
            Phase::Stopped => {}
        }
        Ok(())
    }

    fn entry(&self, world: EntityId) -> Result<&WorldEntry<Ctx>, BoidsError> {
        self.worlds.get(&world).ok_or(BoidsError::UnknownWorld(world))
    }

    fn entry_mut(&mut self, world: EntityId) -> Result<&mut WorldEntry<Ctx>, BoidsError> {
        self.worlds.get_mut(&world).ok_or(BoidsError::UnknownWorld(world))
    }
}

fn stopped(world: EntityId) -> BoidsError {
    BoidsError::config(format!("world {world} is stopped"))
}
