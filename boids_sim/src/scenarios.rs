//! Preset worlds for headless runs.

use crate::simulation::Simulation;
use boids_core::{BoidsError, GroupParameters, Population, Rgb, Vec2};
use boids_env::{EntityId, SimulationContext};

/// The launcher walls of the classic setup.
pub fn classic_walls() -> Vec<Vec<Vec2>> {
    vec![
        vec![Vec2::new(50.0, 0.0), Vec2::new(51.0, 200.0)],
        vec![Vec2::new(-50.0, 0.0), Vec2::new(-101.0, -200.0)],
        vec![
            Vec2::new(10.0, -30.0),
            Vec2::new(15.0, -130.0),
            Vec2::new(70.0, -40.0),
            Vec2::new(105.0, -130.0),
        ],
    ]
}

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Red, green and blue flocks around the three launcher walls
    Classic,

    /// One flock, no walls
    SingleFlock,

    /// A prey flock and a faster, non-aligning predator group repelling each other
    Predators,

    /// One flock between two long horizontal walls
    WalledCorridor,

    /// A third of the flock is killed halfway through the run
    Attrition,

    /// A second flock joins a running world
    LateJoiners,
}

/// Something a scenario does to a running world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidRunEvent {
    /// Kill every third boid spawned before start
    KillThird,
    /// Spawn a new population of the given size
    SpawnFlock,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Classic,
            ScenarioId::SingleFlock,
            ScenarioId::Predators,
            ScenarioId::WalledCorridor,
            ScenarioId::Attrition,
            ScenarioId::LateJoiners,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Classic => "classic",
            ScenarioId::SingleFlock => "single_flock",
            ScenarioId::Predators => "predators",
            ScenarioId::WalledCorridor => "walled_corridor",
            ScenarioId::Attrition => "attrition",
            ScenarioId::LateJoiners => "late_joiners",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Classic => "three populations launched around three walls",
            ScenarioId::SingleFlock => "one population on an empty torus",
            ScenarioId::Predators => "prey and predators with cross-group repulsion",
            ScenarioId::WalledCorridor => "one population between two parallel walls",
            ScenarioId::Attrition => "targeted Die to a third of the boids mid-run",
            ScenarioId::LateJoiners => "a second population spawned into a running world",
        }
    }

    /// The event fired a fraction into the run, if any.
    pub fn mid_run_event(&self) -> Option<MidRunEvent> {
        match self {
            ScenarioId::Attrition => Some(MidRunEvent::KillThird),
            ScenarioId::LateJoiners => Some(MidRunEvent::SpawnFlock),
            _ => None,
        }
    }

    /// Spawns the scenario's pre-start entities. Returns the boids spawned.
    pub fn populate<Ctx: SimulationContext>(
        &self,
        sim: &mut Simulation<Ctx>,
        world: EntityId,
        population_size: usize,
    ) -> Result<Vec<EntityId>, BoidsError> {
        let mut boids = Vec::new();
        match self {
            ScenarioId::Classic => {
                for population in Population::classic_trio() {
                    let population = Population::new((*population.params).clone(), population_size)?;
                    boids.extend(sim.add_population(world, &population)?);
                }
                for points in classic_walls() {
                    sim.spawn_wall(world, &points, None)?;
                }
            }
            ScenarioId::SingleFlock | ScenarioId::Attrition | ScenarioId::LateJoiners => {
                let flock = Population::new(GroupParameters::new("flock", Rgb::BLUE), population_size)?;
                boids.extend(sim.add_population(world, &flock)?);
            }
            ScenarioId::Predators => {
                let prey = Population::new(GroupParameters::new("prey", Rgb::GREEN), population_size)?;
                let mut hunter = GroupParameters::new("predators", Rgb::RED);
                hunter.max_speed = 3.0;
                hunter.cohesion.weight = 0.01;
                hunter.alignment = hunter.alignment.disabled();
                let predators = Population::new(hunter, (population_size / 5).max(1))?;
                boids.extend(sim.add_population(world, &prey)?);
                boids.extend(sim.add_population(world, &predators)?);
            }
            ScenarioId::WalledCorridor => {
                let flock = Population::new(GroupParameters::new("flock", Rgb::BLUE), population_size)?;
                boids.extend(sim.add_population(world, &flock)?);
                sim.spawn_wall(world, &[Vec2::new(-350.0, 80.0), Vec2::new(350.0, 80.0)], None)?;
                sim.spawn_wall(world, &[Vec2::new(-350.0, -80.0), Vec2::new(350.0, -80.0)], None)?;
            }
        }
        Ok(boids)
    }

    /// Applies the scenario's mid-run event to a running world.
    pub fn disrupt<Ctx: SimulationContext>(
        &self,
        sim: &mut Simulation<Ctx>,
        world: EntityId,
        boids: &[EntityId],
        population_size: usize,
    ) -> Result<(), BoidsError> {
        match self.mid_run_event() {
            Some(MidRunEvent::KillThird) => {
                for id in boids.iter().step_by(3) {
                    sim.kill(world, *id)?;
                }
            }
            Some(MidRunEvent::SpawnFlock) => {
                let joiners = Population::new(GroupParameters::new("joiners", Rgb::RED), population_size)?;
                sim.add_population(world, &joiners)?;
            }
            None => {}
        }
        Ok(())
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(ScenarioId::Classic),
            "single_flock" | "singleflock" | "flock" => Ok(ScenarioId::SingleFlock),
            "predators" => Ok(ScenarioId::Predators),
            "walled_corridor" | "corridor" => Ok(ScenarioId::WalledCorridor),
            "attrition" => Ok(ScenarioId::Attrition),
            "late_joiners" | "latejoiners" => Ok(ScenarioId::LateJoiners),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use boids_core::WorldConfig;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert!("nope".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_classic_populates_three_groups_and_walls() {
        let mut sim = Simulation::new(SimContext::shared(42));
        let world = sim.create_world(WorldConfig::default()).unwrap();
        let boids = ScenarioId::Classic.populate(&mut sim, world, 4).unwrap();
        assert_eq!(boids.len(), 12);
    }

    #[test]
    fn test_predators_outnumbered() {
        let mut sim = Simulation::new(SimContext::shared(42));
        let world = sim.create_world(WorldConfig::default()).unwrap();
        let boids = ScenarioId::Predators.populate(&mut sim, world, 10).unwrap();
        assert_eq!(boids.len(), 12);
    }

    #[test]
    fn test_classic_walls_resampled() {
        let mut sim = Simulation::new(SimContext::shared(1));
        let world = sim.create_world(WorldConfig::default()).unwrap();
        for points in classic_walls() {
            assert!(sim.spawn_wall(world, &points, None).is_ok());
        }
    }
}
