//! The entity force model: Reynolds' flocking rules blended with wall escape.
//!
//! Each boid aggregates four rule forces from the boids it can see:
//! 1. **Separation**: inverse-square push away from close flockmates
//! 2. **Cohesion**: pull towards the centroid of flockmates
//! 3. **Alignment**: match the mean heading of flockmates
//! 4. **Repulsion**: inverse-square push away from other populations
//!
//! The weighted sum is capped to `max_force`, divided by `mass`, and mixed
//! with the wall escape force by the blend factor `alpha`.

use crate::body::{BoidState, Vec2, WallSegment};
use crate::geometry::{find_wall_escape, WallEscape, WallLock};
use crate::physics::clamp_length;
use crate::population::RuleParams;

/// Steering constants shared by every boid of a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringConfig {
    /// Perception range for wall points, also the alpha normalisation
    pub wall_range: f64,

    /// Length of the virtual sightline projected along the heading
    pub sightline_length: f64,

    /// Multiplier applied to the raw escape force before blending
    pub escape_gain: f64,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            wall_range: 100.0,
            sightline_length: 5.0,
            escape_gain: 1e8,
        }
    }
}

/// True if `other` is within `distance` of `me` and inside its view cone.
///
/// An observer without velocity has no facing and sees all around.
/// Coincident boids are never visible.
pub fn is_visible(me: &BoidState, other: &BoidState, distance: f64) -> bool {
    let offset = other.position - me.position;
    let len = offset.norm();
    if len > distance || len == 0.0 {
        return false;
    }
    match me.velocity.try_normalize(f64::EPSILON) {
        Some(facing) => facing.dot(&(offset / len)).clamp(-1.0, 1.0) >= me.group.visible_angle_cos,
        None => true,
    }
}

/// A rule's output: the force and how many boids contributed to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleForce {
    pub force: Vec2,
    pub neighbours: usize,
}

impl RuleForce {
    fn zero() -> Self {
        Self {
            force: Vec2::zeros(),
            neighbours: 0,
        }
    }
}

fn candidates<'a, I>(me: &'a BoidState, boids: I, same_group: bool, distance: f64) -> impl Iterator<Item = &'a BoidState> + 'a
where
    I: IntoIterator<Item = &'a BoidState>,
    I::IntoIter: 'a,
{
    boids.into_iter().filter(move |other| {
        other.owner != me.owner && me.same_group(other) == same_group && is_visible(me, other, distance)
    })
}

fn inverse_square<'a>(me: &BoidState, others: impl Iterator<Item = &'a BoidState>) -> RuleForce {
    others.fold(RuleForce::zero(), |mut acc, other| {
        let away = me.position - other.position;
        acc.force += away / away.norm_squared();
        acc.neighbours += 1;
        acc
    })
}

/// Inverse-square push away from visible flockmates within `distance`.
pub fn separation<'a, I>(me: &'a BoidState, boids: I, distance: f64) -> RuleForce
where
    I: IntoIterator<Item = &'a BoidState>,
    I::IntoIter: 'a,
{
    inverse_square(me, candidates(me, boids, true, distance))
}

/// Inverse-square push away from visible boids of other groups.
pub fn repulsion<'a, I>(me: &'a BoidState, boids: I, distance: f64) -> RuleForce
where
    I: IntoIterator<Item = &'a BoidState>,
    I::IntoIter: 'a,
{
    inverse_square(me, candidates(me, boids, false, distance))
}

/// Vector from `me` to the centroid of visible flockmates.
pub fn cohesion<'a, I>(me: &'a BoidState, boids: I, distance: f64) -> RuleForce
where
    I: IntoIterator<Item = &'a BoidState>,
    I::IntoIter: 'a,
{
    let mut sum = Vec2::zeros();
    let mut count = 0;
    for other in candidates(me, boids, true, distance) {
        sum += other.position;
        count += 1;
    }
    if count == 0 {
        return RuleForce::zero();
    }
    RuleForce {
        force: sum / count as f64 - me.position,
        neighbours: count,
    }
}

/// Mean unit heading of visible flockmates. Stationary ones still count as
/// seen but add no direction.
pub fn alignment<'a, I>(me: &'a BoidState, boids: I, distance: f64) -> RuleForce
where
    I: IntoIterator<Item = &'a BoidState>,
    I::IntoIter: 'a,
{
    let mut sum = Vec2::zeros();
    let mut count = 0;
    for other in candidates(me, boids, true, distance) {
        if let Some(unit) = other.velocity.try_normalize(f64::EPSILON) {
            sum += unit;
        }
        count += 1;
    }
    if count == 0 {
        return RuleForce::zero();
    }
    RuleForce {
        force: sum / count as f64,
        neighbours: count,
    }
}

/// Unit vector along `velocity`, or +y for a boid at rest.
pub fn heading_of(velocity: &Vec2) -> Vec2 {
    velocity.try_normalize(1e-9).unwrap_or_else(|| Vec2::new(0.0, 1.0))
}

/// The private decision state of one boid.
///
/// Holds what must survive between ticks: the wall lock and the last blend
/// factor.
#[derive(Debug, Clone, Default)]
pub struct BoidBrain {
    lock: Option<WallLock>,
    alpha: f64,
}

impl BoidBrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn lock(&self) -> Option<WallLock> {
        self.lock
    }

    /// Weighted sum of the enabled rules and the total neighbour count.
    pub fn flocking_force<'a, I>(me: &'a BoidState, boids: I) -> RuleForce
    where
        I: IntoIterator<Item = &'a BoidState> + Clone,
        I::IntoIter: 'a,
    {
        let group = &me.group;
        let mut total = RuleForce::zero();
        let mut add = |params: RuleParams, rule: RuleForce| {
            total.force += rule.force * params.weight;
            total.neighbours += rule.neighbours;
        };

        if group.separation.enabled {
            add(group.separation, separation(me, boids.clone(), group.separation.distance));
        }
        if group.cohesion.enabled {
            add(group.cohesion, cohesion(me, boids.clone(), group.cohesion.distance));
        }
        if group.alignment.enabled {
            add(group.alignment, alignment(me, boids.clone(), group.alignment.distance));
        }
        if group.repulsion.enabled {
            add(group.repulsion, repulsion(me, boids, group.repulsion.distance));
        }
        total
    }

    /// Computes this tick's influence for `me` from a perception snapshot.
    ///
    /// With no visible neighbour at all the flocking rules are skipped and the
    /// boid keeps its heading, still blended with the wall escape.
    pub fn think<'a, I, W>(&mut self, me: &'a BoidState, boids: I, walls: W, config: &SteeringConfig) -> Vec2
    where
        I: IntoIterator<Item = &'a BoidState> + Clone,
        I::IntoIter: 'a,
        W: IntoIterator<Item = &'a WallSegment>,
    {
        let flock = Self::flocking_force(me, boids);

        if flock.neighbours == 0 {
            let heading = heading_of(&me.velocity) * config.sightline_length;
            let escape = self.escape(me, heading, walls, config);
            return self.blend(heading, escape, config);
        }

        let influence = clamp_length(flock.force, me.group.max_force);
        let heading = heading_of(&(me.velocity + influence)) * config.sightline_length;
        let escape = self.escape(me, heading, walls, config);
        self.blend(influence / me.group.mass, escape, config)
    }

    fn escape<'a, W>(&mut self, me: &BoidState, heading: Vec2, walls: W, config: &SteeringConfig) -> WallEscape
    where
        W: IntoIterator<Item = &'a WallSegment>,
    {
        let escape = find_wall_escape(me, heading, walls, &mut self.lock, config.wall_range);
        self.alpha = escape.alpha;
        escape
    }

    fn blend(&self, steering: Vec2, escape: WallEscape, config: &SteeringConfig) -> Vec2 {
        steering * (1.0 - self.alpha) + escape.force * config.escape_gain * self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{GroupParameters, Rgb};
    use approx::assert_relative_eq;
    use boids_env::EntityId;
    use std::sync::Arc;

    fn group(name: &str) -> Arc<GroupParameters> {
        Arc::new(GroupParameters::new(name, Rgb::RED))
    }

    fn boid(seed: u64, g: &Arc<GroupParameters>, pos: (f64, f64), vel: (f64, f64)) -> BoidState {
        BoidState::new(
            EntityId::from_seed(seed),
            Arc::clone(g),
            Vec2::new(pos.0, pos.1),
            Vec2::new(vel.0, vel.1),
        )
    }

    #[test]
    fn test_separation_points_away_from_neighbour() {
        let g = group("red");
        let a = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let b = boid(2, &g, (1.0, 0.0), (0.0, 0.0));
        let all = [a.clone(), b];

        let sep = separation(&a, all.iter(), 10.0);

        assert_eq!(sep.neighbours, 1);
        assert_relative_eq!(sep.force.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(sep.force.y, 0.0, epsilon = 1e-12);

        let mut brain = BoidBrain::new();
        let influence = brain.think(&a, all.iter(), std::iter::empty(), &SteeringConfig::default());
        assert!(influence.x < 0.0);
    }

    #[test]
    fn test_separation_inverse_square() {
        let g = group("red");
        let a = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let b = boid(2, &g, (0.0, 2.0), (0.0, 0.0));
        let sep = separation(&a, [a.clone(), b].iter(), 10.0);
        assert_relative_eq!(sep.force.y, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_isolated_boid_keeps_heading() {
        let mut g = GroupParameters::new("red", Rgb::RED);
        g.separation.weight = 1000.0;
        g.cohesion.weight = 1000.0;
        let g = Arc::new(g);
        let a = boid(1, &g, (0.0, 0.0), (1.0, 1.0));
        let far_away = boid(2, &g, (300.0, 300.0), (0.0, 1.0));

        let mut brain = BoidBrain::new();
        let influence = brain.think(&a, [a.clone(), far_away].iter(), std::iter::empty(), &SteeringConfig::default());

        let expected = Vec2::new(1.0, 1.0).normalize() * 5.0;
        assert_relative_eq!(influence.x, expected.x, epsilon = 1e-12);
        assert_relative_eq!(influence.y, expected.y, epsilon = 1e-12);
        assert_eq!(brain.alpha(), 0.0);
    }

    #[test]
    fn test_resting_isolated_boid_heads_up() {
        let g = group("red");
        let a = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let mut brain = BoidBrain::new();
        let influence = brain.think(&a, [a.clone()].iter(), std::iter::empty(), &SteeringConfig::default());
        assert_relative_eq!(influence.y, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_visibility_cone() {
        let mut g = GroupParameters::new("red", Rgb::RED);
        g.visible_angle_cos = 0.0; // front half-plane
        let g = Arc::new(g);
        let me = boid(1, &g, (0.0, 0.0), (1.0, 0.0));
        let ahead = boid(2, &g, (5.0, 1.0), (0.0, 0.0));
        let behind = boid(3, &g, (-5.0, 0.0), (0.0, 0.0));
        let too_far = boid(4, &g, (50.0, 0.0), (0.0, 0.0));

        assert!(is_visible(&me, &ahead, 10.0));
        assert!(!is_visible(&me, &behind, 10.0));
        assert!(!is_visible(&me, &too_far, 10.0));
        assert!(!is_visible(&me, &me, 10.0));
    }

    #[test]
    fn test_visibility_symmetric_without_cone() {
        let mut g = GroupParameters::new("red", Rgb::RED);
        g.visible_angle_cos = -1.0;
        let g = Arc::new(g);
        let a = boid(1, &g, (0.0, 0.0), (1.0, 0.0));
        let b = boid(2, &g, (-3.0, 4.0), (0.3, -2.0));

        for d in [4.9, 5.0, 5.1] {
            assert_eq!(is_visible(&a, &b, d), is_visible(&b, &a, d));
        }
    }

    #[test]
    fn test_cohesion_and_alignment() {
        let g = group("red");
        let me = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let b = boid(2, &g, (10.0, 0.0), (2.0, 0.0));
        let c = boid(3, &g, (0.0, 10.0), (0.0, 3.0));
        let all = [me.clone(), b, c];

        let coh = cohesion(&me, all.iter(), 100.0);
        assert_eq!(coh.neighbours, 2);
        assert_relative_eq!(coh.force.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(coh.force.y, 5.0, epsilon = 1e-12);

        let ali = alignment(&me, all.iter(), 100.0);
        assert_relative_eq!(ali.force.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(ali.force.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_repulsion_only_other_groups() {
        let red = group("red");
        let blue = group("blue");
        let me = boid(1, &red, (0.0, 0.0), (0.0, 0.0));
        let mate = boid(2, &red, (1.0, 0.0), (0.0, 0.0));
        let foe = boid(3, &blue, (0.0, 1.0), (0.0, 0.0));
        let all = [me.clone(), mate, foe];

        let rep = repulsion(&me, all.iter(), 100.0);
        assert_eq!(rep.neighbours, 1);
        assert_relative_eq!(rep.force.y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(rep.force.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flocking_force_respects_toggles_and_cap() {
        let mut g = GroupParameters::new("red", Rgb::RED);
        g.cohesion = g.cohesion.disabled();
        g.alignment = g.alignment.disabled();
        g.separation.weight = 100.0;
        let g = Arc::new(g);
        let me = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let near = boid(2, &g, (1.0, 0.0), (0.0, 0.0));
        let all = [me.clone(), near];

        let total = BoidBrain::flocking_force(&me, all.iter());
        assert_relative_eq!(total.force.x, -100.0, epsilon = 1e-9);

        let mut brain = BoidBrain::new();
        let influence = brain.think(&me, all.iter(), std::iter::empty(), &SteeringConfig::default());
        assert_relative_eq!(influence.norm(), g.max_force / g.mass, epsilon = 1e-9);
    }

    #[test]
    fn test_mass_dampens_influence() {
        let mut g = GroupParameters::new("red", Rgb::RED);
        g.mass = 4.0;
        let g = Arc::new(g);
        let me = boid(1, &g, (0.0, 0.0), (0.0, 0.0));
        let near = boid(2, &g, (2.0, 0.0), (0.0, 0.0));
        let all = [me.clone(), near];

        let raw = clamp_length(BoidBrain::flocking_force(&me, all.iter()).force, g.max_force);
        let mut brain = BoidBrain::new();
        let influence = brain.think(&me, all.iter(), std::iter::empty(), &SteeringConfig::default());
        assert_relative_eq!(influence.x, raw.x / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wall_dominates_near_wall() {
        let g = group("red");
        let me = boid(1, &g, (0.0, 0.0), (1.0, 0.2));
        let wall = WallSegment::new(
            EntityId::from_seed(50),
            &[Vec2::new(20.0, -30.0), Vec2::new(20.0, 40.0)],
            100.0,
        )
        .unwrap();

        let mut brain = BoidBrain::new();
        let influence = brain.think(&me, [me.clone()].iter(), [wall].iter(), &SteeringConfig::default());

        assert!(brain.alpha() > 0.8);
        assert!(brain.lock().is_some());
        // escape runs along the wall, towards +y
        assert!(influence.y > 1e6);
    }
}
