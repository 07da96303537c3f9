//! Physical bodies: the boid state the coordinator integrates and the wall
//! polylines boids steer around.

use crate::error::BoidsError;
use crate::population::GroupParameters;
use boids_env::EntityId;
use nalgebra::Vector2;
use std::sync::Arc;

/// 2D vector used for positions, velocities and forces.
pub type Vec2 = Vector2<f64>;

/// The body of a boid: canonical in the coordinator, copied into snapshots.
#[derive(Debug, Clone)]
pub struct BoidState {
    pub owner: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub group: Arc<GroupParameters>,
}

impl BoidState {
    pub fn new(owner: EntityId, group: Arc<GroupParameters>, position: Vec2, velocity: Vec2) -> Self {
        Self {
            owner,
            position,
            velocity,
            acceleration: Vec2::zeros(),
            group,
        }
    }

    /// True if both boids belong to the same population.
    pub fn same_group(&self, other: &BoidState) -> bool {
        Arc::ptr_eq(&self.group, &other.group) || self.group.name == other.group.name
    }

    /// Shapes a raw random velocity into a launch velocity.
    ///
    /// The raw direction is shrunk to length 0.25, biased by (0, 0.75) and
    /// scaled to the group's max speed, so fresh boids drift mostly along +y.
    pub fn launch_velocity(raw: Vec2, max_speed: f64) -> Vec2 {
        let direction = raw.try_normalize(f64::EPSILON).unwrap_or_else(Vec2::zeros);
        (direction * 0.25 + Vec2::new(0.0, 0.75)) * max_speed
    }
}

/// An immutable wall polyline.
///
/// Invariant: consecutive points are strictly closer than the spacing the
/// wall was built with.
#[derive(Debug, Clone)]
pub struct WallSegment {
    pub id: EntityId,
    points: Arc<[Vec2]>,
}

impl WallSegment {
    /// Builds a wall, dropping zero-length segments and subdividing every gap
    /// of `max_spacing` or more into `ceil(len / (max_spacing / 2))` equal parts.
    pub fn new(id: EntityId, points: &[Vec2], max_spacing: f64) -> Result<Self, BoidsError> {
        if !(max_spacing > 0.0) {
            return Err(BoidsError::config(format!(
                "wall point spacing must be positive, got {max_spacing}"
            )));
        }

        let mut distinct: Vec<Vec2> = Vec::with_capacity(points.len());
        for p in points {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(BoidsError::config(format!("wall {id} has a non-finite point")));
            }
            match distinct.last() {
                Some(last) if (p - last).norm() <= f64::EPSILON => {
                    tracing::warn!(wall = %id, "skipping zero-length wall segment");
                }
                _ => distinct.push(*p),
            }
        }
        if distinct.len() < 2 {
            return Err(BoidsError::config(format!(
                "wall {id} needs at least two distinct points, got {}",
                distinct.len()
            )));
        }

        let mut resampled = Vec::with_capacity(distinct.len());
        resampled.push(distinct[0]);
        for pair in distinct.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = (b - a).norm();
            if length >= max_spacing {
                let parts = (length / (max_spacing / 2.0)).ceil() as usize;
                let step = (b - a) / parts as f64;
                for k in 1..parts {
                    resampled.push(a + step * k as f64);
                }
            }
            resampled.push(b);
        }

        Ok(Self {
            id,
            points: resampled.into(),
        })
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Rgb;
    use approx::assert_relative_eq;

    #[test]
    fn test_wall_resampling_long_gap() {
        let wall = WallSegment::new(
            EntityId::from_seed(1),
            &[Vec2::new(0.0, 0.0), Vec2::new(250.0, 0.0)],
            100.0,
        )
        .unwrap();

        // 250 / 50 = 5 parts → 4 intermediate points
        assert_eq!(wall.len(), 6);
        for pair in wall.points().windows(2) {
            assert!((pair[1] - pair[0]).norm() <= 100.0 + 1e-9);
        }
        assert_relative_eq!(wall.points()[1].x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(wall.points()[5].x, 250.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wall_short_gaps_untouched() {
        let pts = [Vec2::new(10.0, -30.0), Vec2::new(15.0, -80.0), Vec2::new(40.0, -60.0)];
        let wall = WallSegment::new(EntityId::from_seed(2), &pts, 100.0).unwrap();
        assert_eq!(wall.points(), &pts[..]);
    }

    #[test]
    fn test_wall_gap_equal_to_spacing_is_split() {
        let wall = WallSegment::new(
            EntityId::from_seed(3),
            &[Vec2::new(0.0, 0.0), Vec2::new(0.0, 100.0)],
            100.0,
        )
        .unwrap();
        assert_eq!(wall.len(), 3);
        assert_relative_eq!(wall.points()[1].y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wall_drops_zero_length_segments() {
        let wall = WallSegment::new(
            EntityId::from_seed(4),
            &[Vec2::new(0.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)],
            100.0,
        )
        .unwrap();
        assert_eq!(wall.len(), 2);
    }

    #[test]
    fn test_wall_rejects_degenerate_input() {
        let id = EntityId::from_seed(5);
        assert!(WallSegment::new(id, &[Vec2::new(1.0, 1.0)], 100.0).is_err());
        assert!(WallSegment::new(id, &[Vec2::new(1.0, 1.0), Vec2::new(1.0, 1.0)], 100.0).is_err());
        assert!(WallSegment::new(id, &[Vec2::zeros(), Vec2::new(1.0, 0.0)], 0.0).is_err());
    }

    #[test]
    fn test_launch_velocity_scaled_to_max_speed() {
        let v = BoidState::launch_velocity(Vec2::new(0.3, -0.4), 2.0);
        // direction (0.6, -0.8) * 0.25 = (0.15, -0.2); + (0, 0.75) = (0.15, 0.55); * 2
        assert_relative_eq!(v.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.1, epsilon = 1e-12);
        assert!(v.norm() <= 2.0);

        let still = BoidState::launch_velocity(Vec2::zeros(), 2.0);
        assert_relative_eq!(still.y, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_same_group_by_name() {
        let a = Arc::new(GroupParameters::new("red", Rgb::RED));
        let b = Arc::new(GroupParameters::new("red", Rgb::RED));
        let c = Arc::new(GroupParameters::new("blue", Rgb::BLUE));
        let ba = BoidState::new(EntityId::from_seed(1), a, Vec2::zeros(), Vec2::zeros());
        let bb = BoidState::new(EntityId::from_seed(2), b, Vec2::zeros(), Vec2::zeros());
        let bc = BoidState::new(EntityId::from_seed(3), c, Vec2::zeros(), Vec2::zeros());
        assert!(ba.same_group(&bb));
        assert!(!ba.same_group(&bc));
    }
}
