//! Wall geometry: line-of-sight intersection against wall polylines and the
//! escape force derived from the nearest hit.
//!
//! # Pipeline
//!
//! ```text
//! for each wall, for each segment whose first point is in range:
//!     sightline (boid → boid + heading) ∩ segment    slope/intercept solve
//!     keep if ahead of the boid and closer than the perception range
//! nearest hit → escape target (locked direction or smallest deviation)
//!             → force = (target − hit) / d'²,  alpha = 1 − d' / range
//! ```

use crate::body::{BoidState, Vec2, WallSegment};
use boids_env::EntityId;
use std::f64::consts::PI;

/// Below this |dx| a segment is treated as vertical.
const VERTICAL_EPS: f64 = 1e-12;

/// Floor of the escape distance denominator.
pub const MIN_WALL_DISTANCE: f64 = 1e-5;

/// A boid's remembered wall and traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallLock {
    pub wall: EntityId,

    /// Point index offset from the hit segment's first point (0 or 1)
    pub direction: usize,
}

/// Result of a wall escape query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallEscape {
    /// Unscaled escape force along the wall
    pub force: Vec2,

    /// Blend factor in [0, 1]; 0 when no wall was hit
    pub alpha: f64,
}

impl WallEscape {
    pub fn none() -> Self {
        Self {
            force: Vec2::zeros(),
            alpha: 0.0,
        }
    }
}

/// Angle between two vectors in [0, π]; π if either is zero.
fn angle_between(a: &Vec2, b: &Vec2) -> f64 {
    let (na, nb) = (a.norm(), b.norm());
    if na == 0.0 || nb == 0.0 {
        return PI;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

fn slope_intercept(p: Vec2, q: Vec2) -> (f64, f64) {
    let slope = (q.y - p.y) / (q.x - p.x);
    (slope, p.y - slope * p.x)
}

/// Intersects the infinite sightline through `origin` and `far` with the
/// wall segment `a`–`b`.
///
/// Returns the intersection only if it lies on the segment and is strictly
/// closer to `far` than to `origin`, i.e. the wall is ahead of the boid.
/// Parallel lines yield `None`.
pub fn sightline_intersection(a: Vec2, b: Vec2, origin: Vec2, far: Vec2) -> Option<Vec2> {
    let (w1, w2) = if a.x < b.x { (a, b) } else { (b, a) };
    let (s1, s2) = if origin.x < far.x { (origin, far) } else { (far, origin) };

    let wall_vertical = (w2.x - w1.x).abs() < VERTICAL_EPS;
    let sight_vertical = (s2.x - s1.x).abs() < VERTICAL_EPS;

    let hit = match (wall_vertical, sight_vertical) {
        (true, true) => return None,
        (true, false) => {
            let (a2, b2) = slope_intercept(s1, s2);
            let x = w1.x;
            let y = a2 * x + b2;
            if y < w1.y.min(w2.y) || y > w1.y.max(w2.y) {
                return None;
            }
            Vec2::new(x, y)
        }
        (false, true) => {
            let (a1, b1) = slope_intercept(w1, w2);
            let x = s1.x;
            if x < w1.x || x > w2.x {
                return None;
            }
            Vec2::new(x, a1 * x + b1)
        }
        (false, false) => {
            let (a1, b1) = slope_intercept(w1, w2);
            let (a2, b2) = slope_intercept(s1, s2);
            if (a1 - a2).abs() <= 1e-12 * (1.0 + a1.abs().max(a2.abs())) {
                return None;
            }
            let x = (b2 - b1) / (a1 - a2);
            if x < w1.x || x > w2.x {
                return None;
            }
            Vec2::new(x, a1 * x + b1)
        }
    };

    if (hit - far).norm() < (hit - origin).norm() {
        Some(hit)
    } else {
        None
    }
}

struct Hit<'a> {
    wall: &'a WallSegment,
    index: usize,
    point: Vec2,
    distance: f64,
}

/// Computes the wall escape force for a boid looking along `heading`.
///
/// `range` is both the perception distance for wall points and the
/// normalisation of the blend factor. The lock is kept when the nearest hit
/// is on the locked wall, replaced when another wall is hit, and cleared
/// when nothing is hit.
pub fn find_wall_escape<'a, I>(
    me: &BoidState,
    heading: Vec2,
    walls: I,
    lock: &mut Option<WallLock>,
    range: f64,
) -> WallEscape
where
    I: IntoIterator<Item = &'a WallSegment>,
{
    let origin = me.position;
    let far = origin + heading;

    let mut nearest: Option<Hit<'a>> = None;
    for wall in walls {
        let points = wall.points();
        for i in 0..points.len().saturating_sub(1) {
            if (points[i] - origin).norm() > range {
                continue;
            }
            let Some(point) = sightline_intersection(points[i], points[i + 1], origin, far) else {
                continue;
            };
            let distance = (point - origin).norm();
            if distance >= range {
                continue;
            }
            if nearest.as_ref().map_or(true, |n| distance < n.distance) {
                nearest = Some(Hit {
                    wall,
                    index: i,
                    point,
                    distance,
                });
            }
        }
    }

    let Some(hit) = nearest else {
        *lock = None;
        return WallEscape::none();
    };

    let points = hit.wall.points();
    let (start, end) = (points[hit.index], points[hit.index + 1]);
    let to_hit = hit.point - origin;

    let direction = match lock.filter(|l| l.wall == hit.wall.id) {
        Some(l) => l.direction,
        None => {
            let direction = if angle_between(&to_hit, &(start - hit.point))
                < angle_between(&to_hit, &(end - hit.point))
            {
                0
            } else {
                1
            };
            tracing::trace!(boid = %me.owner, wall = %hit.wall.id, direction, "locking onto wall");
            *lock = Some(WallLock {
                wall: hit.wall.id,
                direction,
            });
            direction
        }
    };
    let target = points[hit.index + direction];

    let segment = end - start;
    let perpendicular = to_hit.perp(&segment).abs() / segment.norm();
    let distance = (perpendicular - range / 10.0).max(MIN_WALL_DISTANCE);

    WallEscape {
        force: (target - hit.point) / (distance * distance),
        alpha: 1.0 - distance / range,
    }
}
