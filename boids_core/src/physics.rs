//! Physics integration: force and speed capping plus toroidal wrap.

use crate::body::{BoidState, Vec2};

/// Scales `v` down to `max` if it is longer; shorter vectors pass unchanged.
pub fn clamp_length(v: Vec2, max: f64) -> Vec2 {
    let len = v.norm();
    if len > max && len > 0.0 {
        v * (max / len)
    } else {
        v
    }
}

/// Wraps one coordinate of a torus of the given extent into
/// `[-extent/2, extent/2]`. In-range values are returned untouched.
pub fn wrap_axis(value: f64, extent: f64) -> f64 {
    let half = extent / 2.0;
    if value > half || value < -half {
        (value + half).rem_euclid(extent) - half
    } else {
        value
    }
}

/// Toroidal world bounds centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

impl WorldBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn wrap(&self, position: Vec2) -> Vec2 {
        Vec2::new(wrap_axis(position.x, self.width), wrap_axis(position.y, self.height))
    }

    pub fn contains(&self, position: &Vec2) -> bool {
        position.x.abs() <= self.width / 2.0 && position.y.abs() <= self.height / 2.0
    }
}

/// Applies one step of physics to a boid.
///
/// The force is capped to the group's `max_force` and becomes the
/// acceleration; velocity is capped to `max_speed`; the new position wraps
/// around the torus. Returns the force actually applied.
pub fn integrate(body: &mut BoidState, raw_force: Vec2, bounds: &WorldBounds) -> Vec2 {
    let force = if raw_force.x.is_finite() && raw_force.y.is_finite() {
        clamp_length(raw_force, body.group.max_force)
    } else {
        tracing::warn!(boid = %body.owner, "non-finite force replaced by zero");
        Vec2::zeros()
    };

    body.acceleration = force;
    body.velocity = clamp_length(body.velocity + body.acceleration, body.group.max_speed);
    body.position = bounds.wrap(body.position + body.velocity);
    force
}
