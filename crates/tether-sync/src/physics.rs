//! What the sync layer needs from the host's physics and input.

use std::cell::Cell;

use tether_protocol::{Quat, RigidbodyState, Vec3};

/// A simulated rigid body owned by the host.
pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, velocity: Vec3);
    fn angular_velocity(&self) -> Vec3;
    fn set_angular_velocity(&mut self, velocity: Vec3);
    fn uses_gravity(&self) -> bool;
    fn set_gravity(&mut self, enabled: bool);
    fn is_kinematic(&self) -> bool;
    fn set_kinematic(&mut self, kinematic: bool);

    /// Advances the simulation by `dt` seconds. Hosts whose engine steps
    /// bodies on its own leave this empty.
    fn step(&mut self, _dt: f32) {}

    /// Snapshot for a `rigidbodyUpdate`.
    fn state(&self) -> RigidbodyState {
        RigidbodyState {
            position: self.position(),
            rotation: self.rotation(),
            linear_velocity: self.linear_velocity(),
            angular_velocity: self.angular_velocity(),
        }
    }
}

/// Something that can hold an object, such as a tracked hand.
pub trait Grasper {
    fn position(&self) -> Vec3;
}

/// A plain data body with Euler integration. Enough for headless peers
/// and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub gravity: bool,
    pub kinematic: bool,
}

impl SimpleBody {
    pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Advances the body by `dt` seconds.
    pub fn integrate(&mut self, dt: f32) {
        if self.kinematic {
            return;
        }
        if self.gravity {
            self.linear_velocity = self.linear_velocity + Self::GRAVITY * dt;
        }
        self.position = self.position + self.linear_velocity * dt;
    }
}

impl Default for SimpleBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            gravity: true,
            kinematic: false,
        }
    }
}

impl PhysicsBody for SimpleBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
    }

    fn uses_gravity(&self) -> bool {
        self.gravity
    }

    fn set_gravity(&mut self, enabled: bool) {
        self.gravity = enabled;
    }

    fn is_kinematic(&self) -> bool {
        self.kinematic
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.kinematic = kinematic;
    }

    fn step(&mut self, dt: f32) {
        self.integrate(dt);
    }
}

/// A grasper whose position the host moves each frame.
#[derive(Debug, Default)]
pub struct Hand {
    position: Cell<Vec3>,
}

impl Hand {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Cell::new(position),
        }
    }

    pub fn move_to(&self, position: Vec3) {
        self.position.set(position);
    }
}

impl Grasper for Hand {
    fn position(&self) -> Vec3 {
        self.position.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_body_falls_under_gravity() {
        let mut body = SimpleBody::at(Vec3::new(0.0, 10.0, 0.0));
        body.integrate(1.0);
        assert_eq!(body.linear_velocity, Vec3::new(0.0, -9.81, 0.0));
        assert_eq!(body.position, Vec3::new(0.0, 10.0 - 9.81, 0.0));
    }

    #[test]
    fn test_kinematic_body_does_not_move() {
        let mut body = SimpleBody {
            kinematic: true,
            linear_velocity: Vec3::new(1.0, 0.0, 0.0),
            ..SimpleBody::default()
        };
        body.integrate(1.0);
        assert_eq!(body.position, Vec3::ZERO);
    }

    #[test]
    fn test_state_snapshot() {
        let body = SimpleBody {
            linear_velocity: Vec3::new(1.0, 2.0, 3.0),
            ..SimpleBody::default()
        };
        let state = body.state();
        assert_eq!(state.linear_velocity, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(state.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_hand_moves() {
        let hand = Hand::default();
        hand.move_to(Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(hand.position(), Vec3::new(0.0, 1.5, 0.0));
    }
}
