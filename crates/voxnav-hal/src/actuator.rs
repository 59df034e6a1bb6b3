//! Generic `Actuator` trait for the controlled agent.
//!
//! Clients implement this trait to expose the agent's pose and its
//! movement primitives.  The waypoint control loop only ever talks to the
//! trait, so clients can be swapped without touching control logic.

use std::time::Duration;

use voxnav_types::{Control, NavError, Vec3};

/// The agent body: continuous pose plus turn / move / jump primitives.
///
/// Controls latch: once `Forward` is set it stays set until cleared, which is
/// why every exit path of a traversal must call
/// [`clear_controls`][Actuator::clear_controls].
pub trait Actuator: Send + Sync {
    /// Stable identifier for this agent, e.g. the client's username.
    fn id(&self) -> &str;

    /// Pull fresh entity state before a control decision.  `elapsed` is the
    /// time since the previous refresh.  Network clients update their pose
    /// asynchronously and keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::HardwareFault`] if the client has disconnected.
    fn refresh(&mut self, _elapsed: Duration) -> Result<(), NavError> {
        Ok(())
    }

    /// Current feet position.
    fn position(&self) -> Vec3;

    /// Current heading in radians.  Zero faces -Z; positive turns toward -X.
    fn yaw(&self) -> f64;

    /// Orient the agent.  `force` snaps to the heading immediately instead of
    /// turning gradually.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::HardwareFault`] if the command cannot be applied.
    fn look(&mut self, yaw: f64, pitch: f64, force: bool) -> Result<(), NavError>;

    /// Latch `control` on or off.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::HardwareFault`] if the command cannot be applied.
    fn set_control(&mut self, control: Control, active: bool) -> Result<(), NavError>;

    /// Release every active control in one step.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::HardwareFault`] if the command cannot be applied.
    fn clear_controls(&mut self) -> Result<(), NavError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process actuator used only for tests.
    struct MockActuator {
        yaw: f64,
        forward: bool,
        jump: bool,
    }

    impl Actuator for MockActuator {
        fn id(&self) -> &str {
            "mock"
        }

        fn position(&self) -> Vec3 {
            Vec3::default()
        }

        fn yaw(&self) -> f64 {
            self.yaw
        }

        fn look(&mut self, yaw: f64, _pitch: f64, _force: bool) -> Result<(), NavError> {
            self.yaw = yaw;
            Ok(())
        }

        fn set_control(&mut self, control: Control, active: bool) -> Result<(), NavError> {
            match control {
                Control::Forward => self.forward = active,
                Control::Jump => self.jump = active,
            }
            Ok(())
        }

        fn clear_controls(&mut self) -> Result<(), NavError> {
            self.forward = false;
            self.jump = false;
            Ok(())
        }
    }

    #[test]
    fn mock_actuator_latches_and_clears() {
        let mut act = MockActuator {
            yaw: 0.0,
            forward: false,
            jump: false,
        };
        act.refresh(Duration::from_millis(50)).unwrap();
        act.set_control(Control::Forward, true).unwrap();
        act.set_control(Control::Jump, true).unwrap();
        act.look(std::f64::consts::FRAC_PI_2, 0.0, true).unwrap();
        assert!(act.forward && act.jump);
        assert!((act.yaw() - std::f64::consts::FRAC_PI_2).abs() < f64::EPSILON);

        act.clear_controls().unwrap();
        assert!(!act.forward && !act.jump);
    }
}
