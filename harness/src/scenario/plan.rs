//! Randomised rider requests

use rand::Rng;

use super::command::{Command, Direction};
use crate::config::ConfigError;

/// One rider trip: hall call at `origin`, then a car call to `destination`
///
/// Always `origin != destination`, both within `1..=floor_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPlan {
    origin: u32,
    destination: u32,
}

impl RequestPlan {
    /// Draw origin and destination uniformly, resampling the destination
    /// until it differs from the origin
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, floor_count: u32) -> Result<Self, ConfigError> {
        if floor_count < 2 {
            return Err(ConfigError::InvalidFloorCount(floor_count));
        }
        let origin = rng.random_range(1..=floor_count);
        let mut destination = rng.random_range(1..=floor_count);
        while destination == origin {
            destination = rng.random_range(1..=floor_count);
        }
        Ok(Self {
            origin,
            destination,
        })
    }

    pub fn origin(&self) -> u32 {
        self.origin
    }

    pub fn destination(&self) -> u32 {
        self.destination
    }

    pub fn direction(&self) -> Direction {
        Direction::between(self.origin, self.destination)
    }

    pub fn call_command(&self) -> Command {
        Command::Call {
            floor: self.origin,
            direction: self.direction(),
        }
    }

    pub fn go_command(&self) -> Command {
        Command::Go {
            floor: self.destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generated_plans_are_valid() {
        for seed in 0..50u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for floor_count in [2u32, 3, 10, 15, 100] {
                for _ in 0..50 {
                    let plan = RequestPlan::generate(&mut rng, floor_count).unwrap();
                    assert_ne!(plan.origin(), plan.destination());
                    assert!((1..=floor_count).contains(&plan.origin()));
                    assert!((1..=floor_count).contains(&plan.destination()));
                    assert_eq!(
                        plan.direction() == Direction::Up,
                        plan.destination() > plan.origin()
                    );
                }
            }
        }
    }

    #[test]
    fn test_two_floors_covers_both_trips() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen_up = false;
        let mut seen_down = false;
        for _ in 0..100 {
            match RequestPlan::generate(&mut rng, 2).unwrap().direction() {
                Direction::Up => seen_up = true,
                Direction::Down => seen_down = true,
            }
        }
        assert!(seen_up && seen_down);
    }

    #[test]
    fn test_single_floor_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            RequestPlan::generate(&mut rng, 1),
            Err(ConfigError::InvalidFloorCount(1))
        );
    }

    #[test]
    fn test_plan_commands() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let plan = RequestPlan::generate(&mut rng, 10).unwrap();
        assert_eq!(
            plan.call_command(),
            Command::Call {
                floor: plan.origin(),
                direction: plan.direction()
            }
        );
        assert_eq!(
            plan.go_command().to_string(),
            format!("go {}", plan.destination())
        );
    }
}
