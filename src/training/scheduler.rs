//! Learning rate scheduling.
//!
//! The schedule advances once per epoch, at the start of the train
//! phase, independently of the running loss and accuracy statistics.

use serde::{Deserialize, Serialize};

/// Learning rate schedule shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Constant learning rate (no scheduling)
    Constant,

    /// Step decay: multiply the rate by `gamma` every `step_size` epochs
    Step { step_size: usize, gamma: f64 },
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::Constant
    }
}

/// Learning rate scheduler
#[derive(Debug, Clone)]
pub struct LrScheduler {
    schedule: LrSchedule,
    current_lr: f64,
    current_epoch: usize,
}

impl LrScheduler {
    /// Create a new scheduler starting from `base_lr`
    pub fn new(schedule: LrSchedule, base_lr: f64) -> Self {
        Self {
            schedule,
            current_lr: base_lr,
            current_epoch: 0,
        }
    }

    /// Get the current learning rate
    pub fn lr(&self) -> f64 {
        self.current_lr
    }

    /// Advance the schedule by one epoch
    pub fn step(&mut self) {
        self.current_epoch += 1;

        match &self.schedule {
            LrSchedule::Constant => {}
            LrSchedule::Step { step_size, gamma } => {
                if self.current_epoch % step_size == 0 {
                    self.current_lr *= gamma;
                }
            }
        }
    }

    /// Number of epochs the schedule has advanced through
    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_schedule() {
        let mut scheduler = LrScheduler::new(LrSchedule::Constant, 0.001);
        assert_eq!(scheduler.lr(), 0.001);

        scheduler.step();
        scheduler.step();
        assert_eq!(scheduler.lr(), 0.001);
        assert_eq!(scheduler.current_epoch(), 2);
    }

    #[test]
    fn test_step_schedule() {
        let mut scheduler = LrScheduler::new(
            LrSchedule::Step {
                step_size: 2,
                gamma: 0.5,
            },
            0.001,
        );

        scheduler.step(); // epoch 1
        assert_eq!(scheduler.lr(), 0.001);

        scheduler.step(); // epoch 2
        assert!((scheduler.lr() - 0.0005).abs() < 1e-9);

        scheduler.step(); // epoch 3
        assert!((scheduler.lr() - 0.0005).abs() < 1e-9);

        scheduler.step(); // epoch 4
        assert!((scheduler.lr() - 0.00025).abs() < 1e-9);
    }

    #[test]
    fn test_reference_schedule_constant_over_short_run() {
        // Step size 7 with a 5-epoch run never decays
        let mut scheduler = LrScheduler::new(
            LrSchedule::Step {
                step_size: 7,
                gamma: 0.1,
            },
            0.001,
        );

        for _ in 0..5 {
            scheduler.step();
            assert_eq!(scheduler.lr(), 0.001);
        }
    }
}
