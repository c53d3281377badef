/// Iteration budget for one run. Every iteration counts, including failed ones.
pub struct LoopController {
    max_steps: u32,
    iterations: u32,
    failure_count: u32,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            iterations: 0,
            failure_count: 0,
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Starts the next iteration and returns its 1-based number.
    pub fn begin_iteration(&mut self) -> u32 {
        self.iterations += 1;
        self.iterations
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn should_stop(&self) -> bool {
        self.iterations >= self.max_steps
    }
}
