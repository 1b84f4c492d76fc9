use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

use super::build_name;

/// Outcome of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Starting,
    /// The step produced its output.
    Success,
    /// The step ran without error but had nothing to produce.
    Empty,
    Failed,
}

/// Execution record of one step: identity, timings, counters and output.
#[derive(Debug, Clone)]
pub struct StepExecution {
    pub id: Uuid,
    pub name: String,
    pub status: StepStatus,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub duration: Option<Duration>,
    /// Rows read by the step.
    pub read_count: usize,
    /// Rows written to the step's output.
    pub write_count: usize,
    /// Rows set aside without failing the step.
    pub skip_count: usize,
    /// Main archive produced, if any.
    pub output_file: Option<PathBuf>,
    pub message: Option<String>,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            status: StepStatus::Starting,
            start_time: None,
            end_time: None,
            duration: None,
            read_count: 0,
            write_count: 0,
            skip_count: 0,
            output_file: None,
            message: None,
        }
    }
}

/// One sequential phase of a job.
///
/// Implementations fill the counters and output fields of the execution; the
/// status and timings are managed by [`run_step`].
pub trait Step {
    fn name(&self) -> &str;

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError>;
}

/// Executes `step`, recording timings and the final status.
///
/// A step that leaves its status at `Starting` is marked `Success`.
pub fn run_step(step: &dyn Step) -> Result<StepExecution, (StepExecution, BatchError)> {
    let mut execution = StepExecution::new(step.name());
    let start = Instant::now();
    execution.start_time = Some(start);

    info!("Start of step: {}, id: {}", execution.name, execution.id);

    let result = step.execute(&mut execution);

    execution.end_time = Some(Instant::now());
    execution.duration = Some(start.elapsed());

    match result {
        Ok(()) => {
            if execution.status == StepStatus::Starting {
                execution.status = StepStatus::Success;
            }
            info!(
                "End of step: {}, id: {}, status={:?} read={} write={} skip={} duration={:?}",
                execution.name,
                execution.id,
                execution.status,
                execution.read_count,
                execution.write_count,
                execution.skip_count,
                start.elapsed()
            );
            Ok(execution)
        }
        Err(err) => {
            execution.status = StepStatus::Failed;
            error!("Step {} failed: {}", execution.name, err);
            Err((execution, err))
        }
    }
}

/// Name for steps built without one.
pub fn default_step_name() -> String {
    build_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingStep {
        fail: bool,
        empty: bool,
    }

    impl Step for CountingStep {
        fn name(&self) -> &str {
            "counting"
        }

        fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
            if self.fail {
                return Err(BatchError::Configuration("boom".to_string()));
            }
            execution.read_count = 3;
            execution.write_count = 2;
            if self.empty {
                execution.status = StepStatus::Empty;
            }
            Ok(())
        }
    }

    #[test]
    fn successful_step_is_timed_and_marked() {
        let execution = run_step(&CountingStep {
            fail: false,
            empty: false,
        })
        .unwrap();

        assert_eq!(execution.status, StepStatus::Success);
        assert_eq!(execution.read_count, 3);
        assert!(execution.start_time.is_some());
        assert!(execution.duration.is_some());
    }

    #[test]
    fn empty_status_is_kept() {
        let execution = run_step(&CountingStep {
            fail: false,
            empty: true,
        })
        .unwrap();
        assert_eq!(execution.status, StepStatus::Empty);
    }

    #[test]
    fn failure_is_reported_with_execution() {
        let (execution, err) = run_step(&CountingStep {
            fail: true,
            empty: false,
        })
        .unwrap_err();
        assert_eq!(execution.status, StepStatus::Failed);
        assert!(err.is_configuration());
    }

    #[test]
    fn default_names_are_random() {
        assert_eq!(default_step_name().len(), 8);
        assert_ne!(default_step_name(), default_step_name());
    }
}
