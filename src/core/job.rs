use std::time::{Duration, Instant};

use log::info;
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{run_step, Step, StepExecution},
};

type JobResult<T> = Result<T, BatchError>;

/// Represents a job that can be executed.
///
/// A job is a sequence of steps run in order. The first failing step aborts
/// the job.
pub trait Job {
    /// Runs every step in order.
    fn run(&self) -> JobResult<JobExecution>;
}

/// Timings of a job run and the execution record of every step.
#[derive(Debug)]
pub struct JobExecution {
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    /// One execution per completed step, in run order.
    pub steps: Vec<StepExecution>,
}

impl JobExecution {
    /// Execution record of the step called `name`, if it ran.
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// A named, ordered list of steps.
pub struct JobInstance<'a> {
    id: Uuid,
    name: String,
    steps: Vec<&'a dyn Step>,
}

impl JobInstance<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Job for JobInstance<'_> {
    fn run(&self) -> JobResult<JobExecution> {
        let start = Instant::now();

        info!("Start of job: {}, id: {}", self.name, self.id);

        let mut executions = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match run_step(*step) {
                Ok(execution) => executions.push(execution),
                Err((execution, error)) => {
                    info!(
                        "Abort of job: {}, id: {}, failed_step={}",
                        self.name, self.id, execution.name
                    );
                    return Err(BatchError::Step {
                        name: execution.name,
                        source: Box::new(error),
                    });
                }
            }
        }

        info!(
            "End of job: {}, id: {}, duration={:?}",
            self.name,
            self.id,
            start.elapsed()
        );

        Ok(JobExecution {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            steps: executions,
        })
    }
}

/// Builder for creating a job instance.
///
/// ```
/// use batimento::core::job::{Job, JobBuilder};
/// use batimento::core::step::{Step, StepExecution};
/// use batimento::BatchError;
///
/// struct Hello;
///
/// impl Step for Hello {
///     fn name(&self) -> &str {
///         "hello"
///     }
///
///     fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
///         execution.write_count = 1;
///         Ok(())
///     }
/// }
///
/// let step = Hello;
/// let job = JobBuilder::new().name("greeting".to_string()).start(&step).build();
/// let execution = job.run().unwrap();
/// assert_eq!(execution.steps.len(), 1);
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    name: Option<String>,
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// If no name has been provided, a random name is generated.
    pub fn build(self) -> JobInstance<'a> {
        JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
        }
    }
}
