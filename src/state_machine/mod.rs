mod job;
mod state;

pub use job::{JobId, JobReport, PrintJob};
pub use state::{JobStatus, Stage, StateMachine, TransitionError};
