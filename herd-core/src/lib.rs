mod config;
mod error;
mod iteration;
mod pool;
mod run;
mod schedule;
mod signal;
mod vu;
mod workflow;
mod workload;

pub use config::{DriverOptions, Stage};
pub use error::{Error, Result};
pub use iteration::IterationRunner;
pub use pool::VuPool;
pub use run::{AbortHandle, LoadDriver};
pub use schedule::RampSchedule;
pub use signal::StopSignal;
pub use vu::VuContext;
pub use workflow::{
    AbortReason, AuthFlow, AuthState, AuthStep, Credentials, LogoutAssessment, StepResponse,
    TokenPair, Transition, register_status_check,
};
pub use workload::{
    Check, RequestContext, TransportFailure, TransportFailureKind, WorkloadCall, WorkloadResult,
};

pub use herd_metrics::{
    Aggregator, CheckSample, CheckSummary, IterationOutcome, IterationResult, LatencySummary,
    MisuseError, Summary,
};
