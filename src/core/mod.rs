//! Dispatch, fan-out and workflow scheduling.

pub mod audit;
pub mod batch;
pub mod confirm;
pub mod cooldown;
pub mod court;
pub mod error;
pub mod executor;
pub mod platform;
pub mod process;
pub mod punishment;
pub mod purge;
pub mod request_queue;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod vote;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use batch::{progress_report, BatchExecutor, BatchProgress, BatchResult, BatchStatus, BatchSummary};
pub use confirm::{await_confirmation, confirm_then, Confirmation};
pub use cooldown::CooldownTracker;
pub use court::{CourtService, SubmitRequest, SupportOutcome};
pub use error::{AppResult, DispatchError};
pub use executor::{Attempt, Job, Spawn};
pub use platform::{Member, MessageQuery, MessageRef, Platform};
pub use process::{NewProcess, Process, ProcessDetails, ProcessPatch, ProcessStatus, ProcessType};
pub use punishment::{NewPunishment, Punishment, PunishmentStatus, PunishmentType};
pub use purge::{PurgeReport, Purger};
pub use request_queue::{QueueStats, RequestQueue, TaskHandle};
pub use resolver::{ProcessResolver, Resolution};
pub use scheduler::{ProcessScheduler, RestoreReport, TimerHandler, TimerOutcome};
pub use store::{Persistence, ProcessStore, PunishmentStore, SupportToggle, VoteStore};
pub use vote::{tally, NewVote, Vote, VoteResult, VoteSide, VoteStatus, VoteToggle};
