//! Domain model (IDs, envelopes, options, states, errors).
//!
//! ここにはプロセス境界をまたぐ「形」だけを置きます。
//! スケジューラやファイルシステムには依存しません。

pub mod call;
pub mod errors;
pub mod ids;
pub mod options;
pub mod outcome;
pub mod state;

pub use self::call::{CallBuilder, CallEnvelope, FunctionRef};
pub use self::errors::{JobError, JobFailure, SchedulerError, SerializationError, SubmissionError};
pub use self::ids::{JobKey, SchedulerJobId};
pub use self::options::{OptionValue, SchedulerOptions};
pub use self::outcome::OutcomeEnvelope;
pub use self::state::JobState;
