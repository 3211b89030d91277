pub mod attempt;
pub mod batch;
pub mod loaders;
pub mod record;

pub use attempt::{AttemptLog, AttemptOutcome, ExecutionAttempt};
pub use batch::{Abort, BatchState, RecordOutcome, RunSummary};
pub use loaders::{load_records_from_csv, parse_records};
pub use record::{FieldValue, RecordField, RecordInput};
