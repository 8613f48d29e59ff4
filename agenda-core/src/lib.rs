pub mod filter;
pub mod lifecycle;
pub mod models;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use filter::{ExecutionState, RequestFilter};
pub use lifecycle::{
    claim, bulk_transition, set_supervisor_note, transition, Action, BulkAction, BulkOutcome,
    BulkPolicy, LifecycleError, Role, Selection, CLAIM_ACTION,
};
pub use models::{
    AgendaKind, Day, DayKind, HistoryEntry, Origin, Request, RequestBook, RequestDraft, Status,
    SubmitError,
};
pub use storage::{default_data_dir, FileKv};
pub use store::{
    parse_request_number, KvStore, LoadOutcome, MemoryKv, RequestStore, LAST_NUMBER_KEY,
    REQUESTS_KEY,
};
