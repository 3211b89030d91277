//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，只处理单条记录或单个界面，不关心流程顺序

pub mod duplicate_guard;
pub mod paginated_locator;
pub mod post_processor;
pub mod prompt;
pub mod report_writer;
pub mod secondary_surface;

pub use duplicate_guard::DuplicateGuard;
pub use paginated_locator::{LocateResult, PaginatedLocator, RowPredicate};
pub use post_processor::{
    wait_for_artifact, DocumentPostProcessor, PdfRenamer, PdftotextExtractor, TextExtractor,
};
pub use prompt::{is_affirmative, wait_until_confirmed, ConfirmationPrompt, StdinPrompt};
pub use report_writer::ReportWriter;
pub use secondary_surface::{SecondarySurfaceSync, SyncOutcome, SyncSettings};
