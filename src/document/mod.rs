//! Document Module
//!
//! Per-document session state and the page selection grammar shared with
//! the processing service.

mod page_selection;
mod session;

pub use page_selection::{parse_page_selection, SelectionError};
pub use session::{
    BatchGuard, DocumentSession, PageState, PointerEvent, PointerOutcome, SessionError, SessionManager,
    SharedSession, ViewerRules, ViewerState, ViewerUpdate, DEFAULT_SESSION_IDLE_TTL,
};
