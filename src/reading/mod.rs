//! Incremental reading
//!
//! Extracts and topics are scheduled by priority alone (see [`scheduler`]),
//! independent of the flashcard memory model.

pub mod breadcrumb;
pub mod collector;
pub mod scheduler;
pub mod storage;

pub use breadcrumb::{find_topic_path, BreadcrumbItem};
pub use collector::{build_ir_queue, calculate_ir_stats, IrCard, IrCardType, IrStats};
pub use storage::{IrState, IrStorage, ReadingError};
