pub mod conversation_service;
pub mod encryption;
pub mod identity_directory;
pub mod message_store;
pub mod report_service;

// Re-export key types for convenience
pub use conversation_service::{ConversationService, ConversationSummary};
pub use encryption::{EncryptionCodec, UNREADABLE_SENTINEL};
pub use identity_directory::{IdentityLookup, MemoryDirectory, PgIdentityDirectory};
pub use message_store::{MemoryMessageStore, MessageStore, PgMessageStore};
pub use report_service::{
    MemoryReportStore, PgReportStore, ReportEvidence, ReportService, ReportStore, ReportView,
};
