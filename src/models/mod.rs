pub mod identity;
pub mod message;
pub mod report;
