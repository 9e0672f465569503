pub mod mailbox;
pub mod message;
