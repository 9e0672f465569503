pub mod backup;
pub mod config;
pub mod credentials;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod folders;
pub mod group;
pub mod mail;
pub mod order;
pub mod plan;
pub mod prompt;
pub mod scan;
