pub mod decoders;
#[cfg(test)]
pub mod fake;
pub mod imap_client;
pub mod session;
