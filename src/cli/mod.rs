//! CLI support modules.

pub mod init;
