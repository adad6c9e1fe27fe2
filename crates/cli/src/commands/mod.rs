//! CLI Commands

pub mod check_ids;
pub mod init_config;
pub mod report;
pub mod run;
pub mod status;
