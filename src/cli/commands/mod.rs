pub mod account;
pub mod backup;
pub mod clouds;
pub mod config;
pub mod deploys;
pub mod execute;
pub mod files;
pub mod logs;
pub mod user;
