//! Domain objects the commands work with. Each wraps the API client and adds
//! the local knowledge (Cloudfile, git, SSH key) a command needs.

pub mod app;
pub mod backup;
pub mod cloudfile;
pub mod user;

pub use app::App;
pub use backup::{download_path, Backup};
pub use cloudfile::{CloudDefinition, Cloudfile, CloudfileEntry};
pub use user::User;
