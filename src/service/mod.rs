pub mod archive;
pub mod archive_actor;
