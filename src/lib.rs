pub mod archive;
pub mod configuration;
pub mod deployment;
pub mod platform;
