pub mod descriptor;
pub mod version;
