pub mod candidate;
pub mod settings;
