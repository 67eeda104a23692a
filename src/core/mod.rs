pub mod availability;
pub mod diagnostics;
pub mod gate;
pub mod models;
pub mod settings;
