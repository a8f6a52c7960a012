mod client;
mod config;
mod operation;

pub use client::{GafferClient, EXECUTE_PATH};
pub use config::GafferConfig;
pub use operation::{AddElements, ADD_ELEMENTS_CLASS};
