pub mod auth;
pub mod chat;
pub mod config;
pub mod console;
pub mod deadline;
mod entity;
pub mod error;
pub mod history;
pub mod model;
pub mod report;
pub mod service;
pub mod store;
pub mod utils;
pub mod workflow;

pub use error::{AppError, Result};
