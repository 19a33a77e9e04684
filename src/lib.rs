pub mod aggregate;
pub mod chart;
pub mod compose;
pub mod config;
pub mod data;
pub mod error;
pub mod insight;
pub mod logging;
pub mod report;
