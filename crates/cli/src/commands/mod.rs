//! CLI Commands

pub mod catalog;
pub mod report;
pub mod validate;
