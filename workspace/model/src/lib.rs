//! Persistence model of the campus platform.

pub mod entities;
