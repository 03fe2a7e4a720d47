//! Core types: alert-policy model, form input parsing, tool settings, errors.

pub mod coerce;
pub mod errors;
pub mod form;
pub mod policy;
pub mod settings;
