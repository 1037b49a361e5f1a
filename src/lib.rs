//! Browser and device fingerprint collection.
//!
//! Ten collectors read a [`host::Host`], each producing a
//! [`collect::Finding`]; the [`orchestrator::Orchestrator`] runs them in a
//! fixed order and writes the results into named slots of a
//! [`surface::RenderSurface`].

pub mod browser;
pub mod cli;
pub mod collect;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod surface;
