//! Reconciling provisioner
//!
//! Drives an ordered list of named resources to "provisioned, identifier
//! known, config updated" on top of a provisioning tool that may crash before
//! reporting success. Each resource is launched in the background while a
//! separate status query is polled until its identifier shows up; the
//! discovered identifiers are then written into a text config artifact.
//!
//! # Modules
//!
//! - [`runner`] - external process execution with timeouts and explicit env
//! - [`poller`] - identifier extraction and fixed-interval status polling
//! - [`supervisor`] - per-resource launch/poll/settle state machine
//! - [`orchestrator`] - sequential reconciliation of a resource list
//! - [`patcher`] - idempotent rewriting of config artifact anchors
//! - [`tool`] - command templates and account queries for the external tool

pub mod cli;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod patcher;
pub mod poller;
pub mod runner;
pub mod supervisor;
pub mod tool;

#[cfg(test)]
mod testing;
