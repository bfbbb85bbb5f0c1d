//! Declarative dotfile manager.
//!
//! A configuration is a nested list of directives (`link`, `mkdir`,
//! `shell`, `package`, ...) spread over files that import each other. A run
//! walks that tree on a producer thread and hands every directive it builds
//! to a consumer that either executes it or describes it.
//!
//! The public API is organised into four layers:
//!
//! - **[`loader`], [`tags`], [`value`]**: read config files into [`value::Value`] trees
//! - **[`dispatch`], [`registry`], [`context`]**: turn nodes into directives
//! - **[`directives`]**: the built-in directive kinds
//! - **[`pipeline`], [`commands`]**: run a configuration and the subcommands built on it
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod condition;
pub mod context;
pub mod directive;
pub mod directives;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod glob;
pub mod loader;
pub mod logging;
pub mod options;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod tags;
pub mod value;
