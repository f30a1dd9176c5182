//! Swole - versioned content package registry
//!
//! This library loads, indexes, edits and saves content packages: named,
//! versioned collections of game content (scripts, data, creations,
//! images and other assets) described by a `manifest.json`.
//!
//! # Modules
//!
//! - [`package`]: identity, manifests and the immutable [`ContentPackage`]
//!   with its copy-on-write editor [`SwolePackage`]
//! - [`content`]: the [`Content`] trait, content kinds and their codecs
//! - [`registry`]: the [`Registry`] of local and external packages
//! - [`config`]: the `config.ini` file
//! - [`logging`]: subscriber setup for binaries
//!
//! [`ContentPackage`]: package::ContentPackage
//! [`SwolePackage`]: package::SwolePackage
//! [`Content`]: content::Content
//! [`Registry`]: registry::Registry

pub mod config;
pub mod content;
pub mod logging;
pub mod package;
pub mod registry;

pub use registry::{Registry, RegistryConfig, RegistryError, RegistryResult};
