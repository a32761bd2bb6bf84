//! burrow: file navigation over heterogeneous storage providers
//!
//! Local disk, a content repository, VFS connections and the recent files are
//! exposed through one tree/list model. The [`session::NavigationSession`]
//! drives path resolution, history, selection, paste and delete on top of the
//! [`controller::FileController`], which owns the provider registry and the
//! listing cache.

pub mod cache;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod delete;
pub mod entity;
pub mod errors;
pub mod filter;
pub mod fs;
pub mod history;
pub mod logging;
pub mod paste;
pub mod providers;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod utils;

pub use controller::FileController;
pub use entity::{Entity, EntityDetails, EntityKind, Listing, Node, Tree};
pub use errors::{NavError, NavResult};
pub use session::{NavigationSession, OperationRequest, OperationResult};
