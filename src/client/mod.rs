//! Admin-command plumbing: the toolbox exec transport, the typed command
//! surface and the output parsers.

pub mod commands;
pub mod parsing;
pub mod toolbox;

pub use commands::CephCommands;
pub use toolbox::{CommandRunner, Toolbox};
