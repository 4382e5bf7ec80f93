//! Core types shared by every clientdeps module.
//!
//! - [`ClientDepsError`] and [`ErrorContext`] for error reporting
//! - [`AssetType`] and [`Mode`], the two enums every specifier and node is
//!   described by

mod asset;
pub mod error;

pub use asset::{AssetType, Mode};
pub use error::{ClientDepsError, ErrorContext, user_friendly_error};
