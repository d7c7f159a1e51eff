//! # rollcall-store
//!
//! `SQLite` persistence for the rollcall directory.
//!
//! - [`UserRepo`]: registered teachers and students
//! - [`ClassRepo`]: classes and their ordered rosters
//! - [`AttendanceRepo`]: finalized attendance records
//! - [`SqliteDirectory`]: the async [`rollcall_core::DirectoryStore`] the
//!   coordinator talks to

#![deny(unsafe_code)]

pub mod attendance;
pub mod classes;
pub mod database;
pub mod directory;
pub mod error;
mod row_helpers;
pub mod schema;
pub mod users;

pub use attendance::AttendanceRepo;
pub use classes::ClassRepo;
pub use database::Database;
pub use directory::SqliteDirectory;
pub use error::StoreError;
pub use users::UserRepo;
