//! Database access for hn-ingest
//!
//! The pool itself comes from `hn_common::db::init_database`.

pub mod items;

pub use items::{ItemOrder, ItemQuery, SortDirection};
