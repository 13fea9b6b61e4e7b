//! URL handling module for propgrid
//!
//! Grid cells carry links in several shapes: absolute URLs, origin-relative
//! paths, page-relative paths with a query, and bare query fragments such as
//! `id=7` that only make sense against a known endpoint. This module turns
//! all of them into absolute URLs.

mod resolve;

pub use resolve::{has_scheme, LinkKind, LinkResolver};
