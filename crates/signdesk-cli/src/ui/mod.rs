//! Text rendering of the support portal.
//!
//! - `pages`: the views mounted behind the guard
//! - `routes`: the route table wiring each page to its allowed roles

pub mod pages;
pub mod routes;
