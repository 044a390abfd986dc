//! KumaView - typed JSON API over an Uptime Kuma status page.
//!
//! The monitoring server renders its public status page with the page
//! state embedded in a script element. This crate fetches that page and
//! the heartbeat feed, recovers the embedded state and serves both as
//! stable JSON.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod service;
pub mod stats;
pub mod timezone;
pub mod web;
