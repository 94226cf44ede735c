//! Route handlers for the Event Router surface (base spec §6 / C11).

pub mod completions;
pub mod healthz;
pub mod monitor;
pub mod subscribe;
