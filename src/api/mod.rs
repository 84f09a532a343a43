//! HTTP API handlers.

pub(crate) mod health;
pub(crate) mod recommend;
