//! Pipeline tests against an in-process transcoder

pub mod e2e;
pub mod fixtures;
