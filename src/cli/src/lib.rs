//! A3S Lock CLI - pins Dockerfile base images to digests.

pub mod commands;
pub mod output;
