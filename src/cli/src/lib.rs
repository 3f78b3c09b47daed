//! Image Vault CLI - back up and restore container images as tarballs.

pub mod commands;
pub mod inputs;
pub mod output;
