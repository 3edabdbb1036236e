//! edgebox-lib: deploy orchestration for the edgebox serverless sandbox.
//!
//! The crate turns a generated artifact into a running change on a compose-managed fleet:
//! - `artifact`: content-addressed artifact manifests and artifact apply
//! - `config`: runtime config snapshots, change counts and merging
//! - `deploy`: the deploy pipeline and its phases
//! - `fleet`, `exec`, `ui`: the seams to the container runtime, processes and the user

pub mod artifact;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod exec;
pub mod fleet;
pub mod platform;
pub mod settings;
pub mod ui;
pub mod util;
