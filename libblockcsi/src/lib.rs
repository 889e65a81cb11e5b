//! # libblockcsi: CSI controller for remote block storage
//!
//! `libblockcsi` implements the [Container Storage Interface][csi]
//! Controller and Identity services for block volumes that live in a remote
//! storage service.  It turns create/delete, publish/unpublish and snapshot
//! requests into calls against a [`Cloud`] backend and keeps every operation
//! idempotent without any local state: whether a request is a replay, a
//! conflict or new work is decided from name lookups against the backend.
//! It follows the RK8s conventions (`async-trait` service traits, `tracing` for
//! observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Wire data model: volumes, snapshots, capabilities, topology, requests. |
//! | [`error`] | [`CsiError`] and its status [`Code`]. |
//! | [`config`] | [`DriverConfig`], read from the environment. |
//! | [`capability`] | Supported access modes and controller RPCs. |
//! | [`validate`] | Required-field checks for every request. |
//! | [`capacity`] | Rounding requested sizes to the backend granularity. |
//! | [`topology`] | Zone selection from topology requirements. |
//! | [`cloud`] | [`Cloud`] backend trait and [`InMemoryCloud`]. |
//! | [`resolve`] | Idempotency decisions for create requests. |
//! | [`attachment`] | Attach/detach of volumes to compute instances. |
//! | [`translate`] | Backend records to wire descriptors. |
//! | [`controller`] | [`CsiController`] trait. |
//! | [`identity`] | [`CsiIdentity`] trait. |
//! | [`driver`] | [`BlockController`], the implementation of both services. |
//! | [`message`] | [`CsiMessage`] envelope and request [`dispatch`](message::dispatch). |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod attachment;
pub mod capability;
pub mod capacity;
pub mod cloud;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod identity;
pub mod message;
pub mod resolve;
pub mod topology;
pub mod translate;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at crate root for convenience.
pub use cloud::{Cloud, CloudError, InMemoryCloud};
pub use config::DriverConfig;
pub use controller::CsiController;
pub use driver::BlockController;
pub use error::{Code, CsiError};
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use types::*;
