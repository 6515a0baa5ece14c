//! Client side of filedeck: the HTTP API client and the file list controller.

pub mod api;
pub mod controller;

pub use api::{ApiClient, ClientError};
pub use controller::{FileApi, FileListController};
