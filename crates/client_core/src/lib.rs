//! Client core for a photo gallery that keeps its pictures in a GitHub repository.
//!
//! [`store::GithubStore`] talks to the contents API, [`workflow::WorkflowEngine`]
//! runs upload/delete/publish/share as staged workflows, and
//! [`gallery::GalleryState`] plus [`input::InputAdapter`] drive paging.

pub mod config;
pub mod error;
pub mod gallery;
pub mod input;
pub mod mode;
pub mod share;
pub mod status;
pub mod store;
pub mod workflow;

pub use config::{load_settings, EngineConfig, Settings, StoreConfig};
pub use error::{ShareError, StageError, StoreError, WorkflowError};
pub use gallery::{GalleryState, PageView};
pub use input::{Control, GestureEvent, GestureState, InputAdapter, NavIntent};
pub use mode::{Capabilities, ModeController};
pub use share::{select_share_sink, ClipboardWriter, ShareReceipt, ShareSink};
pub use store::{GithubStore, PhotoStore, MAX_UPLOAD_BYTES};
pub use workflow::{Confirm, UploadSource, WorkflowEngine, WorkflowKind, WorkflowReport};
