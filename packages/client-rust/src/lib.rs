//! Open-group client — reaction submission, poll reconciliation, and room lifecycle glue
//! around the `opengroup-core` mutation cache.

pub mod config;
pub mod logging;
pub mod poller;
pub mod publisher;
pub mod rooms;
pub mod session;
pub mod shared;
pub mod sink;
pub mod submission;

pub use config::{ClientConfig, ConfigError, LogConfig};
pub use logging::init_tracing;
pub use poller::PollHandler;
pub use rooms::RoomRegistry;
pub use session::OpenGroupSession;
pub use shared::SharedMutationCache;
pub use sink::{ChannelSink, ReactionSink, ReactionUpdate};
pub use submission::{ReactionRequest, ReactionSubmitter, ReactionTransport, SubmitError};
