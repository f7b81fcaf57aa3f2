pub mod client;
pub mod platform;
pub mod transport;

pub use client::{RESULT_SENTINEL, TorrentClientProcess};
pub use platform::{ClientProcessDescriptor, client_process_descriptor};
pub use transport::TorrentTransport;
