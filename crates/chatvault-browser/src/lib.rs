//! Host automation controller: Chrome lifecycle, DevTools protocol session,
//! observer-script injection and the host side of the capture bridge.
//!
//! Drives one Chromium instance logged into the messaging web client. The
//! capture engine reads the page through [`CdpPage`]; captured batches come
//! back over the bridge and are handed to the ingest router.

pub mod cdp;
pub mod config;
pub mod handler;
pub mod launcher;
pub mod manager;
pub mod page;
pub mod scripts;
pub mod types;

pub use cdp::{CdpClient, CdpEvent};
pub use config::BrowserConfig;
pub use handler::RouterHandler;
pub use manager::HostController;
pub use page::CdpPage;
pub use types::*;
