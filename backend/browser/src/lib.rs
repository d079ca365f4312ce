//! Chrome DevTools Protocol host for fullshot.

pub mod cdp_client;
pub mod discovery;
pub mod error;
pub mod page_control;
pub mod screenshot;

pub use cdp_client::CdpClient;
pub use discovery::discover_endpoint;
pub use error::CdpError;
pub use page_control::CdpHost;
