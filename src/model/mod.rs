//! Domain records decoded from the upstream status page and feed.

mod lenient;
mod maintenance;
mod monitor;
mod site;

pub use maintenance::*;
pub use monitor::*;
pub use site::*;
