pub mod actions;
pub mod cdp;
pub mod page;
pub mod resolve;
pub mod session;

pub use actions::{OptionSpec, ScrollDirection, WaitCondition};
pub use cdp::CdpClient;
pub use page::{PageElement, PageSnapshot};
pub use resolve::resolve;
pub use session::BrowserSession;
