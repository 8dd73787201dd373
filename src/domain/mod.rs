mod day_window;
mod duration;
mod page;
mod timeline;
mod types;

pub use day_window::*;
pub use duration::*;
pub use page::*;
pub use timeline::*;
pub use types::*;
