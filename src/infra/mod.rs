mod config;
mod logging;
mod push;
mod sync;

pub use config::*;
pub use logging::*;
pub use push::*;
pub use sync::*;
