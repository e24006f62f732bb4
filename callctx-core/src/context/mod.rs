mod core;
mod latch;
mod listen;
mod options;
mod store;

pub use self::core::Context;
pub use latch::Subscription;
pub use listen::CancelListener;
pub use options::{ContextOptions, ContextOptionsBuilder};
