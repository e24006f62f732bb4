//! callctx propagates cancellation, deadlines and request-scoped data through
//! async call trees.

pub mod task;

pub use callctx_core::{context, timer, types};

pub mod prelude {
    //! Convenient re-exports of commonly used types
    pub use callctx_core::prelude::*;
    pub use crate::task::spawn_child;
}

// Re-export main types
pub use prelude::*;
