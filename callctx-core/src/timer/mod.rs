mod scheduler;
mod tokio_timer;

pub use scheduler::{Scheduler, TimerCallback, TimerId};
pub use tokio_timer::TokioScheduler;
