pub mod pool;
pub mod queue;

pub use pool::FramePool;
pub use queue::{create_job_queue, FrameJob};
