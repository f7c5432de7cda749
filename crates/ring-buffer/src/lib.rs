//! Bounded Buffers
//!
//! Two small containers used by the fatigue trackers:
//! - [`BoundedBuffer`]: fixed-capacity FIFO that evicts its oldest entry
//! - [`TimeWindow`]: timestamped samples purged once they fall out of a
//!   trailing time window

mod buffer;
mod window;

pub use buffer::BoundedBuffer;
pub use window::TimeWindow;
