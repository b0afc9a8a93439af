pub mod hold;
pub mod view;

pub use hold::{MeterConfig, PeakHoldMeter};
pub use view::ChannelView;
