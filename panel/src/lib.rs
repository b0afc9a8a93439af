pub mod meter;
pub mod net;
pub mod render;

pub use meter::hold::{MeterConfig, PeakHoldMeter};
pub use meter::view::ChannelView;
pub use net::commands::{CommandClient, CommandError};
pub use net::protocol::VuFrame;
pub use net::stream::VuStream;
pub use render::MeterBar;
