pub mod commands;
pub mod protocol;
pub mod stream;

pub use commands::{CommandClient, CommandError};
pub use protocol::VuFrame;
pub use stream::VuStream;
