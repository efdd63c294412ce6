pub mod codec;
mod ping_detector;
mod ping_socket;
mod pinger;

pub use codec::{MessageBody, MessageType, ParsedMessage};
pub use ping_detector::PingDetector;
pub use ping_socket::{EchoSocket, PingSocket};
pub use pinger::Pinger;
