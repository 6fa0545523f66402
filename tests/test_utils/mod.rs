pub mod frame_server;

pub use frame_server::FrameServer;
