//! In-process TCP receiver for shipped frames.
//!
//! Accepts connections one after another and forwards every decoded frame,
//! tagged with the index of the connection it arrived on, over a channel so
//! tests can assert on what the transport wrote.

use std::{
    io::{self, Read},
    net::{SocketAddr, TcpListener},
    sync::mpsc,
    thread,
    time::Duration,
};

use logship::transport::FramedBatch;

/// Read one length-prefixed MessagePack frame.
pub fn read_frame(stream: &mut impl Read) -> io::Result<FramedBatch> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    rmp_serde::from_slice(&payload).map_err(io::Error::other)
}

pub struct FrameServer {
    addr: SocketAddr,
    frames: mpsc::Receiver<(usize, FramedBatch)>,
    closed: mpsc::Receiver<usize>,
}

impl FrameServer {
    pub fn start() -> Self {
        Self::spawn(0)
    }

    /// Close the first `n` connections as soon as they are accepted.
    pub fn start_dropping(n: usize) -> Self {
        Self::spawn(n)
    }

    fn spawn(drop_first: usize) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let (tx, frames) = mpsc::channel();
        let (closed_tx, closed) = mpsc::channel();
        thread::spawn(move || {
            for (index, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else {
                    return;
                };
                if index < drop_first {
                    drop(stream);
                    let _ = closed_tx.send(index);
                    continue;
                }
                while let Ok(frame) = read_frame(&mut stream) {
                    if tx.send((index, frame)).is_err() {
                        return;
                    }
                }
            }
        });
        Self {
            addr,
            frames,
            closed,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the next frame.
    pub fn next_frame(&self) -> FramedBatch {
        self.next_frame_with_connection().1
    }

    /// Wait for the next frame and the index of the connection it used.
    pub fn next_frame_with_connection(&self) -> (usize, FramedBatch) {
        self.frames
            .recv_timeout(Duration::from_secs(2))
            .expect("frame should arrive")
    }

    /// Wait until the server has closed connection `index`.
    pub fn wait_closed(&self, index: usize) {
        let closed = self
            .closed
            .recv_timeout(Duration::from_secs(2))
            .expect("connection should be closed");
        assert_eq!(closed, index);
    }

    /// Assert that no further frame arrives within `wait`.
    #[allow(dead_code)]
    pub fn assert_quiet(&self, wait: Duration) {
        assert!(self.frames.recv_timeout(wait).is_err(), "unexpected frame");
    }
}
