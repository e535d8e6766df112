// crates/gateway-client/tests/common/mod.rs
//! Scripted in-process gateway for client tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use gateway_client::{ClientConfig, ClientError, EventHandler};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const STEP: Duration = Duration::from_secs(5);

pub struct MockGateway {
    listener: TcpListener,
    pub addr: String,
}

impl MockGateway {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        MockGateway { listener, addr }
    }

    pub async fn accept(&self) -> Peer {
        let (stream, _) = tokio::time::timeout(STEP, self.listener.accept())
            .await
            .expect("client never connected")
            .unwrap();
        Peer {
            stream,
            buf: BytesMut::new(),
        }
    }
}

/// Gateway side of one accepted connection.
pub struct Peer {
    stream: TcpStream,
    buf: BytesMut,
}

impl Peer {
    /// Read `API\0` plus the version-range frame; returns the range text.
    pub async fn read_handshake(&mut self) -> String {
        let mut sign = [0u8; 4];
        self.read_exact(&mut sign).await;
        assert_eq!(&sign, b"API\0");
        let body = self.read_frame_bytes().await;
        String::from_utf8(body).unwrap()
    }

    /// Read one frame and split it into its fields.
    pub async fn read_frame(&mut self) -> Vec<String> {
        let body = self.read_frame_bytes().await;
        let body = body.strip_suffix(&[0]).unwrap_or(&body[..]);
        body.split(|&b| b == 0)
            .map(|t| String::from_utf8(t.to_vec()).unwrap())
            .collect()
    }

    /// Send one frame made of NUL-terminated fields.
    pub async fn send(&mut self, fields: &[&str]) {
        let mut body = Vec::new();
        for f in fields {
            body.extend_from_slice(f.as_bytes());
            body.push(0);
        }
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        self.send_raw(&out).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Answer the handshake with `server_version` and finish the session
    /// setup; returns the StartAPI fields.
    pub async fn accept_session(&mut self, server_version: i32, first_id: i32) -> Vec<String> {
        let range = self.read_handshake().await;
        assert!(range.starts_with("v100..187"), "unexpected range {range:?}");

        let version = server_version.to_string();
        self.send(&[version.as_str(), "20240102 10:30:00 UTC"]).await;
        let start = self.read_frame().await;
        assert_eq!(start[0], "71");

        let first_id = first_id.to_string();
        self.send(&["9", "1", first_id.as_str()]).await;
        start
    }

    async fn read_frame_bytes(&mut self) -> Vec<u8> {
        let mut header = [0u8; 4];
        self.read_exact(&mut header).await;
        let len = (&header[..]).get_u32() as usize;
        let mut body = vec![0u8; len];
        self.read_exact(&mut body).await;
        body
    }

    async fn read_exact(&mut self, out: &mut [u8]) {
        while self.buf.len() < out.len() {
            let n = tokio::time::timeout(STEP, self.stream.read_buf(&mut self.buf))
                .await
                .expect("client went quiet")
                .unwrap();
            assert!(n > 0, "client closed the connection");
        }
        out.copy_from_slice(&self.buf.split_to(out.len()));
    }
}

pub fn config(addr: &str) -> ClientConfig {
    ClientConfig::new(addr)
        .with_client_id(7)
        .with_connect_timeout(Duration::from_secs(5))
        .with_request_timeout(Duration::from_secs(5))
}

/// Event handler that records what it sees.
#[derive(Default)]
pub struct Recorder {
    pub errors: Mutex<Vec<(i32, i32, String)>>,
    pub unknown: Mutex<Vec<i32>>,
    pub closed: Mutex<Vec<ClientError>>,
    pub next_ids: Mutex<Vec<i32>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Recorder::default())
    }
}

impl EventHandler for Recorder {
    fn error(&self, id: i32, code: i32, message: &str) {
        self.errors.lock().push((id, code, message.to_string()));
    }

    fn next_valid_id(&self, id: i32) {
        self.next_ids.lock().push(id);
    }

    fn connection_closed(&self, error: &ClientError) {
        self.closed.lock().push(error.clone());
    }

    fn unknown_message(&self, code: i32) {
        self.unknown.lock().push(code);
    }
}
