//! Full daemon on an ephemeral port, plus a newline-JSON client

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use geisha_common::config::TomlConfig;
use geisha_common::{Method, Request, Response};
use geishad::audio::AudioOutput;
use geishad::Daemon;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

/// How long to wait for a line from the daemon
const READ_WAIT: Duration = Duration::from_secs(3);

pub struct TestDaemon {
    pub daemon: Daemon,
}

impl TestDaemon {
    pub async fn start(output: Arc<dyn AudioOutput>) -> Self {
        Self::start_with(TomlConfig::default(), output).await
    }

    pub async fn start_with(mut config: TomlConfig, output: Arc<dyn AudioOutput>) -> Self {
        config.bind_address = "127.0.0.1".to_string();
        config.port = 0;
        let daemon = Daemon::start(&config, output).await.expect("daemon starts");
        Self { daemon }
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(&self.daemon.local_addr().to_string()).await
    }

    /// Wait until the bus has `count` subscribers
    pub async fn wait_for_subscribers(&self, count: usize) {
        timeout(READ_WAIT, async {
            while self.daemon.bus().subscriber_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {count} subscribers"));
    }
}

pub struct TestClient {
    lines: Framed<TcpStream, LinesCodec>,
}

impl TestClient {
    pub async fn connect(address: &str) -> Self {
        let stream = TcpStream::connect(address).await.expect("connect");
        Self {
            lines: Framed::new(stream, LinesCodec::new()),
        }
    }

    pub async fn send_line(&mut self, line: &str) {
        self.lines.send(line).await.expect("send line");
    }

    /// Next line from the daemon, None once the connection is closed
    pub async fn read_line(&mut self) -> Option<String> {
        match timeout(READ_WAIT, self.lines.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            Ok(Some(Err(_))) | Ok(None) => None,
            Err(_) => panic!("timed out waiting for a line"),
        }
    }

    pub async fn request(&mut self, request: &Request) -> Response {
        let line = serde_json::to_string(request).unwrap();
        self.send_line(&line).await;
        let reply = self.read_line().await.expect("response line");
        serde_json::from_str(&reply).expect("response decodes")
    }

    pub async fn call(&mut self, method: Method, args: &[&str]) -> Response {
        self.request(&Request::with_args(method, args.iter().copied()))
            .await
    }
}
