use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{sleep, timeout};

use chat_relay_server::{Server, ServerConfig};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a relay on an ephemeral port and returns it with its address.
fn start_server() -> (Arc<Server>, SocketAddr) {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let server = Arc::new(Server::new(config).expect("server should bind"));
    let addr = server.local_addr();

    let runner = Arc::clone(&server);
    tokio::spawn(async move { runner.run().await });

    (server, addr)
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, message: &str) {
        self.writer
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .expect("send failed");
    }

    /// Reads the next pushed history payload (one JSON array per line).
    async fn recv_history(&mut self) -> Vec<String> {
        let mut line = String::new();
        timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a history push")
            .expect("read failed");
        serde_json::from_str(line.trim_end()).expect("payload should be a JSON array of strings")
    }

    /// Asserts that no payload arrives within the given window.
    async fn expect_silence(&mut self, window: Duration) {
        let mut line = String::new();
        let result = timeout(window, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected payload: {:?}", line);
    }
}

/// Polls until the server has registered exactly `expected` clients.
async fn wait_for_clients(server: &Server, expected: usize) {
    for _ in 0..200 {
        if server.client_count().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "server never reached {} client(s), has {}",
        expected,
        server.client_count().await
    );
}

#[tokio::test]
async fn one_message_reaches_every_client() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    alice.send("hello").await;

    assert_eq!(alice.recv_history().await, vec!["hello"]);
    assert_eq!(bob.recv_history().await, vec!["hello"]);
}

#[tokio::test]
async fn history_keeps_only_the_latest_ten() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    alice.send("hello").await;
    assert_eq!(alice.recv_history().await, vec!["hello"]);

    // Ten more pushes the first message out. Reading Alice's payload after
    // each send sequences the dispatch cycles.
    for i in 1..=10 {
        alice.send(&format!("m{}", i)).await;
        alice.recv_history().await;
    }

    let expected: Vec<String> = (1..=10).map(|i| format!("m{}", i)).collect();
    assert_eq!(server.history_snapshot().await, expected);

    // Bob saw every cycle; his last payload matches the final history.
    let mut last = bob.recv_history().await;
    for _ in 0..10 {
        last = bob.recv_history().await;
    }
    assert_eq!(last, expected);
}

#[tokio::test]
async fn no_push_on_join() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    wait_for_clients(&server, 1).await;

    alice.send("early").await;
    assert_eq!(alice.recv_history().await, vec!["early"]);

    let mut bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    // Joining does not replay history.
    bob.expect_silence(Duration::from_millis(300)).await;

    // The next dispatch cycle delivers the full history to the newcomer.
    alice.send("later").await;
    assert_eq!(bob.recv_history().await, vec!["early", "later"]);
}

#[tokio::test]
async fn concurrent_senders_lose_no_messages() {
    let (server, addr) = start_server();

    let alice = tokio::spawn(async move {
        let mut client = TestClient::connect(addr).await;
        for i in 1..=5 {
            client.send(&format!("a{}", i)).await;
            sleep(Duration::from_millis(5)).await;
        }
        client
    });
    let bob = tokio::spawn(async move {
        let mut client = TestClient::connect(addr).await;
        for i in 1..=5 {
            client.send(&format!("b{}", i)).await;
            sleep(Duration::from_millis(5)).await;
        }
        client
    });
    let _alice = alice.await.unwrap();
    let _bob = bob.await.unwrap();

    // Ten messages at capacity ten: nothing may be lost.
    let mut history = server.history_snapshot().await;
    for _ in 0..200 {
        if history.len() == 10 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
        history = server.history_snapshot().await;
    }
    assert_eq!(history.len(), 10);

    // Each sender's messages keep their relative order in the interleaving.
    let alice_order: Vec<&String> = history.iter().filter(|m| m.starts_with('a')).collect();
    let bob_order: Vec<&String> = history.iter().filter(|m| m.starts_with('b')).collect();
    assert_eq!(alice_order, vec!["a1", "a2", "a3", "a4", "a5"]);
    assert_eq!(bob_order, vec!["b1", "b2", "b3", "b4", "b5"]);
}

#[tokio::test]
async fn disconnect_is_isolated_and_deregisters() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    let bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    drop(bob);
    wait_for_clients(&server, 1).await;

    // Fan-out to the remaining peer is unaffected.
    alice.send("still here").await;
    assert_eq!(alice.recv_history().await, vec!["still here"]);

    alice.send("and again").await;
    assert_eq!(alice.recv_history().await, vec!["still here", "and again"]);
}

#[tokio::test]
async fn full_length_message_is_relayed() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    // 1024 bytes is the limit, terminator excluded; it must go through.
    let message = "y".repeat(1024);
    alice.send(&message).await;

    assert_eq!(alice.recv_history().await, vec![message.clone()]);
    assert_eq!(bob.recv_history().await, vec![message]);
}

#[tokio::test]
async fn oversized_message_is_dropped() {
    let (server, addr) = start_server();
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    wait_for_clients(&server, 2).await;

    let oversized = "x".repeat(2000);
    alice.send(&oversized).await;
    bob.expect_silence(Duration::from_millis(300)).await;

    alice.send("short").await;
    assert_eq!(bob.recv_history().await, vec!["short"]);
    assert_eq!(server.history_snapshot().await, vec!["short"]);
}
