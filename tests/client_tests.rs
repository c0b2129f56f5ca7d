//! Integration tests for the chat transport.
//!
//! These drive a real [`ChatClient`] against a local TCP peer. The peer side
//! works on the raw socket: it seals frames with its own cipher before
//! writing, and opens what the client writes.
//!
//! Note: the transport reads one frame per socket read, so the peer leaves a
//! short gap between writes to keep frames from coalescing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use chatwire::{
    encode, ChatClient, Cipher, ClientConfig, EventHandlers, KeyPair, Message, ResponseType,
    SealedCipher, TransportError, SEAL_OVERHEAD,
};

const WAIT: Duration = Duration::from_secs(5);

/// Gap between peer writes so separate frames arrive as separate reads.
const FRAME_GAP: Duration = Duration::from_millis(200);

/// Transport parameters used across the suite: roomy buffer, fast retry.
fn test_config() -> ClientConfig {
    ClientConfig::new(2048, 20)
}

/// Build the client cipher and the peer cipher from two provisioned pairs.
fn cipher_pair() -> (SealedCipher, SealedCipher) {
    let client_keys = KeyPair::generate();
    let peer_keys = KeyPair::generate();

    let client_cipher =
        SealedCipher::new(client_keys.secret_key().clone(), *peer_keys.public_key());
    let peer_cipher = SealedCipher::new(peer_keys.into_secret_key(), *client_keys.public_key());
    (client_cipher, peer_cipher)
}

/// Handlers that forward inbound messages into a channel.
fn message_channel() -> (EventHandlers, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handlers = EventHandlers::new().on_message_received(move |message| {
        let _ = tx.send(message);
    });
    (handlers, rx)
}

async fn local_listener() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Seal and write one text frame from the peer side.
async fn peer_send_text(stream: &mut TcpStream, cipher: &SealedCipher, text: &str) {
    let frame = encode(&Message::text(text), 2048);
    assert!(!frame.is_empty());
    let sealed = cipher.encrypt(&frame).unwrap();
    stream.write_all(&sealed).await.unwrap();
    stream.flush().await.unwrap();
}

/// Read one sealed frame on the peer side.
async fn peer_read(stream: &mut TcpStream, cap: usize) -> Vec<u8> {
    let mut buf = vec![0u8; cap];
    let n = timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("peer read timed out")
        .unwrap();
    buf.truncate(n);
    buf
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    timeout(WAIT, rx.recv())
        .await
        .expect("no message delivered in time")
        .expect("message channel closed")
}

/// A peer sends "hello"; the client delivers Message{StringMessage, "hello"}
/// through the message handler.
#[tokio::test]
async fn test_end_to_end_text_delivery() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let (handlers, mut rx) = message_channel();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    client.start_listening();
    peer_send_text(&mut peer, &peer_cipher, "hello").await;

    let message = next_message(&mut rx).await;
    assert_eq!(message.response_type, ResponseType::StringMessage);
    assert_eq!(message.as_text(), "hello");

    client.stop_listening_and_wait().await;
}

/// The client's outbound text arrives at the peer as one sealed frame.
#[tokio::test]
async fn test_outbound_send_reaches_peer() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), EventHandlers::new());

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    assert!(client.send_text("hi there").await);

    let sealed = peer_read(&mut peer, 4096).await;
    let frame = peer_cipher.decrypt(&sealed).unwrap();
    let message = chatwire::decode(&frame);
    assert_eq!(message.response_type, ResponseType::StringMessage);
    assert_eq!(message.as_text(), "hi there");
}

/// An oversized raw buffer is truncated to exactly `max_response_bytes`
/// plaintext bytes before sealing.
#[tokio::test]
async fn test_send_raw_truncates_to_max() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let config = ClientConfig::new(512, 20);
    let client = ChatClient::new(config, Arc::new(client_cipher), EventHandlers::new());

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    assert!(client.send_raw(&vec![0xAB; 2000]).await);

    let mut sealed = vec![0u8; 512 + SEAL_OVERHEAD];
    timeout(WAIT, peer.read_exact(&mut sealed))
        .await
        .expect("peer read timed out")
        .unwrap();

    let plaintext = peer_cipher.decrypt(&sealed).unwrap();
    assert_eq!(plaintext.len(), 512);
    assert!(plaintext.iter().all(|&b| b == 0xAB));

    // Nothing beyond the truncated frame was written.
    let mut extra = [0u8; 1];
    assert!(timeout(Duration::from_millis(200), peer.read(&mut extra))
        .await
        .is_err());
}

/// A text message whose frame exceeds the cap is refused with no write.
#[tokio::test]
async fn test_send_text_oversized_writes_nothing() {
    let (client_cipher, _) = cipher_pair();
    let config = ClientConfig::new(64, 20);
    let client = ChatClient::new(config, Arc::new(client_cipher), EventHandlers::new());

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    assert!(!client.send_text(&"a".repeat(100)).await);

    let mut byte = [0u8; 1];
    assert!(timeout(Duration::from_millis(200), peer.read(&mut byte))
        .await
        .is_err());
}

/// Starting twice keeps a single receive task: each frame is delivered
/// exactly once.
#[tokio::test]
async fn test_start_listening_idempotent() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let (handlers, mut rx) = message_channel();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    client.start_listening();
    client.start_listening();
    assert!(client.is_listening());

    peer_send_text(&mut peer, &peer_cipher, "first").await;
    sleep(FRAME_GAP).await;
    peer_send_text(&mut peer, &peer_cipher, "second").await;

    assert_eq!(next_message(&mut rx).await.as_text(), "first");
    assert_eq!(next_message(&mut rx).await.as_text(), "second");

    // No duplicate deliveries from a second reader.
    assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());

    client.stop_listening_and_wait().await;
}

/// Stop halts delivery; a later start resumes it on the same connection,
/// picking up frames that queued while stopped.
#[tokio::test]
async fn test_stop_then_start_resumes_delivery() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let (handlers, mut rx) = message_channel();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    client.start_listening();
    peer_send_text(&mut peer, &peer_cipher, "one").await;
    assert_eq!(next_message(&mut rx).await.as_text(), "one");

    client.stop_listening_and_wait().await;
    assert!(!client.is_listening());

    // Sent while stopped: queues in the socket, not delivered yet.
    peer_send_text(&mut peer, &peer_cipher, "two").await;
    assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());

    client.start_listening();
    assert_eq!(next_message(&mut rx).await.as_text(), "two");

    sleep(FRAME_GAP).await;
    peer_send_text(&mut peer, &peer_cipher, "three").await;
    assert_eq!(next_message(&mut rx).await.as_text(), "three");

    client.stop_listening_and_wait().await;
}

/// When the peer closes the socket the receive loop reports it, marks the
/// connection dead, and keeps reporting until stopped.
#[tokio::test]
async fn test_peer_close_reports_repeated_failures() {
    let (client_cipher, _) = cipher_pair();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let handlers = EventHandlers::new().on_receive_failure(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (peer, _) = listener.accept().await.unwrap();

    client.start_listening();
    drop(peer);

    // First failure is the closed socket, then paced not-connected reports.
    timeout(WAIT, async {
        while failures.load(Ordering::SeqCst) < 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no repeated receive failures");

    assert!(!client.is_connected().await);
    assert!(client.is_listening());

    client.stop_listening_and_wait().await;
}

/// An undecryptable frame is reported but does not kill the connection;
/// later valid frames still arrive.
#[tokio::test]
async fn test_garbage_frame_does_not_stop_delivery() {
    let (client_cipher, peer_cipher) = cipher_pair();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handlers = EventHandlers::new()
        .on_message_received(move |message| {
            let _ = tx.send(message);
        })
        .on_receive_failure(move |error| {
            assert!(matches!(error, TransportError::Cipher(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let (mut peer, _) = listener.accept().await.unwrap();

    client.start_listening();

    peer.write_all(&[0x55; 100]).await.unwrap();
    peer.flush().await.unwrap();
    sleep(FRAME_GAP).await;
    peer_send_text(&mut peer, &peer_cipher, "still alive").await;

    assert_eq!(next_message(&mut rx).await.as_text(), "still alive");
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(client.is_connected().await);

    client.stop_listening_and_wait().await;
}

/// Connect by host name: "localhost" resolves to loopback.
#[tokio::test]
async fn test_connect_by_host_name() {
    let (client_cipher, _) = cipher_pair();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), EventHandlers::new());

    let (listener, addr) = local_listener().await;
    assert!(client.connect("LocalHost", addr.port()).await);
    let _peer = listener.accept().await.unwrap();
    assert!(client.is_connected().await);
}

/// A second connect on a live socket is a no-op returning false.
#[tokio::test]
async fn test_connect_while_connected_is_noop() {
    let (client_cipher, _) = cipher_pair();
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), EventHandlers::new());

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let _peer = listener.accept().await.unwrap();

    assert!(!client.connect_addr(addr).await);
    assert!(client.is_connected().await);
}

/// Disconnect is idempotent, and a send afterwards fails the not-connected
/// way: handler fires, returns false.
#[tokio::test]
async fn test_disconnect_then_send() {
    let (client_cipher, _) = cipher_pair();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let handlers = EventHandlers::new().on_send_failure(move |error| {
        assert!(matches!(error, TransportError::NotConnected));
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let _peer = listener.accept().await.unwrap();

    client.disconnect().await;
    client.disconnect().await;
    assert!(!client.is_connected().await);

    assert!(!client.send_text("into the void").await);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

/// Explicit disconnect interrupts a parked read promptly: the receive loop
/// releases the socket and reports the missing connection.
#[tokio::test]
async fn test_disconnect_interrupts_listening() {
    let (client_cipher, _) = cipher_pair();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let handlers = EventHandlers::new().on_receive_failure(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let client = ChatClient::new(test_config(), Arc::new(client_cipher), handlers);

    let (listener, addr) = local_listener().await;
    assert!(client.connect_addr(addr).await);
    let _peer = listener.accept().await.unwrap();

    client.start_listening();
    sleep(Duration::from_millis(50)).await;

    // The loop is parked on a read with no data in flight.
    client.disconnect().await;

    timeout(WAIT, async {
        while failures.load(Ordering::SeqCst) == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("receive loop did not notice the disconnect");

    client.stop_listening_and_wait().await;
}
