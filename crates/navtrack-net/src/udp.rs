//! Non-blocking UDP reception and datagram sending.
//!
//! The wire format is one ASCII NMEA sentence per datagram. The receive
//! loop is single-threaded cooperative: its only suspension point is a
//! short sleep when the socket has nothing to read, and callbacks run
//! synchronously on the loop's task, so a slow callback delays subsequent
//! datagrams. Callbacks must be fast or hand work off elsewhere.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Pause after a would-block receive.
const POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Pause after an unexpected socket error.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Network layer errors.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind UDP socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send datagram to {addr}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Counters maintained by the receiver and sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

type SentenceCallback = Box<dyn Fn(&str, SocketAddr) + Send + Sync>;

/// Stops a running receive loop and reads its counters from outside.
#[derive(Clone)]
pub struct ReceiverHandle {
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<NetworkStats>>,
}

impl ReceiverHandle {
    /// Ask the loop to exit; it stops at the next iteration and releases
    /// the socket.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> NetworkStats {
        *self.stats.lock().unwrap()
    }
}

/// Asynchronous NMEA datagram receiver.
///
/// Bind first, register callbacks, then hand the receiver to [`run`].
/// Each received datagram is decoded as UTF-8 (invalid bytes drop the
/// datagram with a logged diagnostic) and passed to every callback in
/// registration order.
///
/// [`run`]: NmeaReceiver::run
pub struct NmeaReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    buffer_size: usize,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<NetworkStats>>,
    callbacks: Vec<SentenceCallback>,
}

impl NmeaReceiver {
    /// Bind a receiver to the given local address.
    pub async fn bind(addr: SocketAddr, buffer_size: usize) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| NetError::Bind {
            addr,
            source,
        })?;
        info!(%local_addr, "receiver bound");

        Ok(Self {
            socket,
            local_addr,
            buffer_size,
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(Mutex::new(NetworkStats::default())),
            callbacks: Vec::new(),
        })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register a callback invoked for each received sentence.
    pub fn register_callback<F>(&mut self, callback: F)
    where
        F: Fn(&str, SocketAddr) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Handle for stopping the loop and reading counters.
    pub fn handle(&self) -> ReceiverHandle {
        ReceiverHandle {
            running: self.running.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Run the receive loop until the handle stops it.
    ///
    /// The loop attempts a non-blocking receive; when nothing is pending
    /// it sleeps briefly before retrying. Malformed datagrams are counted
    /// and logged, never propagated, so the loop survives arbitrary
    /// network input.
    pub async fn run(self) {
        let mut buffer = vec![0u8; self.buffer_size];
        info!(local_addr = %self.local_addr, "receive loop started");

        while self.running.load(Ordering::SeqCst) {
            match self.socket.try_recv_from(&mut buffer) {
                Ok((len, peer)) => {
                    {
                        let mut stats = self.stats.lock().unwrap();
                        stats.packets_received += 1;
                        stats.bytes_received += len as u64;
                    }

                    match std::str::from_utf8(&buffer[..len]) {
                        Ok(text) => {
                            let text = text.trim();
                            debug!(%peer, len, "datagram received");
                            for callback in &self.callbacks {
                                callback(text, peer);
                            }
                        }
                        Err(_) => {
                            warn!(%peer, "dropping datagram with invalid UTF-8");
                            let mut stats = self.stats.lock().unwrap();
                            stats.packets_dropped += 1;
                            stats.errors += 1;
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => {
                    error!(error = %err, "receive loop error");
                    self.stats.lock().unwrap().errors += 1;
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        info!(local_addr = %self.local_addr, "receive loop stopped");
        // Socket dropped here, releasing the port.
    }
}

/// Send a single datagram from an ephemeral socket.
pub async fn send_datagram(message: &str, dest: SocketAddr) -> std::io::Result<usize> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(message.as_bytes(), dest).await
}

/// Sends NMEA sentences to a fixed destination.
pub struct NmeaSender {
    dest: SocketAddr,
    stats: Mutex<NetworkStats>,
}

impl NmeaSender {
    pub fn new(dest: SocketAddr) -> Self {
        Self {
            dest,
            stats: Mutex::new(NetworkStats::default()),
        }
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    pub fn stats(&self) -> NetworkStats {
        *self.stats.lock().unwrap()
    }

    /// Send one sentence as one datagram.
    pub async fn send_message(&self, message: &str) -> Result<(), NetError> {
        match send_datagram(message, self.dest).await {
            Ok(sent) => {
                let mut stats = self.stats.lock().unwrap();
                stats.packets_received += 1;
                stats.bytes_received += sent as u64;
                debug!(dest = %self.dest, bytes = sent, "datagram sent");
                Ok(())
            }
            Err(source) => {
                self.stats.lock().unwrap().errors += 1;
                Err(NetError::Send {
                    addr: self.dest,
                    source,
                })
            }
        }
    }

    /// Send a burst of sentences paced by a fixed inter-message delay.
    ///
    /// Returns the number of messages sent successfully; individual
    /// failures are logged and skipped.
    pub async fn send_burst(&self, messages: &[String], delay: Duration) -> usize {
        let mut sent = 0;
        for (index, message) in messages.iter().enumerate() {
            match self.send_message(message).await {
                Ok(()) => sent += 1,
                Err(error) => warn!(%error, "burst message failed"),
            }
            if index + 1 < messages.len() {
                tokio::time::sleep(delay).await;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    async fn bound_receiver() -> NmeaReceiver {
        NmeaReceiver::bind("127.0.0.1:0".parse().unwrap(), 4096)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_receive_dispatches_to_callbacks() {
        let mut receiver = bound_receiver().await;
        let addr = receiver.local_addr();

        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_cb = seen.clone();
        receiver.register_callback(move |text, _peer| {
            seen_cb.lock().unwrap().push(text.to_string());
        });

        let handle = receiver.handle();
        let task = tokio::spawn(receiver.run());

        send_datagram("$GPRMC,one\r\n", addr).await.unwrap();
        send_datagram("$GPRMC,two", addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.stop();
        task.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["$GPRMC,one", "$GPRMC,two"]);

        let stats = handle.stats();
        assert_eq!(stats.packets_received, 2);
        assert!(stats.bytes_received > 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_dropped_loop_survives() {
        let mut receiver = bound_receiver().await;
        let addr = receiver.local_addr();

        let count = Arc::new(StdMutex::new(0usize));
        let count_cb = count.clone();
        receiver.register_callback(move |_, _| {
            *count_cb.lock().unwrap() += 1;
        });

        let handle = receiver.handle();
        let task = tokio::spawn(receiver.run());

        // Raw invalid UTF-8 bytes
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(&[0xff, 0xfe, 0xfd], addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Loop must still deliver subsequent valid datagrams
        send_datagram("$GPGGA,ok", addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        handle.stop();
        task.await.unwrap();

        assert_eq!(*count.lock().unwrap(), 1);
        let stats = handle.stats();
        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.packets_dropped, 1);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn test_stop_ends_loop() {
        let receiver = bound_receiver().await;
        let handle = receiver.handle();
        assert!(handle.is_running());

        let task = tokio::spawn(receiver.run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop exits promptly after stop")
            .unwrap();
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_callbacks_run_in_registration_order() {
        let mut receiver = bound_receiver().await;
        let addr = receiver.local_addr();

        let order: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = order.clone();
            receiver.register_callback(move |_, _| order.lock().unwrap().push(label));
        }

        let handle = receiver.handle();
        let task = tokio::spawn(receiver.run());

        send_datagram("x", addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();
        task.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_send_burst_counts_and_paces() {
        let mut receiver = bound_receiver().await;
        let addr = receiver.local_addr();

        let count = Arc::new(StdMutex::new(0usize));
        let count_cb = count.clone();
        receiver.register_callback(move |_, _| {
            *count_cb.lock().unwrap() += 1;
        });

        let handle = receiver.handle();
        let task = tokio::spawn(receiver.run());

        let sender = NmeaSender::new(addr);
        let messages: Vec<String> = (0..3).map(|i| format!("$GPRMC,{i}")).collect();
        let sent = sender.send_burst(&messages, Duration::from_millis(5)).await;
        assert_eq!(sent, 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        task.await.unwrap();

        assert_eq!(*count.lock().unwrap(), 3);
    }
}
