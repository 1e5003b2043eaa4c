mod client;
pub use client::TestClient;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use nas_paneld::broker::Broker;
use nas_paneld::Error;

/// A broker bound to an ephemeral port, run on the current runtime for the
/// lifetime of a test.
pub struct TestBroker {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<(), Error>>,
}

impl TestBroker {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("listener has a local address");

        let (_scheduler_tx, scheduler_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let broker = Arc::new(Broker::new());
        let handle = tokio::spawn(broker.serve(listener, scheduler_rx, shutdown_rx));

        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
