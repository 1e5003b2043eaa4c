mod connection;
mod state;

use std::sync::Mutex;
use std::time::Duration;

use nas_panel_codec::{ConnectReturnCode, PublishPacket, QoS};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::commands::{BrokerToSessionCmd, SchedulerToBrokerCmd, SessionToBrokerCmd};
use crate::error::Error;
use crate::types::SessionId;

use connection::{
    connect_ack, run_reader, run_writer, subscribe_ack, subscribe_requests, unsubscribe_ack,
    unsubscribe_filters, will_from_connect, OUTBOUND_QUEUE_CAPACITY,
};
use state::BrokerState;

const REAPER_INTERVAL: Duration = Duration::from_secs(60);
const INACTIVITY_CEILING: Duration = Duration::from_secs(300);
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// The embedded broker: owns the listener and the single coarse lock over
/// session table, subscription index, and retained store.
pub struct Broker {
    state: Mutex<BrokerState>,
    next_session_id: Mutex<SessionId>,
}

impl Broker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState::new()),
            next_session_id: Mutex::new(0),
        }
    }

    /// Bind the listener and run the accept loop, the session-command
    /// loop, and the reaper concurrently until `shutdown` resolves.
    pub async fn run(
        self: std::sync::Arc<Self>,
        bind_addr: String,
        scheduler_rx: mpsc::Receiver<SchedulerToBrokerCmd>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(&bind_addr).await?;
        log::info!("broker listening on {bind_addr}");
        self.serve(listener, scheduler_rx, shutdown).await
    }

    /// Run the accept loop, the session-command loop, and the reaper over
    /// an already-bound listener. Split out from [`Broker::run`] so tests
    /// can bind an ephemeral port and learn the address before serving.
    pub async fn serve(
        self: std::sync::Arc<Self>,
        listener: TcpListener,
        mut scheduler_rx: mpsc::Receiver<SchedulerToBrokerCmd>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), Error> {
        let (broker_tx, mut broker_rx) = mpsc::channel::<SessionToBrokerCmd>(1024);

        let mut reaper = interval(REAPER_INTERVAL);
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            self.clone().spawn_session(stream, addr.to_string(), broker_tx.clone());
                        }
                        Err(err) => log::warn!("accept failed: {err}"),
                    }
                }
                Some(cmd) = broker_rx.recv() => {
                    self.handle_session_cmd(cmd).await;
                }
                Some(cmd) = scheduler_rx.recv() => {
                    self.handle_scheduler_cmd(cmd).await;
                }
                _ = reaper.tick() => {
                    self.reap_stale_sessions().await;
                }
                _ = shutdown.changed() => {
                    log::info!("broker shutting down");
                    break;
                }
            }
        }

        drop(listener);
        let _ = tokio::time::timeout(SHUTDOWN_DEADLINE, async {
            // Session tasks observe the dropped outbound senders (cleared
            // when their entries are removed on the next reap/disconnect)
            // and the closed listener; give them a bounded grace period.
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .await;

        Ok(())
    }

    fn spawn_session(
        self: std::sync::Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: String,
        broker_tx: mpsc::Sender<SessionToBrokerCmd>,
    ) {
        let session_id = {
            let mut next = self.next_session_id.lock().expect("session id lock poisoned");
            *next += 1;
            *next
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.state
            .lock()
            .expect("broker state lock poisoned")
            .insert_pending(session_id, outbound_tx);

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(run_reader(session_id, read_half, broker_tx, peer_addr.clone()));
        tokio::spawn(run_writer(session_id, write_half, outbound_rx));
        log::info!("session {session_id} connected from {peer_addr}");
    }

    async fn handle_session_cmd(&self, cmd: SessionToBrokerCmd) {
        match cmd {
            SessionToBrokerCmd::Connect(session_id, packet, _peer_addr) => {
                self.on_connect(session_id, packet).await;
            }
            SessionToBrokerCmd::Publish(session_id, packet) => {
                self.on_publish(session_id, packet).await;
            }
            SessionToBrokerCmd::Subscribe(session_id, packet) => {
                self.on_subscribe(session_id, packet).await;
            }
            SessionToBrokerCmd::Unsubscribe(session_id, packet) => {
                self.on_unsubscribe(session_id, packet).await;
            }
            SessionToBrokerCmd::PingRequest(session_id) => {
                self.touch_and_reply(session_id, BrokerToSessionCmd::PingResponse).await;
            }
            SessionToBrokerCmd::Disconnect(session_id) => {
                self.on_disconnect(session_id, true).await;
            }
            SessionToBrokerCmd::Closed(session_id) => {
                self.on_disconnect(session_id, false).await;
            }
        }
    }

    async fn on_connect(&self, session_id: SessionId, packet: nas_panel_codec::ConnectPacket) {
        if packet.client_id.is_empty() && !packet.flags.clean_session {
            self.reply(session_id, BrokerToSessionCmd::ConnectAck(connect_ack(
                false,
                ConnectReturnCode::IdentifierRejected,
            )))
            .await;
            return;
        }

        let will = will_from_connect(&packet);
        let outcome = {
            let mut state = self.state.lock().expect("broker state lock poisoned");
            let (outcome, _client_id) = state.connect(session_id, &packet.client_id, will);
            outcome
        };

        match outcome {
            state::ConnectOutcome::Accepted { session_present, superseded } => {
                if let Some((old_id, old_outbound)) = superseded {
                    self.deliver(old_id, &old_outbound, BrokerToSessionCmd::Kick).await;
                }
                self.reply(
                    session_id,
                    BrokerToSessionCmd::ConnectAck(connect_ack(session_present, ConnectReturnCode::Accepted)),
                )
                .await;
            }
            state::ConnectOutcome::Rejected(code) => {
                self.reply(session_id, BrokerToSessionCmd::ConnectAck(connect_ack(false, code)))
                    .await;
            }
        }
    }

    async fn on_publish(&self, session_id: SessionId, packet: PublishPacket) {
        self.touch(session_id);
        let effective_qos = packet.qos.min(QoS::AtLeastOnce);
        let recipients = self
            .state
            .lock()
            .expect("broker state lock poisoned")
            .publish(&packet);

        for recipient in recipients {
            let outgoing = PublishPacket {
                dup: false,
                qos: recipient.effective_qos,
                retain: false,
                topic_name: packet.topic_name.clone(),
                packet_id: (recipient.effective_qos != QoS::AtMostOnce).then_some(packet.packet_id.unwrap_or(0)),
                payload: packet.payload.clone(),
            };
            self.deliver(
                recipient.session_id,
                &recipient.outbound,
                BrokerToSessionCmd::Publish(outgoing),
            )
            .await;
        }

        if effective_qos == QoS::AtLeastOnce {
            if let Some(packet_id) = packet.packet_id {
                self.reply(session_id, BrokerToSessionCmd::PublishAck(packet_id)).await;
            }
        }
    }

    async fn on_subscribe(&self, session_id: SessionId, packet: nas_panel_codec::SubscribePacket) {
        self.touch(session_id);
        let requests = subscribe_requests(&packet);
        let (codes, retained) = self
            .state
            .lock()
            .expect("broker state lock poisoned")
            .subscribe(session_id, &requests);

        self.reply(session_id, BrokerToSessionCmd::SubscribeAck(subscribe_ack(packet.packet_id, codes)))
            .await;

        for mut retained_packet in retained {
            retained_packet.retain = true;
            self.reply(session_id, BrokerToSessionCmd::Publish(retained_packet)).await;
        }
    }

    async fn on_unsubscribe(&self, session_id: SessionId, packet: nas_panel_codec::UnsubscribePacket) {
        self.touch(session_id);
        let filters = unsubscribe_filters(&packet);
        self.state
            .lock()
            .expect("broker state lock poisoned")
            .unsubscribe(session_id, &filters);
        self.reply(session_id, BrokerToSessionCmd::UnsubscribeAck(unsubscribe_ack(packet.packet_id)))
            .await;
    }

    async fn on_disconnect(&self, session_id: SessionId, graceful: bool) {
        if graceful {
            self.state
                .lock()
                .expect("broker state lock poisoned")
                .clear_will(session_id);
        }
        let will = self
            .state
            .lock()
            .expect("broker state lock poisoned")
            .remove_session(session_id);
        log::info!("session {session_id} disconnected");

        if let Some(will) = will {
            let will_packet = PublishPacket {
                dup: false,
                qos: will.qos,
                retain: will.retain,
                topic_name: will.topic,
                packet_id: None,
                payload: will.payload,
            };
            let recipients = self
                .state
                .lock()
                .expect("broker state lock poisoned")
                .publish(&will_packet);
            for recipient in recipients {
                self.deliver(
                    recipient.session_id,
                    &recipient.outbound,
                    BrokerToSessionCmd::Publish(will_packet.clone()),
                )
                .await;
            }
        }
    }

    async fn handle_scheduler_cmd(&self, cmd: SchedulerToBrokerCmd) {
        let payload = match serde_json::to_vec(&cmd.document) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to serialize metric document: {err}");
                return;
            }
        };
        let packet = PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic_name: cmd.topic,
            packet_id: None,
            payload,
        };
        let recipients = self
            .state
            .lock()
            .expect("broker state lock poisoned")
            .publish(&packet);

        for recipient in recipients {
            self.deliver(
                recipient.session_id,
                &recipient.outbound,
                BrokerToSessionCmd::Publish(packet.clone()),
            )
            .await;
        }
    }

    async fn reap_stale_sessions(&self) {
        let stale = self
            .state
            .lock()
            .expect("broker state lock poisoned")
            .stale_sessions(INACTIVITY_CEILING);
        for session_id in stale {
            log::warn!("session {session_id}: inactivity ceiling exceeded, closing");
            self.on_disconnect(session_id, false).await;
        }
    }

    fn touch(&self, session_id: SessionId) {
        self.state
            .lock()
            .expect("broker state lock poisoned")
            .touch(session_id);
    }

    async fn reply(&self, session_id: SessionId, cmd: BrokerToSessionCmd) {
        let outbound = self.state.lock().expect("broker state lock poisoned").outbound(session_id);
        if let Some(outbound) = outbound {
            self.deliver(session_id, &outbound, cmd).await;
        }
    }

    /// Deliver `cmd` to a session's bounded outbound queue without ever
    /// blocking the broker's single dispatch loop. A full queue marks that
    /// session a slow consumer: it is closed (firing its will, if any)
    /// instead of stalling delivery to every other session.
    async fn deliver(&self, session_id: SessionId, outbound: &mpsc::Sender<BrokerToSessionCmd>, cmd: BrokerToSessionCmd) {
        if outbound.try_send(cmd).is_err() {
            log::warn!("session {session_id}: outbound queue full, closing (slow consumer)");
            Box::pin(self.on_disconnect(session_id, false)).await;
        }
    }

    async fn touch_and_reply(&self, session_id: SessionId, cmd: BrokerToSessionCmd) {
        self.touch(session_id);
        self.reply(session_id, cmd).await;
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
