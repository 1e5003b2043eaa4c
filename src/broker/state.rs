// Session table, subscription index, and retained store behind one coarse
// lock, per the concurrency model: every operation here is synchronous and
// does no I/O, so the lock is never held across an `.await`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nas_panel_codec::{ConnectReturnCode, PublishPacket, QoS, SubscribeReturnCode, TopicFilter};
use tokio::sync::mpsc::Sender;

use crate::commands::BrokerToSessionCmd;
use crate::types::SessionId;

#[derive(Debug, Clone)]
pub struct Will {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

struct SessionEntry {
    client_id: String,
    outbound: Sender<BrokerToSessionCmd>,
    /// Raw filter text alongside its parsed form: UNSUBSCRIBE removes by
    /// exact filter-text match, not by semantic overlap.
    subscriptions: Vec<(String, TopicFilter, QoS)>,
    will: Option<Will>,
    last_activity: Instant,
}

/// One matching recipient for a fan-out, with everything the caller needs
/// to perform the send outside the lock.
pub struct Recipient {
    pub session_id: SessionId,
    pub outbound: Sender<BrokerToSessionCmd>,
    pub effective_qos: QoS,
}

pub enum ConnectOutcome {
    Accepted {
        session_present: bool,
        /// A previously-connected session under the same client id, to be
        /// kicked (outside the lock) now that this one has replaced it.
        superseded: Option<(SessionId, Sender<BrokerToSessionCmd>)>,
    },
    Rejected(ConnectReturnCode),
}

#[derive(Default)]
pub struct BrokerState {
    sessions: HashMap<SessionId, SessionEntry>,
    client_ids: HashMap<String, SessionId>,
    retained: HashMap<String, PublishPacket>,
    next_anonymous_id: u64,
}

impl BrokerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called right after accept, before CONNECT has arrived, so the
    /// session has somewhere to receive a CONNACK or an early Kick.
    pub fn insert_pending(&mut self, session_id: SessionId, outbound: Sender<BrokerToSessionCmd>) {
        self.sessions.insert(
            session_id,
            SessionEntry {
                client_id: String::new(),
                outbound,
                subscriptions: Vec::new(),
                will: None,
                last_activity: Instant::now(),
            },
        );
    }

    /// A client id of `""` is only legal when `clean_session` is set; the
    /// caller is expected to have checked that before calling.
    fn generate_client_id(&mut self) -> String {
        self.next_anonymous_id += 1;
        format!("nas-panel-anon-{}", self.next_anonymous_id)
    }

    pub fn connect(
        &mut self,
        session_id: SessionId,
        requested_client_id: &str,
        will: Option<Will>,
    ) -> (ConnectOutcome, String) {
        let client_id = if requested_client_id.is_empty() {
            self.generate_client_id()
        } else {
            requested_client_id.to_string()
        };

        let superseded = self.client_ids.get(&client_id).copied().and_then(|old_id| {
            if old_id == session_id {
                None
            } else {
                self.sessions
                    .get(&old_id)
                    .map(|entry| (old_id, entry.outbound.clone()))
            }
        });
        if let Some((old_id, _)) = superseded {
            self.remove_session(old_id);
        }

        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return (ConnectOutcome::Rejected(ConnectReturnCode::ServerUnavailable), client_id);
        };
        entry.client_id = client_id.clone();
        entry.will = will;
        entry.last_activity = Instant::now();
        self.client_ids.insert(client_id.clone(), session_id);

        (
            ConnectOutcome::Accepted {
                session_present: false,
                superseded,
            },
            client_id,
        )
    }

    pub fn touch(&mut self, session_id: SessionId) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// The outbound queue for a session, for replies that aren't part of
    /// a fan-out (CONNACK, SUBACK, UNSUBACK, PINGRESP, PUBACK).
    pub fn outbound(&self, session_id: SessionId) -> Option<Sender<BrokerToSessionCmd>> {
        self.sessions.get(&session_id).map(|entry| entry.outbound.clone())
    }

    /// Parse and install one subscription per filter, returning the
    /// per-filter SUBACK code and the retained messages now due for
    /// immediate delivery (in filter order).
    pub fn subscribe(
        &mut self,
        session_id: SessionId,
        requests: &[(String, QoS)],
    ) -> (Vec<SubscribeReturnCode>, Vec<PublishPacket>) {
        let mut codes = Vec::with_capacity(requests.len());
        let mut retained_matches = Vec::new();

        for (filter_str, requested_qos) in requests {
            match TopicFilter::parse(filter_str) {
                Ok(filter) => {
                    let granted = (*requested_qos).min(QoS::AtLeastOnce);
                    for (topic, packet) in &self.retained {
                        if filter.matches(topic) {
                            retained_matches.push(packet.clone());
                        }
                    }
                    if let Some(entry) = self.sessions.get_mut(&session_id) {
                        entry
                            .subscriptions
                            .push((filter_str.clone(), filter, granted));
                    }
                    codes.push(SubscribeReturnCode::Granted(granted));
                }
                Err(_) => codes.push(SubscribeReturnCode::Failure),
            }
        }

        (codes, retained_matches)
    }

    pub fn unsubscribe(&mut self, session_id: SessionId, filters: &[String]) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry
                .subscriptions
                .retain(|(text, _, _)| !filters.iter().any(|f| f == text));
        }
    }

    /// Snapshot the recipients for a PUBLISH and update the retained store.
    /// Delivery itself happens outside the lock.
    pub fn publish(&mut self, packet: &PublishPacket) -> Vec<Recipient> {
        if packet.retain {
            if packet.payload.is_empty() {
                self.retained.remove(&packet.topic_name);
            } else {
                self.retained
                    .insert(packet.topic_name.clone(), packet.clone());
            }
        }

        let mut recipients = Vec::new();
        for (session_id, entry) in &self.sessions {
            let best = entry
                .subscriptions
                .iter()
                .filter(|(_, filter, _)| filter.matches(&packet.topic_name))
                .map(|(_, _, qos)| *qos)
                .max();
            if let Some(granted) = best {
                let effective_qos = packet.qos.min(QoS::AtLeastOnce).min(granted);
                recipients.push(Recipient {
                    session_id: *session_id,
                    outbound: entry.outbound.clone(),
                    effective_qos,
                });
            }
        }
        recipients
    }

    /// Remove a session, returning its will so the caller can fire it
    /// outside the lock (graceful DISCONNECT removes the will first via
    /// `clear_will`, so it never fires for a clean disconnect).
    pub fn remove_session(&mut self, session_id: SessionId) -> Option<Will> {
        let entry = self.sessions.remove(&session_id)?;
        if !entry.client_id.is_empty() {
            self.client_ids.remove(&entry.client_id);
        }
        entry.will
    }

    pub fn clear_will(&mut self, session_id: SessionId) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.will = None;
        }
    }

    /// Sessions whose last activity is older than `ceiling`, for the
    /// reaper sweep.
    pub fn stale_sessions(&self, ceiling: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_activity) > ceiling)
            .map(|(id, _)| *id)
            .collect()
    }
}
