//! In-process radio medium.
//!
//! Every [`LoopbackTransport`] is a station on a shared [`RadioMedium`].
//! The medium plays the part of the platform discovery service: it matches
//! advertisers and discoverers by service id, runs the two-sided accept
//! handshake, and hands payloads across. Outcomes are reported through each
//! station's [`TransportCallbacks`], never by return value.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use dreamstream_core::connection::events::TransportCallbacks;
use dreamstream_core::models::payload::{Payload, PayloadTransferUpdate, TransferStatus};
use dreamstream_core::traits::transport::{Strategy, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    /// Handshake running; holds the ids that have accepted so far.
    Pending(Vec<String>),
    Established,
}

#[derive(Default)]
struct Station {
    callbacks: Option<TransportCallbacks>,
    /// `(advertised name, service id)` while advertising.
    advertising: Option<(String, String)>,
    discovering: Option<String>,
    /// Peer id → link state. Mirrored on the peer's station.
    links: HashMap<String, LinkState>,
}

impl Station {
    fn notify(&self, f: impl FnOnce(&TransportCallbacks)) {
        if let Some(callbacks) = &self.callbacks {
            f(callbacks);
        }
    }
}

#[derive(Default)]
struct MediumState {
    stations: HashMap<String, Station>,
}

impl MediumState {
    fn notify(&self, id: &str, f: impl FnOnce(&TransportCallbacks)) {
        if let Some(station) = self.stations.get(id) {
            station.notify(f);
        }
    }

    fn link(&self, a: &str, b: &str) -> Option<&LinkState> {
        self.stations.get(a).and_then(|s| s.links.get(b))
    }

    fn set_link(&mut self, a: &str, b: &str, state: LinkState) {
        if let Some(station) = self.stations.get_mut(a) {
            station.links.insert(b.to_string(), state.clone());
        }
        if let Some(station) = self.stations.get_mut(b) {
            station.links.insert(a.to_string(), state);
        }
    }

    fn remove_link(&mut self, a: &str, b: &str) -> Option<LinkState> {
        if let Some(station) = self.stations.get_mut(b) {
            station.links.remove(a);
        }
        self.stations.get_mut(a).and_then(|s| s.links.remove(b))
    }

    fn is_busy(&self, id: &str) -> bool {
        self.stations.get(id).is_some_and(|s| !s.links.is_empty())
    }

    fn stop_advertising(&mut self, id: &str) {
        let Some((_, service_id)) = self.stations.get_mut(id).and_then(|s| s.advertising.take()) else {
            return;
        };
        for (other_id, other) in &self.stations {
            if other_id != id && other.discovering.as_deref() == Some(service_id.as_str()) {
                other.notify(|cb| cb.on_endpoint_lost(id));
            }
        }
    }

    /// Tear down one link, telling only the far side.
    fn drop_link(&mut self, id: &str, peer: &str) {
        match self.remove_link(id, peer) {
            Some(LinkState::Established) => self.notify(peer, |cb| cb.on_disconnected(id)),
            Some(LinkState::Pending(_)) => {
                self.notify(peer, |cb| cb.on_connection_result(id, Err("connection canceled".into())))
            }
            None => {}
        }
    }

    fn stop_all(&mut self, id: &str) {
        self.stop_advertising(id);
        let peers: Vec<String> = match self.stations.get_mut(id) {
            Some(station) => {
                station.discovering = None;
                station.links.keys().cloned().collect()
            }
            None => return,
        };
        for peer in peers {
            self.drop_link(id, &peer);
        }
    }
}

/// Shared medium all loopback stations talk over. Cheap to clone.
#[derive(Clone, Default)]
pub struct RadioMedium {
    state: Arc<Mutex<MediumState>>,
}

impl RadioMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the medium under a fresh endpoint id.
    pub fn transport(&self) -> LoopbackTransport {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.state.lock().stations.insert(id.clone(), Station::default());
        log::debug!("Station {} joined the medium", id);
        LoopbackTransport {
            id,
            medium: self.clone(),
        }
    }

    pub fn station_count(&self) -> usize {
        self.state.lock().stations.len()
    }

    /// Ids of the peers `id` has an established link with.
    pub fn established_links(&self, id: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut peers: Vec<String> = state
            .stations
            .get(id)
            .map(|s| {
                s.links
                    .iter()
                    .filter(|(_, link)| **link == LinkState::Established)
                    .map(|(peer, _)| peer.clone())
                    .collect()
            })
            .unwrap_or_default();
        peers.sort();
        peers
    }

    /// Radio loss between two stations. Both sides see a disconnect, or a
    /// failed connection result if the handshake had not completed.
    pub fn break_link(&self, a: &str, b: &str) {
        let mut state = self.state.lock();
        match state.remove_link(a, b) {
            Some(LinkState::Established) => {
                log::debug!("Link {} <-> {} lost", a, b);
                state.notify(a, |cb| cb.on_disconnected(b));
                state.notify(b, |cb| cb.on_disconnected(a));
            }
            Some(LinkState::Pending(_)) => {
                log::debug!("Pending link {} <-> {} lost", a, b);
                state.notify(a, |cb| cb.on_connection_result(b, Err("link lost".into())));
                state.notify(b, |cb| cb.on_connection_result(a, Err("link lost".into())));
            }
            None => {}
        }
    }

    /// Deliver a disconnect notification for `endpoint_id` to `station`
    /// without touching any link, as a misbehaving radio stack might.
    pub fn spurious_disconnect(&self, station: &str, endpoint_id: &str) {
        self.state.lock().notify(station, |cb| cb.on_disconnected(endpoint_id));
    }
}

/// One station on a [`RadioMedium`]. Leaves the medium when dropped.
pub struct LoopbackTransport {
    id: String,
    medium: RadioMedium,
}

impl LoopbackTransport {
    /// Endpoint id peers see for this station.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MediumState) -> R) -> R {
        f(&mut self.medium.state.lock())
    }
}

impl Transport for LoopbackTransport {
    fn attach(&mut self, callbacks: TransportCallbacks) {
        self.with_state(|state| {
            if let Some(station) = state.stations.get_mut(&self.id) {
                station.callbacks = Some(callbacks);
            }
        });
    }

    fn start_advertising(&mut self, name: &str, service_id: &str, strategy: Strategy) {
        let me = self.id.as_str();
        self.with_state(|state| {
            let Some(station) = state.stations.get_mut(me) else {
                return;
            };
            if station.advertising.is_some() {
                station.notify(|cb| cb.on_advertising_result(Err("already advertising".into())));
                return;
            }
            log::debug!("{} advertising {} ({:?})", me, service_id, strategy);
            station.advertising = Some((name.to_string(), service_id.to_string()));
            station.notify(|cb| cb.on_advertising_result(Ok(())));

            for (other_id, other) in &state.stations {
                if other_id != me && other.discovering.as_deref() == Some(service_id) {
                    other.notify(|cb| cb.on_endpoint_found(me, service_id, name));
                }
            }
        });
    }

    fn stop_advertising(&mut self) {
        let me = self.id.as_str();
        self.with_state(|state| state.stop_advertising(me));
    }

    fn start_discovery(&mut self, service_id: &str, strategy: Strategy) {
        let me = self.id.as_str();
        self.with_state(|state| {
            let Some(station) = state.stations.get_mut(me) else {
                return;
            };
            if station.discovering.is_some() {
                station.notify(|cb| cb.on_discovery_result(Err("already discovering".into())));
                return;
            }
            log::debug!("{} discovering {} ({:?})", me, service_id, strategy);
            station.discovering = Some(service_id.to_string());
            station.notify(|cb| cb.on_discovery_result(Ok(())));

            let Some(station) = state.stations.get(me) else {
                return;
            };
            for (other_id, other) in &state.stations {
                if other_id == me {
                    continue;
                }
                if let Some((name, advertised)) = &other.advertising {
                    if advertised == service_id {
                        station.notify(|cb| cb.on_endpoint_found(other_id, advertised, name));
                    }
                }
            }
        });
    }

    fn stop_discovery(&mut self) {
        let me = self.id.as_str();
        self.with_state(|state| {
            if let Some(station) = state.stations.get_mut(me) {
                station.discovering = None;
            }
        });
    }

    fn request_connection(&mut self, name: &str, endpoint_id: &str) {
        let me = self.id.as_str();
        self.with_state(|state| {
            let target_name = match state.stations.get(endpoint_id).and_then(|s| s.advertising.as_ref()) {
                Some((advertised_name, _)) => advertised_name.clone(),
                None => {
                    state.notify(me, |cb| {
                        cb.on_connection_request_result(endpoint_id, Err("endpoint not advertising".into()))
                    });
                    return;
                }
            };
            if endpoint_id == me || state.is_busy(me) || state.is_busy(endpoint_id) {
                state.notify(me, |cb| {
                    cb.on_connection_request_result(endpoint_id, Err("endpoint busy".into()))
                });
                return;
            }

            state.set_link(me, endpoint_id, LinkState::Pending(Vec::new()));
            state.notify(me, |cb| cb.on_connection_request_result(endpoint_id, Ok(())));
            state.notify(me, |cb| cb.on_connection_initiated(endpoint_id, &target_name));
            state.notify(endpoint_id, |cb| cb.on_connection_initiated(me, name));
        });
    }

    fn accept_connection(&mut self, endpoint_id: &str) {
        let me = self.id.as_str();
        self.with_state(|state| {
            let mut accepted = match state.link(me, endpoint_id) {
                Some(LinkState::Pending(accepted)) => accepted.clone(),
                _ => {
                    log::debug!("{} has no pending link with {}", me, endpoint_id);
                    return;
                }
            };
            if !accepted.iter().any(|id| id == me) {
                accepted.push(me.to_string());
            }

            if accepted.len() < 2 {
                state.set_link(me, endpoint_id, LinkState::Pending(accepted));
                return;
            }
            state.set_link(me, endpoint_id, LinkState::Established);
            state.notify(me, |cb| cb.on_connection_result(endpoint_id, Ok(())));
            state.notify(endpoint_id, |cb| cb.on_connection_result(me, Ok(())));
        });
    }

    fn reject_connection(&mut self, endpoint_id: &str) {
        let me = self.id.as_str();
        self.with_state(|state| {
            if let Some(LinkState::Pending(_)) = state.link(me, endpoint_id) {
                state.remove_link(me, endpoint_id);
                state.notify(me, |cb| cb.on_connection_result(endpoint_id, Err("rejected".into())));
                state.notify(endpoint_id, |cb| cb.on_connection_result(me, Err("rejected".into())));
            }
        });
    }

    fn send_payload(&mut self, endpoint_ids: &[String], payload: Payload) {
        let me = self.id.as_str();
        self.with_state(|state| {
            let (reachable, unreachable): (Vec<&String>, Vec<&String>) = endpoint_ids
                .iter()
                .partition(|id| state.link(me, id) == Some(&LinkState::Established));

            let payload_id = payload.id();
            if !unreachable.is_empty() {
                let ids: Vec<String> = unreachable.into_iter().cloned().collect();
                state.notify(me, |cb| cb.on_send_result(&ids, payload_id, Err("endpoint not connected".into())));
            }

            match payload {
                Payload::Bytes { data, .. } => {
                    for id in &reachable {
                        let copy = Payload::Bytes {
                            id: payload_id,
                            data: data.clone(),
                        };
                        state.notify(id, |cb| cb.on_payload_received(me, copy));
                        let update = PayloadTransferUpdate {
                            payload_id,
                            status: TransferStatus::Success,
                            bytes_transferred: data.len() as u64,
                        };
                        state.notify(me, |cb| cb.on_payload_transfer_update(id, update));
                    }
                }
                stream @ Payload::Stream { .. } => {
                    let Some(first) = reachable.first() else {
                        log::debug!("Stream payload {} has no connected recipient", payload_id);
                        return;
                    };
                    if reachable.len() > 1 {
                        log::warn!("Stream payload {} delivered to {} only", payload_id, first);
                    }
                    state.notify(first, |cb| cb.on_payload_received(me, stream));
                    let update = PayloadTransferUpdate {
                        payload_id,
                        status: TransferStatus::InProgress,
                        bytes_transferred: 0,
                    };
                    state.notify(me, |cb| cb.on_payload_transfer_update(first, update));
                }
            }

            if !reachable.is_empty() {
                let ids: Vec<String> = reachable.into_iter().cloned().collect();
                state.notify(me, |cb| cb.on_send_result(&ids, payload_id, Ok(())));
            }
        });
    }

    fn disconnect_from_endpoint(&mut self, endpoint_id: &str) {
        let me = self.id.as_str();
        self.with_state(|state| state.drop_link(me, endpoint_id));
    }

    fn stop_all_endpoints(&mut self) {
        let me = self.id.as_str();
        self.with_state(|state| state.stop_all(me));
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let mut state = self.medium.state.lock();
        state.stop_all(&self.id);
        state.stations.remove(&self.id);
        log::debug!("Station {} left the medium", self.id);
    }
}
