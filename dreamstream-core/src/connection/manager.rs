use crate::connection::events::{TransportCallbacks, TransportEvent};
use crate::connection::registry::EndpointRegistry;
use crate::models::endpoint::Endpoint;
use crate::models::error::StreamError;
use crate::models::payload::{Payload, PayloadTransferUpdate, TransferStatus};
use crate::traits::connection_handler::ConnectionHandler;
use crate::traits::transport::{Strategy, Transport};

/// Drives advertise/discover/connect/accept/disconnect against a
/// [`Transport`] and keeps the [`EndpointRegistry`] in step with the
/// transport's events.
///
/// All methods expect to be called from one dispatch thread. Transport
/// outcomes are fed back in through [`ConnectionManager::handle_event`],
/// which updates the registry and then raises the matching
/// [`ConnectionHandler`] callback.
pub struct ConnectionManager {
    name: String,
    service_id: String,
    strategy: Strategy,
    transport: Box<dyn Transport>,
    registry: EndpointRegistry,
    is_advertising: bool,
    is_discovering: bool,
    is_connecting: bool,
}

impl ConnectionManager {
    pub fn new(
        name: impl Into<String>,
        service_id: impl Into<String>,
        strategy: Strategy,
        mut transport: Box<dyn Transport>,
        callbacks: TransportCallbacks,
    ) -> Self {
        transport.attach(callbacks);
        Self {
            name: name.into(),
            service_id: service_id.into(),
            strategy,
            transport,
            registry: EndpointRegistry::new(),
            is_advertising: false,
            is_discovering: false,
            is_connecting: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn is_advertising(&self) -> bool {
        self.is_advertising
    }

    pub fn is_discovering(&self) -> bool {
        self.is_discovering
    }

    pub fn is_connecting(&self) -> bool {
        self.is_connecting
    }

    pub fn is_connected(&self) -> bool {
        !self.registry.established().is_empty()
    }

    // --- Advertising / discovery ---

    pub fn start_advertising(&mut self) {
        if self.is_advertising {
            log::debug!("Already advertising as {}", self.name);
            return;
        }
        self.is_advertising = true;
        log::info!("Advertising {} under {}", self.name, self.service_id);
        self.transport
            .start_advertising(&self.name, &self.service_id, self.strategy);
    }

    pub fn stop_advertising(&mut self) {
        if self.is_advertising {
            self.transport.stop_advertising();
        }
        self.is_advertising = false;
    }

    /// Begin a new discovery pass. The discovered cache is cleared first.
    pub fn start_discovering(&mut self) {
        self.registry.clear_discovered();
        if self.is_discovering {
            log::debug!("Already discovering {}", self.service_id);
            return;
        }
        self.is_discovering = true;
        log::info!("Discovering {}", self.service_id);
        self.transport.start_discovery(&self.service_id, self.strategy);
    }

    pub fn stop_discovering(&mut self) {
        if self.is_discovering {
            self.transport.stop_discovery();
        }
        self.is_discovering = false;
    }

    // --- Connections ---

    /// Request a connection. Ignored while another request is in flight.
    pub fn connect_to_endpoint(&mut self, endpoint: &Endpoint) {
        if self.is_connecting {
            log::debug!("Connection already in progress, ignoring request to {}", endpoint);
            return;
        }
        self.is_connecting = true;
        log::info!("Requesting connection to {}", endpoint);
        self.transport.request_connection(&self.name, endpoint.id());
    }

    pub fn accept_connection(&mut self, endpoint: &Endpoint) {
        log::debug!("Accepting connection from {}", endpoint);
        self.transport.accept_connection(endpoint.id());
    }

    pub fn reject_connection(&mut self, endpoint: &Endpoint) {
        log::debug!("Rejecting connection from {}", endpoint);
        self.transport.reject_connection(endpoint.id());
        self.registry.take_pending(endpoint.id());
    }

    pub fn disconnect(&mut self, endpoint: &Endpoint) {
        self.transport.disconnect_from_endpoint(endpoint.id());
        self.registry.remove_established(endpoint.id());
    }

    pub fn disconnect_from_all_endpoints(&mut self) {
        for id in self.registry.established_ids() {
            self.transport.disconnect_from_endpoint(&id);
        }
        self.registry.clear_established();
    }

    /// Full reset: flags off, registry empty, transport session torn down.
    pub fn stop_all_endpoints(&mut self) {
        self.is_advertising = false;
        self.is_discovering = false;
        self.is_connecting = false;
        self.registry.clear();
        self.transport.stop_all_endpoints();
    }

    // --- Payloads ---

    /// Send to every established endpoint. Delivery failures only show up
    /// in the log and, eventually, as disconnects.
    pub fn send(&mut self, payload: Payload) {
        let ids = self.registry.established_ids();
        self.send_to(payload, &ids);
    }

    pub fn send_to(&mut self, payload: Payload, endpoint_ids: &[String]) {
        if endpoint_ids.is_empty() {
            log::debug!("No recipients for payload {}, dropping", payload.id());
            return;
        }
        self.transport.send_payload(endpoint_ids, payload);
    }

    // --- Transport events ---

    pub fn handle_event(&mut self, event: TransportEvent, handler: &mut dyn ConnectionHandler) {
        match event {
            TransportEvent::AdvertisingResult(Ok(())) => {
                log::debug!("Advertising started");
                handler.on_advertising_started(self);
            }
            TransportEvent::AdvertisingResult(Err(reason)) => {
                log::warn!("Advertising failed: {}", reason);
                self.is_advertising = false;
                handler.on_advertising_failed(self);
            }
            TransportEvent::DiscoveryResult(Ok(())) => {
                log::debug!("Discovery started");
                handler.on_discovery_started(self);
            }
            TransportEvent::DiscoveryResult(Err(reason)) => {
                log::warn!("Discovery failed: {}", reason);
                self.is_discovering = false;
                handler.on_discovery_failed(self);
            }
            TransportEvent::ConnectionRequestResult { endpoint_id, result } => match result {
                Ok(()) => log::debug!("Connection request to {} delivered", endpoint_id),
                Err(reason) => {
                    log::warn!("Connection request to {} failed: {}", endpoint_id, reason);
                    self.is_connecting = false;
                    let endpoint = self
                        .registry
                        .find_discovered(&endpoint_id)
                        .cloned()
                        .unwrap_or_else(|| Endpoint::new(endpoint_id.clone(), endpoint_id.clone()));
                    handler.on_connection_failed(self, Some(&endpoint));
                }
            },
            TransportEvent::SendResult {
                endpoint_ids,
                payload_id,
                result,
            } => {
                if let Err(reason) = result {
                    log::warn!("Sending payload {} to {:?} failed: {}", payload_id, endpoint_ids, reason);
                }
            }
            TransportEvent::EndpointFound {
                endpoint_id,
                service_id,
                name,
            } => {
                if service_id != self.service_id {
                    log::debug!("Ignoring endpoint {} advertising {}", endpoint_id, service_id);
                    return;
                }
                let endpoint = Endpoint::new(endpoint_id, name);
                log::info!("Endpoint found: {}", endpoint);
                self.registry.mark_discovered(endpoint.clone());
                handler.on_endpoint_discovered(self, &endpoint);
            }
            TransportEvent::EndpointLost { endpoint_id } => {
                log::debug!("Endpoint lost: {}", endpoint_id);
            }
            TransportEvent::ConnectionInitiated {
                endpoint_id,
                remote_name,
            } => {
                let endpoint = Endpoint::new(endpoint_id, remote_name);
                log::info!("Connection initiated with {}", endpoint);
                // The peer started over, so the old link is gone.
                if let Some(stale) = self.registry.remove_established(endpoint.id()) {
                    log::warn!("{} initiated a new connection while established", stale);
                    handler.on_endpoint_disconnected(self, &stale);
                }
                self.registry.add_pending(endpoint.clone());
                handler.on_connection_initiated(self, &endpoint);
            }
            TransportEvent::ConnectionResult { endpoint_id, result } => {
                self.is_connecting = false;
                let pending = self.registry.take_pending(&endpoint_id);
                match (result, pending) {
                    (Ok(()), Some(endpoint)) => {
                        log::info!("Connected to {}", endpoint);
                        self.registry.establish(endpoint.clone());
                        handler.on_endpoint_connected(self, &endpoint);
                    }
                    (Ok(()), None) => {
                        log::warn!("Connection result for unknown endpoint {}", endpoint_id);
                    }
                    (Err(reason), pending) => {
                        log::warn!("Connection to {} failed: {}", endpoint_id, reason);
                        handler.on_connection_failed(self, pending.as_ref());
                    }
                }
            }
            TransportEvent::Disconnected { endpoint_id } => {
                match self.registry.remove_established(&endpoint_id) {
                    Some(endpoint) => {
                        log::info!("Disconnected from {}", endpoint);
                        handler.on_endpoint_disconnected(self, &endpoint);
                    }
                    None => log::warn!("Ignoring {}", StreamError::UnexpectedDisconnect(endpoint_id)),
                }
            }
            TransportEvent::PayloadReceived { endpoint_id, payload } => {
                log::debug!("Payload {:?} from {}", payload, endpoint_id);
                let endpoint = self.registry.established_endpoint(&endpoint_id).cloned();
                handler.on_receive(self, endpoint.as_ref(), payload);
            }
            TransportEvent::PayloadTransferUpdate { endpoint_id, update } => {
                self.log_transfer(&endpoint_id, &update);
            }
        }
    }

    fn log_transfer(&self, endpoint_id: &str, update: &PayloadTransferUpdate) {
        match update.status {
            TransferStatus::Success => log::debug!(
                "Payload {} to {} complete ({} bytes)",
                update.payload_id,
                endpoint_id,
                update.bytes_transferred
            ),
            TransferStatus::Failure => {
                log::warn!("Payload {} to {} failed", update.payload_id, endpoint_id)
            }
            TransferStatus::InProgress | TransferStatus::Canceled => {}
        }
    }
}
