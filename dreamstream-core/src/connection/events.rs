use crossbeam_channel::Sender;

use crate::models::payload::{Payload, PayloadTransferUpdate};

/// Everything the transport reports back, delivered on the session inbox.
#[derive(Debug)]
pub enum TransportEvent {
    AdvertisingResult(Result<(), String>),
    DiscoveryResult(Result<(), String>),
    ConnectionRequestResult {
        endpoint_id: String,
        result: Result<(), String>,
    },
    SendResult {
        endpoint_ids: Vec<String>,
        payload_id: u64,
        result: Result<(), String>,
    },
    EndpointFound {
        endpoint_id: String,
        service_id: String,
        name: String,
    },
    EndpointLost {
        endpoint_id: String,
    },
    ConnectionInitiated {
        endpoint_id: String,
        remote_name: String,
    },
    ConnectionResult {
        endpoint_id: String,
        result: Result<(), String>,
    },
    Disconnected {
        endpoint_id: String,
    },
    PayloadReceived {
        endpoint_id: String,
        payload: Payload,
    },
    PayloadTransferUpdate {
        endpoint_id: String,
        update: PayloadTransferUpdate,
    },
}

/// Callback surface handed to a transport.
///
/// Each call enqueues an event for the owning session; nothing runs on the
/// transport's thread. Calls after the session has shut down are dropped.
#[derive(Clone)]
pub struct TransportCallbacks {
    tx: Sender<TransportEvent>,
}

impl TransportCallbacks {
    pub fn new(tx: Sender<TransportEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: TransportEvent) {
        if let Err(e) = self.tx.send(event) {
            log::debug!("Dropping transport event for closed session: {:?}", e.into_inner());
        }
    }

    pub fn on_advertising_result(&self, result: Result<(), String>) {
        self.emit(TransportEvent::AdvertisingResult(result));
    }

    pub fn on_discovery_result(&self, result: Result<(), String>) {
        self.emit(TransportEvent::DiscoveryResult(result));
    }

    pub fn on_connection_request_result(&self, endpoint_id: &str, result: Result<(), String>) {
        self.emit(TransportEvent::ConnectionRequestResult {
            endpoint_id: endpoint_id.to_string(),
            result,
        });
    }

    pub fn on_send_result(&self, endpoint_ids: &[String], payload_id: u64, result: Result<(), String>) {
        self.emit(TransportEvent::SendResult {
            endpoint_ids: endpoint_ids.to_vec(),
            payload_id,
            result,
        });
    }

    pub fn on_endpoint_found(&self, endpoint_id: &str, service_id: &str, name: &str) {
        self.emit(TransportEvent::EndpointFound {
            endpoint_id: endpoint_id.to_string(),
            service_id: service_id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn on_endpoint_lost(&self, endpoint_id: &str) {
        self.emit(TransportEvent::EndpointLost {
            endpoint_id: endpoint_id.to_string(),
        });
    }

    pub fn on_connection_initiated(&self, endpoint_id: &str, remote_name: &str) {
        self.emit(TransportEvent::ConnectionInitiated {
            endpoint_id: endpoint_id.to_string(),
            remote_name: remote_name.to_string(),
        });
    }

    pub fn on_connection_result(&self, endpoint_id: &str, result: Result<(), String>) {
        self.emit(TransportEvent::ConnectionResult {
            endpoint_id: endpoint_id.to_string(),
            result,
        });
    }

    pub fn on_disconnected(&self, endpoint_id: &str) {
        self.emit(TransportEvent::Disconnected {
            endpoint_id: endpoint_id.to_string(),
        });
    }

    pub fn on_payload_received(&self, endpoint_id: &str, payload: Payload) {
        self.emit(TransportEvent::PayloadReceived {
            endpoint_id: endpoint_id.to_string(),
            payload,
        });
    }

    pub fn on_payload_transfer_update(&self, endpoint_id: &str, update: PayloadTransferUpdate) {
        self.emit(TransportEvent::PayloadTransferUpdate {
            endpoint_id: endpoint_id.to_string(),
            update,
        });
    }
}
