use crate::connection::events::TransportCallbacks;
use crate::models::payload::Payload;

/// Connection topology requested from the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// One advertiser, one discoverer, at most one established connection.
    #[default]
    PointToPoint,
}

/// Platform peer discovery/connection service, treated as a black box.
///
/// Every operation returns immediately. Outcomes arrive later through the
/// attached [`TransportCallbacks`], on whatever thread the transport uses.
pub trait Transport: Send {
    /// Register the callback surface. Called once before any other method.
    fn attach(&mut self, callbacks: TransportCallbacks);

    fn start_advertising(&mut self, name: &str, service_id: &str, strategy: Strategy);

    fn stop_advertising(&mut self);

    fn start_discovery(&mut self, service_id: &str, strategy: Strategy);

    fn stop_discovery(&mut self);

    fn request_connection(&mut self, name: &str, endpoint_id: &str);

    fn accept_connection(&mut self, endpoint_id: &str);

    fn reject_connection(&mut self, endpoint_id: &str);

    fn send_payload(&mut self, endpoint_ids: &[String], payload: Payload);

    fn disconnect_from_endpoint(&mut self, endpoint_id: &str);

    /// Drop every connection, pending request, advertisement and scan.
    fn stop_all_endpoints(&mut self);
}
