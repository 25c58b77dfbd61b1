use crate::connection::manager::ConnectionManager;
use crate::models::endpoint::Endpoint;
use crate::models::payload::Payload;

/// Role-visible lifecycle events raised by [`ConnectionManager`].
///
/// Each method receives the manager so the handler can react in place
/// (accept, connect, send) without shared ownership.
pub trait ConnectionHandler {
    /// Someone has sent us data. `endpoint` is `None` if the sender is not
    /// (or no longer) established.
    fn on_receive(&mut self, manager: &mut ConnectionManager, endpoint: Option<&Endpoint>, payload: Payload);

    /// A remote peer proposed a connection; accept or reject it.
    fn on_connection_initiated(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint);

    fn on_endpoint_discovered(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint);

    fn on_endpoint_connected(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint);

    fn on_endpoint_disconnected(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint);

    fn on_connection_failed(&mut self, manager: &mut ConnectionManager, endpoint: Option<&Endpoint>);

    fn on_advertising_started(&mut self, _manager: &mut ConnectionManager) {}

    fn on_advertising_failed(&mut self, _manager: &mut ConnectionManager) {}

    fn on_discovery_started(&mut self, _manager: &mut ConnectionManager) {}

    fn on_discovery_failed(&mut self, _manager: &mut ConnectionManager) {}
}
