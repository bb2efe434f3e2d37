//! In-memory transport for unit tests.

use super::{Request, Transport, TransportError};

/// Transport that answers every request through a closure and records what
/// was sent.
pub(crate) struct MockTransport<F> {
    handler: F,
    pub sent: Vec<Request>,
}

impl<F> MockTransport<F>
where
    F: FnMut(&Request) -> Result<Vec<u8>, TransportError>,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            sent: Vec::new(),
        }
    }
}

impl<F> Transport for MockTransport<F>
where
    F: FnMut(&Request) -> Result<Vec<u8>, TransportError>,
{
    fn send(&mut self, request: &Request) -> Result<Vec<u8>, TransportError> {
        self.sent.push(request.clone());
        (self.handler)(request)
    }
}
