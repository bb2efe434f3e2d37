//! Transport layer for BMC requests.
//!
//! A transport takes one IPMI request, delivers it to the BMC and hands back
//! the raw response bytes, completion code first. Session setup,
//! authentication, retries and timeouts all live below this trait; callers
//! see a single blocking round trip that either yields bytes or fails.

pub mod ipmitool;
#[cfg(test)]
pub(crate) mod mock;

use std::io;
use thiserror::Error;

use crate::mgmt_protocol::NetFn;

pub use ipmitool::IpmitoolTransport;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The helper process could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The request did not make it to the BMC or back
    #[error("Request failed: {0}")]
    Failed(String),

    /// The response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One IPMI request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub netfn: NetFn,
    pub command: u8,
    pub data: Vec<u8>,
}

impl Request {
    pub fn new(netfn: NetFn, command: u8, data: Vec<u8>) -> Self {
        Self {
            netfn,
            command,
            data,
        }
    }
}

/// Synchronous request/response channel to a BMC.
///
/// Implementations serialize their own access to the underlying channel.
/// The returned bytes start with the completion code.
pub trait Transport {
    fn send(&mut self, request: &Request) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, request: &Request) -> Result<Vec<u8>, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: &Request) -> Result<Vec<u8>, TransportError> {
        (**self).send(request)
    }
}
