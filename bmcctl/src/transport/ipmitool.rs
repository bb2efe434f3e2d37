//! Transport backed by the `ipmitool` executable.
//!
//! Each request runs `ipmitool ... raw <netfn> <cmd> <data...>`. ipmitool
//! owns the session: RMCP+ negotiation, authentication, sequence numbers and
//! its own retry policy. The password is passed through `IPMI_PASSWORD` and
//! `-E` so it never shows up in the process list.
//!
//! On success ipmitool prints the response data as hex bytes without the
//! completion code. On a non-zero completion code it exits with an error
//! that names the code as `rsp=0xNN`; that code is turned back into a
//! one-byte response so the client reports it like any other.

use std::process::Command;

use super::{Request, Transport, TransportError};
use crate::config::BmcConfig;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Transport that shells out to ipmitool for every request.
#[derive(Debug, Clone)]
pub struct IpmitoolTransport {
    config: BmcConfig,
}

impl IpmitoolTransport {
    /// Create a transport for the BMC described by `config`.
    ///
    /// Only out-of-band interfaces need a host; the local `open` interface
    /// talks to the BMC through the kernel driver.
    pub fn new(config: BmcConfig) -> Result<Self> {
        if config.host.is_none() && config.interface != "open" {
            return Err(Error::Config(format!(
                "interface {} needs a BMC host",
                config.interface
            )));
        }
        Ok(Self { config })
    }

    fn args(&self, request: &Request) -> Vec<String> {
        let mut args = vec!["-I".to_string(), self.config.interface.clone()];
        if let Some(host) = &self.config.host {
            args.extend(["-H".to_string(), host.clone()]);
        }
        if let Some(port) = self.config.port {
            args.extend(["-p".to_string(), port.to_string()]);
        }
        if let Some(user) = &self.config.username {
            args.extend(["-U".to_string(), user.clone()]);
        }
        if self.config.password.is_some() {
            args.push("-E".to_string());
        }

        args.push("raw".to_string());
        args.push(format!("0x{:02x}", request.netfn as u8));
        args.push(format!("0x{:02x}", request.command));
        args.extend(request.data.iter().map(|b| format!("0x{:02x}", b)));
        args
    }
}

impl Transport for IpmitoolTransport {
    fn send(&mut self, request: &Request) -> std::result::Result<Vec<u8>, TransportError> {
        let program = self.config.ipmitool.display().to_string();
        let mut command = Command::new(&self.config.ipmitool);
        command.args(self.args(request));
        if let Some(password) = &self.config.password {
            command.env("IPMI_PASSWORD", password);
        }

        trace!(
            netfn = ?request.netfn,
            cmd = %format!("{:#04x}", request.command),
            data = %hex::encode(&request.data),
            "TX ipmitool"
        );

        let output = command
            .output()
            .map_err(|source| TransportError::Spawn { program, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if let Some(code) = completion_code_from_stderr(&stderr) {
                trace!(code = %format!("{:#04x}", code), "RX ipmitool error response");
                return Ok(vec![code]);
            }
            warn!("ipmitool failed: {}", stderr.trim());
            return Err(TransportError::Failed(stderr.trim().to_string()));
        }

        let data = parse_raw_output(&String::from_utf8_lossy(&output.stdout))?;
        trace!(data = %hex::encode(&data), "RX ipmitool");

        let mut frame = Vec::with_capacity(1 + data.len());
        frame.push(0x00);
        frame.extend(data);
        Ok(frame)
    }
}

/// Parse `ipmitool raw` output: whitespace separated hex bytes over one or
/// more lines.
pub(crate) fn parse_raw_output(stdout: &str) -> std::result::Result<Vec<u8>, TransportError> {
    stdout
        .split_whitespace()
        .map(|token| match hex::decode(token) {
            Ok(bytes) if bytes.len() == 1 => Ok(bytes[0]),
            _ => Err(TransportError::InvalidResponse(format!(
                "unexpected token {:?} in ipmitool output",
                token
            ))),
        })
        .collect()
}

/// Extract the completion code from an ipmitool error such as
/// `Unable to send RAW command (channel=0x0 netfn=0x6 lun=0x0 cmd=0x52 rsp=0xc1): Invalid command`.
pub(crate) fn completion_code_from_stderr(stderr: &str) -> Option<u8> {
    let start = stderr.find("rsp=0x")? + "rsp=0x".len();
    let digits: String = stderr[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u8::from_str_radix(&digits, 16).ok()
}
