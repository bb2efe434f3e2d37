//! High-level BMC client.
//!
//! Wraps a [`Transport`] and checks the completion code of every response.
//! Power supply readings and boot device updates are built on top of the
//! two primitives here: [`Client::send_raw`] for I2C master transfers and
//! [`Client::set_boot_param`] for boot option writes.

use crate::error::{Error, Result};
use crate::mgmt_protocol::boot::{BootDevice, BootSequence};
use crate::mgmt_protocol::master::{MasterRequest, MasterResponse};
use crate::mgmt_protocol::{commands, ChassisControl, CompletionCode, NetFn};
use crate::peripheral::psu::{PowerSupply, PowerSupplyReading};
use crate::peripheral::psu_model::{ModelTable, SUPERMICRO_MODELS};
use crate::tracing::prelude::*;
use crate::transport::{Request, Transport};

/// Bus the power supplies sit on unless configured otherwise
pub const DEFAULT_PMBUS_BUS: u8 = 0x07;

/// BMC client over any transport.
pub struct Client<T> {
    transport: T,
    pmbus_bus: u8,
    models: ModelTable,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pmbus_bus: DEFAULT_PMBUS_BUS,
            models: SUPERMICRO_MODELS,
        }
    }

    /// Use `bus` for power supply reads.
    pub fn with_pmbus_bus(mut self, bus: u8) -> Self {
        self.pmbus_bus = bus;
        self
    }

    /// Classify power supplies against `models`.
    pub fn with_models(mut self, models: ModelTable) -> Self {
        self.models = models;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a request and return the response data after the completion
    /// code.
    pub fn send(&mut self, request: &Request) -> Result<Vec<u8>> {
        let mut frame = self.exchange(request)?;
        frame.remove(0);
        Ok(frame)
    }

    /// I2C master write-read on a private bus.
    pub fn send_raw(
        &mut self,
        bus: u8,
        addr: u8,
        rsize: u8,
        data: &[u8],
    ) -> Result<MasterResponse> {
        let master = MasterRequest::new(bus, addr, rsize, data.to_vec());
        let request = Request::new(NetFn::App, commands::MASTER_WRITE_READ, master.encode());
        let frame = self.exchange(&request)?;
        MasterResponse::parse(&frame)
    }

    /// Write one system boot option parameter.
    pub fn set_boot_param(&mut self, param: u8, data: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(param);
        payload.extend_from_slice(data);
        let request = Request::new(NetFn::Chassis, commands::SET_SYSTEM_BOOT_OPTIONS, payload);
        self.send(&request).map(|_| ())
    }

    /// Select the device the host boots from next.
    pub fn set_boot_device(&mut self, device: BootDevice) -> Result<()> {
        BootSequence::new(self, device).run()
    }

    /// Chassis power control.
    pub fn chassis_control(&mut self, control: ChassisControl) -> Result<()> {
        let request = Request::new(NetFn::Chassis, commands::CHASSIS_CONTROL, vec![control as u8]);
        self.send(&request)?;
        info!(%control, "Chassis control sent");
        Ok(())
    }

    /// Read the power supply at `addr` on the configured PMBus bus.
    pub fn power_supply(&mut self, addr: u8) -> Result<PowerSupplyReading> {
        let (bus, models) = (self.pmbus_bus, self.models);
        PowerSupply::new(self, bus, addr, models).read()
    }

    // Round trip with completion code check; the returned frame is non-empty
    // and starts with a success code.
    fn exchange(&mut self, request: &Request) -> Result<Vec<u8>> {
        trace!(
            netfn = ?request.netfn,
            cmd = %format!("{:#04x}", request.command),
            data = %hex::encode(&request.data),
            "TX"
        );
        let frame = self.transport.send(request)?;
        trace!(frame = %hex::encode(&frame), "RX");

        let code = frame
            .first()
            .copied()
            .map(CompletionCode)
            .ok_or(Error::MalformedFrame { need: 1, have: 0 })?;
        if !code.is_success() {
            debug!(
                cmd = %format!("{:#04x}", request.command),
                code = %code,
                "Request failed"
            );
            return Err(Error::Protocol(code));
        }
        Ok(frame)
    }
}
