//! System boot options.
//!
//! The next boot device is the "boot flags" parameter of Set System Boot
//! Options. BMCs that implement the set-in-progress parameter treat it as a
//! lock around parameter updates: it is taken before writing, committed on
//! success and always released afterwards. BMCs that reject it still accept
//! the parameter writes on their own.
//!
//! ```text
//!   Idle --begin ok--> ProgressStarted ------\
//!     \                                       +--ack, flags ok--> Committing --> done
//!      \--begin err--> ProgressUnsupported --/
//!                                             \--ack or flags err--> Failed --> done
//! ```
//!
//! Every terminal path goes through [`BootSequence::release`], so the lock
//! is released whenever it was taken.

use crate::client::Client;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Boot option parameter selectors
pub mod params {
    pub const SET_IN_PROGRESS: u8 = 0x00;
    pub const INFO_ACK: u8 = 0x04;
    pub const BOOT_FLAGS: u8 = 0x05;
}

/// Set-in-progress parameter values
pub mod set_in_progress {
    pub const SET_COMPLETE: u8 = 0x00;
    pub const SET_IN_PROGRESS: u8 = 0x01;
    pub const COMMIT_WRITE: u8 = 0x02;
}

/// Boot info acknowledge: write mask and data for the BIOS/POST bit
const INFO_ACK_DATA: [u8; 2] = [0x01, 0x01];

/// Boot flags byte 1: flags valid, apply to next boot only
const BOOT_FLAGS_VALID: u8 = 0x80;

/// Boot device selector (boot flags byte 2)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum BootDevice {
    None = 0x00,
    Pxe = 0x04,
    Disk = 0x08,
    Safe = 0x0C,
    Diag = 0x10,
    Cdrom = 0x14,
    Bios = 0x18,
    RemoteFloppy = 0x1C,
    RemoteCdrom = 0x20,
    RemotePrimaryMedia = 0x24,
    RemoteDisk = 0x2C,
    Floppy = 0x3C,
}

impl BootDevice {
    /// Data of the boot flags parameter selecting this device
    pub fn boot_flags(self) -> [u8; 5] {
        [BOOT_FLAGS_VALID, self as u8, 0x00, 0x00, 0x00]
    }
}

/// Position in the boot device update.
#[derive(Debug)]
enum BootState {
    Idle,
    /// Set-in-progress accepted; the lock must be released
    ProgressStarted,
    /// Set-in-progress rejected; no further progress writes
    ProgressUnsupported,
    /// Parameters written
    Committing { progress: bool },
    /// A parameter write failed
    Failed { progress: bool, error: Error },
}

/// One boot device update.
pub struct BootSequence<'a, T> {
    client: &'a mut Client<T>,
    device: BootDevice,
}

impl<'a, T: Transport> BootSequence<'a, T> {
    pub fn new(client: &'a mut Client<T>, device: BootDevice) -> Self {
        Self { client, device }
    }

    /// Run the sequence to completion.
    ///
    /// Returns the error of the failed parameter write, if any. Errors of
    /// the progress writes are logged and dropped.
    pub fn run(mut self) -> Result<()> {
        let mut state = BootState::Idle;
        loop {
            trace!(?state, device = %self.device, "Boot sequence step");
            state = match state {
                BootState::Idle => self.begin(),
                BootState::ProgressStarted => self.write_parameters(true),
                BootState::ProgressUnsupported => self.write_parameters(false),
                BootState::Committing { progress } => {
                    if progress {
                        self.best_effort(set_in_progress::COMMIT_WRITE, "commit-write");
                    }
                    self.release(progress);
                    info!(device = %self.device, "Boot device set");
                    return Ok(());
                }
                BootState::Failed { progress, error } => {
                    self.release(progress);
                    return Err(error);
                }
            };
        }
    }

    fn begin(&mut self) -> BootState {
        match self.set_in_progress(set_in_progress::SET_IN_PROGRESS) {
            Ok(()) => BootState::ProgressStarted,
            Err(e) => {
                debug!(error = %e, "Set-in-progress not supported, continuing without it");
                BootState::ProgressUnsupported
            }
        }
    }

    fn write_parameters(&mut self, progress: bool) -> BootState {
        if let Err(error) = self.client.set_boot_param(params::INFO_ACK, &INFO_ACK_DATA) {
            warn!(error = %error, "Boot info acknowledge failed");
            return BootState::Failed { progress, error };
        }

        match self
            .client
            .set_boot_param(params::BOOT_FLAGS, &self.device.boot_flags())
        {
            Ok(()) => BootState::Committing { progress },
            Err(error) => {
                warn!(error = %error, device = %self.device, "Writing boot flags failed");
                BootState::Failed { progress, error }
            }
        }
    }

    /// Mark the update complete if the lock was taken.
    fn release(&mut self, progress: bool) {
        if progress {
            self.best_effort(set_in_progress::SET_COMPLETE, "set-complete");
        }
    }

    fn best_effort(&mut self, value: u8, what: &str) {
        if let Err(e) = self.set_in_progress(value) {
            warn!(error = %e, "Ignoring failed {} write", what);
        }
    }

    fn set_in_progress(&mut self, value: u8) -> Result<()> {
        self.client.set_boot_param(params::SET_IN_PROGRESS, &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mgmt_protocol::{commands, CompletionCode, NetFn};
    use crate::transport::mock::MockTransport;
    use crate::transport::{Request, TransportError};
    use std::str::FromStr;

    const BEGIN: [u8; 2] = [params::SET_IN_PROGRESS, set_in_progress::SET_IN_PROGRESS];
    const COMMIT: [u8; 2] = [params::SET_IN_PROGRESS, set_in_progress::COMMIT_WRITE];
    const COMPLETE: [u8; 2] = [params::SET_IN_PROGRESS, set_in_progress::SET_COMPLETE];
    const INFO_ACK: [u8; 3] = [params::INFO_ACK, 0x01, 0x01];

    type TransportResult = std::result::Result<Vec<u8>, TransportError>;

    fn flags(device: BootDevice) -> Vec<u8> {
        let mut data = vec![params::BOOT_FLAGS];
        data.extend(device.boot_flags());
        data
    }

    /// Answer boot option writes, failing those whose data starts with one
    /// of `fail`.
    fn bmc(fail: Vec<Vec<u8>>) -> impl FnMut(&Request) -> TransportResult {
        move |request: &Request| {
            assert_eq!(request.netfn, NetFn::Chassis);
            assert_eq!(request.command, commands::SET_SYSTEM_BOOT_OPTIONS);
            if fail.iter().any(|f| request.data == *f) {
                Ok(vec![0xCC])
            } else {
                Ok(vec![0x00])
            }
        }
    }

    fn sent(
        client: &Client<MockTransport<impl FnMut(&Request) -> TransportResult>>,
    ) -> Vec<Vec<u8>> {
        client.transport().sent.iter().map(|r| r.data.clone()).collect()
    }

    #[test]
    fn test_full_sequence() {
        let mut client = Client::new(MockTransport::new(bmc(vec![])));
        client.set_boot_device(BootDevice::Pxe).unwrap();

        assert_eq!(
            sent(&client),
            vec![
                BEGIN.to_vec(),
                INFO_ACK.to_vec(),
                vec![0x05, 0x80, 0x04, 0x00, 0x00, 0x00],
                COMMIT.to_vec(),
                COMPLETE.to_vec(),
            ]
        );
    }

    #[test]
    fn test_progress_unsupported_skips_progress_writes() {
        let mut client = Client::new(MockTransport::new(bmc(vec![BEGIN.to_vec()])));
        client.set_boot_device(BootDevice::Disk).unwrap();

        assert_eq!(
            sent(&client),
            vec![BEGIN.to_vec(), INFO_ACK.to_vec(), flags(BootDevice::Disk)]
        );
    }

    #[test]
    fn test_boot_flags_failure_releases_and_returns_its_error() {
        let fail = flags(BootDevice::Cdrom);
        let mut client = Client::new(MockTransport::new(bmc(vec![fail.clone()])));
        let err = client.set_boot_device(BootDevice::Cdrom).unwrap_err();

        assert_eq!(err.completion_code(), Some(CompletionCode(0xCC)));
        assert_eq!(
            sent(&client),
            vec![BEGIN.to_vec(), INFO_ACK.to_vec(), fail, COMPLETE.to_vec()]
        );
    }

    #[test]
    fn test_boot_flags_failure_without_progress() {
        let fail = flags(BootDevice::Bios);
        let mut client =
            Client::new(MockTransport::new(bmc(vec![BEGIN.to_vec(), fail.clone()])));
        let err = client.set_boot_device(BootDevice::Bios).unwrap_err();

        assert_eq!(err.completion_code(), Some(CompletionCode(0xCC)));
        assert_eq!(sent(&client), vec![BEGIN.to_vec(), INFO_ACK.to_vec(), fail]);
    }

    #[test]
    fn test_info_ack_failure_aborts_after_release() {
        let mut client = Client::new(MockTransport::new(bmc(vec![INFO_ACK.to_vec()])));
        let err = client.set_boot_device(BootDevice::Pxe).unwrap_err();

        assert_eq!(err.completion_code(), Some(CompletionCode(0xCC)));
        assert_eq!(
            sent(&client),
            vec![BEGIN.to_vec(), INFO_ACK.to_vec(), COMPLETE.to_vec()]
        );
    }

    #[test]
    fn test_info_ack_failure_without_progress() {
        let mut client = Client::new(MockTransport::new(bmc(vec![
            BEGIN.to_vec(),
            INFO_ACK.to_vec(),
        ])));
        let err = client.set_boot_device(BootDevice::Pxe).unwrap_err();

        assert_eq!(err.completion_code(), Some(CompletionCode(0xCC)));
        assert_eq!(sent(&client), vec![BEGIN.to_vec(), INFO_ACK.to_vec()]);
    }

    #[test]
    fn test_cleanup_failures_do_not_mask_success() {
        let mut client = Client::new(MockTransport::new(bmc(vec![
            COMMIT.to_vec(),
            COMPLETE.to_vec(),
        ])));
        client.set_boot_device(BootDevice::Pxe).unwrap();
        assert_eq!(sent(&client).len(), 5);
    }

    #[test]
    fn test_cleanup_failure_does_not_replace_primary_error() {
        let fail = flags(BootDevice::Pxe);
        let mut client = Client::new(MockTransport::new(move |request: &Request| {
            if request.data == fail {
                Ok(vec![0xC9])
            } else if request.data == COMPLETE {
                Err(TransportError::Failed("connection lost".to_string()))
            } else {
                Ok(vec![0x00])
            }
        }));
        let err = client.set_boot_device(BootDevice::Pxe).unwrap_err();
        assert_eq!(err.completion_code(), Some(CompletionCode::PARAMETER_OUT_OF_RANGE));
    }

    #[test]
    fn test_transport_failure_is_returned() {
        let mut client = Client::new(MockTransport::new(|request: &Request| {
            if request.data[0] == params::BOOT_FLAGS {
                Err(TransportError::Failed("connection lost".to_string()))
            } else {
                Ok(vec![0x00])
            }
        }));
        let err = client.set_boot_device(BootDevice::Disk).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Failed(_))));
        assert_eq!(client.transport().sent.last().unwrap().data, COMPLETE.to_vec());
    }

    #[test]
    fn test_boot_device_names() {
        assert_eq!(BootDevice::from_str("pxe").unwrap(), BootDevice::Pxe);
        assert_eq!(
            BootDevice::from_str("remote-primary-media").unwrap(),
            BootDevice::RemotePrimaryMedia
        );
        assert_eq!(BootDevice::RemoteCdrom.to_string(), "remote-cdrom");
        assert_eq!(BootDevice::Floppy.boot_flags(), [0x80, 0x3C, 0x00, 0x00, 0x00]);
        assert!(BootDevice::from_str("usb-stick").is_err());
    }
}
