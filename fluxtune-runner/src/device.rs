//! Device Slot Pool
//!
//! A fixed set of exclusive device handles. Jobs borrow a [`DeviceSlot`] for
//! their lifetime; dropping the slot hands the device back. Every device is
//! validated before the pool exists, and any failure aborts construction:
//! a run never continues on a silently reduced device set.

use crate::command::CommandSpec;
use crate::job::JobRunner;
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Device pool construction and lending errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device list was empty
    #[error("No devices configured")]
    NoDevices,

    /// The same id appeared twice
    #[error("Device listed more than once: {0}")]
    Duplicate(String),

    /// A device failed validation
    #[error("Device {device} failed validation: {reason}")]
    Unreachable {
        /// Device id
        device: String,
        /// Validator message
        reason: String,
    },

    /// The pool channel disconnected
    #[error("Device pool closed")]
    Closed,
}

/// Exclusive handle to one physical execution target
#[derive(Debug, PartialEq, Eq)]
pub struct Device {
    id: String,
}

impl Device {
    /// Handle for the device named `id`, e.g. `hip://0`
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Device identifier as passed to the tools
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Decides whether a device may join the pool
pub trait DeviceValidator: Send + Sync {
    /// `Err(reason)` if the device is unreachable or unhealthy
    fn validate(&self, device: &Device) -> Result<(), String>;
}

/// Accepts every device without checking
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeReachable;

impl DeviceValidator for AssumeReachable {
    fn validate(&self, _device: &Device) -> Result<(), String> {
        Ok(())
    }
}

/// Runs a probe command per device; exit status 0 means healthy.
/// `{device}` in the program or arguments is replaced by the device id.
#[derive(Debug, Clone)]
pub struct ProbeCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    runner: JobRunner,
}

impl ProbeCommand {
    /// Probe with the given command template and per-device timeout
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
            runner: JobRunner::new(),
        }
    }
}

impl DeviceValidator for ProbeCommand {
    fn validate(&self, device: &Device) -> Result<(), String> {
        let command = CommandSpec::new(self.program.replace("{device}", device.id())).args(
            self.args
                .iter()
                .map(|arg| arg.replace("{device}", device.id())),
        );
        let output = self.runner.execute(&command, self.timeout);
        if output.status.is_success() {
            Ok(())
        } else {
            Err(output.diagnostics().trim_end().to_string())
        }
    }
}

/// Pool of validated devices handed out one job at a time
#[derive(Debug)]
pub struct DeviceSlotPool {
    free_tx: Sender<Device>,
    free_rx: Receiver<Device>,
    ids: Vec<String>,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
}

impl DeviceSlotPool {
    /// Validate every device and build the pool. Fails on an empty list,
    /// duplicates, or the first device that does not validate.
    pub fn new<I, S>(device_ids: I, validator: &dyn DeviceValidator) -> Result<Self, DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = device_ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(DeviceError::NoDevices);
        }

        let mut seen = BTreeSet::new();
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(DeviceError::Duplicate(id.clone()));
            }
        }

        let (free_tx, free_rx) = crossbeam_channel::bounded(ids.len());
        for id in &ids {
            let device = Device::new(id.clone());
            validator
                .validate(&device)
                .map_err(|reason| DeviceError::Unreachable {
                    device: id.clone(),
                    reason,
                })?;
            debug!(device = id.as_str(), "device validated");
            free_tx.send(device).map_err(|_| DeviceError::Closed)?;
        }
        info!(devices = ids.len(), "device pool ready");

        Ok(Self {
            free_tx,
            free_rx,
            ids,
            in_use: AtomicUsize::new(0),
            peak_in_use: AtomicUsize::new(0),
        })
    }

    /// Block until a device is free and lend it out.
    pub fn acquire(&self) -> Result<DeviceSlot<'_>, DeviceError> {
        let device = self.free_rx.recv().map_err(|_| DeviceError::Closed)?;
        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_use.fetch_max(now, Ordering::SeqCst);
        Ok(DeviceSlot {
            pool: self,
            device: Some(device),
        })
    }

    /// Hand a device back. Dropping the slot does the same.
    pub fn release(&self, slot: DeviceSlot<'_>) {
        drop(slot);
    }

    fn give_back(&self, device: Device) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
        // Cannot fail: the pool owns the receiver and has room for every device
        let _ = self.free_tx.send(device);
    }

    /// Number of devices in the pool
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Device identifiers in configuration order
    pub fn device_ids(&self) -> &[String] {
        &self.ids
    }

    /// Devices currently lent out
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Most devices ever lent out at the same time
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use.load(Ordering::SeqCst)
    }
}

/// A device lent out for the duration of one job
#[derive(Debug)]
pub struct DeviceSlot<'a> {
    pool: &'a DeviceSlotPool,
    device: Option<Device>,
}

impl Deref for DeviceSlot<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        match &self.device {
            Some(device) => device,
            None => unreachable!("device is only taken on drop"),
        }
    }
}

impl Drop for DeviceSlot<'_> {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            self.pool.give_back(device);
        }
    }
}
