//! Device discovery.
//!
//! [`Scanner`] turns the raw advertisement stream of a [`Transport`] into
//! at most one [`DiscoveredDevice`] per watch and scanning session. It does
//! no I/O itself; the connector feeds it advertisements and pauses or
//! resumes it as sessions come and go.
//!
//! [`Transport`]: crate::transport::Transport

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::uuid::{INTERACTION_SERVICE, MANUFACTURER_NAME_KEY};

/// One advertisement as seen by the radio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Platform address or peripheral id.
    pub address: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Manufacturer specific data by company id.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// The watch name: the UTF-8 manufacturer data under `0xFFFF`, falling
    /// back to the local name when that is missing, empty or not UTF-8.
    pub fn name(&self) -> Option<String> {
        self.manufacturer_data
            .get(&MANUFACTURER_NAME_KEY)
            .and_then(|data| std::str::from_utf8(data).ok())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| self.local_name.clone())
    }
}

/// A watch reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Identity of the device.
    pub address: String,
    /// Advertised name, empty if the watch advertised none.
    pub name: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
}

/// Filter and dedup state for discovered watches.
///
/// Policy:
/// - Advertisements without the interaction service are dropped.
/// - With a name filter set, a watch whose name does not contain the filter
///   (case-insensitive) is dropped without being remembered, so a later
///   advertisement with a different name is evaluated again.
/// - Everything else is reported once and remembered until
///   [`forget`](Self::forget) or a fresh [`start`](Self::start).
#[derive(Debug)]
pub struct Scanner {
    service: Uuid,
    name_filter: Option<String>,
    running: bool,
    seen: HashSet<String>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Scanner {
    /// Create a stopped scanner for the interaction service.
    pub fn new(name_filter: Option<&str>) -> Self {
        Self::with_service(INTERACTION_SERVICE, name_filter)
    }

    /// Create a stopped scanner for a specific service.
    pub fn with_service(service: Uuid, name_filter: Option<&str>) -> Self {
        Self {
            service,
            name_filter: name_filter
                .filter(|f| !f.is_empty())
                .map(str::to_lowercase),
            running: false,
            seen: HashSet::new(),
        }
    }

    /// Begin reporting devices.
    ///
    /// Starting a stopped scanner opens a new scanning session and clears
    /// the set of seen addresses. Starting a running scanner does nothing.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        debug!("Scanning started");
        self.seen.clear();
        self.running = true;
    }

    /// Stop reporting devices. Seen addresses are kept.
    pub fn stop(&mut self) {
        if self.running {
            debug!("Scanning paused");
        }
        self.running = false;
    }

    /// Whether the scanner currently reports devices.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Allow an address to be reported again.
    pub fn forget(&mut self, address: &str) {
        self.seen.remove(address);
    }

    /// Whether an address has been reported in this session.
    pub fn has_seen(&self, address: &str) -> bool {
        self.seen.contains(address)
    }

    /// Evaluate one advertisement.
    ///
    /// Returns the device the first time a matching watch is seen.
    pub fn on_advertisement(&mut self, adv: &Advertisement) -> Option<DiscoveredDevice> {
        if !self.running || self.seen.contains(&adv.address) {
            return None;
        }

        if !adv.services.contains(&self.service) {
            trace!(address = %adv.address, "Ignoring advertisement without interaction service");
            return None;
        }

        let name = adv.name().unwrap_or_default();
        if let Some(filter) = &self.name_filter
            && !name.to_lowercase().contains(filter.as_str())
        {
            trace!(address = %adv.address, name = %name, "Name does not match filter");
            return None;
        }

        self.seen.insert(adv.address.clone());
        Some(DiscoveredDevice {
            address: adv.address.clone(),
            name,
            rssi: adv.rssi,
        })
    }
}
