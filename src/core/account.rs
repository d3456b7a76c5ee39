//! Account-level records that feed the snapshot alongside the interval data.

use chrono::{DateTime, FixedOffset};

use crate::quantity::{currency::Pounds, energy::KilowattHours, power::Watts};

#[derive(Clone, Debug)]
#[must_use]
pub struct Account {
    pub number: String,

    /// Positive means credit, negative means the customer owes.
    pub balance: Pounds,

    pub name: String,
    pub status: String,
    pub address: String,
}

impl Account {
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.balance > Pounds::ZERO
    }
}

/// Latest Home Mini telemetry reading.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct LivePower {
    pub demand: Watts,
    pub read_at: DateTime<FixedOffset>,
    pub consumption: Option<KilowattHours>,
}

/// Registered smart-charging device, such as an EV charger.
#[derive(Clone, Debug)]
#[must_use]
pub struct SmartDevice {
    pub device_id: String,
    pub provider: String,
    pub status: String,
}
