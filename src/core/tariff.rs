use bon::Builder;

use crate::{
    core::interval::RateWindow,
    quantity::{currency::Pence, rate::KilowattHourRate},
};

/// Snapshot of the active electricity tariff.
#[derive(Clone, Debug, Builder)]
#[must_use]
pub struct Tariff {
    #[builder(into)]
    pub display_name: String,

    #[builder(into)]
    pub product_code: String,

    /// Daily standing charge.
    pub standing_charge: Pence,

    pub off_peak_rate: Option<KilowattHourRate>,
    pub peak_rate: Option<KilowattHourRate>,

    #[builder(default)]
    pub off_peak_window: RateWindow,
}

impl Tariff {
    pub fn off_peak_rate_or_default(&self) -> KilowattHourRate {
        self.off_peak_rate.unwrap_or(KilowattHourRate::DEFAULT_OFF_PEAK)
    }

    pub fn peak_rate_or_default(&self) -> KilowattHourRate {
        self.peak_rate.unwrap_or(KilowattHourRate::DEFAULT_PEAK)
    }
}
