// Unit rate in pence per kilowatt-hour.
quantity!(KilowattHourRate, "p/kWh");

impl KilowattHourRate {
    /// Off-peak rate assumed when the tariff does not expose one.
    pub const DEFAULT_OFF_PEAK: Self = Self(7.0);

    /// Peak rate assumed when the tariff does not expose one.
    pub const DEFAULT_PEAK: Self = Self(30.0);
}
