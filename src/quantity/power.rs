use std::ops::Mul;

use crate::quantity::{currency::Pence, rate::KilowattHourRate};

quantity!(Watts, "W");

impl Mul<KilowattHourRate> for Watts {
    /// Running cost per hour.
    type Output = Pence;

    fn mul(self, rate: KilowattHourRate) -> Self::Output {
        Pence(self.0 * 0.001 * rate.0)
    }
}
