use std::ops::Mul;

use crate::quantity::{currency::Pence, rate::KilowattHourRate};

quantity!(KilowattHours, "kWh");
zero!(KilowattHours);
rounding!(KilowattHours);

impl Mul<KilowattHourRate> for KilowattHours {
    type Output = Pence;

    fn mul(self, rhs: KilowattHourRate) -> Self::Output {
        Pence(self.0 * rhs.0)
    }
}
