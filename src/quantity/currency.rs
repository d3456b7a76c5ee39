quantity!(Pence, "p");
zero!(Pence);

quantity!(Pounds, "GBP");
zero!(Pounds);
rounding!(Pounds);

impl From<Pence> for Pounds {
    fn from(pence: Pence) -> Self {
        Self(pence.0 / 100.0)
    }
}
