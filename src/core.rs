pub mod account;
pub mod consumption;
pub mod dispatch;
pub mod interval;
pub mod rate;
pub mod saving_session;
pub mod series;
pub mod snapshot;
pub mod tariff;
