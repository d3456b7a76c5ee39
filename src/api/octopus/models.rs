//! Raw response shapes of the Kraken GraphQL and the public REST API.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, VecSkipError, serde_as};

use crate::{
    core::{
        account::{Account, LivePower, SmartDevice},
        interval::{ConsumptionSample, DispatchInterval, Interval, SavingSessionWindow},
    },
    prelude::*,
    quantity::{
        currency::{Pence, Pounds},
        energy::KilowattHours,
        power::Watts,
        rate::KilowattHourRate,
    },
};

/// Generic GraphQL response envelope.
#[derive(Deserialize)]
pub struct GraphQlResponse<D> {
    data: Option<D>,

    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<D> GraphQlResponse<D> {
    /// First error message, if the server reported any.
    pub fn error_message(&self) -> Option<&str> {
        self.errors.first().map(|error| error.message.as_str())
    }
}

impl<D> From<GraphQlResponse<D>> for Result<D> {
    fn from(response: GraphQlResponse<D>) -> Self {
        if let Some(message) = response.error_message() {
            bail!(r#"Kraken error ("{message}")"#);
        }
        response.data.context("the response contains neither data nor errors")
    }
}

#[derive(Deserialize)]
pub struct ObtainTokenData {
    #[serde(rename = "obtainKrakenToken")]
    pub obtain_token: ObtainToken,
}

#[derive(Deserialize)]
pub struct ObtainToken {
    pub token: String,
}

#[derive(Deserialize)]
pub struct AccountData {
    pub account: AccountNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    /// Pence, positive when in credit.
    pub balance: f64,

    #[serde(default)]
    pub billing_name: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub properties: Vec<Property>,
}

impl AccountNode {
    pub fn into_account(self, number: &str) -> Account {
        Account {
            number: number.to_string(),
            balance: Pounds::from(Pence(self.balance)),
            name: self.billing_name.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            address: self
                .properties
                .into_iter()
                .next()
                .and_then(|property| property.address)
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub electricity_meter_points: Vec<MeterPoint>,
}

#[derive(Deserialize)]
pub struct MeterPoint {
    #[serde(default)]
    pub meters: Vec<Meter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    #[serde(default)]
    pub smart_devices: Vec<MeterDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDevice {
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Deserialize)]
pub struct MeterDevicesData {
    pub account: MeterDevicesAccount,
}

#[derive(Deserialize)]
pub struct MeterDevicesAccount {
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl MeterDevicesAccount {
    /// First non-empty smart-meter device ID across all properties.
    pub fn into_first_device_id(self) -> Option<String> {
        self.properties
            .into_iter()
            .flat_map(|property| property.electricity_meter_points)
            .flat_map(|meter_point| meter_point.meters)
            .flat_map(|meter| meter.smart_devices)
            .find_map(|device| device.device_id.filter(|device_id| !device_id.is_empty()))
    }
}

#[derive(Deserialize)]
pub struct AgreementsData {
    pub account: AgreementsAccount,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementsAccount {
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub electricity_agreements: Vec<Agreement>,
}

#[derive(Deserialize)]
pub struct Agreement {
    pub tariff: Option<TariffNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffNode {
    #[serde(default)]
    pub display_name: Option<String>,

    pub product_code: String,

    /// Pence per day.
    #[serde(default)]
    pub standing_charge: f64,
}

/// Standard unit rates page of the REST products endpoint.
#[serde_as]
#[derive(Deserialize)]
pub struct UnitRates {
    #[serde_as(as = "VecSkipError<_>")]
    pub results: Vec<UnitRate>,
}

#[derive(Deserialize)]
pub struct UnitRate {
    pub value_inc_vat: f64,
}

/// Rates below this are considered off-peak.
const OFF_PEAK_THRESHOLD: KilowattHourRate = KilowattHourRate(15.0);

/// Parsed peak and off-peak unit rates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RateBands {
    pub off_peak: Option<KilowattHourRate>,
    pub peak: Option<KilowattHourRate>,
}

impl UnitRates {
    /// Classify the most recent rates, the later value wins within a band.
    pub fn bands(&self) -> RateBands {
        let mut bands = RateBands::default();
        for rate in self.results.iter().take(4) {
            let rate = KilowattHourRate(rate.value_inc_vat);
            if rate < OFF_PEAK_THRESHOLD {
                bands.off_peak = Some(rate);
            } else {
                bands.peak = Some(rate);
            }
        }
        bands
    }
}

/// Half-hourly consumption page of the REST meter endpoint.
#[serde_as]
#[derive(Deserialize)]
pub struct ConsumptionPage {
    #[serde_as(as = "VecSkipError<_>")]
    pub results: Vec<RawConsumption>,
}

#[derive(Deserialize)]
pub struct RawConsumption {
    pub interval_start: DateTime<FixedOffset>,
    pub interval_end: DateTime<FixedOffset>,
    pub consumption: f64,
}

impl RawConsumption {
    pub fn into_sample(self) -> Option<ConsumptionSample> {
        let sample = Interval::try_new(self.interval_start, self.interval_end).and_then(|interval| {
            ConsumptionSample::try_new(interval, KilowattHours(self.consumption))
        });
        if sample.is_none() {
            warn!(
                start = ?self.interval_start,
                end = ?self.interval_end,
                consumption = self.consumption,
                "dropping the malformed consumption reading",
            );
        }
        sample
    }
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDispatchesData {
    #[serde_as(as = "Option<VecSkipError<_>>")]
    pub planned_dispatches: Option<Vec<RawDispatch>>,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDispatchesData {
    #[serde_as(as = "Option<VecSkipError<_>>")]
    pub completed_dispatches: Option<Vec<RawDispatch>>,
}

#[serde_as]
#[derive(Deserialize)]
pub struct RawDispatch {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,

    /// Kilowatt-hours, sent as a string by the API.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub delta: Option<f64>,

    #[serde(default)]
    pub source: Option<String>,
}

impl RawDispatch {
    pub fn into_dispatch(self) -> Option<DispatchInterval> {
        let Some(interval) = Interval::try_new(self.start, self.end) else {
            warn!(start = ?self.start, end = ?self.end, "dropping the inverted dispatch");
            return None;
        };
        Some(DispatchInterval {
            interval,
            source: self.source.unwrap_or_else(|| "smart-charge".to_string()),
            delta: self.delta.map(KilowattHours),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingSessionsData {
    #[serde(default)]
    pub saving_sessions: Option<SavingSessions>,
}

#[serde_as]
#[derive(Deserialize)]
pub struct SavingSessions {
    #[serde_as(as = "Option<VecSkipError<_>>")]
    pub events: Option<Vec<RawSavingSession>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSavingSession {
    #[serde(default)]
    pub code: Option<String>,

    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,

    #[serde(default)]
    pub reward_per_kwh_in_octo_points: Option<u32>,
}

impl RawSavingSession {
    pub fn into_window(self) -> Option<SavingSessionWindow> {
        let Some(interval) = Interval::try_new(self.start_at, self.end_at) else {
            warn!(start = ?self.start_at, end = ?self.end_at, "dropping the inverted session");
            return None;
        };
        Some(SavingSessionWindow {
            code: self.code.unwrap_or_default(),
            interval,
            reward_per_kwh: self.reward_per_kwh_in_octo_points.unwrap_or_default(),
        })
    }
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryData {
    #[serde_as(as = "Option<VecSkipError<_>>")]
    pub smart_meter_telemetry: Option<Vec<Telemetry>>,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub read_at: DateTime<FixedOffset>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub demand: Option<f64>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub consumption: Option<f64>,
}

impl From<Telemetry> for LivePower {
    fn from(telemetry: Telemetry) -> Self {
        Self {
            demand: Watts(telemetry.demand.unwrap_or_default()),
            read_at: telemetry.read_at,
            consumption: telemetry.consumption.map(KilowattHours),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartDevicesData {
    #[serde(default)]
    pub registered_krakenflex_device: Option<FlexDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexDevice {
    pub krakenflex_device_id: String,
    pub provider: String,

    #[serde(default)]
    pub status: Option<String>,
}

impl From<FlexDevice> for SmartDevice {
    fn from(device: FlexDevice) -> Self {
        Self {
            device_id: device.krakenflex_device_id,
            provider: device.provider,
            status: device.status.unwrap_or_else(|| "ACTIVE".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_deserialize_account_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "data": {
                    "account": {
                        "balance": -4250,
                        "billingName": "Ada Lovelace",
                        "status": "ACTIVE",
                        "properties": [{"address": "1 Example Street"}]
                    }
                }
            }
        "#;
        let response = serde_json::from_str::<GraphQlResponse<AccountData>>(RESPONSE)?;
        let data = Result::<AccountData>::from(response)?;
        let account = data.account.into_account("A-1234ABCD");
        assert_abs_diff_eq!(account.balance.0, -42.5);
        assert!(!account.is_credit());
        assert_eq!(account.address, "1 Example Street");
        Ok(())
    }

    #[test]
    fn test_graphql_errors() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "errors": [{"message": "Invalid data.", "extensions": {"errorCode": "KT-CT-1139"}}],
                "data": null
            }
        "#;
        let response = serde_json::from_str::<GraphQlResponse<ObtainTokenData>>(RESPONSE)?;
        assert_eq!(response.error_message(), Some("Invalid data."));
        let error = Result::<ObtainTokenData>::from(response).err().map(|error| error.to_string());
        assert_eq!(error.as_deref(), Some(r#"Kraken error ("Invalid data.")"#));
        Ok(())
    }

    #[test]
    fn test_deserialize_dispatches_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "plannedDispatches": [
                    {"start": "2025-01-15T23:30:00+00:00", "end": "2025-01-16T01:00:00+00:00", "delta": "-6.5", "source": "smart-charge"},
                    {"start": "not a date", "end": "2025-01-16T03:00:00+00:00"},
                    {"start": "2025-01-16T04:00:00+00:00", "end": "2025-01-16T03:00:00+00:00"},
                    {"start": "2025-01-16T03:00:00Z", "end": "2025-01-16T03:30:00Z", "delta": -1.25}
                ]
            }
        "#;
        let data = serde_json::from_str::<PlannedDispatchesData>(RESPONSE)?;
        let dispatches = data
            .planned_dispatches
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawDispatch::into_dispatch)
            .collect::<Vec<_>>();
        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].delta, Some(KilowattHours(-6.5)));
        assert_eq!(dispatches[0].source, "smart-charge");
        assert_eq!(dispatches[1].delta, Some(KilowattHours(-1.25)));
        assert_eq!(dispatches[1].source, "smart-charge");
        Ok(())
    }

    #[test]
    fn test_deserialize_null_dispatches_ok() -> Result {
        let data = serde_json::from_str::<PlannedDispatchesData>(r#"{"plannedDispatches": null}"#)?;
        assert!(data.planned_dispatches.is_none());
        Ok(())
    }

    #[test]
    fn test_deserialize_saving_sessions_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "savingSessions": {
                    "events": [
                        {"code": "EVENT_42", "startAt": "2025-01-15T17:00:00+00:00", "endAt": "2025-01-15T18:00:00+00:00", "rewardPerKwhInOctoPoints": 1800},
                        {"code": "BROKEN", "startAt": null, "endAt": "2025-01-15T18:00:00+00:00"}
                    ]
                }
            }
        "#;
        let data = serde_json::from_str::<SavingSessionsData>(RESPONSE)?;
        let sessions = data
            .saving_sessions
            .and_then(|sessions| sessions.events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawSavingSession::into_window)
            .collect::<Vec<_>>();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].code, "EVENT_42");
        assert_eq!(sessions[0].reward_per_kwh, 1800);
        Ok(())
    }

    #[test]
    fn test_deserialize_consumption_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "count": 3,
                "next": null,
                "previous": null,
                "results": [
                    {"consumption": 0.212, "interval_start": "2025-01-14T23:30:00Z", "interval_end": "2025-01-15T00:00:00Z"},
                    {"consumption": -0.1, "interval_start": "2025-01-14T23:00:00Z", "interval_end": "2025-01-14T23:30:00Z"},
                    {"consumption": "oops", "interval_start": "2025-01-14T22:30:00Z", "interval_end": "2025-01-14T23:00:00Z"}
                ]
            }
        "#;
        let page = serde_json::from_str::<ConsumptionPage>(RESPONSE)?;
        assert_eq!(page.results.len(), 2);
        let samples =
            page.results.into_iter().filter_map(RawConsumption::into_sample).collect::<Vec<_>>();
        assert_eq!(samples.len(), 1);
        assert_abs_diff_eq!(samples[0].consumption.0, 0.212);
        Ok(())
    }

    #[test]
    fn test_unit_rate_bands() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "results": [
                    {"value_exc_vat": 6.67, "value_inc_vat": 7.0, "valid_from": "2025-01-15T23:30:00Z"},
                    {"value_exc_vat": 27.62, "value_inc_vat": 29.0, "valid_from": "2025-01-15T05:30:00Z"},
                    {"value_exc_vat": 6.67, "value_inc_vat": 7.5, "valid_from": "2025-01-14T23:30:00Z"},
                    {"value_exc_vat": 27.62, "value_inc_vat": 28.5, "valid_from": "2025-01-14T05:30:00Z"},
                    {"value_exc_vat": 1.0, "value_inc_vat": 1.05, "valid_from": "2025-01-13T23:30:00Z"}
                ]
            }
        "#;
        let bands = serde_json::from_str::<UnitRates>(RESPONSE)?.bands();
        assert_eq!(bands.off_peak, Some(KilowattHourRate(7.5)));
        assert_eq!(bands.peak, Some(KilowattHourRate(28.5)));
        Ok(())
    }

    #[test]
    fn test_discover_meter_device() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "account": {
                    "properties": [
                        {"electricityMeterPoints": [{"meters": [{"smartDevices": []}]}]},
                        {"electricityMeterPoints": [{"meters": [{"smartDevices": [{"deviceId": ""}, {"deviceId": "00-11-22"}]}]}]}
                    ]
                }
            }
        "#;
        let data = serde_json::from_str::<MeterDevicesData>(RESPONSE)?;
        assert_eq!(data.account.into_first_device_id().as_deref(), Some("00-11-22"));
        Ok(())
    }

    #[test]
    fn test_deserialize_telemetry_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {
                "smartMeterTelemetry": [
                    {"readAt": "2025-01-15T12:00:00+00:00", "demand": "1520.0", "consumption": null},
                    {"readAt": "2025-01-15T12:00:10+00:00", "demand": 1480, "consumption": "0.004"}
                ]
            }
        "#;
        let telemetry = serde_json::from_str::<TelemetryData>(RESPONSE)?
            .smart_meter_telemetry
            .unwrap_or_default();
        assert_eq!(telemetry.len(), 2);
        let live_power = telemetry.into_iter().last().map(LivePower::from).unwrap();
        assert_eq!(live_power.demand, Watts(1480.0));
        assert_eq!(live_power.consumption, Some(KilowattHours(0.004)));
        Ok(())
    }

    #[test]
    fn test_deserialize_smart_device_ok() -> Result {
        // language=json
        const RESPONSE: &str = r#"
            {"registeredKrakenflexDevice": {"krakenflexDeviceId": "1234", "provider": "OHME"}}
        "#;
        let device = serde_json::from_str::<SmartDevicesData>(RESPONSE)?
            .registered_krakenflex_device
            .map(SmartDevice::from)
            .unwrap();
        assert_eq!(device.provider, "OHME");
        assert_eq!(device.status, "ACTIVE");
        Ok(())
    }
}
