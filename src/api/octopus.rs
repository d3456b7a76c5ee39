mod models;
mod queries;
mod token;

use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose::STANDARD};
use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::{Serialize, de::DeserializeOwned};
use tracing::Level;
use ureq::Agent;

use self::{
    models::{
        AccountData,
        AgreementsData,
        CompletedDispatchesData,
        ConsumptionPage,
        GraphQlResponse,
        MeterDevicesData,
        ObtainTokenData,
        PlannedDispatchesData,
        RawConsumption,
        RawDispatch,
        RawSavingSession,
        SavingSessionsData,
        SmartDevicesData,
        TelemetryData,
        UnitRates,
    },
    queries::Operation,
    token::TokenCache,
};
pub use self::models::RateBands;
use crate::{
    core::{
        account::{Account, LivePower, SmartDevice},
        interval::{ConsumptionSample, DispatchInterval, RateWindow, SavingSessionWindow},
        snapshot::Refresh,
        tariff::Tariff,
    },
    prelude::*,
    quantity::currency::Pence,
};

const GRAPHQL_URL: &str = "https://api.octopus.energy/v1/graphql/";
const REST_URL: &str = "https://api.octopus.energy/v1";

/// Number of completed dispatches kept for the charge history.
const N_COMPLETED_DISPATCHES: usize = 5;

/// Transport failure, split into the two categories the callers act upon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API key or the token has been rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Anything else: network, HTTP status, GraphQL errors, or an unexpected response.
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl Error {
    fn from_transport(error: ureq::Error, action: &str) -> Self {
        match error {
            ureq::Error::StatusCode(401) => {
                Self::Authentication(format!("failed to {action}: HTTP 401"))
            }
            error => {
                Self::Request(anyhow::Error::new(error).context(format!("failed to {action}")))
            }
        }
    }
}

/// Electricity meter identification for the consumption endpoint.
#[derive(Clone, Debug)]
pub struct Meter {
    pub mpan: String,
    pub serial_number: String,
}

/// What a full refresh fetches.
#[derive(Clone, Debug, Builder)]
pub struct RefreshOptions {
    #[builder(into)]
    pub region: String,

    #[builder(default)]
    pub off_peak_window: RateWindow,

    /// Consumption is skipped without a meter.
    pub meter: Option<Meter>,

    #[builder(default = 96)]
    pub consumption_periods: usize,

    /// Home Mini device, discovered from the account when not set.
    #[builder(into)]
    pub device_id: Option<String>,

    /// Set to `false` once the account is known to have no Home Mini.
    #[builder(default = true)]
    pub live_power: bool,
}

/// Octopus Energy API client: Kraken GraphQL and the public REST API.
pub struct Api {
    client: Agent,
    account: String,
    api_key: String,

    /// Pre-built REST `Authorization` header: the API key as the user name, empty password.
    basic_authorization: String,

    tokens: TokenCache,
}

impl Api {
    pub fn new(api_key: String, account: String) -> Self {
        let client =
            Agent::config_builder().timeout_global(Some(Duration::from_secs(10))).build().into();
        let basic_authorization = format!("Basic {}", STANDARD.encode(format!("{api_key}:")));
        Self { client, account, api_key, basic_authorization, tokens: TokenCache::default() }
    }

    /// Fetch everything the snapshot needs.
    ///
    /// All requests complete before the result is returned. The extras (live power, smart
    /// devices and charge history) degrade to empty on request failures.
    #[instrument(skip_all)]
    pub fn refresh(&self, options: &RefreshOptions) -> Result<Refresh, Error> {
        let account = self.get_account()?;
        let tariff = self.get_tariff(&options.region, options.off_peak_window)?;
        let dispatches = self.get_dispatches()?;
        let saving_sessions = self.get_saving_sessions()?;
        let consumption = if let Some(meter) = &options.meter {
            self.get_consumption(meter, options.consumption_periods)?
        } else {
            debug!("no meter configured, skipping consumption");
            Vec::new()
        };
        let completed_dispatches = degrade(
            "completed dispatches",
            self.get_completed_dispatches(N_COMPLETED_DISPATCHES),
        )?;
        let live_power = degrade("live power", self.get_configured_live_power(options))?;
        let devices = degrade("smart devices", self.get_smart_devices())?;

        Ok(Refresh::builder()
            .account(account)
            .maybe_tariff(tariff)
            .dispatches(dispatches)
            .completed_dispatches(completed_dispatches)
            .saving_sessions(saving_sessions)
            .maybe_live_power(live_power)
            .consumption(consumption)
            .devices(devices)
            .build())
    }

    #[instrument(skip_all, fields(account = %self.account))]
    pub fn get_account(&self) -> Result<Account, Error> {
        let data: AccountData = self.graphql(&queries::GET_ACCOUNT, self.account_variables())?;
        let account = data.account.into_account(&self.account);
        info!(balance = %account.balance, status = %account.status, "fetched");
        Ok(account)
    }

    /// Fetch the active electricity tariff with its unit rates.
    ///
    /// Returns [`None`] when the account has no active agreement.
    #[instrument(skip_all, fields(region = region))]
    pub fn get_tariff(
        &self,
        region: &str,
        off_peak_window: RateWindow,
    ) -> Result<Option<Tariff>, Error> {
        let data: AgreementsData = self.graphql(&queries::GET_TARIFF, self.account_variables())?;
        let Some(node) = data
            .account
            .electricity_agreements
            .into_iter()
            .next()
            .and_then(|agreement| agreement.tariff)
        else {
            warn!("no active electricity agreement");
            return Ok(None);
        };

        let bands = self.get_unit_rates(&node.product_code, region).unwrap_or_else(|error| {
            warn!("failed to fetch the unit rates, using the defaults: {error:#}");
            RateBands::default()
        });
        let tariff = Tariff::builder()
            .display_name(node.display_name.unwrap_or_else(|| "Unknown".to_string()))
            .product_code(node.product_code)
            .standing_charge(Pence(node.standing_charge))
            .maybe_off_peak_rate(bands.off_peak)
            .maybe_peak_rate(bands.peak)
            .off_peak_window(off_peak_window)
            .build();
        info!(
            product_code = %tariff.product_code,
            off_peak_rate = ?tariff.off_peak_rate,
            peak_rate = ?tariff.peak_rate,
            "fetched",
        );
        Ok(Some(tariff))
    }

    #[instrument(skip_all, fields(product_code = product_code, region = region))]
    pub fn get_unit_rates(&self, product_code: &str, region: &str) -> Result<RateBands, Error> {
        let tariff_code = format!("E-1R-{product_code}-{region}");
        let path = format!(
            "products/{product_code}/electricity-tariffs/{tariff_code}/standard-unit-rates/",
        );
        let rates: UnitRates = self.rest(&path, &[("page_size", "10")])?;
        Ok(rates.bands())
    }

    /// Fetch the most recent half-hourly readings.
    #[instrument(skip_all, fields(mpan = %meter.mpan, n_periods = n_periods))]
    pub fn get_consumption(
        &self,
        meter: &Meter,
        n_periods: usize,
    ) -> Result<Vec<ConsumptionSample>, Error> {
        let path = format!(
            "electricity-meter-points/{}/meters/{}/consumption/",
            meter.mpan, meter.serial_number,
        );
        let page_size = n_periods.to_string();
        let page: ConsumptionPage = self.rest(&path, &[("page_size", page_size.as_str())])?;
        let samples =
            page.results.into_iter().filter_map(RawConsumption::into_sample).collect_vec();
        info!(n_samples = samples.len(), "fetched");
        Ok(samples)
    }

    /// Fetch the planned smart-charge dispatches, sorted by start time.
    #[instrument(skip_all)]
    pub fn get_dispatches(&self) -> Result<Vec<DispatchInterval>, Error> {
        let data: PlannedDispatchesData =
            self.graphql(&queries::GET_PLANNED_DISPATCHES, self.account_variables())?;
        let dispatches = data
            .planned_dispatches
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawDispatch::into_dispatch)
            .sorted_by_key(|dispatch| dispatch.interval.start)
            .collect_vec();
        info!(n_dispatches = dispatches.len(), "fetched");
        Ok(dispatches)
    }

    /// Fetch the most recent completed dispatches, latest first.
    #[instrument(skip_all, fields(limit = limit))]
    pub fn get_completed_dispatches(&self, limit: usize) -> Result<Vec<DispatchInterval>, Error> {
        let data: CompletedDispatchesData =
            self.graphql(&queries::GET_COMPLETED_DISPATCHES, self.account_variables())?;
        let dispatches = data
            .completed_dispatches
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawDispatch::into_dispatch)
            .sorted_by_key(|dispatch| std::cmp::Reverse(dispatch.interval.start))
            .take(limit)
            .collect_vec();
        info!(n_dispatches = dispatches.len(), "fetched");
        Ok(dispatches)
    }

    /// Fetch all saving-session events known to the account, past ones included.
    #[instrument(skip_all)]
    pub fn get_saving_sessions(&self) -> Result<Vec<SavingSessionWindow>, Error> {
        let data: SavingSessionsData =
            self.graphql(&queries::GET_SAVING_SESSIONS, self.account_variables())?;
        let sessions = data
            .saving_sessions
            .and_then(|sessions| sessions.events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawSavingSession::into_window)
            .collect_vec();
        info!(n_sessions = sessions.len(), "fetched");
        Ok(sessions)
    }

    /// Find the first smart-meter device registered on the account.
    #[instrument(skip_all)]
    pub fn discover_meter_device(&self) -> Result<Option<String>, Error> {
        let data: MeterDevicesData =
            self.graphql(&queries::GET_METER_DEVICES, self.account_variables())?;
        let device_id = data.account.into_first_device_id();
        info!(device_id = ?device_id, "discovered");
        Ok(device_id)
    }

    /// Fetch the latest Home Mini reading over the last half hour.
    #[instrument(skip_all, fields(device_id = ?device_id))]
    pub fn get_live_power(&self, device_id: Option<&str>) -> Result<Option<LivePower>, Error> {
        let device_id = if let Some(device_id) = device_id {
            device_id.to_string()
        } else if let Some(device_id) = self.discover_meter_device()? {
            device_id
        } else {
            debug!("no smart-meter device");
            return Ok(None);
        };

        let end = Utc::now();
        let variables =
            TelemetryVariables { device_id: &device_id, start: end - TimeDelta::minutes(30), end };
        let data: TelemetryData = self.graphql(&queries::GET_TELEMETRY, variables)?;
        let live_power =
            data.smart_meter_telemetry.unwrap_or_default().into_iter().last().map(LivePower::from);
        info!(demand = ?live_power.map(|live_power| live_power.demand), "fetched");
        Ok(live_power)
    }

    fn get_configured_live_power(
        &self,
        options: &RefreshOptions,
    ) -> Result<Option<LivePower>, Error> {
        if !options.live_power {
            trace!("live power is disabled");
            return Ok(None);
        }
        self.get_live_power(options.device_id.as_deref())
    }

    #[instrument(skip_all)]
    pub fn get_smart_devices(&self) -> Result<Vec<SmartDevice>, Error> {
        let data: SmartDevicesData =
            self.graphql(&queries::GET_SMART_DEVICES, self.account_variables())?;
        let devices =
            data.registered_krakenflex_device.into_iter().map(SmartDevice::from).collect_vec();
        info!(n_devices = devices.len(), "fetched");
        Ok(devices)
    }

    const fn account_variables(&self) -> AccountVariables<'_> {
        AccountVariables { account: self.account.as_str() }
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(operation = operation.name))]
    fn graphql<V: Serialize, D: DeserializeOwned>(
        &self,
        operation: &Operation,
        variables: V,
    ) -> Result<D, Error> {
        let token = self.tokens.get_or_obtain(Instant::now(), || self.obtain_token())?;
        let response = self
            .client
            .post(GRAPHQL_URL)
            .header("Authorization", token.as_str())
            .send_json(GraphQlRequest::new(operation, variables))
            .map_err(|error| {
                let error = Error::from_transport(error, &format!("call `{}`", operation.name));
                if matches!(error, Error::Authentication(_)) {
                    self.tokens.invalidate();
                }
                error
            })?
            .body_mut()
            .read_json::<GraphQlResponse<D>>()
            .with_context(|| format!("failed to deserialize `{}` response", operation.name))?;
        Ok(Result::<D>::from(response).with_context(|| format!("`{}` failed", operation.name))?)
    }

    #[instrument(skip_all)]
    fn obtain_token(&self) -> Result<String, Error> {
        info!("obtaining a new token…");

        let response = self
            .client
            .post(GRAPHQL_URL)
            .send_json(GraphQlRequest::new(
                &queries::OBTAIN_TOKEN,
                ObtainTokenVariables { key: &self.api_key },
            ))
            .map_err(|error| Error::from_transport(error, "obtain a token"))?
            .body_mut()
            .read_json::<GraphQlResponse<ObtainTokenData>>()
            .context("failed to deserialize the token response")?;
        if let Some(message) = response.error_message() {
            return Err(Error::Authentication(message.to_string()));
        }
        Ok(Result::<ObtainTokenData>::from(response)?.obtain_token.token)
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(path = path))]
    fn rest<D: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<D, Error> {
        let response = self
            .client
            .get(format!("{REST_URL}/{path}"))
            .header("Authorization", self.basic_authorization.as_str())
            .query_pairs(query.iter().copied())
            .call()
            .map_err(|error| Error::from_transport(error, &format!("get `{path}`")))?
            .body_mut()
            .read_json::<D>()
            .with_context(|| format!("failed to deserialize `{path}` response"))?;
        Ok(response)
    }
}

/// Swap a request failure for the empty value, keeping authentication failures.
fn degrade<T: Default>(what: &str, result: Result<T, Error>) -> Result<T, Error> {
    match result {
        Err(Error::Request(error)) => {
            warn!("failed to fetch the {what}, continuing without: {error:#}");
            Ok(T::default())
        }
        result => result,
    }
}

#[derive(Serialize)]
struct GraphQlRequest<V> {
    #[serde(rename = "operationName")]
    operation_name: &'static str,

    query: &'static str,

    variables: V,
}

impl<V> GraphQlRequest<V> {
    const fn new(operation: &Operation, variables: V) -> Self {
        Self { operation_name: operation.name, query: operation.query, variables }
    }
}

#[derive(Serialize)]
struct AccountVariables<'a> {
    account: &'a str,
}

#[derive(Serialize)]
struct ObtainTokenVariables<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct TelemetryVariables<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,

    start: DateTime<Utc>,
    end: DateTime<Utc>,
}
