//! Kraken GraphQL operations.

pub struct Operation {
    pub name: &'static str,
    pub query: &'static str,
}

pub const OBTAIN_TOKEN: Operation = Operation {
    name: "ObtainToken",
    query: "mutation ObtainToken($key: String!) { obtainKrakenToken(input: {APIKey: $key}) { token } }",
};

pub const GET_ACCOUNT: Operation = Operation {
    name: "GetAccount",
    query: "query GetAccount($account: String!) { account(accountNumber: $account) { balance billingName status properties { address } } }",
};

pub const GET_TARIFF: Operation = Operation {
    name: "GetTariff",
    query: "query GetTariff($account: String!) { account(accountNumber: $account) { electricityAgreements(active: true) { tariff { ... on HalfHourlyTariff { displayName productCode standingCharge } ... on StandardTariff { displayName productCode standingCharge } } } } }",
};

pub const GET_PLANNED_DISPATCHES: Operation = Operation {
    name: "GetPlannedDispatches",
    query: "query GetPlannedDispatches($account: String!) { plannedDispatches(accountNumber: $account) { start end delta source } }",
};

pub const GET_COMPLETED_DISPATCHES: Operation = Operation {
    name: "GetCompletedDispatches",
    query: "query GetCompletedDispatches($account: String!) { completedDispatches(accountNumber: $account) { start end delta source } }",
};

pub const GET_SAVING_SESSIONS: Operation = Operation {
    name: "GetSavingSessions",
    query: "query GetSavingSessions($account: String!) { savingSessions(accountNumber: $account) { events { code startAt endAt rewardPerKwhInOctoPoints } } }",
};

pub const GET_METER_DEVICES: Operation = Operation {
    name: "GetMeterDevices",
    query: "query GetMeterDevices($account: String!) { account(accountNumber: $account) { properties { electricityMeterPoints { meters { smartDevices { deviceId } } } } } }",
};

pub const GET_TELEMETRY: Operation = Operation {
    name: "GetTelemetry",
    query: "query GetTelemetry($deviceId: String!, $start: DateTime!, $end: DateTime!) { smartMeterTelemetry(deviceId: $deviceId, grouping: HALF_HOURLY, start: $start, end: $end) { readAt demand consumption } }",
};

pub const GET_SMART_DEVICES: Operation = Operation {
    name: "GetSmartDevices",
    query: "query GetSmartDevices($account: String!) { registeredKrakenflexDevice(accountNumber: $account) { krakenflexDeviceId provider status } }",
};
