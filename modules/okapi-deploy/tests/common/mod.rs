#![allow(dead_code, clippy::expect_used)]

use httpmock::MockServer;
use okapi_deploy::{
    DeployableModule, EnableStrategy, Module, ModuleDescriptor, OkapiClient, OkapiConfig,
    RetryPolicyConfig,
};
use std::time::Duration;

pub const TENANT: &str = "diku";

/// Client for the mock server with millisecond backoff
pub fn okapi(server: &MockServer, strategy: EnableStrategy) -> OkapiClient {
    okapi_at(&server.base_url(), strategy, fast_retry())
}

pub fn okapi_at(url: &str, strategy: EnableStrategy, retry: RetryPolicyConfig) -> OkapiClient {
    let mut config = OkapiConfig {
        url: url.to_owned(),
        request_timeout: Duration::from_secs(5),
        ..OkapiConfig::default()
    };
    config.enable.strategy = strategy;
    config.enable.retry = retry;
    OkapiClient::new(&config).expect("okapi client")
}

/// Default enable policy with millisecond delays
pub fn fast_retry() -> RetryPolicyConfig {
    RetryPolicyConfig {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        ..RetryPolicyConfig::default()
    }
}

pub fn registered(name: &str, port: u16, id: &str) -> Module {
    DeployableModule::new(name, port)
        .with_descriptor(ModuleDescriptor::new(id))
        .into()
}

pub fn unregistered(name: &str, port: u16) -> Module {
    DeployableModule::new(name, port).into()
}
