#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Deploying and enabling modules against Okapi
//!
//! Two operations, run in sequence by a deployment pipeline:
//! - [`OkapiClient::deploy_module_to_http_loc`] registers where a module
//!   instance listens (`POST /_/discovery/modules`)
//! - [`OkapiClient::enable_modules_for_tenant`] enables a list of modules for
//!   a tenant, tolerating modules that are already enabled
//!
//! Both skip [`Module::Okapi`]. Logging goes through `tracing`; installing a
//! subscriber is left to the caller.
//!
//! ```ignore
//! let okapi = OkapiClient::new(&OkapiConfig::default())?;
//! for module in &modules {
//!     okapi.deploy_module_to_http_loc(module).await?;
//! }
//! let report = okapi.enable_modules_for_tenant("diku", &modules).await?;
//! ```

mod client;
pub mod config;
mod enabler;
pub mod error;
pub mod model;
mod registrar;

pub use client::{OKAPI_TENANT_HEADER, OkapiClient};
pub use config::{EnableConfig, EnableStrategy, OkapiConfig, RetryPolicyConfig};
pub use error::{ConfigError, DeployError};
pub use model::{
    DeployableModule, DeploymentDescriptor, EnableReport, Module, ModuleDescriptor,
    ModuleEnableState,
};

/// Register `module` with the Okapi at `service_url`, using default settings otherwise.
///
/// # Errors
/// See [`OkapiClient::new`] and [`OkapiClient::deploy_module_to_http_loc`].
pub async fn deploy_module_to_http_loc(
    service_url: &str,
    module: &Module,
) -> Result<Option<DeploymentDescriptor>, DeployError> {
    client_for(service_url)?
        .deploy_module_to_http_loc(module)
        .await
}

/// Enable `modules` for `tenant_id` on the Okapi at `service_url`, using default settings otherwise.
///
/// # Errors
/// See [`OkapiClient::new`] and [`OkapiClient::enable_modules_for_tenant`].
pub async fn enable_modules_for_tenant(
    service_url: &str,
    tenant_id: &str,
    modules: &[Module],
) -> Result<EnableReport, DeployError> {
    client_for(service_url)?
        .enable_modules_for_tenant(tenant_id, modules)
        .await
}

fn client_for(service_url: &str) -> Result<OkapiClient, DeployError> {
    OkapiClient::new(&OkapiConfig {
        url: service_url.to_owned(),
        ..OkapiConfig::default()
    })
}
