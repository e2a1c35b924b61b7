//! Enabling modules for a tenant.

use busybee_http::{HttpResponse, StatusCode};
use serde_json::json;
use tracing::instrument;

use crate::client::OkapiClient;
use crate::config::EnableStrategy;
use crate::error::DeployError;
use crate::model::{EnableReport, Module, ModuleEnableState};

/// Okapi's answer for modules that are known but not launchable; treated as enabled.
const NO_LAUNCH_DESCRIPTOR: &str = "has no launchDescriptor";

impl OkapiClient {
    /// Make sure every module in `modules` is enabled for `tenant_id`.
    ///
    /// Modules are handled one at a time, in order; Okapi itself is skipped.
    /// The first failure aborts the run.
    ///
    /// # Errors
    /// - [`DeployError::NotRegistered`] for a module without descriptor
    /// - [`DeployError::Enable`] when Okapi refuses for any reason other than
    ///   a missing launch descriptor
    /// - [`DeployError::Http`] on transport failure
    #[instrument(skip_all, fields(tenant_id = %tenant_id, strategy = %self.strategy()))]
    pub async fn enable_modules_for_tenant(
        &self,
        tenant_id: &str,
        modules: &[Module],
    ) -> Result<EnableReport, DeployError> {
        tracing::info!("enabling modules for tenant");

        let mut report = EnableReport::new(tenant_id);
        for module in modules {
            let Some(deployable) = module.as_deployable() else {
                continue;
            };
            let module_id = deployable.module_id()?;

            let state = match self.strategy() {
                EnableStrategy::CheckThenCreate => {
                    self.check_then_create(tenant_id, module_id).await?
                }
                EnableStrategy::UnconditionalInstall => {
                    self.install(tenant_id, module_id).await?
                }
            };
            report.record(module_id, state);
        }

        tracing::info!(
            modules = report.modules.len(),
            newly_enabled = report.newly_enabled(),
            "tenant modules enabled"
        );
        Ok(report)
    }

    async fn check_then_create(
        &self,
        tenant_id: &str,
        module_id: &str,
    ) -> Result<ModuleEnableState, DeployError> {
        let lookup = self.endpoint(&["_", "proxy", "tenants", tenant_id, "modules", module_id])?;
        let status = self.get(&lookup).send().await?.status();
        if status != StatusCode::NOT_FOUND {
            tracing::info!(module_id, %status, "module is already enabled for tenant");
            return Ok(ModuleEnableState::AlreadyEnabled);
        }

        tracing::info!(module_id, "enabling module for tenant");
        let resp = self
            .post_with_retry(&self.endpoint(&["_", "proxy", "tenants", tenant_id, "modules"])?)
            .query("tenantParameters", self.enable_config().tenant_parameters())
            .json(&json!({ "id": module_id }))?
            .send()
            .await?;
        classify(resp, tenant_id, module_id).await
    }

    async fn install(
        &self,
        tenant_id: &str,
        module_id: &str,
    ) -> Result<ModuleEnableState, DeployError> {
        tracing::info!(module_id, "enabling module for tenant");
        let resp = self
            .post(&self.endpoint(&["_", "proxy", "tenants", tenant_id, "install"])?)
            .query("deploy", "false")
            .query("tenantParameters", self.enable_config().tenant_parameters())
            .json(&json!([{ "id": module_id, "action": "enable" }]))?
            .send()
            .await?;
        classify(resp, tenant_id, module_id).await
    }
}

async fn classify(
    resp: HttpResponse,
    tenant_id: &str,
    module_id: &str,
) -> Result<ModuleEnableState, DeployError> {
    let status = resp.status();
    if status == StatusCode::OK || status == StatusCode::CREATED {
        tracing::info!(module_id, "enabled module for tenant");
        return Ok(ModuleEnableState::Enabled);
    }

    let body = resp.text().await?;
    if body.contains(NO_LAUNCH_DESCRIPTOR) {
        tracing::warn!(module_id, %status, "module has no launch descriptor, treating as enabled");
        return Ok(ModuleEnableState::EnabledWithoutLaunchDescriptor);
    }

    tracing::error!(module_id, %status, "enable request rejected");
    Err(DeployError::Enable {
        module_id: module_id.to_owned(),
        tenant_id: tenant_id.to_owned(),
        status,
        body,
    })
}
