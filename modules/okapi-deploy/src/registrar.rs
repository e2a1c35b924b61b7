//! Registering where a module instance listens (`/_/discovery/modules`).

use busybee_http::StatusCode;
use tracing::instrument;
use uuid::Uuid;

use crate::client::OkapiClient;
use crate::error::DeployError;
use crate::model::{DeploymentDescriptor, Module};

impl OkapiClient {
    /// Tell Okapi that `module` is reachable at `http://<deploy_host>:<http_port>`.
    ///
    /// Returns the registered record, or `None` for Okapi itself, which needs
    /// no deployment. Sends exactly one POST and never retries it.
    ///
    /// # Errors
    /// - [`DeployError::NotRegistered`] if the module has no descriptor (no request is made)
    /// - [`DeployError::Deployment`] unless Okapi answers 201
    /// - [`DeployError::Http`] on transport failure
    #[instrument(skip_all, fields(module = %module))]
    pub async fn deploy_module_to_http_loc(
        &self,
        module: &Module,
    ) -> Result<Option<DeploymentDescriptor>, DeployError> {
        let Some(deployable) = module.as_deployable() else {
            tracing::info!("Okapi does not need to be deployed");
            return Ok(None);
        };
        let module_id = deployable.module_id()?;

        let record = DeploymentDescriptor {
            inst_id: Uuid::new_v4().to_string(),
            srvc_id: module_id.to_owned(),
            url: format!("http://{}:{}", self.deploy_host(), deployable.http_port),
        };

        tracing::info!(
            module_id,
            url = %record.url,
            inst_id = %record.inst_id,
            "setting module deployment location"
        );

        let resp = self
            .post(&self.endpoint(&["_", "discovery", "modules"])?)
            .json(&record)?
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let body = resp.text().await?;
            tracing::error!(module_id, %status, "deployment registration rejected");
            return Err(DeployError::Deployment { status, body });
        }

        Ok(Some(record))
    }
}
