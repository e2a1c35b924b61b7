use busybee_http::{HttpClient, HttpClientBuilder, RequestBuilder, TransportSecurity};
use url::Url;

use crate::config::{EnableConfig, EnableStrategy, OkapiConfig};
use crate::error::DeployError;

/// Header carrying the tenant a request acts as
pub const OKAPI_TENANT_HEADER: &str = "X-Okapi-Tenant";

const USER_AGENT: &str = concat!("busybee/", env!("CARGO_PKG_VERSION"));

/// Connection to one Okapi instance
///
/// Holds two HTTP clients: a plain one (no retries) for lookups,
/// registrations and installs, and one carrying the enable retry policy
/// used only by the check-then-create enable POST.
#[derive(Debug, Clone)]
pub struct OkapiClient {
    base: Url,
    supertenant: String,
    deploy_host: String,
    enable: EnableConfig,
    http: HttpClient,
    enable_http: HttpClient,
}

impl OkapiClient {
    /// # Errors
    /// Returns [`DeployError::InvalidServiceUrl`] for a malformed or non-HTTP(S)
    /// URL, [`DeployError::Config`] for invalid settings, and
    /// [`DeployError::Http`] if an HTTP client cannot be built.
    pub fn new(config: &OkapiConfig) -> Result<Self, DeployError> {
        config.validate()?;
        let base = parse_service_url(&config.url)?;

        let transport = if base.scheme() == "http" {
            TransportSecurity::AllowInsecureHttp
        } else {
            TransportSecurity::TlsOnly
        };
        let builder = HttpClientBuilder::new()
            .transport(transport)
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT);

        let http = builder.clone().retry(None).build()?;
        let enable_http = builder
            .retry(Some(config.enable.retry.to_retry_config()?))
            .build()?;

        tracing::debug!(okapi = %base, strategy = %config.enable.strategy, "okapi client ready");

        Ok(Self {
            base,
            supertenant: config.supertenant.clone(),
            deploy_host: config.deploy_host.clone(),
            enable: config.enable.clone(),
            http,
            enable_http,
        })
    }

    /// Same client with a different enable strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: EnableStrategy) -> Self {
        self.enable.strategy = strategy;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> EnableStrategy {
        self.enable.strategy
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub(crate) fn deploy_host(&self) -> &str {
        &self.deploy_host
    }

    pub(crate) fn enable_config(&self) -> &EnableConfig {
        &self.enable
    }

    /// Okapi URL for the given path segments, each percent-encoded
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, DeployError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| DeployError::InvalidServiceUrl {
                url: self.base.to_string(),
                reason: "URL cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn get(&self, url: &Url) -> RequestBuilder {
        self.http
            .get(url.as_str())
            .header(OKAPI_TENANT_HEADER, &self.supertenant)
    }

    pub(crate) fn post(&self, url: &Url) -> RequestBuilder {
        self.http
            .post(url.as_str())
            .header(OKAPI_TENANT_HEADER, &self.supertenant)
    }

    /// POST through the client that carries the enable retry policy
    pub(crate) fn post_with_retry(&self, url: &Url) -> RequestBuilder {
        self.enable_http
            .post(url.as_str())
            .header(OKAPI_TENANT_HEADER, &self.supertenant)
    }
}

fn parse_service_url(raw: &str) -> Result<Url, DeployError> {
    let invalid = |reason: String| DeployError::InvalidServiceUrl {
        url: raw.to_owned(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(invalid("missing host".to_owned()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".to_owned()));
    }
    Ok(url)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn client(url: &str) -> Result<OkapiClient, DeployError> {
        OkapiClient::new(&OkapiConfig {
            url: url.to_owned(),
            ..OkapiConfig::default()
        })
    }

    #[tokio::test]
    async fn endpoint_joins_segments_once() {
        for base in ["http://okapi:9130", "http://okapi:9130/"] {
            let okapi = client(base).unwrap();
            let url = okapi.endpoint(&["_", "discovery", "modules"]).unwrap();
            assert_eq!(url.as_str(), "http://okapi:9130/_/discovery/modules");
        }
    }

    #[tokio::test]
    async fn endpoint_keeps_base_path_and_encodes_segments() {
        let okapi = client("https://gateway.example.org/okapi").unwrap();
        let url = okapi
            .endpoint(&["_", "proxy", "tenants", "my tenant", "modules"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.example.org/okapi/_/proxy/tenants/my%20tenant/modules"
        );
    }

    #[tokio::test]
    async fn rejects_bad_service_urls() {
        for bad in ["localhost:9130", "ftp://okapi", "not a url", "http://okapi:9130/?x=1"] {
            assert!(
                matches!(client(bad), Err(DeployError::InvalidServiceUrl { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn invalid_config_rejected_before_url() {
        let result = OkapiClient::new(&OkapiConfig {
            supertenant: String::new(),
            ..OkapiConfig::default()
        });
        assert!(matches!(result, Err(DeployError::Config(_))));
    }

    #[tokio::test]
    async fn strategy_can_be_overridden() {
        let okapi = client("http://okapi:9130")
            .unwrap()
            .with_strategy(EnableStrategy::UnconditionalInstall);
        assert_eq!(okapi.strategy(), EnableStrategy::UnconditionalInstall);
    }
}
