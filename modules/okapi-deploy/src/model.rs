//! Modules, descriptors and the records exchanged with Okapi.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeployError;

/// Okapi module descriptor (`ModuleDescriptor.json`)
///
/// Only `id` is interpreted; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ModuleDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A module that runs as its own process and listens on `http_port`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployableModule {
    pub name: String,
    pub http_port: u16,
    /// `None` until the module has been registered with Okapi
    pub descriptor: Option<ModuleDescriptor>,
}

impl DeployableModule {
    #[must_use]
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            http_port,
            descriptor: None,
        }
    }

    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ModuleDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Descriptor id of a registered module.
    ///
    /// # Errors
    /// Returns [`DeployError::NotRegistered`] if the module has no descriptor.
    pub fn module_id(&self) -> Result<&str, DeployError> {
        self.descriptor
            .as_ref()
            .map(|d| d.id.as_str())
            .ok_or_else(|| DeployError::NotRegistered {
                module: self.name.clone(),
            })
    }
}

/// Anything the deployer is asked to handle
#[derive(Debug, Clone, PartialEq)]
pub enum Module {
    /// Okapi itself. Never deployed or enabled.
    Okapi,
    Deployable(DeployableModule),
}

impl Module {
    #[must_use]
    pub fn as_deployable(&self) -> Option<&DeployableModule> {
        match self {
            Self::Okapi => None,
            Self::Deployable(module) => Some(module),
        }
    }
}

impl From<DeployableModule> for Module {
    fn from(module: DeployableModule) -> Self {
        Self::Deployable(module)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Okapi => f.write_str("okapi"),
            Self::Deployable(m) => write!(f, "{}:{}", m.name, m.http_port),
        }
    }
}

/// Body of `POST /_/discovery/modules`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDescriptor {
    pub inst_id: String,
    pub srvc_id: String,
    pub url: String,
}

/// Result of enabling one module for a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleEnableState {
    /// Okapi already had the module enabled; nothing was posted.
    AlreadyEnabled,
    /// The enable request returned 200 or 201.
    Enabled,
    /// Okapi refused with "has no launchDescriptor", which is tolerated.
    EnabledWithoutLaunchDescriptor,
}

/// Per-module outcome, in processing order. Okapi itself never appears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnableReport {
    pub tenant_id: String,
    pub modules: Vec<(String, ModuleEnableState)>,
}

impl EnableReport {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            modules: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, module_id: &str, state: ModuleEnableState) {
        self.modules.push((module_id.to_owned(), state));
    }

    #[must_use]
    pub fn state_of(&self, module_id: &str) -> Option<ModuleEnableState> {
        self.modules
            .iter()
            .find(|(id, _)| id == module_id)
            .map(|(_, state)| *state)
    }

    /// Number of modules that were enabled by this run
    #[must_use]
    pub fn newly_enabled(&self) -> usize {
        self.modules
            .iter()
            .filter(|(_, s)| *s != ModuleEnableState::AlreadyEnabled)
            .count()
    }
}
