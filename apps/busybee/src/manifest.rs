//! Module manifest: the list of modules a `busybee` run works on.
//!
//! ```yaml
//! - kind: okapi
//! - kind: module
//!   name: mod-users
//!   http_port: 9131
//!   descriptor: descriptors/mod-users.json   # relative to this file
//! - kind: module
//!   name: mod-inventory
//!   http_port: 9132
//!   descriptor: { id: mod-inventory-20.0.0 }
//! ```

use anyhow::{Context, Result};
use okapi_deploy::{DeployableModule, Module, ModuleDescriptor};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Entry {
    Okapi,
    Module {
        name: String,
        http_port: u16,
        #[serde(default)]
        descriptor: Option<DescriptorSource>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptorSource {
    Inline(ModuleDescriptor),
    File(PathBuf),
}

/// Read a manifest; `.json` files are parsed as JSON, anything else as YAML.
///
/// # Errors
/// Fails if the manifest or a referenced descriptor cannot be read or parsed.
pub fn load(path: &Path) -> Result<Vec<Module>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;

    let entries: Vec<Entry> = if is_json(path) {
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?
    } else {
        serde_saphyr::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    entries
        .into_iter()
        .map(|entry| resolve(entry, base))
        .collect()
}

fn resolve(entry: Entry, base: &Path) -> Result<Module> {
    let Entry::Module {
        name,
        http_port,
        descriptor,
    } = entry
    else {
        return Ok(Module::Okapi);
    };

    let module = DeployableModule::new(name, http_port);
    let module = match descriptor {
        None => module,
        Some(DescriptorSource::Inline(descriptor)) => module.with_descriptor(descriptor),
        Some(DescriptorSource::File(file)) => {
            module.with_descriptor(read_descriptor(&base.join(file))?)
        }
    };
    Ok(module.into())
}

fn read_descriptor(path: &Path) -> Result<ModuleDescriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read module descriptor {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse module descriptor {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
