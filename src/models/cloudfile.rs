//! Cloudfile: the per-project manifest describing clouds, servers and
//! databases.
//!
//! The file is a YAML mapping keyed by cloud code name:
//!
//! ```yaml
//! foo-staging:
//!   ruby_version: 2.0.0
//!   environment: production
//!   domains:
//!     - foo-staging.shellyapp.com
//!   servers:
//!     app1:
//!       size: small
//!       thin: 2
//!       databases:
//!         - postgresql
//! ```
//!
//! Reading keeps the order of clouds as written. Writing never rewrites
//! existing content: new clouds are rendered from a template (so the comments
//! survive) and appended.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const CLOUDFILE_NAME: &str = "Cloudfile";

/// Settings of one server inside a cloud.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerSettings {
    pub size: Option<String>,
    pub thin: Option<u32>,
    pub puma: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub databases: Vec<String>,
    pub delayed_job: Option<Value>,
    pub sidekiq: Option<Value>,
    pub clockwork: Option<Value>,
    pub whenever: Option<Value>,
}

impl ServerSettings {
    /// Whether a background-job option key is set on this server.
    pub fn has_option(&self, option: &str) -> bool {
        match option {
            "delayed_job" => self.delayed_job.is_some(),
            "sidekiq" => self.sidekiq.is_some(),
            "clockwork" => self.clockwork.is_some(),
            "whenever" => self.whenever.is_some(),
            _ => false,
        }
    }
}

/// Definition of a single cloud in the Cloudfile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CloudDefinition {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub ruby_version: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub domains: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub servers: BTreeMap<String, ServerSettings>,
}

impl CloudDefinition {
    /// Every database kind used by any server, without duplicates.
    pub fn databases(&self) -> Vec<String> {
        let mut databases: Vec<String> = Vec::new();
        for settings in self.servers.values() {
            for kind in &settings.databases {
                if !databases.contains(kind) {
                    databases.push(kind.clone());
                }
            }
        }
        databases
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.servers.values().any(|s| s.has_option(option))
    }
}

/// Empty keys (`domains:` with no items) read as the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `ruby_version: 2.0` is a YAML float; keep it as written.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone)]
pub struct Cloudfile {
    path: PathBuf,
}

impl Cloudfile {
    /// Cloudfile of the project in `dir`. The file does not need to exist.
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join(CLOUDFILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn present(&self) -> bool {
        self.path.is_file()
    }

    fn content(&self) -> Result<Mapping> {
        if !self.present() {
            return Ok(Mapping::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }

        match serde_yaml::from_str::<Value>(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?
        {
            Value::Mapping(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => anyhow::bail!("{} must be a mapping of clouds", self.path.display()),
        }
    }

    /// Code names of all clouds, in file order.
    pub fn clouds(&self) -> Result<Vec<String>> {
        Ok(self
            .content()?
            .keys()
            .filter_map(|key| match key {
                Value::String(name) => Some(name.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect())
    }

    pub fn definition(&self, code_name: &str) -> Result<Option<CloudDefinition>> {
        let content = self.content()?;
        let Some(value) = content.get(code_name) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(Some(CloudDefinition::default()));
        }

        let definition = serde_yaml::from_value(value.clone())
            .with_context(|| format!("Invalid definition of cloud '{code_name}' in Cloudfile"))?;
        Ok(Some(definition))
    }

    /// Append rendered cloud definitions, creating the file if needed.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut content = if self.present() {
            std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?
        } else {
            String::new()
        };

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(text);
        if !content.ends_with('\n') {
            content.push('\n');
        }

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Answers collected by `shelly add`, rendered into a Cloudfile section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudfileEntry {
    pub code_name: String,
    pub ruby_version: String,
    pub environment: String,
    pub domains: Vec<String>,
    pub size: String,
    pub databases: Vec<String>,
}

impl CloudfileEntry {
    fn workers(&self) -> (&'static str, u32) {
        let small = self.size == "small";
        if self.ruby_version == "jruby" {
            ("puma", if small { 1 } else { 2 })
        } else {
            ("thin", if small { 2 } else { 4 })
        }
    }

    /// Render the section. Small clouds run everything on `app1`; large
    /// clouds get a dedicated server per database kind.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let (server, workers) = self.workers();

        // writeln! into a String cannot fail
        let _ = writeln!(out, "{}:", self.code_name);
        let _ = writeln!(
            out,
            "  ruby_version: {} # 2.0.0, jruby, 1.9.3, 1.9.2 or ree-1.8.7",
            self.ruby_version
        );
        let _ = writeln!(out, "  environment: {} # RAILS_ENV", self.environment);
        out.push_str("  domains:\n");
        for domain in &self.domains {
            let _ = writeln!(out, "    - {domain}");
        }
        out.push_str("  servers:\n");
        out.push_str("    app1:\n");
        let _ = writeln!(out, "      size: {}", self.size);
        let _ = writeln!(out, "      {server}: {workers}");
        out.push_str("      # delayed_job: 1\n");
        out.push_str("      # sidekiq: 1\n");
        out.push_str("      # clockwork: on\n");
        out.push_str("      # whenever: on\n");

        if self.size == "small" {
            if !self.databases.is_empty() {
                out.push_str("      databases:\n");
                for kind in &self.databases {
                    let _ = writeln!(out, "        - {kind}");
                }
            }
        } else {
            for kind in &self.databases {
                let _ = writeln!(out, "    {kind}:");
                let _ = writeln!(out, "      size: {}", self.size);
                out.push_str("      databases:\n");
                let _ = writeln!(out, "        - {kind}");
            }
        }

        out
    }
}
