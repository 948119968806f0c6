//! Rule manifests: the bundled catalog and the remote one share this format.

use std::collections::HashSet;
use std::sync::Arc;

use hakcer_core::ids::CustomRuleId;
use hakcer_core::{CatalogVersionInfo, CompileOptions, Matcher, RuleDefinition, RuleVersion};
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// A versioned set of built-in rule definitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub version: Option<RuleVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// A rule definition together with its compiled matcher.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub definition: RuleDefinition,
    pub matcher: Arc<Matcher>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

/// A manifest whose every rule compiled.
#[derive(Clone, Debug)]
pub struct ValidatedManifest {
    pub version: RuleVersion,
    pub updated: Option<String>,
    pub rules: Vec<CompiledRule>,
}

impl Manifest {
    pub fn parse(body: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(body).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Check the manifest as a whole. The first bad rule rejects everything.
    pub fn validate(self, options: &CompileOptions) -> Result<ValidatedManifest, ManifestError> {
        let version = self
            .version
            .filter(|v| !v.is_blank())
            .ok_or(ManifestError::MissingVersion)?;
        if self.rules.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut seen = HashSet::with_capacity(self.rules.len());
        let mut rules = Vec::with_capacity(self.rules.len());
        for (index, definition) in self.rules.into_iter().enumerate() {
            if definition.id.trim().is_empty() {
                return Err(ManifestError::MissingId { index });
            }
            if CustomRuleId::is_in_space(&definition.id) {
                return Err(ManifestError::ReservedId(definition.id));
            }
            if !seen.insert(definition.id.clone()) {
                return Err(ManifestError::DuplicateId(definition.id));
            }
            let matcher = definition
                .compile(options)
                .map_err(|source| ManifestError::InvalidRule {
                    rule_id: definition.id.clone(),
                    source,
                })?;
            rules.push(CompiledRule {
                definition,
                matcher: Arc::new(matcher),
            });
        }

        Ok(ValidatedManifest {
            version,
            updated: self.updated.filter(|u| !u.trim().is_empty()),
            rules,
        })
    }
}

impl ValidatedManifest {
    pub fn version_info(&self, cached_at: Option<String>) -> CatalogVersionInfo {
        CatalogVersionInfo {
            version: self.version.clone(),
            rules_count: self.rules.len(),
            updated: self.updated.clone(),
            cached_at,
        }
    }

    /// Serializable form, as cached in storage.
    pub fn to_manifest(&self) -> Manifest {
        Manifest {
            version: Some(self.version.clone()),
            updated: self.updated.clone(),
            rules: self.rules.iter().map(|r| r.definition.clone()).collect(),
        }
    }
}
