//! The rule store: built-in and custom rules, enabled state, persistence.
//!
//! Readers take an `Arc<Catalog>` snapshot and never block writers. Writers
//! are serialized, persist first, and only then publish a new snapshot, so a
//! failed write leaves both storage and memory on the previous catalog.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use hakcer_core::ids::CustomRuleId;
use hakcer_core::{CatalogVersionInfo, CompileOptions, CustomRuleRecord, RuleDraft};
use hakcer_store::{get_json, set_json, KvStore, KvWrite, StoreError};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::builtin;
use crate::catalog::{Catalog, CategoryFilter, Rule};
use crate::error::{EngineError, SyncError};
use crate::keys;
use crate::manifest::{CompiledRule, Manifest, ValidatedManifest};

#[derive(Clone, Debug)]
struct CustomEntry {
    compiled: CompiledRule,
    enabled: bool,
    created_at: String,
}

impl CustomEntry {
    fn id(&self) -> &str {
        self.compiled.id()
    }

    fn to_record(&self) -> CustomRuleRecord {
        CustomRuleRecord {
            definition: self.compiled.definition.clone(),
            enabled: self.enabled,
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct CatalogState {
    builtins: Vec<CompiledRule>,
    version: CatalogVersionInfo,
    custom: Vec<CustomEntry>,
    /// Sparse: only built-ins the user switched off.
    overrides: BTreeMap<String, bool>,
}

impl CatalogState {
    fn snapshot(&self) -> Catalog {
        let rules = self
            .builtins
            .iter()
            .map(|b| Rule::builtin(b, self.overrides.get(b.id()).copied()))
            .chain(self.custom.iter().map(|c| Rule::custom(&c.compiled, c.enabled)))
            .collect();
        Catalog::new(rules, self.version.clone())
    }

    fn is_builtin(&self, id: &str) -> bool {
        self.builtins.iter().any(|b| b.id() == id)
    }

    fn records(custom: &[CustomEntry]) -> Vec<CustomRuleRecord> {
        custom.iter().map(CustomEntry::to_record).collect()
    }
}

pub struct RuleStore {
    store: Arc<dyn KvStore>,
    options: CompileOptions,
    state: Mutex<CatalogState>,
    snapshot: RwLock<Arc<Catalog>>,
}

impl RuleStore {
    /// Read the persisted catalog, falling back to the bundled rules.
    pub async fn load(store: Arc<dyn KvStore>, options: CompileOptions) -> Result<Self, EngineError> {
        let state = read_state(store.as_ref(), &options).await?;
        let snapshot = Arc::new(state.snapshot());
        info!(
            rules = snapshot.len(),
            custom = state.custom.len(),
            version = %state.version.version,
            "rule catalog loaded"
        );
        Ok(Self {
            store,
            options,
            state: Mutex::new(state),
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Re-read storage, picking up writes made by other processes.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        *state = read_state(self.store.as_ref(), &self.options).await?;
        self.publish(&state);
        debug!("rule catalog reloaded");
        Ok(())
    }

    pub fn compile_options(&self) -> &CompileOptions {
        &self.options
    }

    /// Current catalog. Cheap; the snapshot never changes after it is taken.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.snapshot.read().clone()
    }

    pub fn list_rules(&self, filter: &CategoryFilter) -> Vec<Rule> {
        self.snapshot().list(filter)
    }

    pub fn get_rule(&self, id: &str) -> Option<Rule> {
        self.snapshot().get(id).cloned()
    }

    pub fn categories(&self) -> Vec<String> {
        self.snapshot().categories()
    }

    pub fn version_info(&self) -> CatalogVersionInfo {
        self.snapshot().version().clone()
    }

    /// Set a rule's enabled state. Unknown ids are ignored and return `false`.
    pub async fn toggle(&self, id: &str, enabled: bool) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;

        if let Some(pos) = state.custom.iter().position(|c| c.id() == id) {
            let mut custom = state.custom.clone();
            custom[pos].enabled = enabled;
            self.persist_custom(&custom).await?;
            state.custom = custom;
        } else if state.is_builtin(id) {
            let mut overrides = state.overrides.clone();
            if enabled {
                overrides.remove(id);
            } else {
                overrides.insert(id.to_string(), false);
            }
            set_json(self.store.as_ref(), keys::RULE_OVERRIDES, &overrides).await?;
            state.overrides = overrides;
        } else {
            debug!(rule_id = id, "toggle ignored, no such rule");
            return Ok(false);
        }

        self.publish(&state);
        info!(rule_id = id, enabled, "rule toggled");
        Ok(true)
    }

    /// Validate and store a new custom rule. It starts enabled.
    pub async fn add_custom_rule(&self, draft: RuleDraft) -> Result<Rule, EngineError> {
        let definition = draft.into_definition(CustomRuleId::new().into_string());
        let matcher = definition.compile(&self.options)?;
        let entry = CustomEntry {
            compiled: CompiledRule {
                definition,
                matcher: Arc::new(matcher),
            },
            enabled: true,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut state = self.state.lock().await;
        let mut custom = state.custom.clone();
        custom.push(entry.clone());
        self.persist_custom(&custom).await?;
        state.custom = custom;
        self.publish(&state);

        info!(rule_id = entry.id(), name = %entry.compiled.definition.name, "custom rule added");
        Ok(Rule::custom(&entry.compiled, entry.enabled))
    }

    /// Delete a custom rule. Built-ins are refused; unknown ids return `false`.
    pub async fn remove_custom_rule(&self, id: &str) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        if state.is_builtin(id) {
            return Err(EngineError::BuiltinProtected {
                rule_id: id.to_string(),
            });
        }
        let Some(pos) = state.custom.iter().position(|c| c.id() == id) else {
            return Ok(false);
        };

        let mut custom = state.custom.clone();
        custom.remove(pos);
        self.persist_custom(&custom).await?;
        state.custom = custom;
        self.publish(&state);

        info!(rule_id = id, "custom rule removed");
        Ok(true)
    }

    /// Drop custom rules, overrides and any fetched catalog.
    pub async fn reset_to_defaults(&self) -> Result<(), EngineError> {
        let bundled = builtin::bundled_manifest(&self.options)?;
        let mut state = self.state.lock().await;

        self.store
            .write_batch(vec![
                KvWrite::set_json(keys::CUSTOM_RULES, &Vec::<CustomRuleRecord>::new())?,
                KvWrite::set_json(keys::RULE_OVERRIDES, &BTreeMap::<String, bool>::new())?,
                KvWrite::remove(keys::RULE_CATALOG),
                KvWrite::remove(keys::RULE_CATALOG_VERSION),
            ])
            .await?;

        *state = CatalogState {
            version: bundled.version_info(None),
            builtins: bundled.rules,
            custom: Vec::new(),
            overrides: BTreeMap::new(),
        };
        self.publish(&state);

        info!(version = %state.version.version, "rules reset to defaults");
        Ok(())
    }

    /// Enable every rule. Returns the number of rules in the catalog.
    pub async fn enable_all(&self) -> Result<usize, EngineError> {
        let mut state = self.state.lock().await;

        let mut custom = state.custom.clone();
        for entry in &mut custom {
            entry.enabled = true;
        }
        self.store
            .write_batch(vec![
                KvWrite::set_json(keys::CUSTOM_RULES, &CatalogState::records(&custom))?,
                KvWrite::set_json(keys::RULE_OVERRIDES, &BTreeMap::<String, bool>::new())?,
            ])
            .await?;
        state.custom = custom;
        state.overrides.clear();
        self.publish(&state);

        let count = state.builtins.len() + state.custom.len();
        info!(count, "all rules enabled");
        Ok(count)
    }

    /// Replace the built-in rules with a validated manifest.
    ///
    /// Custom rules are kept. Overrides survive only for ids still present.
    /// Catalog, version info and pruned overrides are written in one batch.
    pub(crate) async fn install_manifest(
        &self,
        manifest: ValidatedManifest,
    ) -> Result<CatalogVersionInfo, SyncError> {
        let mut state = self.state.lock().await;

        if manifest.version < state.version.version {
            return Err(SyncError::StaleVersion {
                incoming: manifest.version.to_string(),
                local: state.version.version.to_string(),
            });
        }
        if let Some(conflict) = manifest
            .rules
            .iter()
            .find(|r| state.custom.iter().any(|c| c.id() == r.id()))
        {
            return Err(SyncError::IdConflict {
                rule_id: conflict.id().to_string(),
            });
        }

        let info = manifest.version_info(Some(Utc::now().to_rfc3339()));
        let overrides: BTreeMap<String, bool> = state
            .overrides
            .iter()
            .filter(|(id, _)| manifest.rules.iter().any(|r| r.id() == id.as_str()))
            .map(|(id, enabled)| (id.clone(), *enabled))
            .collect();

        let mut writes = vec![
            KvWrite::set_json(keys::RULE_CATALOG, &manifest.to_manifest())?,
            KvWrite::set_json(keys::RULE_CATALOG_VERSION, &info)?,
        ];
        if overrides.len() != state.overrides.len() {
            writes.push(KvWrite::set_json(keys::RULE_OVERRIDES, &overrides)?);
        }
        self.store.write_batch(writes).await?;

        state.builtins = manifest.rules;
        state.version = info.clone();
        state.overrides = overrides;
        self.publish(&state);
        Ok(info)
    }

    async fn persist_custom(&self, custom: &[CustomEntry]) -> Result<(), StoreError> {
        set_json(
            self.store.as_ref(),
            keys::CUSTOM_RULES,
            &CatalogState::records(custom),
        )
        .await
    }

    fn publish(&self, state: &CatalogState) {
        *self.snapshot.write() = Arc::new(state.snapshot());
    }
}

async fn read_state(store: &dyn KvStore, options: &CompileOptions) -> Result<CatalogState, EngineError> {
    let cached = match get_json::<Manifest>(store, keys::RULE_CATALOG).await {
        Ok(Some(manifest)) => match manifest.validate(options) {
            Ok(valid) => Some(valid),
            Err(e) => {
                warn!(error = %e, "cached rule catalog rejected, using bundled rules");
                None
            }
        },
        Ok(None) => None,
        Err(StoreError::Serialization(e)) => {
            warn!(error = %e, "cached rule catalog unreadable, using bundled rules");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let (builtins, version) = match cached {
        Some(manifest) => {
            let stored = get_json::<CatalogVersionInfo>(store, keys::RULE_CATALOG_VERSION)
                .await
                .ok()
                .flatten();
            let version = stored.unwrap_or_else(|| manifest.version_info(None));
            (manifest.rules, version)
        }
        None => {
            let bundled = builtin::bundled_manifest(options)?;
            let version = bundled.version_info(None);
            (bundled.rules, version)
        }
    };

    let records = get_json::<Vec<CustomRuleRecord>>(store, keys::CUSTOM_RULES)
        .await?
        .unwrap_or_default();
    let mut custom: Vec<CustomEntry> = Vec::with_capacity(records.len());
    for record in records {
        let id = record.definition.id.clone();
        if builtins.iter().any(|b| b.id() == id) || custom.iter().any(|c| c.id() == id) {
            warn!(rule_id = %id, "duplicate custom rule id skipped");
            continue;
        }
        match record.definition.compile(options) {
            Ok(matcher) => custom.push(CustomEntry {
                compiled: CompiledRule {
                    definition: record.definition,
                    matcher: Arc::new(matcher),
                },
                enabled: record.enabled,
                created_at: record.created_at,
            }),
            Err(e) => warn!(rule_id = %id, error = %e, "stored custom rule no longer compiles, skipped"),
        }
    }

    let overrides = get_json::<BTreeMap<String, bool>>(store, keys::RULE_OVERRIDES)
        .await?
        .unwrap_or_default();

    Ok(CatalogState {
        builtins,
        version,
        custom,
        overrides,
    })
}
