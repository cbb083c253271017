//! Model registry (C1): loads every artifact once at process start and
//! exposes them through an atomically-swappable handle so a hot reload
//! never hands an in-flight valuation a half-updated view (§4.1).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::ValuationError;

use super::apex2::Apex2Tables;
use super::loader::{self, ModelArtifactInfo};
use super::scenario::ScenarioCatalogue;
use super::segmentation::{RulesTable, SegmentationTree, StateGroupTable};
use super::survival::SurvivalCurve;

/// Immutable snapshot of every loaded artifact.
pub struct RegistryData {
    pub artifact_root: PathBuf,
    pub default_curve_variant: String,
    pub curve_variants: Vec<String>,
    pub segmentation_tree: Option<SegmentationTree>,
    pub rules_table: Option<RulesTable>,
    pub state_groups: StateGroupTable,
    pub survival_curves: HashMap<String, HashMap<u32, SurvivalCurve>>,
    pub apex2: Apex2Tables,
    pub scenarios: ScenarioCatalogue,
    /// Status/version/metrics for each named model, straight out of
    /// `manifest.json`'s `models` map (§4.1).
    pub model_infos: HashMap<String, ModelArtifactInfo>,
}

impl RegistryData {
    fn load(artifact_root: &Path) -> Result<Self, ValuationError> {
        let manifest = loader::load_manifest(artifact_root)?;
        let segmentation_tree = loader::load_segmentation_tree(artifact_root)?;
        let rules_table = loader::load_rules_table(artifact_root)?;
        let state_groups = loader::state_group_table_from(&manifest);
        let apex2 = loader::load_apex2_tables(artifact_root)?;
        let scenarios = loader::load_scenario_catalogue(artifact_root)?;

        let mut survival_curves = HashMap::new();
        for variant in &manifest.curve_variants {
            let curves = loader::load_survival_curves(artifact_root, variant)?;
            survival_curves.insert(variant.clone(), curves);
        }

        Ok(Self {
            artifact_root: artifact_root.to_path_buf(),
            default_curve_variant: manifest.default_curve_variant,
            curve_variants: manifest.curve_variants,
            segmentation_tree,
            rules_table,
            state_groups,
            survival_curves,
            apex2,
            scenarios,
            model_infos: manifest.models,
        })
    }

    /// The survival curve for `leaf_id` under `variant`, falling back to
    /// the registry's default variant when `variant` is `None`.
    pub fn survival_curve(
        &self,
        variant: Option<&str>,
        leaf_id: u32,
    ) -> Result<&SurvivalCurve, ValuationError> {
        let variant = variant.unwrap_or(&self.default_curve_variant);
        let curves = self
            .survival_curves
            .get(variant)
            .ok_or_else(|| ValuationError::VariantNotFound(variant.to_string()))?;
        curves
            .get(&leaf_id)
            .ok_or_else(|| ValuationError::VariantNotFound(format!("{variant}/leaf-{leaf_id}")))
    }
}

/// Owns the current [`RegistryData`] behind a lock, so a reload can swap
/// in a freshly-loaded snapshot atomically without blocking readers that
/// already hold a clone of the `Arc`.
pub struct ModelRegistry {
    current: RwLock<Arc<RegistryData>>,
}

impl ModelRegistry {
    /// Load every artifact under `artifact_root` for the first time.
    pub fn load(artifact_root: &Path) -> Result<Self, ValuationError> {
        let data = RegistryData::load(artifact_root)?;
        Ok(Self {
            current: RwLock::new(Arc::new(data)),
        })
    }

    /// A cheap, reference-counted snapshot of the currently active data.
    /// Safe to hold for the duration of a single valuation even across a
    /// concurrent [`ModelRegistry::reload`].
    pub fn snapshot(&self) -> Arc<RegistryData> {
        self.current
            .read()
            .expect("model registry lock poisoned")
            .clone()
    }

    /// Re-read every artifact from disk and swap it in atomically. Any
    /// valuation already holding a snapshot keeps using the data it
    /// started with.
    pub fn reload(&self) -> Result<(), ValuationError> {
        let artifact_root = self.snapshot().artifact_root.clone();
        let fresh = RegistryData::load(&artifact_root)?;
        let mut guard = self.current.write().expect("model registry lock poisoned");
        *guard = Arc::new(fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("manifest.json"),
            r#"{"default_curve_variant":"baseline","curve_variants":["baseline"],"state_groups":{"CA":1.0}}"#,
        )
        .unwrap();
        let flat_survival: Vec<f64> = (0..360).map(|t| 1.0 - t as f64 / 720.0).collect();
        let body = serde_json::json!({ "leaf_curves": { "1": flat_survival } });
        fs::write(
            dir.join("survival_baseline.json"),
            serde_json::to_string(&body).unwrap(),
        )
        .unwrap();
        fs::create_dir_all(dir.join("apex2")).unwrap();
        let one_band = serde_json::json!({"inf": 1.0, "no_score": 1.0});
        for file in [
            "credit_rates.json",
            "rate_delta_rates.json",
            "ltv_rates.json",
            "loan_size_rates.json",
        ] {
            fs::write(
                dir.join("apex2").join(file),
                serde_json::to_string(&one_band).unwrap(),
            )
            .unwrap();
        }
        let scenarios = serde_json::json!({
            "scenarios": [
                {"name": "base", "prepay_multiplier": 1.0, "default_multiplier": 1.0}
            ]
        });
        fs::write(
            dir.join("scenarios.json"),
            serde_json::to_string(&scenarios).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_registry_loads_fixture() {
        let dir = std::env::temp_dir().join(format!(
            "mortgage_pool_kernel_registry_test_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        write_fixture(&dir);

        let registry = ModelRegistry::load(&dir).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.default_curve_variant, "baseline");
        assert!(snapshot.survival_curve(None, 1).is_ok());
        assert!(snapshot.survival_curve(None, 999).is_err());
        assert!(snapshot.scenarios.get("base").is_ok());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_registry_missing_manifest_errors() {
        let dir = std::env::temp_dir().join(format!(
            "mortgage_pool_kernel_registry_missing_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let result = ModelRegistry::load(&dir);
        assert!(matches!(result, Err(ValuationError::MissingArtifact(_))));
        fs::remove_dir_all(&dir).ok();
    }
}
