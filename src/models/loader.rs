//! JSON artifact parsing: manifest, segmentation tree, rules table,
//! survival curves, APEX2 tables and scenario catalogue (§4.1).
//!
//! Each artifact has a small JSON-facing schema here, converted into the
//! domain types the rest of the kernel works with. Keeping the wire schema
//! separate from the domain types means a manifest format change never
//! leaks into `segmentation`/`survival`/`apex2`/`scenario`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ValuationError;

use super::apex2::{Apex2Tables, Band, BandedLookup, NO_SCORE_BAND_LABEL};
use super::scenario::{Scenario, ScenarioCatalogue, TreasuryCurve};
use super::segmentation::{Feature, LeafInfo, Operator, Rule, RuleTerm, RulesTable, SegmentationTree, StateGroupTable, TreeNode};
use super::survival::SurvivalCurve;

fn read_file(path: &Path) -> Result<String, ValuationError> {
    fs::read_to_string(path).map_err(|_| ValuationError::MissingArtifact(path.to_path_buf()))
}

fn parse_json<T: for<'de> Deserialize<'de>>(path: &Path, body: &str) -> Result<T, ValuationError> {
    serde_json::from_str(body).map_err(|e| ValuationError::BadFormat {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// One entry of `manifest.json`'s `models` map (§4.1 status view).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelArtifactInfo {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Top-level `manifest.json`.
#[derive(Debug, Deserialize)]
pub struct ManifestFile {
    pub default_curve_variant: String,
    pub curve_variants: Vec<String>,
    #[serde(default)]
    pub state_groups: HashMap<String, f64>,
    #[serde(default)]
    pub models: HashMap<String, ModelArtifactInfo>,
}

pub fn load_manifest(artifact_root: &Path) -> Result<ManifestFile, ValuationError> {
    let path = artifact_root.join("manifest.json");
    let body = read_file(&path)?;
    parse_json(&path, &body)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum TreeNodeFile {
    #[serde(rename = "split")]
    Split {
        feature: String,
        threshold: f64,
        left: Box<TreeNodeFile>,
        right: Box<TreeNodeFile>,
    },
    #[serde(rename = "leaf")]
    Leaf {
        leaf_id: u32,
        #[serde(default)]
        decision_path: Vec<String>,
        sample_count: u64,
        source_population_count: u64,
    },
}

fn feature_of(name: &str, path: &Path) -> Result<Feature, ValuationError> {
    Ok(match name {
        "credit_score" => Feature::CreditScore,
        "ltv_pct" => Feature::LtvPct,
        "rate_pct" => Feature::RatePct,
        "loan_size" => Feature::LoanSize,
        "origination_year" => Feature::OriginationYear,
        "state_group" => Feature::StateGroup,
        "itin" => Feature::Itin,
        "original_term" => Feature::OriginalTerm,
        other => {
            return Err(ValuationError::BadFormat {
                path: path.to_path_buf(),
                detail: format!("unknown feature name `{other}`"),
            })
        }
    })
}

fn convert_tree_node(node: TreeNodeFile, path: &Path) -> Result<TreeNode, ValuationError> {
    Ok(match node {
        TreeNodeFile::Split {
            feature,
            threshold,
            left,
            right,
        } => TreeNode::Split {
            feature: feature_of(&feature, path)?,
            threshold,
            left: Box::new(convert_tree_node(*left, path)?),
            right: Box::new(convert_tree_node(*right, path)?),
        },
        TreeNodeFile::Leaf {
            leaf_id,
            decision_path,
            sample_count,
            source_population_count,
        } => TreeNode::Leaf(LeafInfo {
            leaf_id,
            decision_path,
            sample_count,
            source_population_count,
        }),
    })
}

/// Load `tree_structure.json`. Absence is tolerated by the caller (the
/// leaf assigner falls back to the rules table) — this function only
/// errors when the file exists but fails to parse.
pub fn load_segmentation_tree(
    artifact_root: &Path,
) -> Result<Option<SegmentationTree>, ValuationError> {
    let path = artifact_root.join("tree_structure.json");
    if !path.exists() {
        return Ok(None);
    }
    let body = read_file(&path)?;
    let file: TreeNodeFile = parse_json(&path, &body)?;
    Ok(Some(SegmentationTree::new(convert_tree_node(file, &path)?)))
}

#[derive(Debug, Deserialize)]
struct RuleTermFile {
    feature: String,
    #[serde(rename = "op")]
    operator: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    terms: Vec<RuleTermFile>,
    leaf_id: u32,
}

#[derive(Debug, Deserialize)]
struct RulesTableFile {
    rules: Vec<RuleFile>,
}

fn operator_of(name: &str, path: &Path) -> Result<Operator, ValuationError> {
    Ok(match name {
        "lt" => Operator::Lt,
        "le" => Operator::Le,
        "gt" => Operator::Gt,
        "ge" => Operator::Ge,
        "eq" => Operator::Eq,
        other => {
            return Err(ValuationError::BadFormat {
                path: path.to_path_buf(),
                detail: format!("unknown operator `{other}`"),
            })
        }
    })
}

/// Load `rules_table.json`. Absence is tolerated (falls back further).
pub fn load_rules_table(artifact_root: &Path) -> Result<Option<RulesTable>, ValuationError> {
    let path = artifact_root.join("rules_table.json");
    if !path.exists() {
        return Ok(None);
    }
    let body = read_file(&path)?;
    let file: RulesTableFile = parse_json(&path, &body)?;
    let rules = file
        .rules
        .into_iter()
        .map(|r| {
            Ok(Rule {
                terms: r
                    .terms
                    .into_iter()
                    .map(|t| {
                        Ok(RuleTerm {
                            feature: feature_of(&t.feature, &path)?,
                            operator: operator_of(&t.operator, &path)?,
                            value: t.value,
                        })
                    })
                    .collect::<Result<Vec<_>, ValuationError>>()?,
                leaf_id: r.leaf_id,
            })
        })
        .collect::<Result<Vec<_>, ValuationError>>()?;
    Ok(Some(RulesTable { rules }))
}

#[derive(Debug, Deserialize)]
struct SurvivalFile {
    leaf_curves: HashMap<String, Vec<f64>>,
}

/// Load `survival_<variant>.json`, keyed by leaf id.
pub fn load_survival_curves(
    artifact_root: &Path,
    variant: &str,
) -> Result<HashMap<u32, SurvivalCurve>, ValuationError> {
    let path = artifact_root.join(format!("survival_{variant}.json"));
    let body = read_file(&path)?;
    let file: SurvivalFile = parse_json(&path, &body)?;
    file.leaf_curves
        .into_iter()
        .map(|(leaf_id_str, series)| {
            let leaf_id: u32 = leaf_id_str.parse().map_err(|_| ValuationError::BadFormat {
                path: path.clone(),
                detail: format!("non-numeric leaf id `{leaf_id_str}`"),
            })?;
            let curve = SurvivalCurve::new(series, leaf_id)?;
            Ok((leaf_id, curve))
        })
        .collect()
}

/// Parses one `{ band_label: multiplier }` object (§6 artifact layout) into
/// an ordered [`Band`] list. A label of `"inf"` is the open-ended top band;
/// [`NO_SCORE_BAND_LABEL`] is carried through unparsed for the credit
/// dimension's sentinel band, everything else must parse as the band's
/// upper bound.
fn bands_from_labeled_object(
    object: HashMap<String, f64>,
    dimension: &'static str,
    path: &Path,
) -> Result<Vec<Band>, ValuationError> {
    object
        .into_iter()
        .filter(|(label, _)| label != NO_SCORE_BAND_LABEL)
        .map(|(label, multiplier)| {
            let upper_bound = if label == "inf" {
                f64::INFINITY
            } else {
                label.parse::<f64>().map_err(|_| ValuationError::BadFormat {
                    path: path.to_path_buf(),
                    detail: format!("apex2 `{dimension}`: unparseable band label `{label}`"),
                })?
            };
            Ok(Band {
                upper_bound,
                multiplier,
            })
        })
        .collect()
}

fn load_apex2_dimension(
    artifact_root: &Path,
    file_name: &str,
    dimension: &'static str,
) -> Result<(BandedLookup, Option<f64>), ValuationError> {
    let path = artifact_root.join("apex2").join(file_name);
    let body = read_file(&path)?;
    let object: HashMap<String, f64> = parse_json(&path, &body)?;
    let no_score_multiplier = object.get(NO_SCORE_BAND_LABEL).copied();
    let bands = bands_from_labeled_object(object, dimension, &path)?;
    Ok((BandedLookup::new(bands, dimension)?, no_score_multiplier))
}

/// Load the four `apex2/<dimension>_rates.json` files (§6).
pub fn load_apex2_tables(artifact_root: &Path) -> Result<Apex2Tables, ValuationError> {
    let (credit, no_score_multiplier) =
        load_apex2_dimension(artifact_root, "credit_rates.json", "credit")?;
    let (rate_delta, _) =
        load_apex2_dimension(artifact_root, "rate_delta_rates.json", "rate_delta")?;
    let (ltv, _) = load_apex2_dimension(artifact_root, "ltv_rates.json", "ltv")?;
    let (loan_size, _) =
        load_apex2_dimension(artifact_root, "loan_size_rates.json", "loan_size")?;
    Ok(Apex2Tables::new(
        credit,
        no_score_multiplier.unwrap_or(1.0),
        rate_delta,
        ltv,
        loan_size,
    ))
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    name: String,
    prepay_multiplier: f64,
    default_multiplier: f64,
    #[serde(default = "default_severity_multiplier")]
    severity_multiplier: f64,
    #[serde(default)]
    treasury_pillars: Option<Vec<(f64, f64)>>,
}

fn default_severity_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct ScenarioCatalogueFile {
    scenarios: Vec<ScenarioFile>,
}

/// Load `scenarios.json`.
pub fn load_scenario_catalogue(artifact_root: &Path) -> Result<ScenarioCatalogue, ValuationError> {
    let path = artifact_root.join("scenarios.json");
    let body = read_file(&path)?;
    let file: ScenarioCatalogueFile = parse_json(&path, &body)?;
    let scenarios = file
        .scenarios
        .into_iter()
        .map(|s| {
            let treasury_curve = match s.treasury_pillars {
                Some(pillars) => Some(TreasuryCurve::new(pillars)?),
                None => None,
            };
            Ok(Scenario {
                name: s.name,
                prepay_multiplier: s.prepay_multiplier,
                default_multiplier: s.default_multiplier,
                severity_multiplier: s.severity_multiplier,
                treasury_curve,
            })
        })
        .collect::<Result<Vec<_>, ValuationError>>()?;
    Ok(ScenarioCatalogue::new(scenarios))
}

/// Load the pre-binned state-group table straight out of the manifest.
pub fn state_group_table_from(manifest: &ManifestFile) -> StateGroupTable {
    StateGroupTable::new(manifest.state_groups.clone())
}

pub fn artifact_root_from_str(root: &str) -> PathBuf {
    PathBuf::from(root)
}
