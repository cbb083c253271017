//! Model artifacts: segmentation, survival curves, APEX2 tables, scenarios,
//! and the registry that loads and hot-swaps them (§3, §4.1, §4.2, §4.3).

mod apex2;
mod loader;
mod registry;
mod scenario;
mod segmentation;
mod survival;

pub use apex2::{Apex2Inputs, Apex2Tables, Band, BandedLookup};
pub use loader::ModelArtifactInfo;
pub use registry::{ModelRegistry, RegistryData};
pub use scenario::{Scenario, ScenarioCatalogue, TreasuryCurve, STANDARD_PILLARS_MONTHS};
pub use segmentation::{
    assign_leaf, build_features, hardcoded_bucket, AssignmentTier, FallbackTally, Feature,
    FeatureVector, LeafInfo, Operator, Rule, RuleTerm, RulesTable, SegmentationTree,
    StateGroupTable, TreeNode,
};
pub use survival::{SurvivalCurve, CURVE_HORIZON_MONTHS};
