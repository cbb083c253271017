//! Segmentation tree and leaf assignment (C2)
//!
//! Maps a loan to a segmentation leaf id via a four-tier fallback: decision
//! tree, rules table, hard-coded 5-bucket classifier (§4.2). Every fallback
//! to a lower tier, and every missing-feature imputation, is logged at
//! warning severity and tallied rather than raised as an error (§7
//! `ModelFallback`).

use std::collections::HashMap;

use crate::loan::Loan;

/// Feature vector derived from a loan after the scale conversions §4.2
/// specifies (rate x100, LTV x100, DTI defaulted to 36 if null, ITIN
/// defaulted to 0, state mapped through the pre-binned state-group table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub credit_score: f64,
    pub ltv_pct: f64,
    pub rate_pct: f64,
    pub loan_size: f64,
    pub origination_year: f64,
    pub state_group: f64,
    pub itin: f64,
    pub original_term: f64,
}

/// Tracks which tier of the leaf-assignment fallback chain was used, and
/// which optional fields had to be imputed, across a batch of loans.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FallbackTally {
    pub tree_hits: u64,
    pub rules_hits: u64,
    pub hardcoded_hits: u64,
    pub dti_imputed: u64,
    pub itin_imputed: u64,
    pub state_imputed: u64,
}

impl FallbackTally {
    pub fn record_tier(&mut self, tier: AssignmentTier) {
        match tier {
            AssignmentTier::DecisionTree => self.tree_hits += 1,
            AssignmentTier::RulesTable => self.rules_hits += 1,
            AssignmentTier::HardcodedBuckets => self.hardcoded_hits += 1,
        }
    }

    pub fn merge(&mut self, other: &FallbackTally) {
        self.tree_hits += other.tree_hits;
        self.rules_hits += other.rules_hits;
        self.hardcoded_hits += other.hardcoded_hits;
        self.dti_imputed += other.dti_imputed;
        self.itin_imputed += other.itin_imputed;
        self.state_imputed += other.state_imputed;
    }
}

/// Which fallback tier produced a leaf assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTier {
    DecisionTree,
    RulesTable,
    HardcodedBuckets,
}

/// A node of the segmentation decision tree.
#[derive(Debug, Clone)]
pub enum TreeNode {
    Split {
        feature: Feature,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf(LeafInfo),
}

/// Features the decision tree and rules table may split/evaluate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    CreditScore,
    LtvPct,
    RatePct,
    LoanSize,
    OriginationYear,
    StateGroup,
    Itin,
    OriginalTerm,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::CreditScore => self.credit_score,
            Feature::LtvPct => self.ltv_pct,
            Feature::RatePct => self.rate_pct,
            Feature::LoanSize => self.loan_size,
            Feature::OriginationYear => self.origination_year,
            Feature::StateGroup => self.state_group,
            Feature::Itin => self.itin,
            Feature::OriginalTerm => self.original_term,
        }
    }
}

/// Metadata carried by a segmentation leaf (§3).
#[derive(Debug, Clone)]
pub struct LeafInfo {
    pub leaf_id: u32,
    pub decision_path: Vec<String>,
    pub sample_count: u64,
    pub source_population_count: u64,
}

/// The segmentation decision tree.
#[derive(Debug, Clone)]
pub struct SegmentationTree {
    root: TreeNode,
}

impl SegmentationTree {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    /// Traverse the tree and return the leaf it resolves to.
    pub fn apply(&self, features: &FeatureVector) -> &LeafInfo {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf(info) => return info,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features.get(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Finds a leaf by id, regardless of its position in the tree — used by
    /// the `leaf_detail` status operation, which has no feature vector to
    /// traverse with.
    pub fn leaf_info(&self, leaf_id: u32) -> Option<&LeafInfo> {
        fn walk(node: &TreeNode, leaf_id: u32) -> Option<&LeafInfo> {
            match node {
                TreeNode::Leaf(info) if info.leaf_id == leaf_id => Some(info),
                TreeNode::Leaf(_) => None,
                TreeNode::Split { left, right, .. } => {
                    walk(left, leaf_id).or_else(|| walk(right, leaf_id))
                }
            }
        }
        walk(&self.root, leaf_id)
    }
}

/// Comparison operator for a rules-table conjunction term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Operator {
    fn eval(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => (lhs - rhs).abs() < 1e-9,
        }
    }
}

/// One `(feature, operator, value)` term in a rule's conjunction.
#[derive(Debug, Clone, Copy)]
pub struct RuleTerm {
    pub feature: Feature,
    pub operator: Operator,
    pub value: f64,
}

/// A single rule: all terms must hold for the rule to match.
#[derive(Debug, Clone)]
pub struct Rule {
    pub terms: Vec<RuleTerm>,
    pub leaf_id: u32,
}

impl Rule {
    fn matches(&self, features: &FeatureVector) -> bool {
        self.terms
            .iter()
            .all(|term| term.operator.eval(features.get(term.feature), term.value))
    }
}

/// JSON-described rules table, evaluated top-to-bottom; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RulesTable {
    pub rules: Vec<Rule>,
}

impl RulesTable {
    pub fn apply(&self, features: &FeatureVector) -> Option<u32> {
        self.rules
            .iter()
            .find(|rule| rule.matches(features))
            .map(|rule| rule.leaf_id)
    }
}

/// Hard-coded 5-bucket classifier on credit score x LTV (§4.2 tier 3).
/// A total function: always returns a valid leaf id in `[1, 5]`.
pub fn hardcoded_bucket(features: &FeatureVector) -> u32 {
    let score = features.credit_score;
    let ltv = features.ltv_pct;

    if score >= 740.0 && ltv <= 80.0 {
        1
    } else if score >= 700.0 && ltv <= 90.0 {
        2
    } else if score >= 660.0 {
        3
    } else if score >= 620.0 {
        4
    } else {
        5
    }
}

/// Pre-binned state-group lookup (two-letter USPS code -> coarse group id).
#[derive(Debug, Clone, Default)]
pub struct StateGroupTable {
    groups: HashMap<String, f64>,
}

impl StateGroupTable {
    pub fn new(groups: HashMap<String, f64>) -> Self {
        Self { groups }
    }

    /// Unknown states map to group 0, the catch-all.
    pub fn group_of(&self, state: Option<&str>) -> f64 {
        state
            .and_then(|s| self.groups.get(s))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Builds the scaled [`FeatureVector`] for a loan, recording any imputation.
pub fn build_features(
    loan: &Loan,
    state_groups: &StateGroupTable,
    tally: &mut FallbackTally,
) -> FeatureVector {
    let (_, itin_imputed) = loan.itin_or_default();
    if itin_imputed {
        tally.itin_imputed += 1;
    }
    let (_, dti_imputed) = loan.dti_or_default();
    if dti_imputed {
        tally.dti_imputed += 1;
    }
    let state_group = if loan.state.is_none() {
        tally.state_imputed += 1;
        0.0
    } else {
        state_groups.group_of(loan.state.as_deref())
    };

    FeatureVector {
        credit_score: loan.credit_score as f64,
        ltv_pct: loan.ltv * 100.0,
        rate_pct: loan.note_rate * 100.0,
        loan_size: loan.upb,
        origination_year: loan.origination_year.unwrap_or(0) as f64,
        state_group,
        itin: if loan.itin_or_default().0 { 1.0 } else { 0.0 },
        original_term: loan.original_term as f64,
    }
}

/// Assigns a loan to a leaf id, trying the decision tree, then the rules
/// table, then the hard-coded classifier, logging (at warning severity) any
/// fallback to a lower tier (§4.2). Always returns a valid leaf id.
pub fn assign_leaf(
    loan: &Loan,
    tree: Option<&SegmentationTree>,
    rules: Option<&RulesTable>,
    state_groups: &StateGroupTable,
    tally: &mut FallbackTally,
) -> (u32, AssignmentTier) {
    let features = build_features(loan, state_groups, tally);

    if let Some(tree) = tree {
        let leaf = tree.apply(&features);
        tally.record_tier(AssignmentTier::DecisionTree);
        return (leaf.leaf_id, AssignmentTier::DecisionTree);
    }
    log::warn!(
        "loan {}: segmentation tree unavailable, falling back to rules table",
        loan.loan_id
    );

    if let Some(rules) = rules {
        if let Some(leaf_id) = rules.apply(&features) {
            tally.record_tier(AssignmentTier::RulesTable);
            return (leaf_id, AssignmentTier::RulesTable);
        }
        log::warn!(
            "loan {}: no rule matched, falling back to hard-coded classifier",
            loan.loan_id
        );
    } else {
        log::warn!(
            "loan {}: rules table unavailable, falling back to hard-coded classifier",
            loan.loan_id
        );
    }

    let leaf_id = hardcoded_bucket(&features);
    tally.record_tier(AssignmentTier::HardcodedBuckets);
    (leaf_id, AssignmentTier::HardcodedBuckets)
}
