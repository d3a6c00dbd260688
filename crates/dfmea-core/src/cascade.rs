use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AnalysisRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum CascadeLevel {
    Program,
    ProductCategory,
    Subsystem,
    Product,
}

impl CascadeLevel {
    pub const ALL: [CascadeLevel; 4] = [
        Self::Program,
        Self::ProductCategory,
        Self::Subsystem,
        Self::Product,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::ProductCategory => "product_category",
            Self::Subsystem => "subsystem",
            Self::Product => "product",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Program => "Program",
            Self::ProductCategory => "Product Category",
            Self::Subsystem => "Subsystem",
            Self::Product => "Product",
        }
    }

    pub fn parent(self) -> Option<CascadeLevel> {
        match self {
            Self::Program => None,
            Self::ProductCategory => Some(Self::Program),
            Self::Subsystem => Some(Self::ProductCategory),
            Self::Product => Some(Self::Subsystem),
        }
    }

    /// Levels whose options are filtered by this one, nearest first.
    pub fn downstream(self) -> &'static [CascadeLevel] {
        let all: &'static [CascadeLevel] = &Self::ALL;
        &all[self.index() + 1..]
    }

    /// Levels that filter this one, from the top of the cascade.
    pub fn ancestors(self) -> &'static [CascadeLevel] {
        let all: &'static [CascadeLevel] = &Self::ALL;
        &all[..self.index()]
    }

    pub fn field(self, record: &AnalysisRecord) -> &str {
        match self {
            Self::Program => &record.program,
            Self::ProductCategory => &record.campaign,
            Self::Subsystem => &record.subsystem,
            Self::Product => &record.product,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Program => 0,
            Self::ProductCategory => 1,
            Self::Subsystem => 2,
            Self::Product => 3,
        }
    }
}

impl std::str::FromStr for CascadeLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "program" => Ok(Self::Program),
            "product_category" | "category" | "campaign" => Ok(Self::ProductCategory),
            "subsystem" => Ok(Self::Subsystem),
            "product" => Ok(Self::Product),
            other => Err(format!(
                "invalid level '{other}', expected one of: program, product_category, subsystem, product"
            )),
        }
    }
}

/// How a multi-valued ancestor selection filters the next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AncestorPolicy {
    /// A record matches when its field equals any selected ancestor value.
    #[default]
    Union,
    /// Only the first selected ancestor value filters.
    FirstSelected,
}

impl AncestorPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::FirstSelected => "first_selected",
        }
    }

    fn effective(self, values: &[String]) -> &[String] {
        match self {
            Self::Union => values,
            Self::FirstSelected => &values[..values.len().min(1)],
        }
    }
}

impl std::str::FromStr for AncestorPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "union" => Ok(Self::Union),
            "first_selected" => Ok(Self::FirstSelected),
            other => Err(format!(
                "invalid ancestor policy '{other}', expected one of: union, first_selected"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("{level} cannot be set before {parent} is selected")]
    UpstreamIncomplete {
        level: &'static str,
        parent: &'static str,
    },
}

/// Four-level cascade selection. Single-value pages hold at most one value per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub program: Vec<String>,
    pub product_category: Vec<String>,
    pub subsystem: Vec<String>,
    pub product: Vec<String>,
}

impl Selection {
    pub fn values(&self, level: CascadeLevel) -> &[String] {
        match level {
            CascadeLevel::Program => &self.program,
            CascadeLevel::ProductCategory => &self.product_category,
            CascadeLevel::Subsystem => &self.subsystem,
            CascadeLevel::Product => &self.product,
        }
    }

    fn values_mut(&mut self, level: CascadeLevel) -> &mut Vec<String> {
        match level {
            CascadeLevel::Program => &mut self.program,
            CascadeLevel::ProductCategory => &mut self.product_category,
            CascadeLevel::Subsystem => &mut self.subsystem,
            CascadeLevel::Product => &mut self.product,
        }
    }

    /// First selected value of a level, used wherever one value stands for the level.
    pub fn primary(&self, level: CascadeLevel) -> Option<&str> {
        self.values(level).first().map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        CascadeLevel::ALL
            .iter()
            .all(|level| !self.values(*level).is_empty())
    }

    pub fn is_empty(&self) -> bool {
        CascadeLevel::ALL
            .iter()
            .all(|level| self.values(*level).is_empty())
    }

    /// No level holds a value while a level above it is empty.
    pub fn is_upstream_complete(&self) -> bool {
        CascadeLevel::ALL.iter().all(|level| {
            self.values(*level).is_empty()
                || level
                    .ancestors()
                    .iter()
                    .all(|ancestor| !self.values(*ancestor).is_empty())
        })
    }

    /// Replaces one level and clears every level below it. Blank values are dropped
    /// and duplicates collapse while keeping the first-selected order.
    pub fn set(
        &mut self,
        level: CascadeLevel,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), SelectionError> {
        let normalized = normalize_values(values);

        if !normalized.is_empty()
            && let Some(parent) = level.parent()
            && self.values(parent).is_empty()
        {
            return Err(SelectionError::UpstreamIncomplete {
                level: level.label(),
                parent: parent.label(),
            });
        }

        *self.values_mut(level) = normalized;
        for downstream in level.downstream() {
            self.values_mut(*downstream).clear();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn normalize_values(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .map(|value| value.into().trim().to_owned())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Sorted distinct options for `level`, filtered by every ancestor's selection.
/// Empty whenever a required ancestor has no selection.
pub fn options_for(
    level: CascadeLevel,
    records: &[AnalysisRecord],
    selection: &Selection,
    policy: AncestorPolicy,
) -> Vec<String> {
    let ancestors: Vec<&[String]> = level
        .ancestors()
        .iter()
        .map(|ancestor| selection.values(*ancestor))
        .collect();
    derive_options(level, records, &ancestors, policy)
}

pub fn programs(records: &[AnalysisRecord]) -> Vec<String> {
    derive_options(
        CascadeLevel::Program,
        records,
        &[],
        AncestorPolicy::default(),
    )
}

pub fn product_categories(
    records: &[AnalysisRecord],
    programs: &[String],
    policy: AncestorPolicy,
) -> Vec<String> {
    derive_options(CascadeLevel::ProductCategory, records, &[programs], policy)
}

pub fn subsystems(
    records: &[AnalysisRecord],
    programs: &[String],
    categories: &[String],
    policy: AncestorPolicy,
) -> Vec<String> {
    derive_options(
        CascadeLevel::Subsystem,
        records,
        &[programs, categories],
        policy,
    )
}

pub fn products(
    records: &[AnalysisRecord],
    programs: &[String],
    categories: &[String],
    subsystems: &[String],
    policy: AncestorPolicy,
) -> Vec<String> {
    derive_options(
        CascadeLevel::Product,
        records,
        &[programs, categories, subsystems],
        policy,
    )
}

fn derive_options(
    level: CascadeLevel,
    records: &[AnalysisRecord],
    ancestor_values: &[&[String]],
    policy: AncestorPolicy,
) -> Vec<String> {
    let mut filters = Vec::with_capacity(ancestor_values.len());
    for (ancestor, values) in level.ancestors().iter().zip(ancestor_values) {
        let effective = policy.effective(values);
        if effective.is_empty() {
            return Vec::new();
        }
        filters.push((*ancestor, effective));
    }

    records
        .iter()
        .filter(|record| {
            filters.iter().all(|(ancestor, values)| {
                let field = ancestor.field(record);
                values.iter().any(|value| value == field)
            })
        })
        .map(|record| level.field(record).to_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<AnalysisRecord> {
        vec![
            AnalysisRecord::new("P2", "Display", "Panel", "Screen"),
            AnalysisRecord::new("P1", "Body", "Housing", "Case"),
            AnalysisRecord::new("P1", "Body", "Housing", "Bezel"),
            AnalysisRecord::new("P1", "Body", "Seals", "Gasket"),
            AnalysisRecord::new("P1", "Electronics", "Board", "PCB"),
            AnalysisRecord::new("P1", "Body", "Housing", "Case"),
            AnalysisRecord::new("P2", "Body", "Housing", "Shell"),
        ]
    }

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn programs_are_sorted_and_distinct() {
        assert_eq!(programs(&sample_records()), owned(&["P1", "P2"]));
        assert!(programs(&[]).is_empty());
    }

    #[test]
    fn each_level_is_empty_until_its_ancestors_are_selected() {
        let records = sample_records();
        let policy = AncestorPolicy::Union;

        assert!(product_categories(&records, &[], policy).is_empty());
        assert!(subsystems(&records, &owned(&["P1"]), &[], policy).is_empty());
        assert!(products(&records, &owned(&["P1"]), &owned(&["Body"]), &[], policy).is_empty());
        assert!(
            products(&records, &[], &owned(&["Body"]), &owned(&["Housing"]), policy).is_empty()
        );
    }

    #[test]
    fn options_follow_the_selected_ancestors() {
        let records = sample_records();
        let policy = AncestorPolicy::Union;

        assert_eq!(
            product_categories(&records, &owned(&["P1"]), policy),
            owned(&["Body", "Electronics"])
        );
        assert_eq!(
            subsystems(&records, &owned(&["P1"]), &owned(&["Body"]), policy),
            owned(&["Housing", "Seals"])
        );
        assert_eq!(
            products(
                &records,
                &owned(&["P1"]),
                &owned(&["Body"]),
                &owned(&["Housing"]),
                policy
            ),
            owned(&["Bezel", "Case"])
        );
    }

    #[test]
    fn union_policy_merges_options_across_selected_ancestors() {
        let records = sample_records();

        let union = subsystems(
            &records,
            &owned(&["P2", "P1"]),
            &owned(&["Body"]),
            AncestorPolicy::Union,
        );
        let first = subsystems(
            &records,
            &owned(&["P2", "P1"]),
            &owned(&["Body"]),
            AncestorPolicy::FirstSelected,
        );

        assert_eq!(union, owned(&["Housing", "Seals"]));
        assert_eq!(first, owned(&["Housing"]));

        let shells = products(
            &records,
            &owned(&["P2", "P1"]),
            &owned(&["Body"]),
            &owned(&["Housing"]),
            AncestorPolicy::FirstSelected,
        );
        assert_eq!(shells, owned(&["Shell"]));
    }

    #[test]
    fn options_for_reads_ancestors_from_selection() {
        let records = sample_records();
        let mut selection = Selection::default();

        for level in CascadeLevel::ALL.iter().skip(1) {
            assert!(options_for(*level, &records, &selection, AncestorPolicy::Union).is_empty());
        }

        selection.set(CascadeLevel::Program, ["P1"]).expect("set program");
        selection
            .set(CascadeLevel::ProductCategory, ["Body"])
            .expect("set category");

        let subsystem_options = options_for(
            CascadeLevel::Subsystem,
            &records,
            &selection,
            AncestorPolicy::Union,
        );
        assert_eq!(subsystem_options, owned(&["Housing", "Seals"]));
        assert!(subsystem_options.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn setting_a_level_clears_every_level_below_it() {
        let mut selection = Selection::default();
        selection.set(CascadeLevel::Program, ["P1"]).expect("program");
        selection
            .set(CascadeLevel::ProductCategory, ["Body"])
            .expect("category");
        selection
            .set(CascadeLevel::Subsystem, ["Housing"])
            .expect("subsystem");
        selection.set(CascadeLevel::Product, ["Case"]).expect("product");
        assert!(selection.is_complete());

        selection
            .set(CascadeLevel::ProductCategory, ["Electronics"])
            .expect("category again");

        assert_eq!(selection.program, owned(&["P1"]));
        assert_eq!(selection.product_category, owned(&["Electronics"]));
        assert!(selection.subsystem.is_empty());
        assert!(selection.product.is_empty());
        assert!(selection.is_upstream_complete());
    }

    #[test]
    fn setting_below_an_empty_parent_is_rejected() {
        let mut selection = Selection::default();

        let err = selection
            .set(CascadeLevel::Subsystem, ["Housing"])
            .expect_err("parent missing");

        assert_eq!(
            err,
            SelectionError::UpstreamIncomplete {
                level: "Subsystem",
                parent: "Product Category"
            }
        );
        assert!(selection.is_empty());

        selection
            .set(CascadeLevel::Subsystem, Vec::<String>::new())
            .expect("clearing is always allowed");
    }

    #[test]
    fn set_drops_blank_and_duplicate_values() {
        let mut selection = Selection::default();
        selection
            .set(CascadeLevel::Program, ["P2", " ", "P1", "P2"])
            .expect("program");

        assert_eq!(selection.program, owned(&["P2", "P1"]));
        assert_eq!(selection.primary(CascadeLevel::Program), Some("P2"));
    }

    #[test]
    fn level_relationships_are_consistent() {
        assert_eq!(CascadeLevel::Program.parent(), None);
        assert_eq!(
            CascadeLevel::Product.ancestors(),
            &[
                CascadeLevel::Program,
                CascadeLevel::ProductCategory,
                CascadeLevel::Subsystem
            ]
        );
        assert_eq!(
            CascadeLevel::ProductCategory.downstream(),
            &[CascadeLevel::Subsystem, CascadeLevel::Product]
        );
        assert!(CascadeLevel::Product.downstream().is_empty());
        assert_eq!(
            "category".parse::<CascadeLevel>(),
            Ok(CascadeLevel::ProductCategory)
        );
    }
}
