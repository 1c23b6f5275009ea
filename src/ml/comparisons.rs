//! Enumeration of the comparisons a batch runs
//!
//! Order is part of the contract: global first, then pairwise sub-group pairs,
//! then one-vs-rest. Output naming and the batch report follow this order.

use crate::config::ColumnLayout;
use crate::structs::{Comparison, ComparisonKind, CsvData, Label, Result, VipError};
use std::collections::{BTreeSet, HashSet};

/// Synthesized negative label of a one-vs-rest comparison
pub const REST_LABEL: &str = "Rest";

impl Comparison {
    /// Decide whether a row takes part in this comparison and on which side
    ///
    /// Returns `None` when the row is filtered out.
    #[must_use]
    pub fn label_for(&self, group: &str, subgroup: &str) -> Option<Label> {
        match &self.kind {
            ComparisonKind::Global => side(group, &self.positive, &self.negative),
            ComparisonKind::Pairwise { first, second } => side(subgroup, first, second),
            ComparisonKind::OneVsRest { target, baseline } => {
                if subgroup.is_empty() || subgroup == baseline {
                    None
                } else if subgroup == target {
                    Some(Label::Positive)
                } else {
                    Some(Label::Negative)
                }
            }
        }
    }
}

/// Blank cells never match a label, even a missing one
fn side(value: &str, positive: &str, negative: &str) -> Option<Label> {
    if value.is_empty() {
        None
    } else if value == positive {
        Some(Label::Positive)
    } else if value == negative {
        Some(Label::Negative)
    } else {
        None
    }
}

/// Build the ordered list of comparisons for a dataset
///
/// # Errors
/// Returns `VipError::Schema` if the group or sub-group column is missing
pub fn enumerate(table: &CsvData, layout: &ColumnLayout) -> Result<Vec<Comparison>> {
    let groups = distinct_values(table, &layout.group)?;
    let subgroups = distinct_values(table, &layout.subgroup)?;

    let mut names = NameRegistry::default();
    let mut comparisons = Vec::new();

    // Global
    if groups.len() != 2 {
        log::warn!(
            "Group column '{}' has {} distinct values ({}), global comparison expects 2",
            layout.group,
            groups.len(),
            groups.join(", ")
        );
    }
    let (positive, negative) = global_labels(&groups, layout.control_group.as_deref());
    comparisons.push(Comparison {
        name: names.claim(&format!("{positive}_vs_{negative}")),
        kind: ComparisonKind::Global,
        positive,
        negative,
    });

    // Pairwise
    for (i, first) in subgroups.iter().enumerate() {
        for second in &subgroups[i + 1..] {
            comparisons.push(Comparison {
                name: names.claim(&format!("{first}_vs_{second}")),
                kind: ComparisonKind::Pairwise {
                    first: first.clone(),
                    second: second.clone(),
                },
                positive: first.clone(),
                negative: second.clone(),
            });
        }
    }

    // One-vs-rest
    let baseline = &layout.baseline_subgroup;
    for target in subgroups.iter().filter(|s| *s != baseline) {
        comparisons.push(Comparison {
            name: names.claim(&format!("{target}_vs_{REST_LABEL}")),
            kind: ComparisonKind::OneVsRest {
                target: target.clone(),
                baseline: baseline.clone(),
            },
            positive: target.clone(),
            negative: REST_LABEL.to_string(),
        });
    }

    Ok(comparisons)
}

/// Sorted distinct non-empty values of a column
fn distinct_values(table: &CsvData, column: &str) -> Result<Vec<String>> {
    let index = table
        .column_index(column)
        .ok_or_else(|| VipError::Schema(format!("column '{column}' not found")))?;
    let values: BTreeSet<String> = table
        .column(index)
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok(values.into_iter().collect())
}

fn global_labels(groups: &[String], control: Option<&str>) -> (String, String) {
    if let Some(control) = control.filter(|c| groups.iter().any(|g| g == c)) {
        let positive = groups
            .iter()
            .find(|g| *g != control)
            .cloned()
            .unwrap_or_default();
        return (positive, control.to_string());
    }
    (
        groups.first().cloned().unwrap_or_default(),
        groups.get(1).cloned().unwrap_or_default(),
    )
}

/// Hands out unique, filename-safe comparison names
#[derive(Default)]
struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        let mut name = base.clone();
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{base}_{n}");
            n += 1;
        }
        name
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
