//! Rule-based browsing groups and the default "active columns" selection.
//!
//! Groups are a name-level convenience for the column browser; they do not
//! affect classification.  Keywords are matched lowercase, first group wins.

use std::collections::{BTreeMap, HashSet};

use super::classify::{ClassifiedColumn, ColumnCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnGroup {
    Time,
    Coordinates,
    RegionOrArea,
    Species,
    SiteType,
    Counts,
    Lengths,
    Numeric,
    Text,
    Other,
}

impl ColumnGroup {
    pub fn label(&self) -> &'static str {
        match self {
            ColumnGroup::Time => "Time",
            ColumnGroup::Coordinates => "Coordinates",
            ColumnGroup::RegionOrArea => "Region or area",
            ColumnGroup::Species => "Species",
            ColumnGroup::SiteType => "Site type",
            ColumnGroup::Counts => "Counts",
            ColumnGroup::Lengths => "Lengths",
            ColumnGroup::Numeric => "Numeric",
            ColumnGroup::Text => "Text",
            ColumnGroup::Other => "Other",
        }
    }
}

struct GroupRule {
    group: ColumnGroup,
    contains_any: &'static [&'static str],
    whole_word: &'static [&'static str],
}

const RULES: &[GroupRule] = &[
    GroupRule {
        group: ColumnGroup::Time,
        contains_any: &[
            "date", "time", "aika", "päivä", "kuukausi", "viikko", "vuosi", "year", "timestamp",
            "datetime", "created", "modified",
        ],
        whole_word: &["pvm", "pp", "dd", "kk", "mm", "yyyy", "vvvv", "vko"],
    },
    GroupRule {
        group: ColumnGroup::Coordinates,
        contains_any: &["lat", "latitude", "lon", "lng", "longitude", "koord", "coord", "x_", "y_"],
        whole_word: &["x", "y"],
    },
    GroupRule {
        group: ColumnGroup::RegionOrArea,
        contains_any: &[
            "maakunta", "region", "county", "province", "country", "block", "stand", "plot",
            "pinta-ala", "pinta_ala", "area",
        ],
        whole_word: &["site"],
    },
    GroupRule {
        group: ColumnGroup::Species,
        contains_any: &["species"],
        whole_word: &["puulaji"],
    },
    GroupRule {
        group: ColumnGroup::SiteType,
        contains_any: &["metsätyyp", "metsa", "forest type", "site", "soil", "maaperä", "ground type"],
        whole_word: &["site.type", "site_type", "maan_laji", "maalaji", "maa_laji"],
    },
    GroupRule {
        group: ColumnGroup::Counts,
        contains_any: &["count", "number", "quantity", "määrä", "lukumäärä", "lkm", "kpl", "qty"],
        whole_word: &["no", "n"],
    },
    GroupRule {
        group: ColumnGroup::Lengths,
        contains_any: &["length", "pituus", "height", "korkeus", "diameter", "läpimitta"],
        whole_word: &[],
    },
];

/// Priority used when preselecting active columns.
const PRESELECT_ORDER: &[ColumnGroup] = &[
    ColumnGroup::Coordinates,
    ColumnGroup::Time,
    ColumnGroup::RegionOrArea,
    ColumnGroup::Species,
    ColumnGroup::SiteType,
    ColumnGroup::Counts,
    ColumnGroup::Lengths,
    ColumnGroup::Numeric,
    ColumnGroup::Text,
    ColumnGroup::Other,
];

/// Group for one column: first matching name rule, else by category.
pub fn group_of(column: &ClassifiedColumn) -> ColumnGroup {
    let name = column.name.trim().to_lowercase();
    for rule in RULES {
        let substring = rule.contains_any.iter().any(|w| name.contains(w));
        let exact = rule.whole_word.iter().any(|w| name == *w);
        if substring || exact {
            return rule.group;
        }
    }
    match column.category {
        c if c.is_numeric_valued() => ColumnGroup::Numeric,
        ColumnCategory::Categorical | ColumnCategory::Identifier => ColumnGroup::Text,
        _ => ColumnGroup::Other,
    }
}

/// Columns per group, only non-empty groups, columns in table order.
pub fn group_columns(columns: &[ClassifiedColumn]) -> BTreeMap<ColumnGroup, Vec<String>> {
    let mut groups: BTreeMap<ColumnGroup, Vec<String>> = BTreeMap::new();
    for column in columns {
        groups.entry(group_of(column)).or_default().push(column.name.clone());
    }
    groups
}

/// Default active columns: coordinate columns first, then up to
/// `max_per_group` from each group by priority, then the rest in table
/// order, never more than `max_total`.
pub fn preselect_active(
    columns: &[ClassifiedColumn],
    max_per_group: usize,
    max_total: usize,
) -> Vec<String> {
    let groups = group_columns(columns);
    let mut picked: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut take = |name: &str, picked: &mut Vec<String>| {
        if picked.len() < max_total && seen.insert(name.to_string()) {
            picked.push(name.to_string());
        }
    };

    for column in columns.iter().filter(|c| c.category.is_coordinate()) {
        take(&column.name, &mut picked);
    }
    for group in PRESELECT_ORDER {
        for name in groups.get(group).into_iter().flatten().take(max_per_group) {
            take(name, &mut picked);
        }
    }
    for column in columns {
        take(&column.name, &mut picked);
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::Evidence;

    fn col(name: &str, category: ColumnCategory) -> ClassifiedColumn {
        ClassifiedColumn {
            name: name.to_string(),
            category,
            evidence: Evidence::default(),
        }
    }

    #[test]
    fn name_rules_win_over_category() {
        assert_eq!(group_of(&col("tree_height", ColumnCategory::Numeric)), ColumnGroup::Lengths);
        assert_eq!(group_of(&col("Puulaji", ColumnCategory::Categorical)), ColumnGroup::Species);
        assert_eq!(group_of(&col("x", ColumnCategory::Numeric)), ColumnGroup::Coordinates);
        assert_eq!(group_of(&col("notes", ColumnCategory::Categorical)), ColumnGroup::Text);
        assert_eq!(group_of(&col("weight", ColumnCategory::Numeric)), ColumnGroup::Numeric);
    }

    #[test]
    fn preselection_puts_coordinates_first_and_caps() {
        let columns = vec![
            col("a", ColumnCategory::Numeric),
            col("b", ColumnCategory::Numeric),
            col("c", ColumnCategory::Numeric),
            col("latitude", ColumnCategory::Latitude),
            col("longitude", ColumnCategory::Longitude),
            col("label", ColumnCategory::Categorical),
        ];
        let picked = preselect_active(&columns, 2, 5);
        assert_eq!(picked, vec!["latitude", "longitude", "a", "b", "label"]);

        let all = preselect_active(&columns, 4, 30);
        assert_eq!(all.len(), columns.len());
    }
}
