//! Day offsets used to derive task deadlines from a reference date.
//!
//! A task of type `Mix` for a song is due `42` days before the song's release
//! date unless the user or the project type says otherwise. Lookups go
//! through four layers, highest first:
//!
//! 1. user override for the project type (`userOffsets.projectTypes.Album.Mix`)
//! 2. user override for the category (`userOffsets.song.Mix`)
//! 3. built-in project type default
//! 4. built-in category default
//!
//! and resolve to `0` (due on the reference date) when no layer knows the
//! task type.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::fields::Category;

/// Task type -> days before the reference date. Negative values fall after it.
pub type OffsetMap = BTreeMap<String, i64>;

const CATEGORY_DEFAULTS: &[(Category, &[(&str, i64)])] = &[
    (
        Category::Song,
        &[
            ("Songwriting", 120),
            ("Demo", 90),
            ("Recording", 70),
            ("Mix", 42),
            ("Artwork", 35),
            ("Pitch to Playlists", 28),
            ("Master", 21),
            ("Distribution Upload", 14),
            ("Release", 0),
        ],
    ),
    (Category::Stems, &[("Stems Export", 14), ("Stems Delivery", 7)]),
    (
        Category::Video,
        &[
            ("Concept", 60),
            ("Storyboard", 45),
            ("Location Scouting", 40),
            ("Shoot", 30),
            ("Lyric Sync", 21),
            ("Visualizer Design", 21),
            ("Edit", 18),
            ("Color Grade", 12),
            ("Render", 10),
            ("Video Upload", 3),
            ("Premiere", 0),
        ],
    ),
    (
        Category::Release,
        &[
            ("Finalize Tracklist", 90),
            ("Album Sequencing", 75),
            ("Liner Notes", 60),
            ("Artwork", 56),
            ("Distribution Upload", 28),
            ("Pre-save Campaign", 21),
            ("Press Release", 14),
            ("Release", 0),
            ("Post-Release Promo", -7),
        ],
    ),
    (
        Category::PhysicalRelease,
        &[
            ("Manufacturing Order", 84),
            ("Test Pressing Approval", 56),
            ("Shipping to Distributor", 21),
            ("Release", 0),
        ],
    ),
    (
        Category::Event,
        &[
            ("Book Venue", 60),
            ("Promote Event", 21),
            ("Rehearsal", 7),
            ("Soundcheck", 0),
            ("Event", 0),
        ],
    ),
];

const PROJECT_TYPE_DEFAULTS: &[(&str, &[(&str, i64)])] = &[
    (
        "Album",
        &[
            ("Finalize Tracklist", 120),
            ("Artwork", 70),
            ("Mix", 56),
            ("Distribution Upload", 42),
            ("Master", 35),
        ],
    ),
    ("EP", &[("Mix", 49), ("Distribution Upload", 35), ("Master", 28)]),
    ("Single", &[("Pre-save Campaign", 14)]),
    ("Vinyl", &[("Manufacturing Order", 120), ("Shipping to Distributor", 28)]),
    ("Lyric Video", &[("Edit", 10)]),
    ("Visualizer", &[("Video Upload", 2)]),
];

fn to_map(entries: &[(&str, i64)]) -> OffsetMap {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Sanitised user overrides, as stored in settings.
///
/// Serialised shape: `{"song": {"Mix": 30}, "projectTypes": {"Album": {"Mix": 50}}}`.
/// Deserialisation always runs [`validate_offsets`], so a loaded value never
/// holds negative or non-numeric overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct UserOffsets {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub project_types: BTreeMap<String, OffsetMap>,
    #[serde(flatten)]
    pub categories: BTreeMap<String, OffsetMap>,
}

impl From<Value> for UserOffsets {
    fn from(value: Value) -> Self {
        validate_offsets(&value)
    }
}

impl UserOffsets {
    pub fn category(&self, category: Category, task_type: &str) -> Option<i64> {
        self.categories.get(category.as_str())?.get(task_type).copied()
    }

    pub fn project_type(&self, project_type: &str, task_type: &str) -> Option<i64> {
        self.project_types.get(project_type)?.get(task_type).copied()
    }

    pub fn set_category(&mut self, category: Category, task_type: &str, days: i64) {
        self.categories
            .entry(category.as_str().to_string())
            .or_default()
            .insert(task_type.to_string(), days);
    }

    pub fn set_project_type(&mut self, project_type: &str, task_type: &str, days: i64) {
        self.project_types
            .entry(project_type.to_string())
            .or_default()
            .insert(task_type.to_string(), days);
    }

    /// Remove an override. Returns whether one existed.
    pub fn clear(&mut self, scope: &str, task_type: &str) -> bool {
        let map = match Category::from_key(scope) {
            Some(c) => self.categories.get_mut(c.as_str()),
            None => self.project_types.get_mut(scope),
        };
        map.map(|m| m.remove(task_type).is_some()).unwrap_or(false)
    }
}

/// Built-in offsets with user overrides merged in, per category and per
/// project type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedOffsets {
    pub categories: BTreeMap<Category, OffsetMap>,
    pub project_types: BTreeMap<String, OffsetMap>,
}

/// Default offset tables. The built-in instance is shared; custom tables can
/// be constructed for tests or alternative catalogs.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    categories: BTreeMap<Category, OffsetMap>,
    project_types: BTreeMap<String, OffsetMap>,
}

impl OffsetTable {
    pub fn new(
        categories: BTreeMap<Category, OffsetMap>,
        project_types: BTreeMap<String, OffsetMap>,
    ) -> Self {
        OffsetTable { categories, project_types }
    }

    /// The built-in defaults.
    pub fn builtin() -> &'static OffsetTable {
        static TABLE: OnceLock<OffsetTable> = OnceLock::new();
        TABLE.get_or_init(|| OffsetTable {
            categories: CATEGORY_DEFAULTS.iter().map(|(c, e)| (*c, to_map(e))).collect(),
            project_types: PROJECT_TYPE_DEFAULTS
                .iter()
                .map(|(p, e)| (p.to_string(), to_map(e)))
                .collect(),
        })
    }

    pub fn category_default(&self, category: Category, task_type: &str) -> Option<i64> {
        self.categories.get(&category)?.get(task_type).copied()
    }

    pub fn project_type_default(&self, project_type: &str, task_type: &str) -> Option<i64> {
        self.project_types.get(project_type)?.get(task_type).copied()
    }

    /// Effective offset for a task type. Never fails: unknown types are due
    /// on the reference date.
    pub fn offset(
        &self,
        task_type: &str,
        category: Category,
        user: &UserOffsets,
        project_type: Option<&str>,
    ) -> i64 {
        project_type
            .and_then(|p| user.project_type(p, task_type))
            .or_else(|| user.category(category, task_type))
            .or_else(|| project_type.and_then(|p| self.project_type_default(p, task_type)))
            .or_else(|| self.category_default(category, task_type))
            .unwrap_or(0)
    }

    /// Shallow-merge user overrides over the defaults. Entries the user did
    /// not override are kept.
    pub fn merge(&self, user: &UserOffsets) -> MergedOffsets {
        let mut merged = MergedOffsets {
            categories: self.categories.clone(),
            project_types: self.project_types.clone(),
        };
        for (key, overrides) in &user.categories {
            let Some(category) = Category::from_key(key) else {
                continue;
            };
            let table = merged.categories.entry(category).or_default();
            for (task_type, days) in overrides {
                table.insert(task_type.clone(), *days);
            }
        }
        for (project_type, overrides) in &user.project_types {
            let table = merged.project_types.entry(project_type.clone()).or_default();
            for (task_type, days) in overrides {
                table.insert(task_type.clone(), *days);
            }
        }
        merged
    }
}

/// Offset lookup against the built-in tables.
pub fn get_offset(
    task_type: &str,
    category: Category,
    user: &UserOffsets,
    project_type: Option<&str>,
) -> i64 {
    OffsetTable::builtin().offset(task_type, category, user, project_type)
}

/// Merge user overrides over the built-in tables.
pub fn merge_offsets(user: &UserOffsets) -> MergedOffsets {
    OffsetTable::builtin().merge(user)
}

fn sanitize_days(value: &Value) -> Option<i64> {
    let days = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    Some(days.round() as i64)
}

fn sanitize_table(scope: &str, raw: &Value) -> OffsetMap {
    let Some(entries) = raw.as_object() else {
        debug!(scope, "offset overrides are not an object, ignoring");
        return OffsetMap::new();
    };
    let mut out = OffsetMap::new();
    for (task_type, value) in entries {
        match sanitize_days(value) {
            Some(days) => {
                out.insert(task_type.clone(), days);
            }
            None => {
                debug!(scope, task_type = %task_type, %value, "dropping invalid offset override")
            }
        }
    }
    out
}

/// Sanitise raw user overrides: negative, non-finite and non-numeric values
/// are dropped; everything else keeps its place. Known category keys are
/// normalised to their canonical spelling.
pub fn validate_offsets(raw: &Value) -> UserOffsets {
    let mut offsets = UserOffsets::default();
    let Some(root) = raw.as_object() else {
        return offsets;
    };
    for (key, value) in root {
        if key == "projectTypes" || key == "project_types" {
            if let Some(types) = value.as_object() {
                for (project_type, table) in types {
                    offsets
                        .project_types
                        .insert(project_type.clone(), sanitize_table(project_type, table));
                }
            }
            continue;
        }
        let canonical = Category::from_key(key)
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| key.clone());
        offsets.categories.insert(canonical.clone(), sanitize_table(&canonical, value));
    }
    offsets
}
