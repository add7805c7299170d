//! Task data structure and related functionality.
//!
//! A `Task` is one production step (Mix, Shoot, Press Release, ...) owned by a
//! song, version, video, release or event. Owners keep their tasks in their
//! own collections; the task only records who its owner is.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::cost::{deserialize_money, CostLayer, Money};
use crate::fields::*;

/// Era, stage and tag identifiers carried by songs, versions, videos and tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub era_ids: BTreeSet<String>,
    #[serde(default)]
    pub stage_ids: BTreeSet<String>,
    #[serde(default)]
    pub tag_ids: BTreeSet<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.era_ids.is_empty() && self.stage_ids.is_empty() && self.tag_ids.is_empty()
    }

    /// Fill each empty dimension from `ancestor`. Non-empty dimensions are
    /// never touched.
    pub fn fill_from(&mut self, ancestor: &Metadata) {
        if self.era_ids.is_empty() {
            self.era_ids = ancestor.era_ids.clone();
        }
        if self.stage_ids.is_empty() {
            self.stage_ids = ancestor.stage_ids.clone();
        }
        if self.tag_ids.is_empty() {
            self.tag_ids = ancestor.tag_ids.clone();
        }
    }
}

/// A team member booked on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedMember {
    pub member_id: String,
    #[serde(default, deserialize_with = "deserialize_money")]
    pub cost: Money,
    #[serde(default)]
    pub instrument: Option<String>,
}

/// Reference to the entity that owns a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOwner {
    pub parent_type: ParentType,
    pub parent_id: String,
}

impl TaskOwner {
    pub fn new(parent_type: ParentType, parent_id: impl Into<String>) -> Self {
        TaskOwner { parent_type, parent_id: parent_id.into() }
    }
}

/// A unit of production work with a deadline and costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub cost: CostLayer,
    /// The date was set by hand; recalculation leaves it alone.
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub parent_type: Option<ParentType>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub meta: Metadata,
    #[serde(default)]
    pub assigned_members: Vec<AssignedMember>,
    #[serde(default)]
    pub notes: Option<String>,
    /// May be skipped; counts towards the minimum rollout cost only once money is committed.
    #[serde(default)]
    pub is_optional: bool,
    /// Children are mutually exclusive alternatives.
    #[serde(default)]
    pub is_choice_group: bool,
    #[serde(default)]
    pub selected_child_id: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Task {
            id: id.into(),
            task_type: task_type.into(),
            category: category.into(),
            date: None,
            status: Status::NotStarted,
            cost: CostLayer::default(),
            is_overridden: false,
            parent_type: None,
            parent_id: None,
            meta: Metadata::default(),
            assigned_members: Vec::new(),
            notes: None,
            is_optional: false,
            is_choice_group: false,
            selected_child_id: None,
        }
    }

    pub fn owned_by(mut self, owner: &TaskOwner) -> Self {
        self.parent_type = Some(owner.parent_type);
        self.parent_id = Some(owner.parent_id.clone());
        self
    }

    /// Manual date edit. Marks the task overridden in the same write so
    /// later recalculations keep the user's date.
    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
        self.is_overridden = true;
    }

    /// Hand the date back to automatic scheduling.
    pub fn reset_override(&mut self) {
        self.is_overridden = false;
    }

    /// Overridden or finished tasks are immune to recalculation and
    /// metadata propagation.
    pub fn is_locked(&self) -> bool {
        self.is_overridden || self.status.is_done()
    }

    pub fn member_total(&self) -> Money {
        self.assigned_members
            .iter()
            .map(|m| if m.cost.is_finite() { m.cost } else { 0.0 })
            .sum()
    }
}

/// Lowercase, hyphen-separated form of a label, used to build stable ids.
pub fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Id of the generated task of `task_type` under `owner`. Stable, so
/// regenerating a deadline set yields the same ids.
///
/// The ':' separator never comes out of [`slugify`], so derived ids cannot
/// collide with user-facing ids. Physical deadlines get their own segment
/// since a release carries both sets and both contain a "Release" task.
pub fn generated_task_id(owner: &TaskOwner, category: Category, task_type: &str) -> String {
    match category {
        Category::PhysicalRelease => {
            format!("{}:physical:{}", owner.parent_id, slugify(task_type))
        }
        _ => format!("{}:{}", owner.parent_id, slugify(task_type)),
    }
}

/// Parse an ISO date, tolerating a trailing time component.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Serde helper: empty or unparseable stored dates load as `None`.
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_iso_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manual_date_edit_sets_override() {
        let mut t = Task::new("t1", "Mix", "song");
        assert!(!t.is_locked());
        t.set_date(NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(t.is_overridden);
        assert!(t.is_locked());
        t.reset_override();
        assert!(!t.is_locked());
        t.status = Status::Done;
        assert!(t.is_locked());
    }

    #[test]
    fn test_deserialize_stored_shape() {
        let t: Task = serde_json::from_value(json!({
            "id": "a",
            "type": "Release",
            "date": "2024-01-01T00:00:00.000Z",
            "status": "Not Started",
            "cost": { "paidCost": "120" },
            "eraIds": ["era-1"],
            "assignedMembers": [{ "memberId": "m1", "cost": "50", "instrument": "Bass" }]
        }))
        .unwrap();
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(t.cost.paid, 120.0);
        assert!(t.meta.era_ids.contains("era-1"));
        assert!(t.meta.tag_ids.is_empty());
        assert_eq!(t.member_total(), 50.0);
        assert!(!t.is_overridden);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pitch to Playlists"), "pitch-to-playlists");
        assert_eq!(slugify("  Pre-save  Campaign!"), "pre-save-campaign");
        assert_eq!(slugify(""), "");
        let owner = TaskOwner::new(ParentType::Song, "song-1");
        assert_eq!(generated_task_id(&owner, Category::Song, "Mix"), "song-1:mix");
        let release = TaskOwner::new(ParentType::Release, "r1");
        assert_eq!(generated_task_id(&release, Category::Release, "Release"), "r1:release");
        assert_eq!(
            generated_task_id(&release, Category::PhysicalRelease, "Release"),
            "r1:physical:release"
        );
    }

    #[test]
    fn test_bad_date_loads_as_none() {
        for date in [json!(""), json!(null)] {
            let t: Task =
                serde_json::from_value(json!({ "id": "a", "type": "Mix", "date": date })).unwrap();
            assert_eq!(t.date, None);
        }
    }

    #[test]
    fn test_fill_from_only_fills_empty_sets() {
        let song = Metadata {
            era_ids: ["e1".to_string()].into(),
            stage_ids: ["s1".to_string()].into(),
            tag_ids: ["t1".to_string()].into(),
        };
        let mut child = Metadata { tag_ids: ["own".to_string()].into(), ..Default::default() };
        child.fill_from(&song);
        assert_eq!(child.era_ids, song.era_ids);
        assert_eq!(child.stage_ids, song.stage_ids);
        assert!(child.tag_ids.contains("own") && child.tag_ids.len() == 1);
    }
}
