//! Enumerations and field types shared by the engine and the CLI.
//!
//! This module defines the structured values used to categorise entities and
//! tasks: task status, scheduling categories, owner types, cost precedence
//! models and the individual cost sources they order.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task completion status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    #[serde(alias = "NotStarted", alias = "Not Started")]
    NotStarted,
    #[serde(alias = "InProgress", alias = "In Progress")]
    InProgress,
    #[serde(alias = "Done", alias = "Complete")]
    Done,
    #[serde(alias = "Delayed")]
    Delayed,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }
}

/// Scheduling category: selects the default offset table and the task
/// definitions used when generating deadlines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Song,
    Stems,
    Video,
    Release,
    PhysicalRelease,
    Event,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Song,
        Category::Stems,
        Category::Video,
        Category::Release,
        Category::PhysicalRelease,
        Category::Event,
    ];

    /// Key used for this category in stored offset overrides.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Song => "song",
            Category::Stems => "stems",
            Category::Video => "video",
            Category::Release => "release",
            Category::PhysicalRelease => "physicalRelease",
            Category::Event => "event",
        }
    }

    /// Parse a stored category key. Accepts the camelCase key as well as
    /// the kebab/snake spellings used on the command line.
    pub fn from_key(s: &str) -> Option<Category> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "song" | "songs" => Some(Category::Song),
            "stems" => Some(Category::Stems),
            "video" | "videos" => Some(Category::Video),
            "release" | "releases" => Some(Category::Release),
            "physicalrelease" | "physical" => Some(Category::PhysicalRelease),
            "event" | "events" => Some(Category::Event),
            _ => None,
        }
    }
}

/// The kind of entity that owns a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ParentType {
    Song,
    Version,
    Video,
    Release,
    Event,
    Task,
}

/// Cost precedence model: which cost layer wins when several are filled in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CostModel {
    #[default]
    #[serde(alias = "actualFirst", alias = "actual_first")]
    ActualFirst,
    #[serde(alias = "paidFirst", alias = "paid_first")]
    PaidFirst,
    #[serde(alias = "quotedFirst", alias = "quoted_first")]
    QuotedFirst,
    #[serde(alias = "estimatedFirst", alias = "estimated_first")]
    EstimatedFirst,
    #[serde(alias = "Custom")]
    Custom,
}

/// One of the five cost layers an entity may carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    Actual,
    Paid,
    PartiallyPaid,
    Quoted,
    Estimated,
}

impl CostSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CostSource::Actual => "actual",
            CostSource::Paid => "paid",
            CostSource::PartiallyPaid => "partially_paid",
            CostSource::Quoted => "quoted",
            CostSource::Estimated => "estimated",
        }
    }

    /// Parse a source name as it appears in a stored custom order.
    pub fn from_name(s: &str) -> Option<CostSource> {
        match s.trim() {
            "actual" => Some(CostSource::Actual),
            "paid" => Some(CostSource::Paid),
            "partially_paid" | "partiallyPaid" => Some(CostSource::PartiallyPaid),
            "quoted" => Some(CostSource::Quoted),
            "estimated" => Some(CostSource::Estimated),
            _ => None,
        }
    }
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accepts_legacy_labels() {
        let s: Status = serde_json::from_str("\"Not Started\"").unwrap();
        assert_eq!(s, Status::NotStarted);
        let s: Status = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(s, Status::InProgress);
        let s: Status = serde_json::from_str("\"Done\"").unwrap();
        assert!(s.is_done());
    }

    #[test]
    fn test_category_keys() {
        for c in Category::ALL {
            assert_eq!(Category::from_key(c.as_str()), Some(c));
        }
        assert_eq!(Category::from_key("physical-release"), Some(Category::PhysicalRelease));
        assert_eq!(Category::from_key("podcast"), None);
    }

    #[test]
    fn test_cost_source_names() {
        assert_eq!(CostSource::from_name("partiallyPaid"), Some(CostSource::PartiallyPaid));
        assert_eq!(CostSource::from_name("amount"), None);
        assert_eq!(
            serde_json::to_string(&CostSource::PartiallyPaid).unwrap(),
            "\"partially_paid\""
        );
    }
}
