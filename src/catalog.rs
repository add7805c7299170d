//! Task definitions: which deadlines a category gets.
//!
//! The scheduler is generic over categories; this catalog is the injected
//! table that tells it which task types to create for a song, a lyric video,
//! an album release and so on. A definition restricted to subtypes only
//! applies when the owner's subtype (video type, release type, format) is one
//! of them.

use std::sync::OnceLock;

use crate::fields::Category;

/// One task type generated for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub task_type: String,
    pub category: Category,
    /// Empty means every subtype.
    pub subtypes: Vec<String>,
}

impl TaskDefinition {
    pub fn new(category: Category, task_type: &str, subtypes: &[&str]) -> Self {
        TaskDefinition {
            task_type: task_type.to_string(),
            category,
            subtypes: subtypes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn applies_to(&self, subtype: &str) -> bool {
        self.subtypes.is_empty() || self.subtypes.iter().any(|s| s.eq_ignore_ascii_case(subtype))
    }
}

/// Ordered set of task definitions plus the subtype assumed for owners that
/// do not name one.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    definitions: Vec<TaskDefinition>,
    default_subtypes: Vec<(Category, String)>,
}

const BUILTIN: &[(Category, &str, &[&str])] = &[
    (Category::Song, "Songwriting", &[]),
    (Category::Song, "Demo", &[]),
    (Category::Song, "Recording", &[]),
    (Category::Song, "Mix", &[]),
    (Category::Song, "Artwork", &[]),
    (Category::Song, "Pitch to Playlists", &[]),
    (Category::Song, "Master", &[]),
    (Category::Song, "Distribution Upload", &[]),
    (Category::Song, "Release", &[]),
    (Category::Stems, "Stems Export", &[]),
    (Category::Stems, "Stems Delivery", &[]),
    (Category::Video, "Concept", &["Music Video"]),
    (Category::Video, "Storyboard", &["Music Video"]),
    (Category::Video, "Location Scouting", &["Music Video"]),
    (Category::Video, "Shoot", &["Music Video"]),
    (Category::Video, "Lyric Sync", &["Lyric Video"]),
    (Category::Video, "Visualizer Design", &["Visualizer"]),
    (Category::Video, "Edit", &["Music Video", "Lyric Video"]),
    (Category::Video, "Color Grade", &["Music Video"]),
    (Category::Video, "Render", &["Visualizer"]),
    (Category::Video, "Video Upload", &[]),
    (Category::Video, "Premiere", &[]),
    (Category::Release, "Finalize Tracklist", &[]),
    (Category::Release, "Album Sequencing", &["Album", "EP"]),
    (Category::Release, "Liner Notes", &["Album"]),
    (Category::Release, "Artwork", &[]),
    (Category::Release, "Distribution Upload", &[]),
    (Category::Release, "Pre-save Campaign", &[]),
    (Category::Release, "Press Release", &[]),
    (Category::Release, "Release", &[]),
    (Category::Release, "Post-Release Promo", &[]),
    (Category::PhysicalRelease, "Manufacturing Order", &[]),
    (Category::PhysicalRelease, "Test Pressing Approval", &["Vinyl"]),
    (Category::PhysicalRelease, "Shipping to Distributor", &[]),
    (Category::PhysicalRelease, "Release", &[]),
    (Category::Event, "Book Venue", &[]),
    (Category::Event, "Promote Event", &[]),
    (Category::Event, "Rehearsal", &[]),
    (Category::Event, "Soundcheck", &[]),
    (Category::Event, "Event", &[]),
];

impl TaskCatalog {
    pub fn new(definitions: Vec<TaskDefinition>) -> Self {
        TaskCatalog { definitions, default_subtypes: Vec::new() }
    }

    pub fn with_default_subtype(mut self, category: Category, subtype: &str) -> Self {
        self.default_subtypes.retain(|(c, _)| *c != category);
        self.default_subtypes.push((category, subtype.to_string()));
        self
    }

    pub fn builtin() -> &'static TaskCatalog {
        static CATALOG: OnceLock<TaskCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            TaskCatalog::new(
                BUILTIN
                    .iter()
                    .map(|(category, task_type, subtypes)| {
                        TaskDefinition::new(*category, task_type, subtypes)
                    })
                    .collect(),
            )
            .with_default_subtype(Category::Video, "Music Video")
            .with_default_subtype(Category::Release, "Single")
            .with_default_subtype(Category::PhysicalRelease, "CD")
        })
    }

    pub fn default_subtype(&self, category: Category) -> Option<&str> {
        self.default_subtypes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| s.as_str())
    }

    /// Definitions that apply to `category` and `subtype`, in catalog order.
    pub fn definitions_for<'a>(
        &'a self,
        category: Category,
        subtype: Option<&'a str>,
    ) -> impl Iterator<Item = &'a TaskDefinition> + 'a {
        let subtype = subtype.or_else(|| self.default_subtype(category));
        self.definitions.iter().filter(move |d| {
            d.category == category
                && match subtype {
                    Some(s) => d.applies_to(s),
                    None => d.subtypes.is_empty(),
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(category: Category, subtype: Option<&str>) -> Vec<String> {
        TaskCatalog::builtin()
            .definitions_for(category, subtype)
            .map(|d| d.task_type.clone())
            .collect()
    }

    #[test]
    fn test_video_types_differ() {
        let music = types(Category::Video, Some("Music Video"));
        assert!(music.contains(&"Shoot".to_string()));
        assert!(!music.contains(&"Lyric Sync".to_string()));

        let lyric = types(Category::Video, Some("lyric video"));
        assert_eq!(lyric, vec!["Lyric Sync", "Edit", "Video Upload", "Premiere"]);
    }

    #[test]
    fn test_default_subtype_used_when_missing() {
        assert_eq!(types(Category::Video, None), types(Category::Video, Some("Music Video")));
        assert!(!types(Category::Release, None).contains(&"Liner Notes".to_string()));
    }

    #[test]
    fn test_album_specific_tasks() {
        let album = types(Category::Release, Some("Album"));
        let ep = types(Category::Release, Some("EP"));
        let single = types(Category::Release, Some("Single"));
        assert!(album.contains(&"Liner Notes".to_string()));
        assert!(ep.contains(&"Album Sequencing".to_string()));
        assert!(!ep.contains(&"Liner Notes".to_string()));
        assert!(!single.contains(&"Album Sequencing".to_string()));
    }

    #[test]
    fn test_song_ignores_subtype() {
        assert_eq!(types(Category::Song, Some("Album")).len(), 9);
    }
}
