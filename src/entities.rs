//! Songs, versions, videos, releases and events: the owners of deadlines.
//!
//! Every owner keeps two task collections: `deadlines`, which the scheduler
//! generates and recalculates, and `customTasks`, which the user adds by hand.
//! Both are recalculated when the owner's reference date moves (custom tasks
//! of an unknown type simply land on the reference date unless overridden).

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cost::CostLayer;
use crate::error::{Error, Result};
use crate::fields::{Category, ParentType, Status};
use crate::schedule::Scheduler;
use crate::task::{deserialize_date, Metadata, Task, TaskOwner};

/// An owner whose deadlines derive from a reference date.
pub trait Scheduled {
    fn owner(&self) -> TaskOwner;
    fn category(&self) -> Category;
    /// Video type, release type or physical format, if any.
    fn subtype(&self) -> Option<&str>;
    /// Own date, falling back to `inherited` (the song's date for versions
    /// and videos).
    fn reference_date(&self, inherited: Option<NaiveDate>) -> Option<NaiveDate>;
    fn deadlines_mut(&mut self) -> &mut Vec<Task>;
    fn custom_tasks_mut(&mut self) -> &mut Vec<Task>;

    /// Recalculate (or first-time generate) deadlines and re-derive custom
    /// task dates against the current reference date.
    fn reschedule(&mut self, scheduler: &Scheduler, inherited: Option<NaiveDate>) {
        let subtype = self.subtype().map(str::to_string);
        self.reschedule_as(scheduler, inherited, subtype.as_deref());
    }

    /// `reschedule` with an explicit subtype, for owners whose subtype comes
    /// from their parent.
    fn reschedule_as(
        &mut self,
        scheduler: &Scheduler,
        inherited: Option<NaiveDate>,
        subtype: Option<&str>,
    ) {
        let reference = self.reference_date(inherited);
        let owner = self.owner();
        let category = self.category();
        let deadlines = std::mem::take(self.deadlines_mut());
        *self.deadlines_mut() =
            scheduler.recalculate(deadlines, reference, &owner, category, subtype);
        let custom = std::mem::take(self.custom_tasks_mut());
        *self.custom_tasks_mut() = if custom.is_empty() {
            custom
        } else {
            scheduler.recalculate(custom, reference, &owner, category, subtype)
        };
    }
}

macro_rules! scheduled_accessors {
    () => {
        fn deadlines_mut(&mut self) -> &mut Vec<Task> {
            &mut self.deadlines
        }
        fn custom_tasks_mut(&mut self) -> &mut Vec<Task> {
            &mut self.custom_tasks
        }
    };
}

/// A recording of a song: the core version, a remix, an acoustic take, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub release_ids: BTreeSet<String>,
    /// Release id -> date this version goes out on that release.
    #[serde(default)]
    pub release_overrides: BTreeMap<String, NaiveDate>,
    #[serde(default)]
    pub cost: CostLayer,
    #[serde(flatten)]
    pub meta: Metadata,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub deadlines: Vec<Task>,
    #[serde(default)]
    pub custom_tasks: Vec<Task>,
}

impl Version {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Version {
            id: id.into(),
            name: name.into(),
            is_core: false,
            release_date: None,
            release_ids: BTreeSet::new(),
            release_overrides: BTreeMap::new(),
            cost: CostLayer::default(),
            meta: Metadata::default(),
            is_overridden: false,
            status: Status::NotStarted,
            deadlines: Vec::new(),
            custom_tasks: Vec::new(),
        }
    }

    /// Date this version goes out on `release`: the per-release override if
    /// one is set, else the release's own date.
    pub fn release_date_for(&self, release: &Release) -> Option<NaiveDate> {
        self.release_overrides
            .get(&release.id)
            .copied()
            .or(release.release_date)
    }

    pub fn link_release(&mut self, release_id: &str, date: Option<NaiveDate>) {
        self.release_ids.insert(release_id.to_string());
        match date {
            Some(d) => {
                self.release_overrides.insert(release_id.to_string(), d);
            }
            None => {
                self.release_overrides.remove(release_id);
            }
        }
    }

    pub fn unlink_release(&mut self, release_id: &str) {
        self.release_ids.remove(release_id);
        self.release_overrides.remove(release_id);
    }

    pub fn is_locked(&self) -> bool {
        self.is_overridden || self.status.is_done()
    }
}

impl Scheduled for Version {
    fn owner(&self) -> TaskOwner {
        TaskOwner::new(ParentType::Version, self.id.clone())
    }
    fn category(&self) -> Category {
        Category::Song
    }
    /// Versions use the song's project type; see [`Song::reschedule_all`].
    fn subtype(&self) -> Option<&str> {
        None
    }
    fn reference_date(&self, inherited: Option<NaiveDate>) -> Option<NaiveDate> {
        self.release_date.or(inherited)
    }
    scheduled_accessors!();
}

/// A music video, lyric video or visualizer for a song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub video_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub release_ids: BTreeSet<String>,
    #[serde(default)]
    pub release_overrides: BTreeMap<String, NaiveDate>,
    #[serde(default)]
    pub cost: CostLayer,
    #[serde(flatten)]
    pub meta: Metadata,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub deadlines: Vec<Task>,
    #[serde(default)]
    pub custom_tasks: Vec<Task>,
}

impl Video {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        video_type: Option<String>,
    ) -> Self {
        Video {
            id: id.into(),
            title: title.into(),
            video_type,
            release_date: None,
            release_ids: BTreeSet::new(),
            release_overrides: BTreeMap::new(),
            cost: CostLayer::default(),
            meta: Metadata::default(),
            is_overridden: false,
            status: Status::NotStarted,
            deadlines: Vec::new(),
            custom_tasks: Vec::new(),
        }
    }

    pub fn release_date_for(&self, release: &Release) -> Option<NaiveDate> {
        self.release_overrides
            .get(&release.id)
            .copied()
            .or(release.release_date)
    }

    pub fn link_release(&mut self, release_id: &str, date: Option<NaiveDate>) {
        self.release_ids.insert(release_id.to_string());
        match date {
            Some(d) => {
                self.release_overrides.insert(release_id.to_string(), d);
            }
            None => {
                self.release_overrides.remove(release_id);
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_overridden || self.status.is_done()
    }
}

impl Scheduled for Video {
    fn owner(&self) -> TaskOwner {
        TaskOwner::new(ParentType::Video, self.id.clone())
    }
    fn category(&self) -> Category {
        Category::Video
    }
    fn subtype(&self) -> Option<&str> {
        self.video_type.as_deref()
    }
    fn reference_date(&self, inherited: Option<NaiveDate>) -> Option<NaiveDate> {
        self.release_date.or(inherited)
    }
    scheduled_accessors!();
}

/// A song with its versions and videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub release_date: Option<NaiveDate>,
    /// Single / EP / Album: selects project-type offsets.
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub cost: CostLayer,
    #[serde(flatten)]
    pub meta: Metadata,
    #[serde(default)]
    pub deadlines: Vec<Task>,
    #[serde(default)]
    pub custom_tasks: Vec<Task>,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub videos: Vec<Video>,
    /// Versions are competing options rather than additional recordings.
    #[serde(default)]
    pub alternative_versions: bool,
    #[serde(default)]
    pub selected_version_id: Option<String>,
}

/// Id of a song's core version. Uses the same ':' separator as generated
/// task ids.
pub fn core_version_id(song_id: &str) -> String {
    format!("{song_id}:core")
}

impl Song {
    /// New song with its core version.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        release_date: Option<NaiveDate>,
    ) -> Self {
        let id = id.into();
        let mut core = Version::new(core_version_id(&id), "Core");
        core.is_core = true;
        Song {
            id,
            title: title.into(),
            release_date,
            project_type: None,
            cost: CostLayer::default(),
            meta: Metadata::default(),
            deadlines: Vec::new(),
            custom_tasks: Vec::new(),
            versions: vec![core],
            videos: Vec::new(),
            alternative_versions: false,
            selected_version_id: None,
        }
    }

    pub fn core_version(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.is_core)
    }

    /// Make sure exactly one core version exists. Older files may have none.
    pub fn ensure_core_version(&mut self) {
        if self.core_version().is_some() {
            return;
        }
        let mut core = Version::new(core_version_id(&self.id), "Core");
        core.is_core = true;
        self.versions.insert(0, core);
    }

    pub fn add_version(&mut self, version: Version) {
        self.versions.push(version);
    }

    /// Remove a non-core version.
    pub fn remove_version(&mut self, version_id: &str) -> Result<Version> {
        let idx = self
            .versions
            .iter()
            .position(|v| v.id == version_id)
            .ok_or_else(|| Error::NotFound(format!("version {version_id}")))?;
        if self.versions[idx].is_core {
            return Err(Error::CoreVersion(self.title.clone()));
        }
        if self.selected_version_id.as_deref() == Some(version_id) {
            self.selected_version_id = None;
        }
        Ok(self.versions.remove(idx))
    }

    /// Move the release date and cascade through versions and videos that
    /// follow it.
    pub fn set_release_date(&mut self, date: Option<NaiveDate>, scheduler: &Scheduler) {
        self.release_date = date;
        self.reschedule_all(scheduler);
    }

    /// Reschedule the song's own deadlines and every version and video.
    pub fn reschedule_all(&mut self, scheduler: &Scheduler) {
        self.reschedule(scheduler, None);
        let inherited = self.release_date;
        let project_type = self.project_type.as_deref();
        for version in self.versions.iter_mut() {
            version.reschedule_as(scheduler, inherited, project_type);
        }
        for video in self.videos.iter_mut() {
            video.reschedule(scheduler, inherited);
        }
    }

    /// Every task under this song, with the owning entity's label.
    pub fn all_tasks(&self) -> Vec<(String, &Task)> {
        let mut out = Vec::new();
        for t in self.deadlines.iter().chain(&self.custom_tasks) {
            out.push((self.title.clone(), t));
        }
        for v in &self.versions {
            for t in v.deadlines.iter().chain(&v.custom_tasks) {
                out.push((format!("{} ({})", self.title, v.name), t));
            }
        }
        for v in &self.videos {
            for t in v.deadlines.iter().chain(&v.custom_tasks) {
                out.push((format!("{} [{}]", self.title, v.title), t));
            }
        }
        out
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        let Song { deadlines, custom_tasks, versions, videos, .. } = self;
        deadlines
            .iter_mut()
            .chain(custom_tasks.iter_mut())
            .chain(
                versions
                    .iter_mut()
                    .flat_map(|v| v.deadlines.iter_mut().chain(v.custom_tasks.iter_mut())),
            )
            .chain(
                videos
                    .iter_mut()
                    .flat_map(|v| v.deadlines.iter_mut().chain(v.custom_tasks.iter_mut())),
            )
            .find(|t| t.id == task_id)
    }
}

impl Scheduled for Song {
    fn owner(&self) -> TaskOwner {
        TaskOwner::new(ParentType::Song, self.id.clone())
    }
    fn category(&self) -> Category {
        Category::Song
    }
    fn subtype(&self) -> Option<&str> {
        self.project_type.as_deref()
    }
    fn reference_date(&self, _inherited: Option<NaiveDate>) -> Option<NaiveDate> {
        self.release_date
    }
    scheduled_accessors!();
}

/// A digital (and optionally physical) release: single, EP or album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_type: Option<String>,
    /// Vinyl / CD / Cassette. Physical releases get manufacturing deadlines too.
    #[serde(default)]
    pub physical_format: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub cost: CostLayer,
    #[serde(default)]
    pub deadlines: Vec<Task>,
    #[serde(default)]
    pub physical_deadlines: Vec<Task>,
    #[serde(default)]
    pub custom_tasks: Vec<Task>,
}

impl Release {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        release_type: Option<String>,
    ) -> Self {
        Release {
            id: id.into(),
            name: name.into(),
            release_type,
            physical_format: None,
            release_date: None,
            cost: CostLayer::default(),
            deadlines: Vec::new(),
            physical_deadlines: Vec::new(),
            custom_tasks: Vec::new(),
        }
    }

    /// Reschedule digital and physical deadlines.
    pub fn reschedule_all(&mut self, scheduler: &Scheduler) {
        self.reschedule(scheduler, None);
        let tasks = std::mem::take(&mut self.physical_deadlines);
        self.physical_deadlines = match self.physical_format.as_deref() {
            Some(format) => scheduler.recalculate(
                tasks,
                self.release_date,
                &self.owner(),
                Category::PhysicalRelease,
                Some(format),
            ),
            None => Vec::new(),
        };
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.deadlines
            .iter()
            .chain(&self.physical_deadlines)
            .chain(&self.custom_tasks)
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.deadlines
            .iter_mut()
            .chain(self.physical_deadlines.iter_mut())
            .chain(self.custom_tasks.iter_mut())
            .find(|t| t.id == task_id)
    }
}

impl Scheduled for Release {
    fn owner(&self) -> TaskOwner {
        TaskOwner::new(ParentType::Release, self.id.clone())
    }
    fn category(&self) -> Category {
        Category::Release
    }
    fn subtype(&self) -> Option<&str> {
        self.release_type.as_deref()
    }
    fn reference_date(&self, _inherited: Option<NaiveDate>) -> Option<NaiveDate> {
        self.release_date
    }
    scheduled_accessors!();
}

/// A show, livestream or listening party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub cost: CostLayer,
    #[serde(default)]
    pub deadlines: Vec<Task>,
    #[serde(default)]
    pub custom_tasks: Vec<Task>,
}

impl Event {
    pub fn new(id: impl Into<String>, name: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Event {
            id: id.into(),
            name: name.into(),
            date,
            cost: CostLayer::default(),
            deadlines: Vec::new(),
            custom_tasks: Vec::new(),
        }
    }
}

impl Scheduled for Event {
    fn owner(&self) -> TaskOwner {
        TaskOwner::new(ParentType::Event, self.id.clone())
    }
    fn category(&self) -> Category {
        Category::Event
    }
    fn subtype(&self) -> Option<&str> {
        None
    }
    fn reference_date(&self, _inherited: Option<NaiveDate>) -> Option<NaiveDate> {
        self.date
    }
    scheduled_accessors!();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
}

/// A cost not tied to any task (merch samples, ads, travel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cost: CostLayer,
}
