//! Database operations and utility functions.
//!
//! This module provides the `Database` struct holding one artist's songs,
//! releases, events, team and expenses, persisted as a single JSON file,
//! along with helpers for ids, date parsing, formatting and flattening the
//! entity graph for cost rollups.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cost::CostLayer;
use crate::entities::{Event, Expense, Release, Scheduled, Song, TeamMember};
use crate::error::{Error, Result};
use crate::fields::{Category, Status};
use crate::propagate::propagate_in_place;
use crate::rollup::CostNode;
use crate::settings::Settings;
use crate::task::{parse_iso_date, slugify, Task, TaskOwner};

/// In-memory database for one project file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(default)]
    pub songs: Vec<Song>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub settings: Settings,
}

/// A task together with a label for the entity that owns it.
#[derive(Debug, Clone)]
pub struct TaskRow<'a> {
    pub owner: String,
    pub task: &'a Task,
}

impl Database {
    /// Load the database from a JSON file. A missing file is an empty
    /// database; a corrupt one is an error so it is never overwritten.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no database file yet, starting empty");
            return Ok(Database::default());
        }
        let buf = fs::read_to_string(path)?;
        let mut db: Database = serde_json::from_str(&buf)?;
        for song in db.songs.iter_mut() {
            song.ensure_core_version();
        }
        Ok(db)
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        info!(path = %path.display(), "database saved");
        Ok(())
    }

    /// Every id in use, across entities and tasks.
    pub fn ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for s in &self.songs {
            ids.insert(s.id.clone());
            ids.extend(s.versions.iter().map(|v| v.id.clone()));
            ids.extend(s.videos.iter().map(|v| v.id.clone()));
            ids.extend(s.all_tasks().into_iter().map(|(_, t)| t.id.clone()));
        }
        for r in &self.releases {
            ids.insert(r.id.clone());
            ids.extend(r.all_tasks().map(|t| t.id.clone()));
        }
        for e in &self.events {
            ids.insert(e.id.clone());
            ids.extend(e.deadlines.iter().chain(&e.custom_tasks).map(|t| t.id.clone()));
        }
        ids.extend(self.team_members.iter().map(|m| m.id.clone()));
        ids.extend(self.expenses.iter().map(|x| x.id.clone()));
        ids
    }

    /// A fresh, readable id derived from a label ("Night Drive" -> "night-drive",
    /// then "night-drive-2", ...).
    pub fn unique_id(&self, label: &str) -> String {
        let base = match slugify(label) {
            s if s.is_empty() => "item".to_string(),
            s => s,
        };
        let taken = self.ids();
        if !taken.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or(base)
    }

    pub fn song_mut(&mut self, id: &str) -> Result<&mut Song> {
        self.songs
            .iter_mut()
            .find(|s| s.id == id || s.title.eq_ignore_ascii_case(id))
            .ok_or_else(|| Error::NotFound(format!("song '{id}'")))
    }

    pub fn release_mut(&mut self, id: &str) -> Result<&mut Release> {
        self.releases
            .iter_mut()
            .find(|r| r.id == id || r.name.eq_ignore_ascii_case(id))
            .ok_or_else(|| Error::NotFound(format!("release '{id}'")))
    }

    pub fn event_mut(&mut self, id: &str) -> Result<&mut Event> {
        self.events
            .iter_mut()
            .find(|e| e.id == id || e.name.eq_ignore_ascii_case(id))
            .ok_or_else(|| Error::NotFound(format!("event '{id}'")))
    }

    /// Find a task anywhere in the database.
    pub fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        let Database { songs, releases, events, .. } = self;
        songs
            .iter_mut()
            .find_map(|s| s.find_task_mut(id))
            .or_else(|| releases.iter_mut().find_map(|r| r.find_task_mut(id)))
            .or_else(|| {
                events
                    .iter_mut()
                    .flat_map(|e| e.deadlines.iter_mut().chain(e.custom_tasks.iter_mut()))
                    .find(|t| t.id == id)
            })
            .ok_or_else(|| Error::NotFound(format!("task '{id}'")))
    }

    /// Cost layers of any entity, expense or task.
    pub fn cost_mut(&mut self, id: &str) -> Result<&mut CostLayer> {
        if let Some(i) = self.songs.iter().position(|s| s.id == id) {
            return Ok(&mut self.songs[i].cost);
        }
        for i in 0..self.songs.len() {
            if let Some(j) = self.songs[i].versions.iter().position(|v| v.id == id) {
                return Ok(&mut self.songs[i].versions[j].cost);
            }
            if let Some(j) = self.songs[i].videos.iter().position(|v| v.id == id) {
                return Ok(&mut self.songs[i].videos[j].cost);
            }
        }
        if let Some(i) = self.releases.iter().position(|r| r.id == id) {
            return Ok(&mut self.releases[i].cost);
        }
        if let Some(i) = self.events.iter().position(|e| e.id == id) {
            return Ok(&mut self.events[i].cost);
        }
        if let Some(i) = self.expenses.iter().position(|x| x.id == id) {
            return Ok(&mut self.expenses[i].cost);
        }
        self.task_mut(id).map(|t| &mut t.cost)
    }

    /// Attach a hand-made task to the song, version, video, release or
    /// event with id (or name) `owner`.
    pub fn add_custom_task(&mut self, owner: &str, mut task: Task) -> Result<()> {
        let named = |id: &str, name: &str| id == owner || name.eq_ignore_ascii_case(owner);
        if let Some(i) = self.songs.iter().position(|s| named(&s.id, &s.title)) {
            let song = &mut self.songs[i];
            attach(&mut task, song.owner(), Category::Song);
            song.custom_tasks.push(task);
            return Ok(());
        }
        for i in 0..self.songs.len() {
            if let Some(j) = self.songs[i].versions.iter().position(|v| named(&v.id, &v.id)) {
                let version = &mut self.songs[i].versions[j];
                attach(&mut task, version.owner(), Category::Song);
                version.custom_tasks.push(task);
                return Ok(());
            }
            if let Some(j) = self.songs[i].videos.iter().position(|v| named(&v.id, &v.id)) {
                let video = &mut self.songs[i].videos[j];
                attach(&mut task, video.owner(), Category::Video);
                video.custom_tasks.push(task);
                return Ok(());
            }
        }
        if let Some(i) = self.releases.iter().position(|r| named(&r.id, &r.name)) {
            let release = &mut self.releases[i];
            attach(&mut task, release.owner(), Category::Release);
            release.custom_tasks.push(task);
            return Ok(());
        }
        if let Some(i) = self.events.iter().position(|e| named(&e.id, &e.name)) {
            let event = &mut self.events[i];
            attach(&mut task, event.owner(), Category::Event);
            event.custom_tasks.push(task);
            return Ok(());
        }
        Err(Error::NotFound(format!("owner '{owner}'")))
    }

    /// One full recompute pass: recalculate every owner's deadlines against
    /// its current reference date, then propagate song metadata.
    pub fn reschedule(&mut self) {
        let Database { songs, releases, events, settings, .. } = self;
        let scheduler = settings.scheduler();
        for song in songs.iter_mut() {
            song.reschedule_all(&scheduler);
            propagate_in_place(song);
        }
        for release in releases.iter_mut() {
            release.reschedule_all(&scheduler);
        }
        for event in events.iter_mut() {
            event.reschedule(&scheduler, None);
        }
    }

    /// All tasks with the label of their owner.
    pub fn task_rows(&self) -> Vec<TaskRow<'_>> {
        let mut rows = Vec::new();
        for s in &self.songs {
            rows.extend(s.all_tasks().into_iter().map(|(owner, task)| TaskRow { owner, task }));
        }
        for r in &self.releases {
            rows.extend(r.all_tasks().map(|task| TaskRow { owner: r.name.clone(), task }));
        }
        for e in &self.events {
            rows.extend(
                e.deadlines
                    .iter()
                    .chain(&e.custom_tasks)
                    .map(|task| TaskRow { owner: e.name.clone(), task }),
            );
        }
        rows
    }

    /// Flatten the entity graph into cost nodes for rollups.
    ///
    /// Songs, releases and events are roots. A song's versions hang off a
    /// choice group when the song treats them as alternatives. Tasks without
    /// a parent id are attached to the entity that holds them.
    pub fn cost_nodes(&self) -> Vec<CostNode> {
        let mut nodes = Vec::new();
        for song in &self.songs {
            nodes.push(CostNode::new(song.id.clone(), None, song.cost));
            push_tasks(&mut nodes, song.deadlines.iter().chain(&song.custom_tasks), &song.id);

            let version_parent = if song.alternative_versions {
                let group_id = format!("{}:versions", song.id);
                let mut group =
                    CostNode::new(group_id.clone(), Some(song.id.clone()), CostLayer::default());
                group.is_choice_group = true;
                group.selected_child_id = song.selected_version_id.clone();
                nodes.push(group);
                group_id
            } else {
                song.id.clone()
            };
            for v in &song.versions {
                nodes.push(CostNode::new(v.id.clone(), Some(version_parent.clone()), v.cost));
                push_tasks(&mut nodes, v.deadlines.iter().chain(&v.custom_tasks), &v.id);
            }
            for v in &song.videos {
                nodes.push(CostNode::new(v.id.clone(), Some(song.id.clone()), v.cost));
                push_tasks(&mut nodes, v.deadlines.iter().chain(&v.custom_tasks), &v.id);
            }
        }
        for r in &self.releases {
            nodes.push(CostNode::new(r.id.clone(), None, r.cost));
            push_tasks(&mut nodes, r.all_tasks(), &r.id);
        }
        for e in &self.events {
            nodes.push(CostNode::new(e.id.clone(), None, e.cost));
            push_tasks(&mut nodes, e.deadlines.iter().chain(&e.custom_tasks), &e.id);
        }
        nodes
    }

    pub fn expense_costs(&self) -> Vec<CostLayer> {
        self.expenses.iter().map(|e| e.cost).collect()
    }
}

fn attach(task: &mut Task, owner: TaskOwner, category: Category) {
    task.parent_type = Some(owner.parent_type);
    task.parent_id = Some(owner.parent_id);
    task.category = category.as_str().to_string();
}

fn push_tasks<'a>(
    nodes: &mut Vec<CostNode>,
    tasks: impl Iterator<Item = &'a Task>,
    owner_id: &str,
) {
    for task in tasks {
        let mut node = CostNode::from(task);
        if node.parent_id.is_none() {
            node.parent_id = Some(owner_id.to_string());
        }
        nodes.push(node);
    }
}

/// Normalize a tag string by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalize each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

/// Parse human-readable date input relative to `today`.
///
/// Supports "today", "tomorrow", "in 3d", "in 2w", "in 1m" and ISO dates.
/// Offsets that land outside the representable calendar give `None`.
pub fn parse_date_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        _ => {}
    }
    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        let (idx, unit) = rest.char_indices().last()?;
        if let Ok(n) = rest[..idx].trim().parse::<i64>() {
            let days = match unit {
                'd' => Some(n),
                'w' => n.checked_mul(7),
                // Approximate: 30 days per month
                'm' => n.checked_mul(30),
                _ => return None,
            }?;
            return today.checked_add_signed(Duration::try_days(days)?);
        }
    }
    parse_iso_date(&s)
}

/// Parse a date argument, reporting bad input as an error.
pub fn require_date(s: &str) -> Result<NaiveDate> {
    parse_date_input(s, Local::now().date_naive()).ok_or_else(|| {
        Error::InvalidInput(format!("unrecognised date '{s}' (use YYYY-MM-DD, today, in 3w)"))
    })
}

/// Calculate the start and end dates of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    let end = start + Duration::days(6);
    (start, end)
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::NotStarted => "Not Started",
        Status::InProgress => "In Progress",
        Status::Done => "Done",
        Status::Delayed => "Delayed",
    }
}

/// Format a dollar amount.
pub fn format_money(v: f64) -> String {
    format!("${v:.2}")
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Print tasks in a formatted table.
pub fn print_table(rows: &[TaskRow<'_>], today: NaiveDate) {
    println!(
        "{:<28} {:<12} {:<12} {:<11} {:<3} {:<24} {}",
        "ID", "Due", "Date", "Status", "Ovr", "Owner", "Task"
    );
    for row in rows {
        let t = row.task;
        println!(
            "{:<28} {:<12} {:<12} {:<11} {:<3} {:<24} {}",
            truncate(&t.id, 28),
            format_due_relative(t.date, today),
            t.date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            format_status(t.status),
            if t.is_overridden { "*" } else { "" },
            truncate(&row.owner, 24),
            t.task_type
        );
    }
}
