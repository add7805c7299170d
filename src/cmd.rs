//! Command implementations for the CLI interface.
//!
//! Each handler loads what it needs from the `Database`, applies one edit
//! through the engine (scheduling, propagation, cost resolution), saves and
//! prints a short summary. Anything that moves a reference date re-runs the
//! scheduler so locked tasks keep their dates and everything else follows.

use std::path::Path;

use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::Value;

use crate::cost::{committed_cost, normalize_money, CostLayer, CostPolicy, Money};
use crate::db::*;
use crate::entities::{Event, Expense, Release, Song, TeamMember, Version, Video};
use crate::error::{Error, Result};
use crate::fields::*;
use crate::offsets::merge_offsets;
use crate::propagate::propagate_in_place;
use crate::rollup::{roll_up_all, CostGraph};
use crate::schedule::Scheduler;
use crate::task::{AssignedMember, Task};

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database file if it does not exist yet.
    Init,

    /// Add and edit songs, their versions and metadata.
    Song {
        #[command(subcommand)]
        action: SongAction,
    },

    /// Add and edit videos attached to songs.
    Video {
        #[command(subcommand)]
        action: VideoAction,
    },

    /// Add and edit releases (single, EP, album; optionally physical).
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Add and edit events (shows, livestreams, listening parties).
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Custom tasks, manual dates, status and team assignments.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Miscellaneous expenses not tied to a task.
    Expense {
        #[command(subcommand)]
        action: ExpenseAction,
    },

    /// Team roster.
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Upcoming deadlines across every song, release and event.
    List {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Only tasks whose owner label contains this text.
        #[arg(long)]
        owner: Option<String>,
        /// Filter by tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Due filter: today | this-week | overdue | none.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a task, or every task of a song, release or event.
    View {
        /// Task, song, release or event id (or name).
        id: String,
    },

    /// Show effective costs, or set cost fields on an item.
    Cost {
        /// Task, entity or expense id. Omit to list every costed item.
        id: Option<String>,
        #[command(flatten)]
        amounts: CostArgs,
    },

    /// Rollout cost range: minimum, maximum and committed.
    Rollup {
        /// Also print the range of each song, release and event.
        #[arg(long)]
        by_root: bool,
    },

    /// Print deadline offsets (days before the reference date) with user overrides merged in.
    Offsets {
        /// Only this category (song, video, release, physicalRelease, event, stems).
        #[arg(long)]
        category: Option<String>,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Cost model, custom precedence order and user offsets.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Push song eras, stages and tags down to versions, videos and tasks.
    Propagate,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SongAction {
    /// Add a song and generate its deadlines.
    Add {
        title: String,
        /// Release date: YYYY-MM-DD, "today", "tomorrow", or "in Nd/Nw/Nm".
        #[arg(long)]
        date: Option<String>,
        /// Single | EP | Album. Selects project-type offsets.
        #[arg(long)]
        project_type: Option<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Comma-separated eras. May be repeated.
        #[arg(long = "era")]
        eras: Vec<String>,
        /// Comma-separated stages. May be repeated.
        #[arg(long = "stage")]
        stages: Vec<String>,
        /// Treat versions as competing alternatives in cost rollups.
        #[arg(long)]
        alternatives: bool,
    },
    /// Move (or clear) a song's release date and cascade.
    Date {
        song: String,
        /// New date. Omit to clear.
        date: Option<String>,
    },
    /// Add eras, stages or tags to a song and propagate them.
    Tag {
        song: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "era")]
        eras: Vec<String>,
        #[arg(long = "stage")]
        stages: Vec<String>,
    },
    /// Add a version (remix, acoustic, radio edit, ...).
    AddVersion {
        song: String,
        name: String,
        /// Own release date; otherwise follows the song.
        #[arg(long)]
        date: Option<String>,
    },
    /// Remove a non-core version.
    RemoveVersion { song: String, version: String },
    /// Pick one alternative version for cost rollups. Omit to clear.
    Choose { song: String, version: Option<String> },
}

#[derive(Subcommand)]
pub enum VideoAction {
    /// Add a video to a song.
    Add {
        song: String,
        title: String,
        /// Music Video | Lyric Video | Visualizer.
        #[arg(long)]
        video_type: Option<String>,
        /// Own release date; otherwise follows the song.
        #[arg(long)]
        date: Option<String>,
    },
    /// Set (or clear) a video's own release date.
    Date { video: String, date: Option<String> },
}

#[derive(Subcommand)]
pub enum ReleaseAction {
    /// Add a release and generate its deadlines.
    Add {
        name: String,
        /// Single | EP | Album.
        #[arg(long)]
        release_type: Option<String>,
        /// Vinyl | CD | Cassette. Adds manufacturing deadlines.
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Move (or clear) a release date.
    Date { release: String, date: Option<String> },
    /// Put a version or video on a release, optionally on its own date.
    Link {
        release: String,
        item: String,
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum EventAction {
    /// Add an event and generate its deadlines.
    Add {
        name: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Move (or clear) an event date.
    Date { event: String, date: Option<String> },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a custom task to a song, version, video, release or event.
    Add {
        owner: String,
        task_type: String,
        /// Fixed date. Without one the task follows its owner's date.
        #[arg(long)]
        date: Option<String>,
        /// May be skipped; counts toward the minimum cost only once paid.
        #[arg(long)]
        optional: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Set a task date by hand. Recalculation will leave it alone.
    Date { id: String, date: Option<String> },
    /// Hand a task back to automatic scheduling.
    Reset { id: String },
    /// Change a task's status.
    Status {
        id: String,
        #[arg(value_enum)]
        status: Status,
    },
    /// Book a team member on a task.
    Assign {
        id: String,
        member: String,
        #[arg(long)]
        cost: Option<String>,
        #[arg(long)]
        instrument: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExpenseAction {
    /// Record an expense.
    Add {
        description: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        amounts: CostArgs,
    },
}

#[derive(Subcommand)]
pub enum MemberAction {
    /// Add a team member.
    Add {
        name: String,
        #[arg(long)]
        role: Option<String>,
        /// May be repeated. Accepts comma-separated.
        #[arg(long = "instrument")]
        instruments: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the stored settings.
    Show,
    /// Set the stored cost model.
    Model {
        #[arg(value_enum)]
        model: CostModel,
    },
    /// Set a custom precedence order (e.g. "quoted,actual,estimated") and switch to it.
    Order { sources: Vec<String> },
    /// Override the offset of one task type for a category or project type.
    Offset {
        /// Category key (song, video, ...) or project type (Album, Vinyl, ...).
        scope: String,
        task_type: String,
        days: i64,
    },
    /// Remove a user offset override.
    ClearOffset { scope: String, task_type: String },
}

/// Amounts accept "1200", "$1,200" or "1200.50".
#[derive(Args, Debug, Default, Clone)]
pub struct CostArgs {
    #[arg(long)]
    pub estimated: Option<String>,
    #[arg(long)]
    pub quoted: Option<String>,
    #[arg(long)]
    pub paid: Option<String>,
    #[arg(long)]
    pub partially_paid: Option<String>,
    #[arg(long)]
    pub actual: Option<String>,
}

impl CostArgs {
    fn is_empty(&self) -> bool {
        self.pairs().iter().all(|(_, v)| v.is_none())
    }

    fn pairs(&self) -> [(CostSource, &Option<String>); 5] {
        [
            (CostSource::Estimated, &self.estimated),
            (CostSource::Quoted, &self.quoted),
            (CostSource::Paid, &self.paid),
            (CostSource::PartiallyPaid, &self.partially_paid),
            (CostSource::Actual, &self.actual),
        ]
    }

    /// Write the given fields into `layer`, leaving the rest alone.
    pub fn apply(&self, layer: &mut CostLayer) {
        for (source, raw) in self.pairs() {
            if let Some(raw) = raw {
                layer.set(source, parse_amount(raw));
            }
        }
    }
}

/// Dispatch a parsed command. `Completions` is handled before the database
/// is opened and never reaches here.
pub fn run(
    command: Commands,
    db: &mut Database,
    db_path: &Path,
    model: Option<CostModel>,
) -> Result<()> {
    match command {
        Commands::Init => cmd_init(db, db_path),
        Commands::Song { action } => cmd_song(db, db_path, action),
        Commands::Video { action } => cmd_video(db, db_path, action),
        Commands::Release { action } => cmd_release(db, db_path, action),
        Commands::Event { action } => cmd_event(db, db_path, action),
        Commands::Task { action } => cmd_task(db, db_path, action),
        Commands::Expense { action } => cmd_expense(db, db_path, action),
        Commands::Member { action } => cmd_member(db, db_path, action),
        Commands::List { all, status, owner, tags, due, limit } => {
            cmd_list(db, all, status, owner, tags, due, limit);
            Ok(())
        }
        Commands::View { id } => cmd_view(db, &id, model),
        Commands::Cost { id, amounts } => cmd_cost(db, db_path, id, amounts, model),
        Commands::Rollup { by_root } => {
            cmd_rollup(db, by_root, model);
            Ok(())
        }
        Commands::Offsets { category, json } => cmd_offsets(db, category, json),
        Commands::Settings { action } => cmd_settings(db, db_path, action),
        Commands::Propagate => cmd_propagate(db, db_path),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

pub fn cmd_init(db: &Database, db_path: &Path) -> Result<()> {
    if db_path.exists() {
        println!("Database already exists at {}.", db_path.display());
        return Ok(());
    }
    db.save(db_path)?;
    println!("Created {}.", db_path.display());
    Ok(())
}

pub fn cmd_song(db: &mut Database, db_path: &Path, action: SongAction) -> Result<()> {
    match action {
        SongAction::Add { title, date, project_type, tags, eras, stages, alternatives } => {
            let id = db.unique_id(&title);
            let mut song = Song::new(id.clone(), title, optional_date(date.as_deref())?);
            song.project_type = project_type;
            song.alternative_versions = alternatives;
            song.meta.tag_ids.extend(split_and_normalise_tags(&tags));
            song.meta.era_ids.extend(split_and_normalise_tags(&eras));
            song.meta.stage_ids.extend(split_and_normalise_tags(&stages));
            song.reschedule_all(&db.settings.scheduler());
            propagate_in_place(&mut song);
            let count = song.all_tasks().len();
            db.songs.push(song);
            db.save(db_path)?;
            println!("Added song {id} with {count} deadline(s).");
        }
        SongAction::Date { song, date } => {
            let date = optional_date(date.as_deref())?;
            let title = with_song(db, &song, |s, scheduler| {
                s.set_release_date(date, scheduler);
                Ok(s.title.clone())
            })?;
            db.save(db_path)?;
            println!("{title}: release date {}.", format_date(date));
        }
        SongAction::Tag { song, tags, eras, stages } => {
            let meta = with_song(db, &song, |s, _| {
                s.meta.tag_ids.extend(split_and_normalise_tags(&tags));
                s.meta.era_ids.extend(split_and_normalise_tags(&eras));
                s.meta.stage_ids.extend(split_and_normalise_tags(&stages));
                Ok(s.meta.clone())
            })?;
            db.save(db_path)?;
            println!(
                "Eras: {}  Stages: {}  Tags: {}",
                join(&meta.era_ids),
                join(&meta.stage_ids),
                join(&meta.tag_ids)
            );
        }
        SongAction::AddVersion { song, name, date } => {
            let date = optional_date(date.as_deref())?;
            let song_id = db.song_mut(&song)?.id.clone();
            let id = db.unique_id(&format!("{song_id} {name}"));
            with_song(db, &song_id, |s, scheduler| {
                let mut version = Version::new(id.clone(), name);
                version.release_date = date;
                s.add_version(version);
                s.reschedule_all(scheduler);
                Ok(())
            })?;
            db.save(db_path)?;
            println!("Added version {id}.");
        }
        SongAction::RemoveVersion { song, version } => {
            let removed = with_song(db, &song, |s, _| s.remove_version(&version))?;
            db.save(db_path)?;
            println!("Removed version {} ({}).", removed.id, removed.name);
        }
        SongAction::Choose { song, version } => {
            with_song(db, &song, |s, _| {
                if let Some(v) = version.as_deref() {
                    if !s.versions.iter().any(|x| x.id == v) {
                        return Err(Error::NotFound(format!("version '{v}'")));
                    }
                    s.alternative_versions = true;
                }
                s.selected_version_id = version.clone();
                Ok(())
            })?;
            db.save(db_path)?;
            match version {
                Some(v) => println!("Selected {v}."),
                None => println!("Cleared selection."),
            }
        }
    }
    Ok(())
}

pub fn cmd_video(db: &mut Database, db_path: &Path, action: VideoAction) -> Result<()> {
    match action {
        VideoAction::Add { song, title, video_type, date } => {
            let date = optional_date(date.as_deref())?;
            let song_id = db.song_mut(&song)?.id.clone();
            let id = db.unique_id(&format!("{song_id} {title}"));
            with_song(db, &song_id, |s, scheduler| {
                let mut video = Video::new(id.clone(), title, video_type);
                video.release_date = date;
                s.videos.push(video);
                s.reschedule_all(scheduler);
                Ok(())
            })?;
            db.save(db_path)?;
            println!("Added video {id}.");
        }
        VideoAction::Date { video, date } => {
            let date = optional_date(date.as_deref())?;
            let song_id = db
                .songs
                .iter()
                .find(|s| s.videos.iter().any(|v| v.id == video))
                .map(|s| s.id.clone())
                .ok_or_else(|| Error::NotFound(format!("video '{video}'")))?;
            with_song(db, &song_id, |s, scheduler| {
                if let Some(v) = s.videos.iter_mut().find(|v| v.id == video) {
                    v.release_date = date;
                }
                s.reschedule_all(scheduler);
                Ok(())
            })?;
            db.save(db_path)?;
            println!("{video}: release date {}.", format_date(date));
        }
    }
    Ok(())
}

pub fn cmd_release(db: &mut Database, db_path: &Path, action: ReleaseAction) -> Result<()> {
    match action {
        ReleaseAction::Add { name, release_type, format, date } => {
            let id = db.unique_id(&name);
            let mut release = Release::new(id.clone(), name, release_type);
            release.physical_format = format;
            release.release_date = optional_date(date.as_deref())?;
            release.reschedule_all(&db.settings.scheduler());
            let count = release.all_tasks().count();
            db.releases.push(release);
            db.save(db_path)?;
            println!("Added release {id} with {count} deadline(s).");
        }
        ReleaseAction::Date { release, date } => {
            let date = optional_date(date.as_deref())?;
            let offsets = db.settings.user_offsets.clone();
            let r = db.release_mut(&release)?;
            r.release_date = date;
            r.reschedule_all(&Scheduler::new(&offsets));
            let name = r.name.clone();
            db.save(db_path)?;
            println!("{name}: release date {}.", format_date(date));
        }
        ReleaseAction::Link { release, item, date } => {
            let date = optional_date(date.as_deref())?;
            let release_id = db.release_mut(&release)?.id.clone();
            let mut linked = false;
            for song in db.songs.iter_mut() {
                if let Some(v) = song.versions.iter_mut().find(|v| v.id == item) {
                    v.link_release(&release_id, date);
                    linked = true;
                }
                if let Some(v) = song.videos.iter_mut().find(|v| v.id == item) {
                    v.link_release(&release_id, date);
                    linked = true;
                }
            }
            if !linked {
                return Err(Error::NotFound(format!("version or video '{item}'")));
            }
            db.save(db_path)?;
            println!("Linked {item} to {release_id}.");
        }
    }
    Ok(())
}

pub fn cmd_event(db: &mut Database, db_path: &Path, action: EventAction) -> Result<()> {
    use crate::entities::Scheduled;

    match action {
        EventAction::Add { name, date } => {
            let id = db.unique_id(&name);
            let mut event = Event::new(id.clone(), name, optional_date(date.as_deref())?);
            event.reschedule(&db.settings.scheduler(), None);
            db.events.push(event);
            db.save(db_path)?;
            println!("Added event {id}.");
        }
        EventAction::Date { event, date } => {
            let date = optional_date(date.as_deref())?;
            let offsets = db.settings.user_offsets.clone();
            let e = db.event_mut(&event)?;
            e.date = date;
            e.reschedule(&Scheduler::new(&offsets), None);
            let name = e.name.clone();
            db.save(db_path)?;
            println!("{name}: date {}.", format_date(date));
        }
    }
    Ok(())
}

pub fn cmd_task(db: &mut Database, db_path: &Path, action: TaskAction) -> Result<()> {
    match action {
        TaskAction::Add { owner, task_type, date, optional, notes } => {
            let id = db.unique_id(&format!("{owner} {task_type}"));
            let mut task = Task::new(id.clone(), task_type, "");
            task.is_optional = optional;
            task.notes = notes;
            if let Some(d) = optional_date(date.as_deref())? {
                task.set_date(Some(d));
            }
            db.add_custom_task(&owner, task)?;
            db.reschedule();
            db.save(db_path)?;
            println!("Added task {id}.");
        }
        TaskAction::Date { id, date } => {
            let date = optional_date(date.as_deref())?;
            db.task_mut(&id)?.set_date(date);
            db.save(db_path)?;
            println!("{id}: date {} (kept on recalculation).", format_date(date));
        }
        TaskAction::Reset { id } => {
            db.task_mut(&id)?.reset_override();
            db.reschedule();
            let date = db.task_mut(&id)?.date;
            db.save(db_path)?;
            println!("{id}: back on schedule, date {}.", format_date(date));
        }
        TaskAction::Status { id, status } => {
            db.task_mut(&id)?.status = status;
            db.save(db_path)?;
            println!("{id}: {}.", format_status(status));
        }
        TaskAction::Assign { id, member, cost, instrument } => {
            let member_id = db
                .team_members
                .iter()
                .find(|m| m.id == member || m.name.eq_ignore_ascii_case(&member))
                .map(|m| m.id.clone())
                .ok_or_else(|| Error::NotFound(format!("team member '{member}'")))?;
            let task = db.task_mut(&id)?;
            task.assigned_members.retain(|a| a.member_id != member_id);
            task.assigned_members.push(AssignedMember {
                member_id: member_id.clone(),
                cost: cost.as_deref().map(parse_amount).unwrap_or(0.0),
                instrument,
            });
            let total = task.member_total();
            db.save(db_path)?;
            println!("Assigned {member_id} to {id} (team total {}).", format_money(total));
        }
    }
    Ok(())
}

pub fn cmd_expense(db: &mut Database, db_path: &Path, action: ExpenseAction) -> Result<()> {
    let ExpenseAction::Add { description, date, category, amounts } = action;
    let id = db.unique_id(&description);
    let mut expense = Expense {
        id: id.clone(),
        description,
        date: optional_date(date.as_deref())?,
        category,
        cost: CostLayer::default(),
    };
    amounts.apply(&mut expense.cost);
    db.expenses.push(expense);
    db.save(db_path)?;
    println!("Recorded expense {id}.");
    Ok(())
}

pub fn cmd_member(db: &mut Database, db_path: &Path, action: MemberAction) -> Result<()> {
    let MemberAction::Add { name, role, instruments } = action;
    let id = db.unique_id(&name);
    let instruments = instruments
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    db.team_members.push(TeamMember { id: id.clone(), name, role, instruments });
    db.save(db_path)?;
    println!("Added team member {id}.");
    Ok(())
}

pub fn cmd_list(
    db: &Database,
    all: bool,
    status: Option<Status>,
    owner: Option<String>,
    tags: Vec<String>,
    due: Option<DueFilter>,
    limit: Option<usize>,
) {
    let tags = split_and_normalise_tags(&tags);
    let today = Local::now().date_naive();
    let (week_start, week_end) = start_end_of_this_week(today);
    let owner = owner.map(|o| o.to_lowercase());

    let mut rows: Vec<TaskRow> = db
        .task_rows()
        .into_iter()
        .filter(|row| {
            let t = row.task;
            if !all && t.status.is_done() {
                return false;
            }
            if status.is_some_and(|s| t.status != s) {
                return false;
            }
            if let Some(ref o) = owner {
                if !row.owner.to_lowercase().contains(o) {
                    return false;
                }
            }
            if !tags.iter().all(|tg| t.meta.tag_ids.contains(tg)) {
                return false;
            }
            match due {
                None => true,
                Some(DueFilter::Today) => t.date == Some(today),
                Some(DueFilter::ThisWeek) => {
                    t.date.is_some_and(|d| d >= week_start && d <= week_end)
                }
                Some(DueFilter::Overdue) => t.date.is_some_and(|d| d < today),
                Some(DueFilter::None) => t.date.is_none(),
            }
        })
        .collect();

    rows.sort_by_key(|row| (row.task.date.unwrap_or(NaiveDate::MAX), row.task.id.clone()));
    if let Some(n) = limit {
        rows.truncate(n);
    }
    if rows.is_empty() {
        println!("No tasks.");
        return;
    }
    print_table(&rows, today);
}

pub fn cmd_view(db: &Database, id: &str, model: Option<CostModel>) -> Result<()> {
    let today = Local::now().date_naive();
    let rows = db.task_rows();
    if let Some(row) = rows.iter().find(|r| r.task.id == id) {
        let t = row.task;
        let policy = db.settings.policy(model);
        let cost = policy.resolve(&t.cost);
        println!("ID:        {}", t.id);
        println!("Task:      {}", t.task_type);
        println!("Owner:     {}", row.owner);
        println!("Category:  {}", t.category);
        println!("Date:      {} ({})", format_date(t.date), format_due_relative(t.date, today));
        println!("Status:    {}", format_status(t.status));
        println!("Manual:    {}", if t.is_overridden { "yes" } else { "no" });
        println!("Cost:      {} ({})", format_money(cost.value), cost.source.as_str());
        if t.is_optional {
            println!("Optional:  yes");
        }
        if !t.meta.is_empty() {
            println!("Eras:      {}", join(&t.meta.era_ids));
            println!("Stages:    {}", join(&t.meta.stage_ids));
            println!("Tags:      {}", join(&t.meta.tag_ids));
        }
        for m in &t.assigned_members {
            let instrument = m.instrument.as_deref().unwrap_or("-");
            println!("Member:    {} ({instrument}) {}", m.member_id, format_money(m.cost));
        }
        if let Some(notes) = &t.notes {
            println!("Notes:     {notes}");
        }
        return Ok(());
    }

    let matches = |key: &str, name: &str| key == id || name.eq_ignore_ascii_case(id);
    let owned: Vec<TaskRow> = if let Some(s) = db.songs.iter().find(|s| matches(&s.id, &s.title)) {
        println!("{} ({}), release {}", s.title, s.id, format_date(s.release_date));
        s.all_tasks().into_iter().map(|(owner, task)| TaskRow { owner, task }).collect()
    } else if let Some(r) = db.releases.iter().find(|r| matches(&r.id, &r.name)) {
        println!("{} ({}), release {}", r.name, r.id, format_date(r.release_date));
        r.all_tasks().map(|task| TaskRow { owner: r.name.clone(), task }).collect()
    } else if let Some(e) = db.events.iter().find(|e| matches(&e.id, &e.name)) {
        println!("{} ({}), on {}", e.name, e.id, format_date(e.date));
        e.deadlines
            .iter()
            .chain(&e.custom_tasks)
            .map(|task| TaskRow { owner: e.name.clone(), task })
            .collect()
    } else {
        return Err(Error::NotFound(format!("'{id}'")));
    };
    print_table(&owned, today);
    Ok(())
}

pub fn cmd_cost(
    db: &mut Database,
    db_path: &Path,
    id: Option<String>,
    amounts: CostArgs,
    model: Option<CostModel>,
) -> Result<()> {
    let Some(id) = id else {
        if !amounts.is_empty() {
            return Err(Error::InvalidInput("an id is required to set cost fields".into()));
        }
        print_cost_table(db, db.settings.policy(model));
        return Ok(());
    };

    if !amounts.is_empty() {
        amounts.apply(db.cost_mut(&id)?);
        db.save(db_path)?;
    }
    let layer = *db.cost_mut(&id)?;
    let resolved = db.settings.policy(model).resolve(&layer);
    for source in [
        CostSource::Estimated,
        CostSource::Quoted,
        CostSource::PartiallyPaid,
        CostSource::Paid,
        CostSource::Actual,
    ] {
        println!("{:<15} {}", source.as_str(), format_money(layer.get(source)));
    }
    println!("{:<15} {} ({})", "effective", format_money(resolved.value), resolved.source.as_str());
    println!("{:<15} {}", "committed", format_money(committed_cost(&layer)));
    Ok(())
}

fn print_cost_table(db: &Database, policy: CostPolicy) {
    println!("{:<32} {:>12} {:<15} {:>12}", "ID", "Effective", "Source", "Committed");
    let nodes = db.cost_nodes();
    let costed = nodes
        .iter()
        .map(|n| (&n.id, &n.cost))
        .chain(db.expenses.iter().map(|x| (&x.id, &x.cost)))
        .filter(|(_, c)| !c.is_empty());
    for (id, cost) in costed {
        let r = policy.resolve(cost);
        println!(
            "{:<32} {:>12} {:<15} {:>12}",
            truncate(id, 32),
            format_money(r.value),
            r.source.as_str(),
            format_money(committed_cost(cost))
        );
    }
}

pub fn cmd_rollup(db: &Database, by_root: bool, model: Option<CostModel>) {
    let policy = db.settings.policy(model);
    let nodes = db.cost_nodes();
    if by_root {
        let graph = CostGraph::new(&nodes, policy);
        for root in graph.roots() {
            let r = graph.roll_up_node(&root.id);
            println!(
                "{:<32} min {:>12}  max {:>12}  committed {:>12}",
                truncate(&root.id, 32),
                format_money(r.min),
                format_money(r.max),
                format_money(r.actual)
            );
        }
    }
    let total = roll_up_all(&nodes, &db.expense_costs(), policy);
    println!("Minimum:   {}", format_money(total.min));
    println!("Maximum:   {}", format_money(total.max));
    println!("Committed: {}", format_money(total.actual));
}

pub fn cmd_offsets(db: &Database, category: Option<String>, json: bool) -> Result<()> {
    let filter = match category.as_deref() {
        Some(key) => Some(
            Category::from_key(key)
                .ok_or_else(|| Error::InvalidInput(format!("unknown category '{key}'")))?,
        ),
        None => None,
    };
    let user = &db.settings.user_offsets;
    let mut merged = merge_offsets(user);
    if let Some(c) = filter {
        merged.categories.retain(|k, _| *k == c);
        merged.project_types.clear();
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
        return Ok(());
    }
    for (category, offsets) in &merged.categories {
        println!("{}:", category.as_str());
        let mut sorted: Vec<_> = offsets.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (task_type, days) in sorted {
            let mark = if user.category(*category, task_type).is_some() { "*" } else { "" };
            println!("  {task_type:<28} {days:>4}{mark}");
        }
    }
    for (project_type, offsets) in &merged.project_types {
        println!("{project_type} (project type):");
        for (task_type, days) in offsets {
            let mark = if user.project_type(project_type, task_type).is_some() { "*" } else { "" };
            println!("  {task_type:<28} {days:>4}{mark}");
        }
    }
    Ok(())
}

pub fn cmd_settings(db: &mut Database, db_path: &Path, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("Effective cost model: {:?}", db.settings.cost_model());
            println!("{}", serde_json::to_string_pretty(&db.settings)?);
        }
        SettingsAction::Model { model } => {
            db.settings.set_cost_model(model);
            db.save(db_path)?;
            println!("Cost model set to {model:?}.");
        }
        SettingsAction::Order { sources } => {
            db.settings.set_custom_order(&sources)?;
            db.save(db_path)?;
            println!("Custom order: {}.", db.settings.cost_precedence_order.join(", "));
        }
        SettingsAction::Offset { scope, task_type, days } => {
            if days < 0 {
                return Err(Error::InvalidInput(format!(
                    "offset must be zero or more days (got {days})"
                )));
            }
            match Category::from_key(&scope) {
                Some(c) => db.settings.user_offsets.set_category(c, &task_type, days),
                None => db.settings.user_offsets.set_project_type(&scope, &task_type, days),
            }
            db.reschedule();
            db.save(db_path)?;
            println!("{scope} / {task_type}: {days} day(s) before.");
        }
        SettingsAction::ClearOffset { scope, task_type } => {
            if !db.settings.user_offsets.clear(&scope, &task_type) {
                return Err(Error::NotFound(format!("offset override {scope} / {task_type}")));
            }
            db.reschedule();
            db.save(db_path)?;
            println!("Cleared {scope} / {task_type}.");
        }
    }
    Ok(())
}

pub fn cmd_propagate(db: &mut Database, db_path: &Path) -> Result<()> {
    for song in db.songs.iter_mut() {
        propagate_in_place(song);
    }
    db.save(db_path)?;
    println!("Propagated metadata for {} song(s).", db.songs.len());
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;

    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Run `f` on one song with a scheduler built from the stored offsets, then
/// propagate its metadata.
fn with_song<T>(
    db: &mut Database,
    key: &str,
    f: impl FnOnce(&mut Song, &Scheduler) -> Result<T>,
) -> Result<T> {
    let offsets = db.settings.user_offsets.clone();
    let scheduler = Scheduler::new(&offsets);
    let song = db.song_mut(key)?;
    let out = f(&mut *song, &scheduler)?;
    propagate_in_place(song);
    Ok(out)
}

fn optional_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(require_date).transpose()
}

fn parse_amount(raw: &str) -> Money {
    normalize_money(&Value::String(raw.to_string()))
}

fn format_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "none".into())
}

fn join(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".into()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
