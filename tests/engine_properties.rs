use chrono::NaiveDate;
use serde_json::json;

use rollout::cost::{resolve, resolve_value, CostLayer};
use rollout::entities::{Song, Version, Video};
use rollout::fields::{Category, CostModel, CostSource, ParentType, Status};
use rollout::offsets::{get_offset, UserOffsets};
use rollout::propagate::propagate;
use rollout::rollup::{roll_up, CostNode, CostRange};
use rollout::schedule::{generate, recalculate};
use rollout::task::{Task, TaskOwner};

const MODELS: [CostModel; 5] = [
    CostModel::ActualFirst,
    CostModel::PaidFirst,
    CostModel::QuotedFirst,
    CostModel::EstimatedFirst,
    CostModel::Custom,
];

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// A spread of cost layers covering zeros, single fields and mixes.
fn sample_layers() -> Vec<CostLayer> {
    let mut out = Vec::new();
    for estimated in [0.0, 80.0] {
        for quoted in [0.0, 120.0] {
            for actual in [0.0, 95.0] {
                for partially_paid in [0.0, 30.0] {
                    out.push(CostLayer { estimated, quoted, actual, partially_paid, paid: 0.0 });
                }
            }
        }
    }
    out
}

#[test]
fn paid_wins_under_paid_first() {
    for mut layer in sample_layers() {
        layer.paid = 410.0;
        let r = resolve(&layer, CostModel::PaidFirst, None);
        assert_eq!(r.source, CostSource::Paid);
        assert_eq!(r.value, 410.0);
    }
}

#[test]
fn all_zero_costs_resolve_to_zero_estimated() {
    let empty = [
        json!({}),
        json!({ "estimatedCost": 0, "quoted": "", "paidCost": null }),
        json!("garbage"),
    ];
    let order = vec!["quoted".to_string(), "paid".to_string()];
    for raw in &empty {
        for model in MODELS {
            let r = resolve_value(raw, model, Some(order.as_slice()));
            assert_eq!(r.value, 0.0);
            assert_eq!(r.source, CostSource::Estimated);
        }
    }
}

#[test]
fn cost_scenario_walks_the_layers() {
    let mut raw = json!({ "estimatedCost": 500 });
    let r = resolve_value(&raw, CostModel::ActualFirst, None);
    assert_eq!((r.value, r.source), (500.0, CostSource::Estimated));

    raw["quotedCost"] = json!(650);
    for model in [CostModel::ActualFirst, CostModel::QuotedFirst] {
        let r = resolve_value(&raw, model, None);
        assert_eq!((r.value, r.source), (650.0, CostSource::Quoted));
    }

    raw["paidCost"] = json!(700);
    for model in [CostModel::ActualFirst, CostModel::PaidFirst] {
        let r = resolve_value(&raw, model, None);
        assert_eq!((r.value, r.source), (700.0, CostSource::Paid));
    }
    assert_eq!(resolve_value(&raw, CostModel::QuotedFirst, None).value, 650.0);
}

fn tagged_song() -> Song {
    let mut song = Song::new("s", "Nightdrive", Some(d(2024, 6, 1)));
    song.meta.era_ids.insert("neon".into());
    song.meta.tag_ids.insert("single".into());
    let mut remix = Version::new("s-remix", "Remix");
    remix.meta.stage_ids.insert("mixing".into());
    remix.deadlines.push(Task::new("r-mix", "Mix", "song"));
    song.add_version(remix);
    let mut video = Video::new("s-vid", "Video", Some("Lyric Video".into()));
    video.status = Status::Done;
    song.videos.push(video);
    let mut done = Task::new("s-demo", "Demo", "song");
    done.status = Status::Done;
    song.deadlines.push(done);
    song.custom_tasks.push(Task::new("s-press", "Press Kit", "song"));
    song
}

#[test]
fn propagation_is_idempotent() {
    let once = propagate(&tagged_song());
    assert_eq!(propagate(&once), once);

    let remix = &once.versions[1];
    assert!(remix.meta.era_ids.contains("neon"));
    assert_eq!(remix.meta.stage_ids.len(), 1);
    assert!(once.videos[0].meta.is_empty());
    assert!(once.deadlines[0].meta.is_empty());
    assert_eq!(once.custom_tasks[0].meta, once.meta);
}

#[test]
fn overridden_task_survives_two_recalculations() {
    let owner = TaskOwner::new(ParentType::Song, "s");
    let user = UserOffsets::default();
    let mut tasks = generate(Some(d(2024, 6, 1)), &owner, Category::Song, None, &user);
    let pinned = tasks.iter_mut().find(|t| t.task_type == "Artwork").unwrap();
    pinned.set_date(Some(d(2024, 3, 3)));

    let tasks = recalculate(tasks, Some(d(2024, 7, 1)), &owner, Category::Song, None, &user);
    let tasks = recalculate(tasks, Some(d(2024, 8, 15)), &owner, Category::Song, None, &user);

    let fresh = generate(Some(d(2024, 8, 15)), &owner, Category::Song, None, &user);
    for task in &tasks {
        if task.task_type == "Artwork" {
            assert_eq!(task.date, Some(d(2024, 3, 3)));
            continue;
        }
        let expected = fresh.iter().find(|f| f.id == task.id).unwrap();
        assert_eq!(task.date, expected.date, "{}", task.task_type);
    }
}

#[test]
fn generate_matches_recalculate_on_empty() {
    let user = UserOffsets::from(json!({ "video": { "Edit": 9 } }));
    let cases = [
        (Category::Song, None, ParentType::Song),
        (Category::Song, Some("Album"), ParentType::Version),
        (Category::Video, Some("Visualizer"), ParentType::Video),
        (Category::Release, Some("EP"), ParentType::Release),
        (Category::PhysicalRelease, Some("Vinyl"), ParentType::Release),
        (Category::Event, None, ParentType::Event),
    ];
    for (category, subtype, parent) in cases {
        let owner = TaskOwner::new(parent, "x");
        let reference = Some(d(2025, 2, 14));
        let generated = generate(reference, &owner, category, subtype, &user);
        let recalculated = recalculate(Vec::new(), reference, &owner, category, subtype, &user);
        assert!(!generated.is_empty());
        assert_eq!(generated, recalculated);
    }
}

#[test]
fn offset_scenario() {
    assert_eq!(get_offset("Mix", Category::Song, &UserOffsets::default(), None), 42);
    let user = UserOffsets::from(json!({ "song": { "Mix": 30 } }));
    assert_eq!(get_offset("Mix", Category::Song, &user, None), 30);
    let user = UserOffsets::from(json!({
        "song": { "Mix": 30 },
        "projectTypes": { "Album": { "Mix": 50 } }
    }));
    assert_eq!(get_offset("Mix", Category::Song, &user, Some("Album")), 50);
}

#[test]
fn release_recalculation_scenario() {
    let owner = TaskOwner::new(ParentType::Release, "r");
    let user = UserOffsets::default();
    let mut task = Task::new("r-release", "Release", "release");
    task.date = Some(d(2024, 1, 1));

    let june = Some(d(2024, 6, 1));
    let moved = recalculate(vec![task.clone()], june, &owner, Category::Release, None, &user);
    assert_eq!(moved[0].date, june);

    task.status = Status::Done;
    let kept = recalculate(vec![task], june, &owner, Category::Release, None, &user);
    assert_eq!(kept[0].date, Some(d(2024, 1, 1)));
}

#[test]
fn choice_group_scenario() {
    let node = |id: &str, parent: Option<&str>, cost: CostLayer| {
        CostNode::new(id, parent.map(str::to_string), cost)
    };
    let mut group = node("g", None, CostLayer::default());
    group.is_choice_group = true;
    let mut one_extra = node("one-extra", Some("one"), CostLayer::estimated(50.0));
    one_extra.is_optional = true;
    let mut two_extra = node("two-extra", Some("two"), CostLayer::estimated(120.0));
    two_extra.is_optional = true;
    let mut nodes = vec![
        group,
        node("one", Some("g"), CostLayer { estimated: 100.0, paid: 100.0, ..Default::default() }),
        one_extra,
        node("two", Some("g"), CostLayer::estimated(80.0)),
        two_extra,
    ];

    let policy = Default::default();
    assert_eq!(roll_up(&["g".into()], &nodes, policy), CostRange::new(80.0, 200.0, 0.0));

    nodes[0].selected_child_id = Some("one".into());
    assert_eq!(roll_up(&["g".into()], &nodes, policy), CostRange::new(100.0, 150.0, 100.0));
}
