//! Integration tests for the schedule registry and due-today evaluation.

use chrono::NaiveDate;
use signoff::core::schedule::{
    is_due_today, CronDelegate, DayOfWeek, Frequency, NeverDue, ScheduleSpec, ScheduleStatus,
    LAST_DAY_OF_MONTH,
};
use signoff::core::store::Store;
use signoff::plugins::schedule::{
    add_schedule, check_all_schedules, check_schedule, delete_schedule, get_schedule,
    initialize_schedule_db, list_schedules, replace_schedule, set_schedule_status,
};
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    initialize_schedule_db(&root).unwrap();
    (tmp, Store::new(root))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn daily_spec(interval: Option<u32>, start: Option<NaiveDate>) -> ScheduleSpec {
    ScheduleSpec {
        frequency: Frequency::Daily,
        interval_days: interval,
        days_of_week: vec![],
        day_of_month: None,
        cron_expression: None,
        start_date: start,
        end_date: None,
        status: ScheduleStatus::Active,
    }
}

// ---------------------------------------------------------------------------
// Registry round trips
// ---------------------------------------------------------------------------

#[test]
fn test_add_and_get_round_trips_the_spec() {
    let (_tmp, store) = test_store();
    let spec = ScheduleSpec {
        frequency: Frequency::Weekly,
        interval_days: None,
        days_of_week: vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
        day_of_month: None,
        cron_expression: None,
        start_date: Some(date(2025, 1, 1)),
        end_date: Some(date(2025, 12, 31)),
        status: ScheduleStatus::Active,
    };
    let id = add_schedule(&store, "weekly-kpi", "KPI digest", spec).unwrap();
    assert!(id.starts_with("SCH_"));

    let entry = get_schedule(&store, &id).unwrap();
    assert_eq!(entry.name, "weekly-kpi");
    assert_eq!(entry.spec.frequency, Frequency::Weekly);
    assert_eq!(
        entry.spec.days_of_week,
        vec![DayOfWeek::Monday, DayOfWeek::Wednesday]
    );
    assert_eq!(entry.spec.start_date, Some(date(2025, 1, 1)));
}

#[test]
fn test_add_rejects_malformed_specs() {
    let (_tmp, store) = test_store();
    let weekly_empty = ScheduleSpec {
        frequency: Frequency::Weekly,
        ..daily_spec(None, None)
    };
    let result = add_schedule(&store, "broken", "", weekly_empty);
    assert!(result.is_err());
    assert!(list_schedules(&store, None).unwrap().is_empty());
}

#[test]
fn test_replace_swaps_the_spec_wholesale() {
    let (_tmp, store) = test_store();
    let id = add_schedule(
        &store,
        "digest",
        "",
        daily_spec(Some(2), Some(date(2025, 1, 1))),
    )
    .unwrap();

    let monthly = ScheduleSpec {
        frequency: Frequency::Monthly,
        day_of_month: Some(LAST_DAY_OF_MONTH),
        ..daily_spec(None, None)
    };
    replace_schedule(&store, &id, monthly).unwrap();

    let entry = get_schedule(&store, &id).unwrap();
    assert_eq!(entry.spec.frequency, Frequency::Monthly);
    assert_eq!(entry.spec.day_of_month, Some(LAST_DAY_OF_MONTH));
    assert_eq!(entry.spec.interval_days, None);
    assert_eq!(entry.name, "digest");
}

#[test]
fn test_set_status_is_logical_deletion() {
    let (_tmp, store) = test_store();
    let id = add_schedule(&store, "digest", "", daily_spec(None, Some(date(2025, 1, 1))))
        .unwrap();

    set_schedule_status(&store, &id, ScheduleStatus::Disabled).unwrap();
    let entry = get_schedule(&store, &id).unwrap();
    assert_eq!(entry.spec.status, ScheduleStatus::Disabled);

    // Disabled rows are never due but remain in the registry.
    assert!(!check_schedule(&store, &id, date(2025, 2, 1), &NeverDue).unwrap());
    assert_eq!(list_schedules(&store, None).unwrap().len(), 1);
    assert_eq!(
        list_schedules(&store, Some(ScheduleStatus::Disabled))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_delete_removes_the_row() {
    let (_tmp, store) = test_store();
    let id = add_schedule(&store, "digest", "", daily_spec(None, None)).unwrap();
    delete_schedule(&store, &id).unwrap();
    assert!(get_schedule(&store, &id).is_err());
}

// ---------------------------------------------------------------------------
// Due-today checks through the registry
// ---------------------------------------------------------------------------

#[test]
fn test_daily_interval_check_through_registry() {
    let (_tmp, store) = test_store();
    let id = add_schedule(
        &store,
        "every-third-day",
        "",
        daily_spec(Some(3), Some(date(2025, 1, 1))),
    )
    .unwrap();

    assert!(check_schedule(&store, &id, date(2025, 1, 1), &NeverDue).unwrap());
    assert!(!check_schedule(&store, &id, date(2025, 1, 2), &NeverDue).unwrap());
    assert!(!check_schedule(&store, &id, date(2025, 1, 3), &NeverDue).unwrap());
    assert!(check_schedule(&store, &id, date(2025, 1, 4), &NeverDue).unwrap());
    assert!(check_schedule(&store, &id, date(2025, 1, 7), &NeverDue).unwrap());
}

#[test]
fn test_check_all_sweeps_the_registry() {
    let (_tmp, store) = test_store();
    add_schedule(&store, "daily", "", daily_spec(None, Some(date(2025, 1, 1)))).unwrap();
    let weekly = ScheduleSpec {
        frequency: Frequency::Weekly,
        days_of_week: vec![DayOfWeek::Friday],
        ..daily_spec(None, None)
    };
    add_schedule(&store, "friday-only", "", weekly).unwrap();

    // 2025-01-06 is a Monday.
    let results = check_all_schedules(&store, date(2025, 1, 6), &NeverDue).unwrap();
    assert_eq!(results.len(), 2);
    for (entry, due) in results {
        match entry.name.as_str() {
            "daily" => assert!(due),
            "friday-only" => assert!(!due),
            other => panic!("unexpected schedule {}", other),
        }
    }
}

#[test]
fn test_custom_cron_rows_use_the_delegate() {
    let (_tmp, store) = test_store();
    struct FridayCron;
    impl CronDelegate for FridayCron {
        fn is_due(&self, _expression: &str, on: NaiveDate) -> bool {
            on.format("%u").to_string() == "5"
        }
    }

    let cron = ScheduleSpec {
        frequency: Frequency::CustomCron,
        cron_expression: Some("0 6 * * 5".to_string()),
        ..daily_spec(None, None)
    };
    let id = add_schedule(&store, "cron-row", "", cron).unwrap();

    // 2025-01-10 is a Friday.
    assert!(check_schedule(&store, &id, date(2025, 1, 10), &FridayCron).unwrap());
    assert!(!check_schedule(&store, &id, date(2025, 1, 9), &FridayCron).unwrap());
}

#[test]
fn test_pure_evaluator_agrees_with_registry_check() {
    let (_tmp, store) = test_store();
    let spec = daily_spec(Some(4), Some(date(2025, 3, 1)));
    let id = add_schedule(&store, "agree", "", spec.clone()).unwrap();

    for offset in 0..12u32 {
        let day = date(2025, 3, 1) + chrono::Duration::days(i64::from(offset));
        let direct = is_due_today(&spec, day, &NeverDue);
        let via_registry = check_schedule(&store, &id, day, &NeverDue).unwrap();
        assert_eq!(direct, via_registry);
    }
}
