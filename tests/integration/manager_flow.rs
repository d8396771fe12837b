//! Jobs driven through the manager and its workers

use crate::common::{fast_settings, royalroad_chapter, royalroad_toc, version_engine};
use black_library::parsers::{JobResult, JobStatus, ParserFactory, ParserKind, ParserManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_fiction(server: &MockServer, id: u32) -> String {
    let fiction = format!("/www.royalroad.com/fiction/{}/work-{}", id, id);

    Mock::given(method("GET"))
        .and(path(fiction.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string(royalroad_toc(
            &fiction,
            &[("one", 1, 1_600_000_000), ("two", 2, 1_600_100_000)],
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^{}/chapter/\d+/\w+$", fiction)))
        .respond_with(ResponseTemplate::new(200).set_body_string(royalroad_chapter("text")))
        .mount(server)
        .await;

    format!("{}{}", server.uri(), fiction)
}

fn manager(dir: &TempDir, num_parsers: usize) -> ParserManager {
    let factory = Arc::new(ParserFactory::new(Some(version_engine()), fast_settings()));
    ParserManager::new(factory, dir.path(), num_parsers, [ParserKind::Rr])
}

/// Ticks the manager until it is idle, returning every status seen
async fn run_until_idle(manager: &mut ParserManager) -> Vec<Vec<(String, JobStatus)>> {
    let mut snapshots = Vec::new();

    for _ in 0..1000 {
        manager.run_once();
        snapshots.push(
            manager
                .get_current_job_list()
                .into_iter()
                .map(|tracker| (tracker.uuid, tracker.status))
                .collect(),
        );
        if manager.is_idle() {
            return snapshots;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("manager did not finish its jobs");
}

#[tokio::test]
async fn test_job_flows_through_manager() {
    let server = MockServer::start().await;
    let url = mount_fiction(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, 1);

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    manager.register_database_status_callback(Arc::new(move |result: JobResult| {
        sink.lock().unwrap().push(result);
    }));
    let progress = Arc::new(Mutex::new(Vec::new()));
    let progress_sink = progress.clone();
    manager.register_progress_callback(Arc::new(move |uuid: &str, number: usize, error: bool| {
        progress_sink.lock().unwrap().push((uuid.to_string(), number, error));
    }));

    assert!(manager.add_job("work-1", &url, &url, 0, 0, false));
    assert!(!manager.add_job("work-1", &url, &url, 0, 0, false));
    assert!(manager.still_working_on("work-1"));
    assert_eq!(
        manager.get_current_job_list()[0].status,
        JobStatus::ManagerQueued
    );

    let snapshots = run_until_idle(&mut manager).await;

    let seen: Vec<JobStatus> = snapshots
        .iter()
        .flatten()
        .map(|(_, status)| *status)
        .collect();
    assert!(seen.contains(&JobStatus::Working));
    assert!(!seen.contains(&JobStatus::Error));
    assert!(!manager.still_working_on("work-1"));

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.uuid, "work-1");
    assert_eq!(results[0].start_number, 1);
    assert_eq!(results[0].metadata.series_length, 2);
    assert_eq!(
        results[0].metadata.media_path,
        dir.path().join("work-1").display().to_string()
    );
    assert!(!results[0].has_error);

    assert_eq!(
        *progress.lock().unwrap(),
        vec![
            ("work-1".to_string(), 1, false),
            ("work-1".to_string(), 2, false)
        ]
    );
    assert!(dir.path().join("work-1").join("SEC0002_two_VER000.html").is_file());
}

#[tokio::test]
async fn test_failed_job_is_dropped_without_database_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, 1);
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    manager.register_database_status_callback(Arc::new(move |result: JobResult| {
        sink.lock().unwrap().push(result);
    }));

    let url = format!("{}/www.royalroad.com/fiction/404/gone", server.uri());
    manager.add_job("work-404", &url, &url, 1, 0, false);

    run_until_idle(&mut manager).await;

    assert!(results.lock().unwrap().is_empty());
    assert!(!manager.still_working_on("work-404"));
    assert!(manager.get_current_job_list().is_empty());
}

#[tokio::test]
async fn test_one_parser_runs_one_job_at_a_time() {
    let server = MockServer::start().await;
    let mut urls = Vec::new();
    for id in 1..=3 {
        urls.push(mount_fiction(&server, id).await);
    }

    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, 1);
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    manager.register_database_status_callback(Arc::new(move |result: JobResult| {
        sink.lock().unwrap().push(result.metadata.uuid);
    }));

    for (i, url) in urls.iter().enumerate() {
        manager.add_job(&format!("work-{}", i + 1), url, url, 1, 0, false);
    }

    let snapshots = run_until_idle(&mut manager).await;

    for snapshot in &snapshots {
        let working = snapshot
            .iter()
            .filter(|(_, status)| *status == JobStatus::Working)
            .count();
        assert!(working <= 1, "{} jobs working at once", working);
    }

    let mut finished = results.lock().unwrap().clone();
    finished.sort();
    assert_eq!(finished, vec!["work-1", "work-2", "work-3"]);
}
