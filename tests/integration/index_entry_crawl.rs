//! Index-entry crawls against a mock Royal Road

use crate::common::{fast_settings, file_names, royalroad_chapter, royalroad_toc, version_engine};
use black_library::parsers::{parse, ParserFactory, ParserJob};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FICTION: &str = "/www.royalroad.com/fiction/1/test-fiction";

async fn mount_toc(server: &MockServer, chapters: &[(&str, u32, i64)], calls: u64) {
    Mock::given(method("GET"))
        .and(path(FICTION))
        .respond_with(ResponseTemplate::new(200).set_body_string(royalroad_toc(FICTION, chapters)))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_chapter(server: &MockServer, slug: &str, number: u32, text: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/chapter/{}/{}", FICTION, number, slug)))
        .respond_with(ResponseTemplate::new(200).set_body_string(royalroad_chapter(text)))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_saves_every_chapter_then_skips_unchanged() {
    let server = MockServer::start().await;
    // the second run fetches the contents page but no chapter
    mount_toc(
        &server,
        &[("one", 10, 1_600_000_000), ("two", 11, 1_600_100_000), ("three", 12, 1_600_200_000)],
        2,
    )
    .await;
    mount_chapter(&server, "one", 10, "first", 1).await;
    mount_chapter(&server, "two", 11, "second", 1).await;
    mount_chapter(&server, "three", 12, "third", 1).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), FICTION);
    let job = ParserJob::new("work-rr", url.clone());

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(result.metadata.title, "test-fiction");
    assert_eq!(result.metadata.author, "Tester");
    assert_eq!(result.metadata.series_length, 3);
    assert_eq!(result.metadata.update_date, 1_600_200_000);
    assert_eq!(
        result.metadata.last_url,
        format!("{}{}/chapter/12/three", server.uri(), FICTION)
    );
    assert_eq!(
        file_names(dir.path()),
        vec![
            "SEC0001_one_VER000.html",
            "SEC0002_two_VER000.html",
            "SEC0003_three_VER000.html",
        ]
    );

    // a fresh parser sharing the same catalog finds nothing new
    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let rerun = parse(parser.as_mut(), &job).await;

    assert!(!rerun.has_error);
    assert_eq!(rerun.metadata.update_date, 1_600_200_000);
    assert_eq!(file_names(dir.path()).len(), 3);
}

#[tokio::test]
async fn test_changed_chapter_is_saved_as_new_version() {
    let server = MockServer::start().await;
    mount_toc(&server, &[("one", 10, 1_600_000_000), ("two", 11, 1_600_100_000)], 1).await;
    mount_chapter(&server, "one", 10, "first", 1).await;
    mount_chapter(&server, "two", 11, "second", 1).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), FICTION);
    let job = ParserJob::new("work-rr", url.clone());

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    assert!(!parse(parser.as_mut(), &job).await.has_error);

    server.verify().await;
    server.reset().await;

    // chapter one is unchanged, two has a new date and four is new
    mount_toc(
        &server,
        &[("one", 10, 1_600_000_000), ("two", 11, 1_700_000_000), ("four", 13, 1_700_100_000)],
        1,
    )
    .await;
    mount_chapter(&server, "one", 10, "first", 0).await;
    mount_chapter(&server, "two", 11, "second, revised", 1).await;
    mount_chapter(&server, "four", 13, "fourth", 1).await;

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(result.metadata.series_length, 3);
    assert_eq!(result.metadata.update_date, 1_700_100_000);
    assert_eq!(
        file_names(dir.path()),
        vec![
            "SEC0001_one_VER000.html",
            "SEC0002_two_VER000.html",
            "SEC0002_two_VER001.html",
            "SEC0003_four_VER000.html",
        ]
    );
}

#[tokio::test]
async fn test_error_replay_skips_chapters_before_its_window() {
    let server = MockServer::start().await;
    mount_toc(&server, &[("one", 10, 1_600_000_000), ("two", 11, 1_600_100_000)], 1).await;
    mount_chapter(&server, "one", 10, "first", 0).await;
    mount_chapter(&server, "two", 11, "second", 1).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), FICTION);
    let mut job = ParserJob::new("work-rr", url.clone());
    job.start_number = 2;
    job.end_number = 2;
    job.is_error_job = true;

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(file_names(dir.path()), vec!["SEC0002_two_VER000.html"]);
}

#[tokio::test]
async fn test_rerun_from_known_length_refetches_republished_chapter() {
    let server = MockServer::start().await;
    mount_toc(
        &server,
        &[("one", 10, 1_600_000_000), ("two", 11, 1_600_100_000), ("three", 12, 1_600_200_000)],
        1,
    )
    .await;
    mount_chapter(&server, "one", 10, "first", 1).await;
    mount_chapter(&server, "two", 11, "second", 1).await;
    mount_chapter(&server, "three", 12, "third", 1).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), FICTION);

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let first = parse(parser.as_mut(), &ParserJob::new("work-rr", url.clone())).await;
    assert!(!first.has_error);
    assert_eq!(first.metadata.series_length, 3);

    server.verify().await;
    server.reset().await;

    // chapter one was edited after the first crawl
    mount_toc(
        &server,
        &[("one", 10, 1_650_000_000), ("two", 11, 1_600_100_000), ("three", 12, 1_600_200_000)],
        1,
    )
    .await;
    mount_chapter(&server, "one", 10, "first, edited", 1).await;
    mount_chapter(&server, "two", 11, "second", 0).await;
    mount_chapter(&server, "three", 12, "third", 0).await;

    // a scheduled refresh starts at the stored length
    let mut rerun = ParserJob::new("work-rr", url.clone());
    rerun.last_url = first.metadata.last_url.clone();
    rerun.start_number = first.metadata.series_length as usize;

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &rerun).await;

    assert!(!result.has_error);
    assert_eq!(
        file_names(dir.path()),
        vec![
            "SEC0001_one_VER000.html",
            "SEC0001_one_VER001.html",
            "SEC0002_two_VER000.html",
            "SEC0003_three_VER000.html",
        ]
    );
}

#[tokio::test]
async fn test_failing_chapter_exhausts_attempts_and_keeps_saved_work() {
    let server = MockServer::start().await;
    mount_toc(
        &server,
        &[("one", 10, 1_600_000_000), ("two", 11, 1_600_100_000), ("three", 12, 1_600_200_000)],
        1,
    )
    .await;
    mount_chapter(&server, "one", 10, "first", 1).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/chapter/11/two", FICTION)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    mount_chapter(&server, "three", 12, "third", 0).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), FICTION);
    let job = ParserJob::new("work-rr", url.clone());

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    // exhausting attempts still ends the loop normally
    assert!(!result.has_error);
    assert_eq!(result.metadata.series_length, 1);
    assert_eq!(file_names(dir.path()), vec!["SEC0001_one_VER000.html"]);
}
