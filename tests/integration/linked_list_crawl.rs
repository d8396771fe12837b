//! Linked-list crawls against a mock WordPress serial

use crate::common::{fast_settings, file_names, version_engine};
use black_library::parsers::{parse, ParserFactory, ParserJob};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chapter_path(number: u32) -> String {
    format!("/serial.wordpress.com/2021/01/0{}/chapter-{}/", number, number)
}

fn chapter_page(number: u32, next: Option<u32>) -> String {
    let nav = match next {
        Some(next) => format!(
            r#"<div class="nav-next"><a href="{}">Next Chapter</a></div>"#,
            chapter_path(next)
        ),
        None => String::new(),
    };

    format!(
        r#"<html>
        <head><meta property="og:site_name" content="Test Serial"></head>
        <body>
            <article>
                <h1 class="entry-title">Chapter {number}</h1>
                <span class="author vcard"><a href="/author/writer">writer</a></span>
                <time class="entry-date updated" datetime="2021-01-0{number}T00:00:00+00:00">January</time>
                <div class="entry-content"><p>part {number}</p><p>more</p><p>end</p></div>
            </article>
            <nav>{nav}</nav>
        </body>
        </html>"#,
        number = number,
        nav = nav
    )
}

async fn mount_chapter(server: &MockServer, number: u32, next: Option<u32>, calls: u64) {
    Mock::given(method("GET"))
        .and(path(chapter_path(number)))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(number, next)))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_follows_next_links_then_resumes() {
    let server = MockServer::start().await;
    // chapter 1 is the target page and the first section
    mount_chapter(&server, 1, Some(2), 2).await;
    mount_chapter(&server, 2, Some(3), 1).await;
    // a section in the first run, then the target and first section of the resumed run
    mount_chapter(&server, 3, None, 3).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), chapter_path(1));
    let job = ParserJob::new("work-wp", url.clone());

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(result.metadata.title, "Test Serial");
    assert_eq!(result.metadata.author, "writer");
    assert_eq!(result.metadata.series_length, 3);
    assert_eq!(result.metadata.update_date, 1609632000);
    assert_eq!(result.metadata.last_url, format!("{}{}", server.uri(), chapter_path(3)));
    assert_eq!(
        file_names(dir.path()),
        vec![
            "SEC0001_Chapter-1_VER000.html",
            "SEC0002_Chapter-2_VER000.html",
            "SEC0003_Chapter-3_VER000.html",
        ]
    );

    // the next run starts on the last parsed chapter
    let mut resume = ParserJob::new("work-wp", url.clone());
    resume.last_url = result.metadata.last_url.clone();
    resume.start_number = result.metadata.series_length as usize;

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let rerun = parse(parser.as_mut(), &resume).await;

    assert!(!rerun.has_error);
    assert_eq!(rerun.metadata.series_length, 3);
    assert_eq!(rerun.metadata.last_url, result.metadata.last_url);
    assert_eq!(file_names(dir.path()).len(), 3);
}

#[tokio::test]
async fn test_end_number_stops_the_walk() {
    let server = MockServer::start().await;
    mount_chapter(&server, 1, Some(2), 2).await;
    mount_chapter(&server, 2, Some(3), 1).await;
    mount_chapter(&server, 3, None, 0).await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), chapter_path(1));
    let mut job = ParserJob::new("work-wp", url.clone());
    job.end_number = 2;

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(result.metadata.series_length, 2);
    assert_eq!(file_names(dir.path()).len(), 2);
}

#[tokio::test]
async fn test_broken_page_ends_the_walk_without_advancing() {
    let server = MockServer::start().await;
    mount_chapter(&server, 1, Some(2), 2).await;
    Mock::given(method("GET"))
        .and(path(chapter_path(2)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let factory = ParserFactory::new(Some(version_engine()), fast_settings());
    let url = format!("{}{}", server.uri(), chapter_path(1));
    let job = ParserJob::new("work-wp", url.clone());

    let mut parser = factory.parser_by_url(&url).unwrap();
    parser.core_mut().set_local_path(dir.path());
    let result = parse(parser.as_mut(), &job).await;

    assert!(!result.has_error);
    assert_eq!(result.metadata.series_length, 1);
    assert_eq!(result.metadata.last_url, url);
    assert_eq!(file_names(dir.path()), vec!["SEC0001_Chapter-1_VER000.html"]);
}
