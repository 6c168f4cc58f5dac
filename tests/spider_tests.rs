//! End-to-end spider tests
//!
//! These tests run the full crawl state machine against a wiremock
//! server: index discovery, resource pagination, per-item permalink
//! visits, and indexing into the in-memory output.

use gleaner::config::{
    ItemConfig, PageConfig, ScrapingConfig, SelectorConfig, Settings, SourceConfig, SourceManifest,
};
use gleaner::crawler::Spider;
use gleaner::output::{MemoryOutput, Output, SqliteOutput};
use gleaner::processor::Pipeline;
use gleaner::runner::Scraper;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_source(base_url: &str) -> SourceConfig {
    SourceConfig {
        name: "forum".to_string(),
        domain: base_url.to_string(),
        url: format!("{base_url}/board"),
        filter_by_author: false,
        default_author: None,
        authors_of_interest: Vec::new(),
        test_resources: Vec::new(),
        processors: Vec::new(),
        doc_type: None,
        directories: None,
        file_extensions: Vec::new(),
        request_delay_ms: Some(1),
    }
}

fn test_scraping() -> ScrapingConfig {
    ScrapingConfig {
        index_page: PageConfig {
            items: ItemConfig {
                item_selector: SelectorConfig::with_attribute("a.topic", "href"),
                title: None,
                author: None,
                date: None,
                content: None,
                url: None,
            },
            next_page: Some(SelectorConfig::with_attribute("a.next", "href")),
            url_pattern: None,
        },
        resource_page: PageConfig {
            items: ItemConfig {
                item_selector: {
                    let mut selector = SelectorConfig::new("div.post");
                    selector.multiple = true;
                    selector
                },
                title: Some(SelectorConfig::new("h3.subject")),
                author: Some(SelectorConfig::new("span.author")),
                date: Some(SelectorConfig::new("span.date")),
                content: Some(SelectorConfig::new("div.body")),
                url: Some(SelectorConfig::with_attribute("a.permalink", "href")),
            },
            next_page: Some(SelectorConfig::with_attribute("a.nav-next", "href")),
            url_pattern: None,
        },
    }
}

fn spider_for(source: SourceConfig) -> Spider {
    Spider::new(
        source,
        test_scraping(),
        Pipeline::empty(),
        &Settings::default(),
        Vec::new(),
    )
    .unwrap()
}

fn post(msg: usize, subject: &str, author: &str, date: &str, body: &str) -> String {
    format!(
        r##"<div class="post">
          <h3 class="subject">{subject}</h3>
          <span class="author">{author}</span>
          <span class="date">{date}</span>
          <div class="body">{body}</div>
          <a class="permalink" href="#msg{msg}">link</a>
        </div>"##
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts the standard two-resource fixture: an index page listing two
/// topics plus an empty second index page, a three-post topic, and a
/// two-page topic with two posts then one.
async fn mount_forum(server: &MockServer) {
    mount_page(
        server,
        "/board",
        r#"<a class="topic" href="/topic1">T1</a>
           <a class="topic" href="/topic2">T2</a>
           <a class="next" href="/board2">more</a>"#
            .to_string(),
    )
    .await;
    mount_page(server, "/board2", "<p>no more topics</p>".to_string()).await;

    mount_page(
        server,
        "/topic1",
        format!(
            "{}{}{}",
            post(11, "A thread", "alice", "2024-03-13", "first post"),
            post(12, "Re: A thread", "bob", "2024-03-14", "a reply"),
            post(13, "Re: A thread", "alice", "2024-03-15", "another reply"),
        ),
    )
    .await;

    mount_page(
        server,
        "/topic2",
        format!(
            "{}{}{}",
            post(21, "B thread", "carol", "2024-04-01", "opening"),
            post(22, "Re: B thread", "dave", "2024-04-02", "reply"),
            r#"<a class="nav-next" href="/topic2-page2">next</a>"#,
        ),
    )
    .await;
    mount_page(
        server,
        "/topic2-page2",
        post(23, "Re: B thread", "carol", "2024-04-03", "last word"),
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_indexes_both_resources() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let mut spider = spider_for(test_source(&server.uri()));
    let mut output = MemoryOutput::new(100);

    let stats = spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    assert_eq!(stats.resources_to_process, 2);
    assert_eq!(stats.documents_indexed, 6);
    assert!(stats.last_commit_hash.is_none());
    assert_eq!(output.document_count(), 6);

    // Each resource's first page opens with its original post
    let originals: Vec<&str> = output
        .documents()
        .iter()
        .filter(|doc| doc.doc_type.as_deref() == Some("original_post"))
        .map(|doc| doc.id.as_str())
        .collect();
    assert_eq!(originals, vec!["forum-11", "forum-21"]);

    let first = output.get_document("forum-11").unwrap();
    assert_eq!(first.title, "A thread");
    assert_eq!(first.body, "first post");
    assert_eq!(first.authors, Some(vec!["alice".to_string()]));
    assert_eq!(first.created_at.as_deref(), Some("2024-03-13T00:00:00"));
    assert_eq!(first.url, format!("{}/topic1#msg11", server.uri()));
    assert_eq!(first.thread_url, Some(format!("{}/topic1", server.uri())));
    assert!(first.indexed_at.is_some());

    // The paginated page's item is a reply even though it is first on
    // its own page
    let late = output.get_document("forum-23").unwrap();
    assert_eq!(late.doc_type.as_deref(), Some("reply"));
    assert_eq!(
        late.thread_url,
        Some(format!("{}/topic2-page2", server.uri()))
    );
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let mut output = MemoryOutput::new(100);

    let mut spider = spider_for(test_source(&server.uri()));
    spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();
    assert_eq!(output.stats().inserted, 6);

    let mut again = spider_for(test_source(&server.uri()));
    again.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    let stats = output.stats();
    assert_eq!(stats.inserted, 6);
    assert_eq!(stats.unchanged, 6);
    assert_eq!(stats.updated, 0);
    assert_eq!(output.document_count(), 6);
}

#[tokio::test]
async fn test_test_resources_bypass_index_discovery() {
    let server = MockServer::start().await;
    // Only the listed resource is mounted; touching /board would fail
    mount_page(
        &server,
        "/topic1",
        format!(
            "{}{}",
            post(11, "A thread", "alice", "2024-03-13", "first post"),
            r#"<a class="nav-next" href="/unmounted">next</a>"#,
        ),
    )
    .await;

    let mut source = test_source(&server.uri());
    source.test_resources = vec![format!("{}/topic1", server.uri())];
    let mut spider = spider_for(source);
    let mut output = MemoryOutput::new(100);

    let stats = spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    assert_eq!(stats.resources_to_process, 1);
    assert_eq!(stats.documents_indexed, 1);
    assert_eq!(output.document_count(), 1);
    // Pagination was not followed
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_author_filter_drops_unlisted_authors() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let mut source = test_source(&server.uri());
    source.filter_by_author = true;
    let mut spider = Spider::new(
        source,
        test_scraping(),
        Pipeline::empty(),
        &Settings::default(),
        vec!["alice".to_string()],
    )
    .unwrap();
    let mut output = MemoryOutput::new(100);

    let stats = spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    assert_eq!(stats.documents_indexed, 2);
    assert!(output.get_document("forum-11").is_some());
    assert!(output.get_document("forum-13").is_some());
    assert!(output.get_document("forum-12").is_none());
}

#[tokio::test]
async fn test_failed_seed_index_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut spider = spider_for(test_source(&server.uri()));
    let mut output = MemoryOutput::new(100);

    let result = spider.scrape(&mut output).await;
    assert!(result.is_err());
    assert_eq!(output.document_count(), 0);
}

#[tokio::test]
async fn test_failed_resource_page_skips_only_that_resource() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/board",
        r#"<a class="topic" href="/gone">T1</a>
           <a class="topic" href="/topic1">T2</a>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/topic1",
        post(11, "A thread", "alice", "2024-03-13", "survives"),
    )
    .await;

    let mut spider = spider_for(test_source(&server.uri()));
    let mut output = MemoryOutput::new(100);

    let stats = spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    assert_eq!(stats.resources_to_process, 2);
    assert_eq!(stats.documents_indexed, 1);
    assert_eq!(output.get_document("forum-11").unwrap().body, "survives");
}

#[tokio::test]
async fn test_run_source_records_the_run_and_persists() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gleaner.db");
    std::fs::create_dir_all(dir.path().join("selectors")).unwrap();
    std::fs::write(
        dir.path().join("selectors").join("forum.toml"),
        r#"
[index-page.items.item-selector]
selector = "a.topic"
attribute = "href"
multiple = true

[index-page.next-page]
selector = "a.next"
attribute = "href"

[resource-page.items.item-selector]
selector = "div.post"
multiple = true

[resource-page.items.title]
selector = "h3.subject"

[resource-page.items.author]
selector = "span.author"

[resource-page.items.date]
selector = "span.date"

[resource-page.items.content]
selector = "div.body"

[resource-page.items.url]
selector = "a.permalink"
attribute = "href"

[resource-page.next-page]
selector = "a.nav-next"
attribute = "href"
"#,
    )
    .unwrap();

    let manifest_path = dir.path().join("sources.toml");
    std::fs::write(
        &manifest_path,
        format!(
            r#"
[settings]
selectors-dir = "{selectors}"
database-path = "{db}"
data-dir = "{data}"

[[web]]
name = "forum"
domain = "{base}"
url = "{base}/board"
request-delay-ms = 1
"#,
            selectors = dir.path().join("selectors").display(),
            db = db_path.display(),
            data = dir.path().join("data").display(),
            base = server.uri(),
        ),
    )
    .unwrap();

    let manifest = SourceManifest::load(&manifest_path).unwrap();
    let summary = gleaner::runner::run_source(&manifest, "forum", "sqlite")
        .await
        .unwrap();

    assert!(summary.record.success);
    assert_eq!(summary.record.scraper, "spider");
    assert_eq!(summary.record.stats.resources_to_process, 2);
    assert_eq!(summary.record.stats.documents_indexed, 6);
    assert_eq!(summary.index.inserted, 6);

    // Everything survives the run: documents and the run record
    let mut reopened = SqliteOutput::open(&db_path, 10).unwrap();
    assert_eq!(reopened.document_count().unwrap(), 6);
    let doc = reopened.get_document("forum-21").unwrap().unwrap();
    assert_eq!(doc.title, "B thread");
    assert_eq!(doc.doc_type.as_deref(), Some("original_post"));

    let runs = reopened.recent_runs(Some("forum"), 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].success);
    assert_eq!(runs[0].stats.documents_indexed, 6);
}

#[tokio::test]
async fn test_run_source_with_test_resources_is_not_recorded() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gleaner.db");
    std::fs::create_dir_all(dir.path().join("selectors")).unwrap();
    std::fs::write(
        dir.path().join("selectors").join("forum.toml"),
        r#"
[index-page.items.item-selector]
selector = "a.topic"
attribute = "href"
multiple = true

[resource-page.items.item-selector]
selector = "div.post"
multiple = true

[resource-page.items.title]
selector = "h3.subject"

[resource-page.items.content]
selector = "div.body"

[resource-page.items.url]
selector = "a.permalink"
attribute = "href"
"#,
    )
    .unwrap();

    let manifest_path = dir.path().join("sources.toml");
    std::fs::write(
        &manifest_path,
        format!(
            r#"
[settings]
selectors-dir = "{selectors}"
database-path = "{db}"

[[web]]
name = "forum"
domain = "{base}"
url = "{base}/board"
test-resources = ["{base}/topic1"]
request-delay-ms = 1
"#,
            selectors = dir.path().join("selectors").display(),
            db = db_path.display(),
            base = server.uri(),
        ),
    )
    .unwrap();

    let manifest = SourceManifest::load(&manifest_path).unwrap();
    let summary = gleaner::runner::run_source(&manifest, "forum", "sqlite")
        .await
        .unwrap();
    assert!(summary.record.success);
    assert_eq!(summary.index.inserted, 3);

    // Documents are indexed but the run leaves no history behind
    let mut reopened = SqliteOutput::open(&db_path, 10).unwrap();
    assert_eq!(reopened.document_count().unwrap(), 3);
    assert!(reopened.recent_runs(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_permalink_fetch_skips_the_item() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/board",
        r#"<a class="topic" href="/topic1">T1</a>"#.to_string(),
    )
    .await;
    // The second post's permalink points at a missing page
    mount_page(
        &server,
        "/topic1",
        format!(
            "{}{}",
            post(11, "A thread", "alice", "2024-03-13", "kept"),
            r#"<div class="post">
              <h3 class="subject">Re: A thread</h3>
              <span class="author">bob</span>
              <div class="body">lost</div>
              <a class="permalink" href="/missing"></a>
            </div>"#,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut spider = spider_for(test_source(&server.uri()));
    let mut output = MemoryOutput::new(100);

    let stats = spider.scrape(&mut output).await.unwrap();
    output.flush().await.unwrap();

    assert_eq!(stats.documents_indexed, 1);
    assert!(output.get_document("forum-11").is_some());
}
