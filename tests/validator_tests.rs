//! Configuration validator tests
//!
//! Dry-run a selector configuration against wiremock-served pages and
//! assert on the report tree: statuses, samples, pagination chains, and
//! how fetch and extraction failures surface.

use gleaner::config::{ItemConfig, PageConfig, ScrapingConfig, SelectorConfig};
use gleaner::validator::{ConfigValidator, NodeStatus, ValidationNode};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scraping() -> ScrapingConfig {
    ScrapingConfig {
        index_page: PageConfig {
            items: ItemConfig {
                item_selector: {
                    let mut selector = SelectorConfig::with_attribute("a.topic", "href");
                    selector.multiple = true;
                    selector
                },
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
                date: None,
                content: Some(SelectorConfig::new("div.body")),
                url: None,
            },
            next_page: Some(SelectorConfig::with_attribute("a.nav-next", "href")),
            url_pattern: None,
        },
    }
}

fn validator_for(server: &MockServer) -> ConfigValidator {
    ConfigValidator::new(
        "forum",
        &format!("{}/board", server.uri()),
        &format!("{}/topic", server.uri()),
        scraping(),
        2,
        Duration::from_millis(1),
    )
    .unwrap()
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn child<'a>(node: &'a ValidationNode, name: &str) -> &'a ValidationNode {
    node.children
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no child named '{name}'"))
}

fn chain_node(page: &ValidationNode) -> &ValidationNode {
    &child(page, "Pagination").children[0]
}

async fn mount_healthy_fixture(server: &MockServer) {
    mount_page(
        server,
        "/board",
        r#"<a class="topic" href="/t1">1</a>
           <a class="topic" href="/t2">2</a>
           <a class="topic" href="/t3">3</a>
           <a class="next" href="/board2">more</a>"#,
    )
    .await;
    mount_page(server, "/board2", "<p>empty tail page</p>").await;

    mount_page(
        server,
        "/topic",
        r#"<div class="post">
             <h3 class="subject">A thread</h3>
             <span class="author">alice</span>
             <div class="body">hello there</div>
           </div>
           <div class="post"><h3 class="subject">Re: A thread</h3></div>
           <a class="nav-next" href="/topic-p2">next</a>"#,
    )
    .await;
    mount_page(
        server,
        "/topic-p2",
        r#"<div class="post"><h3 class="subject">Re: A thread</h3></div>"#,
    )
    .await;
}

#[tokio::test]
async fn test_healthy_configuration_passes() {
    let server = MockServer::start().await;
    mount_healthy_fixture(&server).await;

    let mut validator = validator_for(&server);
    let tree = validator.validate().await;

    assert!(!tree.has_failures());
    assert_eq!(tree.name, "forum Configuration Validation");

    let index = child(&tree, "Index Page");
    assert_eq!(index.status, NodeStatus::Success);
    assert_eq!(
        index.url.as_deref(),
        Some(format!("{}/board", server.uri()).as_str())
    );

    let items = child(index, "Items Selector");
    assert_eq!(items.count, Some(3));
    assert_eq!(items.sample.as_deref(), Some("(a.topic)"));

    let chain = chain_node(index);
    assert_eq!(chain.name, "Chain: 2 pages validated");
    assert_eq!(chain.children.len(), 2);
    assert_eq!(
        chain.children[1].url.as_deref(),
        Some(format!("{}/board2", server.uri()).as_str())
    );

    let resource = child(&tree, "Resource Page");
    assert_eq!(resource.status, NodeStatus::Success);
    let items = child(resource, "Items Selector");
    assert_eq!(items.count, Some(2));
    assert_eq!(child(items, "Title").sample.as_deref(), Some("A thread"));
    assert_eq!(child(items, "Author").sample.as_deref(), Some("alice"));
    assert_eq!(child(items, "Content").sample.as_deref(), Some("hello there"));
    assert_eq!(chain_node(resource).name, "Chain: 2 pages validated");
}

#[tokio::test]
async fn test_unreachable_index_fails_only_that_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/topic",
        r#"<div class="post">
             <h3 class="subject">A thread</h3>
             <span class="author">alice</span>
             <div class="body">hello</div>
           </div>
           <div class="post"><h3 class="subject">Re: A thread</h3></div>"#,
    )
    .await;

    let mut validator = validator_for(&server);
    let tree = validator.validate().await;

    assert!(tree.has_failures());
    let index = child(&tree, "Index Page");
    assert_eq!(index.status, NodeStatus::Failure);
    assert!(index.error.as_deref().unwrap().contains("HTTP status 500"));
    assert_eq!(child(index, "Items Selector").count, Some(0));

    // The resource page is still validated in full
    let resource = child(&tree, "Resource Page");
    assert_eq!(resource.status, NodeStatus::Success);
    assert_eq!(child(resource, "Items Selector").count, Some(2));
}

#[tokio::test]
async fn test_missing_field_is_reported_per_field() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/board",
        r#"<a class="topic" href="/t1">1</a>"#,
    )
    .await;
    // Posts carry no author element
    mount_page(
        &server,
        "/topic",
        r#"<div class="post">
             <h3 class="subject">A thread</h3>
             <div class="body">hello</div>
           </div>"#,
    )
    .await;

    let mut validator = validator_for(&server);
    let tree = validator.validate().await;

    assert!(tree.has_failures());
    let items = child(child(&tree, "Resource Page"), "Items Selector");

    let author = child(items, "Author");
    assert_eq!(author.status, NodeStatus::Failure);
    assert_eq!(author.error.as_deref(), Some("No content extracted"));

    // Siblings are unaffected
    assert_eq!(child(items, "Title").status, NodeStatus::Success);
    assert_eq!(child(items, "Content").status, NodeStatus::Success);
}

#[tokio::test]
async fn test_pagination_stops_at_the_page_budget() {
    let server = MockServer::start().await;
    mount_page(&server, "/board", r#"<a class="topic" href="/t1">1</a>"#).await;
    // A chain longer than the budget; the third page must never be fetched
    mount_page(
        &server,
        "/topic",
        r#"<div class="post"><h3 class="subject">T</h3></div>
           <a class="nav-next" href="/topic-p2">next</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/topic-p2",
        r#"<a class="nav-next" href="/topic-p3">next</a>"#,
    )
    .await;
    mount_page(&server, "/topic-p3", "<p>past the budget</p>").await;

    let mut validator = validator_for(&server);
    let tree = validator.validate().await;

    let chain = chain_node(child(&tree, "Resource Page"));
    assert_eq!(chain.name, "Chain: 2 pages validated");
    assert_eq!(chain.children.len(), 2);

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.contains(&"/topic-p3".to_string()));
}
