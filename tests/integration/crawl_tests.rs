//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use seo_ripple::analyzer::Category;
use seo_ripple::config::CrawlConfig;
use seo_ripple::crawler::{CrawlEngine, FailureKind, SkipReason, StopReason};
use seo_ripple::output::{crawl_order, BrokenLink, CollectingSink, PageOutcome, PageReport};
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for a crawl of `seed`
fn create_test_config(seed: &str) -> CrawlConfig {
    let mut config = CrawlConfig::new(seed);
    config.user_agent.crawler_name = "TestBot".to_string();
    config.use_sitemap = false;
    config.retry.max_attempts = 3;
    config.retry.backoff_base_ms = 1; // Very short for testing
    config.retry.jitter = false;
    config.request_timeout_ms = 5_000;
    config
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn links(paths: &[&str]) -> String {
    let anchors: String = paths
        .iter()
        .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
        .collect();
    format!(
        "<html><head><title>Test page</title></head><body>{}</body></html>",
        anchors
    )
}

fn find<'a>(reports: &'a [PageReport], suffix: &str) -> &'a PageReport {
    reports
        .iter()
        .find(|r| r.url.as_str().ends_with(suffix))
        .unwrap_or_else(|| panic!("no report for {}", suffix))
}

#[tokio::test]
async fn test_permissive_crawl_when_robots_missing() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(&server, "/", links(&["/a", "/b", "/c"])).await;
    mount_page(&server, "/a", links(&["/", "/b", "/deeper"])).await;
    mount_page(&server, "/b", links(&[])).await;
    mount_page(&server, "/c", links(&[])).await;

    let mut config = create_test_config(&server.uri());
    config.max_depth = 1;
    config.max_pages = 10;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    assert_eq!(reports.len(), 4);
    assert_eq!(summary.pages_fetched, 4);
    assert!(summary.policy_unavailable.is_empty());
    assert_eq!(summary.stop_reason, StopReason::FrontierDrained);
    assert_eq!(summary.discarded.too_deep, 1);

    let seed = find(&reports, "/");
    assert_eq!(seed.depth(), 0);
    assert_eq!(seed.sequence, 0);
    for suffix in ["/a", "/b", "/c"] {
        let report = find(&reports, suffix);
        assert_eq!(report.depth(), 1);
        assert!(report.outcome.is_fetched());
    }

    // Every URL is reported once
    let unique: HashSet<&str> = reports.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(unique.len(), reports.len());
}

#[tokio::test]
async fn test_findings_reported_for_fetched_page() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(
        &server,
        "/",
        r#"<!doctype html>
<html><head>
<meta name="description" content="A page used to check that images without alternative text are reported once each.">
<link rel="canonical" href="/">
</head><body>
<h1>Gallery</h1>
<img src="/a.png"><img src="/b.png" alt="">
</body></html>"#,
    )
    .await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let findings = &reports[0].findings;
    let in_category = |category: Category| -> Vec<&str> {
        findings
            .iter()
            .filter(|f| f.category == category)
            .map(|f| f.code)
            .collect()
    };
    assert_eq!(in_category(Category::Meta), vec!["title_missing"]);
    assert_eq!(
        in_category(Category::Images),
        vec!["image_alt_missing", "image_alt_missing"]
    );
    assert_eq!(
        summary.findings_by_severity.values().sum::<usize>(),
        findings.len()
    );
}

#[tokio::test]
async fn test_persistent_503_fails_after_max_attempts() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert!(matches!(
        reports[0].outcome,
        PageOutcome::Failed {
            kind: FailureKind::Http,
            attempts: 3,
            status: Some(503),
            ..
        }
    ));
    assert!(reports[0].findings.is_empty());
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.failed_by_kind.get("http"), Some(&1));
    // Nothing linked to the seed
    assert!(summary.broken_links.is_empty());
}

#[tokio::test]
async fn test_redirect_chain_over_cap_is_a_loop() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    for hop in 0..7 {
        Mock::given(method("GET"))
            .and(path(format!("/r{}", hop)))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("/r{}", hop + 1).as_str()),
            )
            .mount(&server)
            .await;
    }
    mount_page(&server, "/r7", links(&[])).await;

    let mut config = create_test_config(&format!("{}/r0", server.uri()));
    config.max_redirects = 5;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(matches!(
        reports[0].outcome,
        PageOutcome::Failed {
            kind: FailureKind::RedirectLoop,
            ..
        }
    ));
    assert!(reports[0].findings.is_empty());
    assert_eq!(summary.pages_fetched, 0);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
    )
    .await;
    mount_page(&server, "/", links(&["/private/secret", "/public"])).await;
    mount_page(&server, "/public", links(&[])).await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let private = find(&reports, "/private/secret");
    assert_eq!(
        private.outcome,
        PageOutcome::Skipped {
            reason: SkipReason::RobotsDisallowed
        }
    );
    assert!(find(&reports, "/public").outcome.is_fetched());
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.skipped_by_reason.get("robots_disallowed"), Some(&1));
}

#[tokio::test]
async fn test_unavailable_robots_is_permissive_and_reported() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(503)).await;
    mount_page(&server, "/", links(&[])).await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(reports[0].outcome.is_fetched());
    assert_eq!(summary.policy_unavailable, vec![server.uri()]);
}

#[tokio::test]
async fn test_breadth_first_dequeue_order() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(&server, "/", links(&["/a", "/b", "/c"])).await;
    mount_page(&server, "/a", links(&["/a1", "/a2"])).await;
    mount_page(&server, "/b", links(&["/b1"])).await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html(links(&["/c1"])).set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;
    for leaf in ["/a1", "/a2", "/b1", "/c1"] {
        mount_page(&server, leaf, links(&[])).await;
    }

    let mut config = create_test_config(&server.uri());
    config.max_depth = 2;
    config.concurrency = 4;

    let (mut reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.pages_fetched, 8);

    reports.sort_by_key(|r| r.sequence);
    let depths: Vec<u32> = reports.iter().map(|r| r.depth()).collect();
    assert!(
        depths.windows(2).all(|w| w[0] <= w[1]),
        "dequeue order was not breadth-first: {:?}",
        depths
    );

    // Sequence numbers are dense
    let sequences: Vec<u64> = reports.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (0..8).collect::<Vec<u64>>());

    crawl_order(&mut reports);
    assert_eq!(reports[0].depth(), 0);
}

#[tokio::test]
async fn test_page_cap_is_never_exceeded() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    let targets: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
    mount_page(&server, "/", links(&refs)).await;
    for target in &targets {
        mount_page(&server, target, links(&refs)).await;
    }

    let mut config = create_test_config(&server.uri());
    config.max_pages = 3;
    config.concurrency = 3;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(reports.len(), 3);
    assert_eq!(summary.stop_reason, StopReason::PageLimit);
    assert!(summary.discarded.over_budget >= 8);
}

#[tokio::test]
async fn test_non_html_content_is_skipped() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(&server, "/", links(&["/guide.pdf"])).await;
    Mock::given(method("GET"))
        .and(path("/guide.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let pdf = find(&reports, "/guide.pdf");
    assert!(matches!(
        &pdf.outcome,
        PageOutcome::Skipped {
            reason: SkipReason::NonHtml { content_type }
        } if content_type.starts_with("application/pdf")
    ));
    assert!(pdf.findings.is_empty());
    assert_eq!(summary.skipped_by_reason.get("non_html"), Some(&1));
}

#[tokio::test]
async fn test_sitemap_urls_seed_the_frontier() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n",
            server.uri()
        )),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{0}/orphan</loc></url>
  <url><loc>{0}/</loc></url>
</urlset>"#,
                server.uri()
            )
            .into_bytes(),
            "application/xml",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/", links(&[])).await;
    mount_page(&server, "/orphan", links(&[])).await;

    let mut config = create_test_config(&server.uri());
    config.use_sitemap = true;
    config.max_depth = 1;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.pages_fetched, 2);
    let orphan = find(&reports, "/orphan");
    assert_eq!(orphan.depth(), 1);
    assert!(orphan.outcome.is_fetched());
}

#[tokio::test]
async fn test_stop_signal_drains_gracefully() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    let targets: Vec<String> = (0..20).map(|i| format!("/slow{}", i)).collect();
    let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
    mount_page(&server, "/", links(&refs)).await;
    for target in &targets {
        Mock::given(method("GET"))
            .and(path(target.as_str()))
            .respond_with(html(links(&[])).set_delay(Duration::from_millis(100)))
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&server.uri());
    config.max_pages = 50;

    let engine = CrawlEngine::new(config).unwrap();
    let stop = engine.stop_signal();
    let mut run = engine.start();

    let first = run.reports.recv().await.unwrap();
    assert_eq!(first.sequence, 0);
    stop.stop();

    let mut sink = CollectingSink::new();
    let summary = run.drain_into(&mut sink).await.unwrap();
    let (rest, finished) = sink.into_parts();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!(finished.is_some());
    assert!(rest.len() < 20, "stop did not halt dispatch: {}", rest.len());
    // In-flight pages still complete and are reported
    assert_eq!(summary.total_pages(), 1 + rest.len());
}

#[tokio::test]
async fn test_directory_redirect_adds_trailing_slash() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(&server, "/", links(&["/blog", "/docs/"])).await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/blog/"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/blog/", links(&["post"])).await;
    mount_page(&server, "/blog/post", links(&[])).await;
    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html(links(&[])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.max_depth = 2;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    let blog = find(&reports, "/blog");
    match &blog.outcome {
        PageOutcome::Fetched { final_url, .. } => {
            assert_eq!(final_url, &format!("{}/blog/", server.uri()))
        }
        other => panic!("expected /blog to be fetched, got {:?}", other),
    }
    // Relative links resolve against the URL the page was served from
    assert!(find(&reports, "/blog/post").outcome.is_fetched());
    assert!(find(&reports, "/docs").outcome.is_fetched());
    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.pages_failed, 0);
}

#[tokio::test]
async fn test_extreme_crawl_delay_still_gives_a_policy() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        ResponseTemplate::new(200)
            .set_body_string("User-agent: *\nCrawl-delay: 1e30\nDisallow: /private/\n"),
    )
    .await;
    mount_page(&server, "/", links(&["/private/report"])).await;

    let (reports, summary) = CrawlEngine::new(create_test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.skipped_by_reason.get("robots_disallowed"), Some(&1));
    assert!(summary.policy_unavailable.is_empty());
}

#[tokio::test]
async fn test_robots_disallow_holds_under_concurrency() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
    )
    .await;
    mount_page(
        &server,
        "/",
        links(&["/p0", "/p1", "/p2", "/p3", "/private/", "/private/a"]),
    )
    .await;
    for page in ["/p0", "/p1", "/p2", "/p3"] {
        let secret = format!("/private{}", page);
        mount_page(&server, page, links(&[secret.as_str(), "/private/a"])).await;
    }
    Mock::given(method("GET"))
        .and(path_regex("^/private/"))
        .respond_with(html(links(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.max_depth = 2;
    config.concurrency = 4;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    let private: Vec<&PageReport> = reports
        .iter()
        .filter(|r| r.url.as_str().contains("/private"))
        .collect();
    assert_eq!(private.len(), 6);
    for report in private {
        assert_eq!(
            report.outcome,
            PageOutcome::Skipped {
                reason: SkipReason::RobotsDisallowed
            },
            "{} was not blocked",
            report.url
        );
    }
    assert_eq!(summary.pages_fetched, 5);
    assert_eq!(summary.skipped_by_reason.get("robots_disallowed"), Some(&6));
}

#[tokio::test]
async fn test_broken_links_are_tied_to_linking_pages() {
    let server = MockServer::start().await;
    mount_robots(&server, ResponseTemplate::new(404)).await;
    mount_page(&server, "/", links(&["/a", "/gone"])).await;
    mount_page(&server, "/a", links(&["/gone", "/"])).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.max_depth = 2;

    let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

    assert!(matches!(
        find(&reports, "/gone").outcome,
        PageOutcome::Failed {
            kind: FailureKind::Http,
            attempts: 1,
            status: Some(404),
            ..
        }
    ));
    assert_eq!(
        summary.broken_links,
        vec![BrokenLink {
            url: format!("{}/gone", server.uri()),
            status: Some(404),
            linked_from: vec![format!("{}/", server.uri()), format!("{}/a", server.uri())],
        }]
    );
}
