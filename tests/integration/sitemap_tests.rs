//! Sitemap resolution against a mock website

use crate::common::{mount_xml, pages, sitemap_config, sitemap_index, urlset};
use sitemap_indexer::sitemap::SitemapResolver;
use sitemap_indexer::SitemapError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_two_level_index_deduplicates_in_order() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[
            format!("{}/post-sitemap.xml", uri),
            format!("{}/page-sitemap.xml", uri),
        ]),
    )
    .await;
    mount_xml(&server, "/post-sitemap.xml", urlset(&pages(&server, &[1, 2, 3]))).await;
    mount_xml(&server, "/page-sitemap.xml", urlset(&pages(&server, &[3, 4, 5]))).await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let urls = resolver.resolve_all(&uri).await.unwrap();

    assert_eq!(urls, pages(&server, &[1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn test_falls_back_to_plain_sitemap() {
    let server = MockServer::start().await;
    mount_xml(&server, "/sitemap.xml", urlset(&pages(&server, &[7, 8]))).await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let mut stream = resolver.resolve(&server.uri()).unwrap();

    assert_eq!(stream.next_url().await.unwrap(), Some(pages(&server, &[7])[0].clone()));
    assert_eq!(
        stream.root_url(),
        Some(format!("{}/sitemap.xml", server.uri()).as_str())
    );
    assert_eq!(stream.next_url().await.unwrap(), Some(pages(&server, &[8])[0].clone()));
    assert_eq!(stream.next_url().await.unwrap(), None);
    assert_eq!(stream.yielded(), 2);
}

#[tokio::test]
async fn test_bare_domain_falls_back_from_https_to_http() {
    let server = MockServer::start().await;
    mount_xml(&server, "/sitemap_index.xml", urlset(&pages(&server, &[1]))).await;

    // No scheme: https is tried first and fails against the plain-HTTP mock
    let bare = server.uri().trim_start_matches("http://").to_string();
    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let mut stream = resolver.resolve(&bare).unwrap();

    assert_eq!(stream.next_url().await.unwrap(), Some(pages(&server, &[1])[0].clone()));
    assert!(stream.root_url().unwrap().starts_with("http://"));
}

#[tokio::test]
async fn test_leaf_sitemaps_are_fetched_lazily() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[format!("{}/a.xml", uri), format!("{}/b.xml", uri)]),
    )
    .await;
    mount_xml(&server, "/a.xml", urlset(&pages(&server, &[1]))).await;
    mount_xml(&server, "/b.xml", urlset(&pages(&server, &[2]))).await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let mut stream = resolver.resolve(&uri).unwrap();

    stream.next_url().await.unwrap();
    assert_eq!(stream.documents_fetched(), 2);

    stream.next_url().await.unwrap();
    assert_eq!(stream.documents_fetched(), 3);
}

#[tokio::test]
async fn test_self_referencing_index_is_too_deep() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[format!("{}/sitemap_index.xml", uri)]),
    )
    .await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let result = resolver.resolve_all(&uri).await;

    assert!(matches!(result, Err(SitemapError::TooDeep { .. })));
}

#[tokio::test]
async fn test_nesting_beyond_bound_is_too_deep() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[format!("{}/level-1.xml", uri)]),
    )
    .await;
    mount_xml(
        &server,
        "/level-1.xml",
        sitemap_index(&[format!("{}/level-2.xml", uri)]),
    )
    .await;
    mount_xml(&server, "/level-2.xml", urlset(&pages(&server, &[1]))).await;

    let mut config = sitemap_config();
    config.max_depth = 1;
    let resolver = SitemapResolver::new(&config).unwrap();

    match resolver.resolve_all(&uri).await {
        Err(SitemapError::TooDeep { url, max_depth }) => {
            assert_eq!(max_depth, 1);
            assert!(url.ends_with("/level-2.xml"));
        }
        other => panic!("expected TooDeep, got {:?}", other),
    }

    config.max_depth = 2;
    let resolver = SitemapResolver::new(&config).unwrap();
    assert_eq!(resolver.resolve_all(&uri).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_sitemap_is_fetch_error() {
    let server = MockServer::start().await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let result = resolver.resolve_all(&server.uri()).await;

    match result {
        Err(SitemapError::Fetch { url, reason }) => {
            assert!(url.ends_with("/sitemap.xml"));
            assert!(reason.contains("404"));
        }
        other => panic!("expected Fetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_child_is_parse_error() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[format!("{}/broken.xml", uri)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Not found</body>"))
        .mount(&server)
        .await;

    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    let result = resolver.resolve_all(&uri).await;

    assert!(matches!(result, Err(SitemapError::Parse { .. })));
}

#[tokio::test]
async fn test_invalid_domain() {
    let resolver = SitemapResolver::new(&sitemap_config()).unwrap();
    assert!(matches!(
        resolver.resolve("   "),
        Err(SitemapError::InvalidDomain(_))
    ));
}
