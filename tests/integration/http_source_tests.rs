//! Integration tests for the HTTP source
//!
//! These use wiremock to stand in for the herbarium site.

use herbarium_harvest::aggregator::CompletionPolicy;
use herbarium_harvest::config::{
    AggregationConfig, Config, FetchConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use herbarium_harvest::crawler::{
    Coordinator, EntityDiscovery, FailureKind, FragmentFetcher, HerbariumClient, SpeciesCatalog,
};
use herbarium_harvest::ledger::StatusLedger;
use herbarium_harvest::output::RecordWriter;
use herbarium_harvest::state::{EntityId, FragmentContent};
use herbarium_harvest::FragmentKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX_PAGE: &str = r##"<html><head><title>Herbarium</title></head><body>
  <div id="specimen_wrapper">
    <div id="specimen_title">Cassia fistula <span class="specimen_title2">L.</span></div>
    <div id="specimen_family">Fabaceae</div>
    <div id="specimen_img"><img src="/images/cassia.jpg"></div>
  </div>
  <div id="plant_menu" title="Nomenclature"><a href="#">Nomenclature</a></div>
  <div id="plant_sousmenu" title="Leaf"><a href="#">Leaf</a></div>
</body></html>"##;

const LEAF_PAGE: &str = r##"<html><body>
  <div id="plant_txt"><p>Leaves pinnate, 30 cm long.</p></div>
  <div id="specimen_img"><img src="/img/leaf.jpg"></div>
  <div id="specimen_legend">Leaflets</div>
</body></html>"##;

const NOMENCLATURE_PAGE: &str = r##"<html><body><ul>
  <li><span class="titchap">Botanical name :</span> <em>Cassia fistula</em></li>
  <li><span class="titchap">Family :</span> Fabaceae</li>
</ul></body></html>"##;

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output_dir: &str) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        fetch: FetchConfig {
            download_delay: 0,
            request_timeout: 5,
            max_retries: 2,
            retry_backoff: 10,
        },
        aggregation: AggregationConfig::default(),
        output: OutputConfig {
            output_dir: output_dir.to_string(),
            status_file: "_scraping_status.json".to_string(),
        },
    }
}

fn create_client(server: &MockServer) -> HerbariumClient {
    HerbariumClient::new(&create_test_config(&server.uri(), "unused")).unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_list_species() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/menu_species.php"))
        .respond_with(html(
            r##"<html><body>
              <a href="herbarium.php?id=12">Cassia fistula</a>
              <a href="herbarium.php?id=3">Albizia lebbeck</a>
              <a href="herbarium.php?id=12">Cassia fistula</a>
              <a href="about.php">About</a>
            </body></html>"##,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let ids = client.list_species().await.unwrap();

    assert_eq!(ids, vec![EntityId::from(12), EntityId::from(3)]);
}

#[tokio::test]
async fn test_discover_species() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .and(query_param("id", "12"))
        .respond_with(html(INDEX_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let discovery = client.discover(&EntityId::from(12)).await.unwrap();

    assert_eq!(
        discovery.base.basic_info.scientific_name.as_deref(),
        Some("Cassia fistula")
    );
    assert!(discovery.base.url.ends_with("/herbarium.php?id=12"));
    assert!(!discovery.base.scraped_at.is_empty());
    assert_eq!(
        discovery.available,
        Some(BTreeSet::from([FragmentKind::Nomenclature, FragmentKind::Leaf]))
    );
}

#[tokio::test]
async fn test_not_found_is_permanent_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let failure = client.discover(&EntityId::from(99)).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::NotFound);
    assert_eq!(failure.error_type(), "404_permanent");
    assert!(!failure.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    // First attempt fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(html(INDEX_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let discovery = client.discover(&EntityId::from(12)).await.unwrap();

    assert!(discovery.available.is_some());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;

    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let failure = client.discover(&EntityId::from(12)).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::ServerError);
    assert!(failure.is_retryable());
}

#[tokio::test]
async fn test_rate_limit_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = create_client(&server);
    let failure = client.discover(&EntityId::from(12)).await.unwrap_err();

    assert_eq!(failure.error_type(), "rate_limit");
}

#[tokio::test]
async fn test_tiny_index_page_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .respond_with(html("<html></html>"))
        .mount(&server)
        .await;

    let client = create_client(&server);
    let failure = client.discover(&EntityId::from(12)).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::EmptyResponse);
    assert!(failure.is_retryable());
}

#[tokio::test]
async fn test_fetch_fragment() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/contents/description-leaf.php"))
        .and(query_param("id", "12"))
        .respond_with(html(LEAF_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let content = client
        .fetch_fragment(&EntityId::from(12), FragmentKind::Leaf)
        .await
        .unwrap();

    match content {
        FragmentContent::Section(section) => {
            assert_eq!(section.text.as_deref(), Some("Leaves pinnate, 30 cm long."));
            assert_eq!(section.images.len(), 1);
            assert_eq!(section.images[0].caption.as_deref(), Some("Leaflets"));
        }
        other => panic!("expected section, got {:?}", other),
    }
}

#[tokio::test]
async fn test_harvest_against_mock_site() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output_dir = dir.path().join("species");

    Mock::given(method("GET"))
        .and(path("/herbarium.php"))
        .and(query_param("id", "12"))
        .respond_with(html(INDEX_PAGE))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contents/description-leaf.php"))
        .respond_with(html(LEAF_PAGE))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contents/nomenclature.php"))
        .respond_with(html(NOMENCLATURE_PAGE))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &output_dir.to_string_lossy());
    let ledger = Arc::new(StatusLedger::load(config.output.status_path()));
    let writer = RecordWriter::new(&config.output.output_dir, ledger.clone());
    let client = Arc::new(HerbariumClient::new(&config).unwrap());

    let summary = Coordinator::new(
        client,
        CompletionPolicy::from_config(&config.aggregation),
        writer,
        vec![EntityId::from(12)],
    )
    .run()
    .await;

    assert_eq!(summary.completed, 1);

    let data = ledger.snapshot().unwrap();
    let entry = &data.completed["12"];
    assert_eq!(entry.completion.as_deref(), Some("complete"));
    assert!(entry.has_minimal_data);

    let content = std::fs::read_to_string(output_dir.join("species-12.json")).unwrap();
    let record: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(record["species_id"], "12");
    assert_eq!(record["basic_info"]["family"], "Fabaceae");
    assert_eq!(
        record["description"]["leaf"]["text"],
        "Leaves pinnate, 30 cm long."
    );
    assert!(record["nomenclature"].is_object());
}
