use captured_logs::CapturedLogs;
use fake_transport::{FakeTransport, message, pool};
use objectl_core::prost_reflect::DynamicMessage;
use objectl_core::rendering::RenderError;
use objectl_core::tonic::Status;
use objectl_core::{BuildError, Registry, TableRenderer};
use objectl_fixtures::{FULFILLMENT_PACKAGE, PRIVATE_PACKAGE};
use serde_json::json;

mod captured_logs;
mod fake_transport;

fn setup() -> (FakeTransport, Registry<FakeTransport>) {
    let transport = FakeTransport::new();
    let registry = Registry::builder()
        .transport(transport.clone())
        .pool(pool())
        .add_package(PRIVATE_PACKAGE, 0)
        .add_package(FULFILLMENT_PACKAGE, 1)
        .build()
        .unwrap();
    (transport, registry)
}

async fn render(
    registry: &Registry<FakeTransport>,
    objects: &[DynamicMessage],
) -> Result<String, RenderError> {
    let mut output = Vec::new();
    let mut renderer = TableRenderer::builder()
        .registry(registry)
        .writer(&mut output)
        .build()
        .unwrap();
    let result = renderer.render(objects).await;
    drop(renderer);
    result.map(|_| String::from_utf8(output).unwrap())
}

fn row(output: &str, index: usize) -> Vec<&str> {
    output.lines().nth(index).unwrap().split_whitespace().collect()
}

fn cluster(json: serde_json::Value) -> DynamicMessage {
    message("fulfillment.v1.Cluster", json)
}

fn template(id: &str, name: &str) -> DynamicMessage {
    message(
        "fulfillment.v1.ClusterTemplate",
        json!({ "id": id, "metadata": { "name": name } }),
    )
}

#[tokio::test]
async fn test_empty_list_renders_nothing() {
    let (transport, registry) = setup();
    assert_eq!(render(&registry, &[]).await.unwrap(), "");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_default_layout() {
    let (_, registry) = setup();
    let hubs = [
        message("private.v1.Hub", json!({ "id": "h1" })),
        message("private.v1.Hub", json!({ "id": "h22", "metadata": { "name": "main" } })),
    ];

    let output = render(&registry, &hubs).await.unwrap();
    assert_eq!(output, "ID   NAME\nh1   -\nh22  main\n");
}

#[tokio::test]
async fn test_enum_values_are_shortened() {
    let (_, registry) = setup();
    let object = cluster(json!({
        "id": "c1",
        "metadata": { "name": "my" },
        "status": { "state": "CLUSTER_STATE_READY", "api_url": "https://api" },
    }));

    let output = render(&registry, &[object]).await.unwrap();
    assert_eq!(row(&output, 0), ["ID", "NAME", "TEMPLATE", "STATE", "API", "URL"]);
    assert_eq!(row(&output, 1), ["c1", "my", "-", "READY", "https://api"]);
}

#[tokio::test]
async fn test_lookup_shows_name_and_is_cached() {
    let (transport, registry) = setup();
    transport.insert("fulfillment.v1.ClusterTemplates", template("t1", "small"));
    transport.insert("fulfillment.v1.ClusterTemplates", template("t2", "large"));
    let objects = [
        cluster(json!({ "id": "c1", "template": "t1" })),
        cluster(json!({ "id": "c2", "template": "t1" })),
        cluster(json!({ "id": "c3", "template": "large" })),
    ];

    let mut output = Vec::new();
    let mut renderer = TableRenderer::builder()
        .registry(&registry)
        .writer(&mut output)
        .build()
        .unwrap();
    renderer.render(&objects).await.unwrap();
    // A second render with the same renderer reuses the names already found:
    renderer.render(&objects[..1]).await.unwrap();
    drop(renderer);
    let output = String::from_utf8(output).unwrap();

    assert_eq!(row(&output, 1)[2], "small");
    assert_eq!(row(&output, 2)[2], "small");
    assert_eq!(row(&output, 3)[2], "large");
    assert_eq!(row(&output, 5)[2], "small");
    assert_eq!(
        transport.call_count("/fulfillment.v1.ClusterTemplates/List"),
        2
    );
}

#[tokio::test]
async fn test_missing_reference_shows_identifier() {
    let (transport, registry) = setup();
    transport.insert("fulfillment.v1.ClusterTemplates", template("t1", "small"));
    let object = cluster(json!({ "id": "c1", "template": "gone" }));

    let (logs, _guard) = CapturedLogs::start();
    let output = render(&registry, &[object]).await.unwrap();
    assert_eq!(row(&output, 1)[2], "gone");

    let warnings = logs.lines("WARN");
    assert_eq!(warnings.len(), 1, "{}", logs.contents());
    assert!(warnings[0].contains("Expected exactly one object for lookup"));
    assert!(warnings[0].contains("matches=0"));
    assert!(warnings[0].contains("gone"));
}

#[tokio::test]
async fn test_lookup_failures_dont_abort() {
    let (transport, registry) = setup();
    transport.fail(
        "/fulfillment.v1.HostClasses/List",
        Status::unavailable("down"),
    );
    let host = message(
        "fulfillment.v1.Host",
        json!({ "id": "h1", "host_class": "x1", "power_state": "HOST_POWER_STATE_ON" }),
    );

    let (logs, _guard) = CapturedLogs::start();
    let output = render(&registry, &[host]).await.unwrap();
    assert_eq!(row(&output, 1), ["h1", "-", "x1", "ON"]);

    let errors = logs.lines("ERROR");
    assert_eq!(errors.len(), 1, "{}", logs.contents());
    assert!(errors[0].contains("Failed to look up object"));
    assert!(errors[0].contains("x1"));
    assert!(errors[0].contains("down"));
}

#[tokio::test]
async fn test_ambiguous_reference_shows_identifier() {
    let (transport, registry) = setup();
    transport.insert("fulfillment.v1.ClusterTemplates", template("t1", "dup"));
    transport.insert("fulfillment.v1.ClusterTemplates", template("t2", "dup"));
    let object = cluster(json!({ "id": "c1", "template": "dup" }));

    let (logs, _guard) = CapturedLogs::start();
    let output = render(&registry, &[object]).await.unwrap();
    assert_eq!(row(&output, 1)[2], "dup");

    let warnings = logs.lines("WARN");
    assert_eq!(warnings.len(), 1, "{}", logs.contents());
    assert!(warnings[0].contains("matches=2"));
}

#[tokio::test]
async fn test_found_references_log_nothing() {
    let (transport, registry) = setup();
    transport.insert("fulfillment.v1.ClusterTemplates", template("t1", "small"));
    let object = cluster(json!({ "id": "c1", "template": "t1" }));

    let (logs, _guard) = CapturedLogs::start();
    render(&registry, &[object]).await.unwrap();
    assert!(logs.lines("WARN").is_empty());
    assert!(logs.lines("ERROR").is_empty());
}

#[tokio::test]
async fn test_describe() {
    let (transport, registry) = setup();
    transport.insert("fulfillment.v1.ClusterTemplates", template("t1", "small"));
    let object = cluster(json!({
        "id": "c1",
        "metadata": { "name": "my" },
        "template": "t1",
        "status": { "state": "CLUSTER_STATE_FAILED" },
    }));

    let mut output = Vec::new();
    let mut renderer = TableRenderer::builder()
        .registry(&registry)
        .writer(&mut output)
        .build()
        .unwrap();
    renderer.describe(&object).await.unwrap();
    drop(renderer);
    let output = String::from_utf8(output).unwrap();

    let lines: Vec<Vec<&str>> = output
        .lines()
        .map(|line| line.split_whitespace().collect())
        .collect();
    assert_eq!(lines[0], ["ID:", "c1"]);
    assert_eq!(lines[1], ["NAME:", "my"]);
    assert_eq!(lines[2], ["TEMPLATE:", "small"]);
    assert_eq!(lines[3], ["STATE:", "FAILED"]);
    // Values start in the same column:
    let offsets: Vec<usize> = output
        .lines()
        .map(|line| line.len() - line.split_once(':').unwrap().1.trim_start().len())
        .collect();
    assert!(offsets.windows(2).all(|w| w[0] == w[1]), "{output}");
}

#[tokio::test]
async fn test_include_deleted() {
    let (_, registry) = setup();
    let hubs = [
        message(
            "private.v1.Hub",
            json!({ "id": "h1", "metadata": { "deletion_timestamp": "2024-05-01T10:00:00Z" } }),
        ),
        message("private.v1.Hub", json!({ "id": "h2" })),
    ];

    let mut output = Vec::new();
    let mut renderer = TableRenderer::builder()
        .registry(&registry)
        .writer(&mut output)
        .include_deleted(true)
        .build()
        .unwrap();
    renderer.render(&hubs).await.unwrap();
    drop(renderer);
    let output = String::from_utf8(output).unwrap();

    assert_eq!(row(&output, 0), ["ID", "DELETED", "NAME"]);
    assert_eq!(row(&output, 1), ["h1", "2024-05-01T10:00:00Z", "-"]);
    assert_eq!(row(&output, 2), ["h2", "-", "-"]);
}

#[tokio::test]
async fn test_mixed_types_are_rejected() {
    let (_, registry) = setup();
    let objects = [
        cluster(json!({ "id": "c1" })),
        message("fulfillment.v1.Host", json!({ "id": "h1" })),
    ];

    let error = render(&registry, &objects).await.unwrap_err();
    assert!(matches!(
        error,
        RenderError::MixedTypes { ref first, ref other }
            if first == "fulfillment.v1.Cluster" && other == "fulfillment.v1.Host"
    ));
}

#[tokio::test]
async fn test_unknown_types_are_rejected() {
    let (_, registry) = setup();
    let event = message("fulfillment.v1.Event", json!({ "id": "e1" }));

    let error = render(&registry, &[event]).await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "failed to find object descriptor for type 'fulfillment.v1.Event'"
    );
}

#[tokio::test]
async fn test_layout_from_directory() {
    let (_, registry) = setup();
    let directory = std::env::temp_dir().join(format!("objectl-tables-{}", std::process::id()));
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(
        directory.join("private.v1.Hub.yaml"),
        "columns:\n- header: NAMESPACE\n  value: this.namespace\n- header: BAD\n  value: this.nope\n",
    )
    .unwrap();

    let mut output = Vec::new();
    let mut renderer = TableRenderer::builder()
        .registry(&registry)
        .writer(&mut output)
        .tables_dir(&directory)
        .build()
        .unwrap();
    let error = renderer
        .render(&[message("private.v1.Hub", json!({ "id": "h1" }))])
        .await
        .unwrap_err();
    drop(renderer);
    std::fs::remove_dir_all(&directory).unwrap();

    match error {
        RenderError::Compile { column, type_name, source } => {
            assert_eq!(column, "BAD");
            assert_eq!(type_name, "private.v1.Hub");
            assert_eq!(source.expression(), "this.nope");
        }
        other => panic!("Unexpected error: {other}"),
    }
    // Nothing is written when the layout can't be compiled:
    assert!(output.is_empty());
}

#[test]
fn test_builder_requires_inputs() {
    let (_, registry) = setup();
    let error = TableRenderer::<FakeTransport, Vec<u8>>::builder()
        .writer(Vec::new())
        .build()
        .err()
        .unwrap();
    assert_eq!(error, BuildError::Missing("registry"));

    let error = TableRenderer::<FakeTransport, Vec<u8>>::builder()
        .registry(&registry)
        .build()
        .err()
        .unwrap();
    assert_eq!(error, BuildError::Missing("writer"));
}
