// Integration tests for the Gen1 HTTP client using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelly_api::gen1::RawRange;
use shelly_api::{Credentials, Error, Gen1Client, TransportConfig, WireValue};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(credentials: Option<Credentials>) -> (MockServer, Gen1Client) {
    let server = MockServer::start().await;
    let client = Gen1Client::new(
        Url::parse(&server.uri()).unwrap(),
        credentials,
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_device_information() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/shelly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "SHSW-1",
            "mac": "98CDAC1F03B4",
            "auth": false,
            "fw": "20230913-112003/v1.14.0-gcb84623",
            "num_outputs": 1
        })))
        .mount(&server)
        .await;

    let info = client.get_device_information().await.unwrap();
    assert_eq!(info.device_type, "SHSW-1");
    assert_eq!(info.mac, "98CDAC1F03B4");
    assert_eq!(info.num_outputs, Some(1));
}

#[tokio::test]
async fn test_get_device_description() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/cit/d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blk": [{"I": 1, "D": "relay_0"}, {"I": 2, "D": "device"}],
            "sen": [
                {"I": 9103, "T": "EVC", "D": "cfgChanged", "R": "U16", "L": 2},
                {"I": 1101, "T": "S", "D": "output", "R": "0/1", "L": 1},
                {"I": 3104, "T": "T", "D": "deviceTemp", "U": "C", "R": ["-40/300", "999"], "L": 2}
            ]
        })))
        .mount(&server)
        .await;

    let desc = client.get_device_description().await.unwrap();
    assert_eq!(desc.blk.len(), 2);
    assert_eq!(desc.sen[1].description, "output");
    assert_eq!(desc.sen[1].range, Some(RawRange::Token("0/1".into())));
    assert_eq!(desc.sensors_of(2).count(), 2);
}

#[tokio::test]
async fn test_get_device_state() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wifi_sta": {"connected": true, "ssid": "home", "ip": "192.168.1.20", "rssi": -58},
            "relays": [{"ison": true, "has_timer": false, "source": "http"}],
            "meters": [{"power": 12.3, "is_valid": true, "total": 4567}],
            "temperature": 43.2,
            "uptime": 3600
        })))
        .mount(&server)
        .await;

    let status = client.get_device_state().await.unwrap();
    assert!(status.relays[0].ison);
    assert_eq!(status.meters[0].power, Some(12.3));
    assert_eq!(status.wifi_sta.unwrap().rssi, Some(-58));
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_relay_output() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/relay/0"))
        .and(query_param("turn", "on"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ison": true})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_device_state("relay_0", "output", &WireValue::from("on"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_roller_position() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/roller/0"))
        .and(query_param("go", "to_pos"))
        .and(query_param("roller_pos", "35"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "open"})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_device_state("roller_0", "rollerPos", &WireValue::Int(35))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unmappable_write_never_reaches_device() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client
        .set_device_state("relay_0", "power", &WireValue::Int(1))
        .await;
    assert!(matches!(result, Err(Error::Mapping { .. })));
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_basic_challenge_is_answered_once() {
    let (server, client) = setup(Some(Credentials::new("admin", "pass"))).await;

    // "admin:pass"
    Mock::given(method("GET"))
        .and(path("/shelly"))
        .and(header("authorization", "Basic YWRtaW46cGFzcw=="))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"type": "SHSW-25", "mac": "AABBCC"})),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shelly"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Basic realm="SHSW-25""#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let info = client.get_device_information().await.unwrap();
    assert_eq!(info.device_type, "SHSW-25");
}

#[tokio::test]
async fn test_missing_credentials_fail_without_retry() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.get_device_state().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

// ── Error classification ────────────────────────────────────────────

#[tokio::test]
async fn test_schema_failure_is_distinct_from_transport() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/shelly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "SHSW-1"})))
        .mount(&server)
        .await;

    let err = client.get_device_information().await.unwrap_err();
    assert!(matches!(err, Error::SchemaValidation { .. }), "got: {err:?}");
    assert!(!err.is_network());
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.get_device_state().await.unwrap_err();
    assert!(err.is_server_error());
    assert!(err.is_transient());
    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
}
