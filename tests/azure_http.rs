//! The Azure table client against a local HTTP server: table provisioning,
//! entity inserts and error propagation through the hook.
#![cfg(feature = "azure")]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::json;

use tracing_table_sink::azure::{AzureConfig, AzureConnector, DEFAULT_API_VERSION};
use tracing_table_sink::storage::Credentials;
use tracing_table_sink::{HookInitializer, LogEntry, Severity, TableHook};

const KEY: &str = "c2VjcmV0LWtleQ==";

fn connector(server: &MockServer) -> AzureConnector {
    AzureConnector::new(AzureConfig {
        endpoint: Some(server.base_url()),
        ..AzureConfig::default()
    })
}

fn odata_error(code: &str, message: &str) -> String {
    json!({ "odata.error": { "code": code, "message": { "lang": "en-US", "value": message } } }).to_string()
}

fn hook_for(server: &MockServer) -> TableHook {
    HookInitializer::new(connector(server)).initialize(&Credentials::new("acct", KEY), "applogs", Severity::Info)
}

// ---------------------------------------------------------------------------
// Table provisioning
// ---------------------------------------------------------------------------

/// Creating the table sends a signed POST to `/Tables` with the fixed
/// server-side timeout and the table name in the body.
#[test]
fn create_table_sends_signed_request() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/Tables")
            .query_param("timeout", "30")
            .header("x-ms-version", DEFAULT_API_VERSION)
            .header("accept", "application/json;odata=nometadata")
            .header("content-type", "application/json")
            .header_exists("x-ms-date")
            .header_exists("authorization")
            .json_body(json!({ "TableName": "applogs" }));
        then.status(201);
    });

    let hook = hook_for(&server);

    create.assert();
    assert!(hook.is_enabled());
}

#[test]
fn existing_table_keeps_hook_enabled() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/Tables");
        then.status(409)
            .header("content-type", "application/json")
            .body(odata_error("TableAlreadyExists", "The table specified already exists."));
    });

    let hook = hook_for(&server);

    create.assert();
    assert!(hook.is_enabled());
    assert_eq!(hook.levels(), Severity::at_or_above(Severity::Info).as_slice());
}

#[test]
fn rejected_provisioning_disables_hook() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/Tables");
        then.status(403)
            .header("content-type", "application/json")
            .body(odata_error("AuthenticationFailed", "Server failed to authenticate the request."));
    });
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);

    let hook = HookInitializer::new(connector(&server))
        .with_diagnostics(move |err| sink.lock().unwrap().push(err.to_string()))
        .initialize(&Credentials::new("acct", KEY), "applogs", Severity::Info);

    assert!(!hook.is_enabled());
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("applogs"));
    assert!(reports[0].contains("AuthenticationFailed"));
}

// ---------------------------------------------------------------------------
// Inserts
// ---------------------------------------------------------------------------

/// An insert posts the mapped entity, with typed timestamp, to `/{table}`.
#[test]
fn fire_posts_entity_to_table() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/Tables");
        then.status(204);
    });
    let insert = server.mock(|when, then| {
        when.method(POST)
            .path("/applogs")
            .header("x-ms-version", DEFAULT_API_VERSION)
            .header_exists("authorization")
            .json_body(json!({
                "PartitionKey": "billing",
                "RowKey": "1700000000123456789",
                "LogTimestamp": "2023-11-14T22:13:20.1234567Z",
                "LogTimestamp@odata.type": "Edm.DateTime",
                "Level": "info",
                "Message": "x",
                "service": "billing",
            }));
        then.status(204);
    });

    let hook = hook_for(&server);
    let time = Utc.timestamp_opt(1_700_000_000, 123_456_789).single().unwrap();
    hook.fire(&LogEntry::new(Severity::Info, "x").at(time).with_field("service", "billing"))
        .unwrap();

    insert.assert();
}

#[test]
fn insert_conflict_is_returned_unchanged() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/Tables");
        then.status(204);
    });
    let insert = server.mock(|when, then| {
        when.method(POST).path("/applogs");
        then.status(409)
            .header("content-type", "application/json")
            .body(odata_error("EntityAlreadyExists", "The specified entity already exists."));
    });

    let hook = hook_for(&server);
    let err = hook.fire(&LogEntry::new(Severity::Error, "boom")).unwrap_err();

    insert.assert_hits(1);
    assert_eq!(err.code(), Some("EntityAlreadyExists"));
    assert!(err.to_string().contains("409"));
}
