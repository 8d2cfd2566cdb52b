//! End-to-end sync lifecycle against a live HTTP agent
//!
//! Runs the syncer against the real `ConsulAgent` adapter talking to a
//! stateful in-process mock of the Consul agent API, covering register,
//! converge, update, and shutdown over the wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use selkie_core::config::SyncerConfig;
use selkie_sync::{
    CheckDefinition, CheckKind, ConsulAgent, ServiceAgent, ServiceDefinition, Syncer, TaskNetwork,
};

/// Shared state of the mock agent: registered services and checks,
/// keyed by registration ID
#[derive(Clone, Default)]
struct MockAgentState {
    services: Arc<Mutex<HashMap<String, Value>>>,
    checks: Arc<Mutex<HashMap<String, Value>>>,
}

async fn list_services(State(state): State<MockAgentState>) -> Json<Value> {
    let services = state.services.lock().expect("services lock");
    Json(json!(services.clone()))
}

async fn list_checks(State(state): State<MockAgentState>) -> Json<Value> {
    let checks = state.checks.lock().expect("checks lock");
    Json(json!(checks.clone()))
}

async fn register(State(state): State<MockAgentState>, Json(body): Json<Value>) {
    let id = body["ID"].as_str().expect("ID").to_string();

    let mut checks = state.checks.lock().expect("checks lock");
    checks.retain(|_, c| c["ServiceID"].as_str() != Some(id.as_str()));
    for check in body["Checks"].as_array().cloned().unwrap_or_default() {
        let check_id = check["CheckID"].as_str().expect("CheckID").to_string();
        checks.insert(
            check_id.clone(),
            json!({
                "CheckID": check_id,
                "Name": check["Name"],
                "ServiceID": id,
            }),
        );
    }

    state.services.lock().expect("services lock").insert(
        id.clone(),
        json!({
            "ID": id,
            "Service": body["Name"],
            "Tags": body["Tags"],
            "Address": body["Address"],
            "Port": body["Port"],
        }),
    );
}

async fn deregister(State(state): State<MockAgentState>, Path(id): Path<String>) {
    state.services.lock().expect("services lock").remove(&id);
    state
        .checks
        .lock()
        .expect("checks lock")
        .retain(|_, c| c["ServiceID"].as_str() != Some(id.as_str()));
}

/// Spawn the mock agent and return its state plus the adapter config
async fn spawn_mock_agent() -> (MockAgentState, selkie_core::config::AgentConfig) {
    let state = MockAgentState::default();
    let router = Router::new()
        .route("/v1/agent/services", get(list_services))
        .route("/v1/agent/checks", get(list_checks))
        .route("/v1/agent/service/register", put(register))
        .route("/v1/agent/service/deregister/{id}", put(deregister))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let config = selkie_core::config::AgentConfig {
        address: format!("{}", addr),
        ..selkie_core::config::AgentConfig::default()
    };
    (state, config)
}

fn test_services() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition::new("api", "http")
            .with_tags(vec!["v1".into()])
            .with_check(CheckDefinition {
                name: "alive".into(),
                kind: CheckKind::Http {
                    path: "/health".into(),
                },
                interval_ms: 10_000,
                timeout_ms: 2_000,
            }),
        ServiceDefinition::new("metrics", "admin"),
    ]
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let (state, agent_config) = spawn_mock_agent().await;
    let config = SyncerConfig {
        agent: agent_config.clone(),
        ..SyncerConfig::for_testing()
    };
    let agent = ConsulAgent::new(&config.agent).expect("adapter");

    let syncer = Syncer::new(config, agent).await.expect("syncer");
    syncer.set_service_reg_prefix("selkie");
    let network = TaskNetwork::new("10.0.0.7")
        .with_port("http", 23100)
        .with_port("admin", 23101);
    syncer.set_addr_finder(network.addr_finder());
    syncer.set_services("web", test_services());

    syncer.sync_services().await.expect("first pass");

    {
        let services = state.services.lock().expect("services lock");
        assert_eq!(services.len(), 2);
        let api = &services["selkie-web:api"];
        assert_eq!(api["Address"], "10.0.0.7");
        assert_eq!(api["Port"], 23100);
        assert_eq!(api["Tags"], json!(["v1"]));

        let checks = state.checks.lock().expect("checks lock");
        assert_eq!(checks.len(), 1);
        assert!(checks.contains_key("selkie-web:api:alive"));
    }

    // Idempotent against live agent state
    syncer.sync_services().await.expect("second pass");
    assert_eq!(state.services.lock().expect("services lock").len(), 2);

    // Dropping a service from desired state removes its registration
    syncer.set_services("web", vec![test_services().remove(0)]);
    syncer.sync_services().await.expect("third pass");
    {
        let services = state.services.lock().expect("services lock");
        assert_eq!(services.len(), 1);
        assert!(services.contains_key("selkie-web:api"));
    }

    // Shutdown deregisters everything the syncer owns
    syncer.shutdown().await.expect("shutdown");
    assert!(state.services.lock().expect("services lock").is_empty());
    assert!(state.checks.lock().expect("checks lock").is_empty());
}

#[tokio::test]
async fn test_converges_after_external_mutation() {
    let (state, agent_config) = spawn_mock_agent().await;
    let config = SyncerConfig {
        agent: agent_config,
        ..SyncerConfig::for_testing()
    };
    let agent = ConsulAgent::new(&config.agent).expect("adapter");

    let syncer = Syncer::new(config, agent).await.expect("syncer");
    syncer.set_service_reg_prefix("selkie");
    syncer.set_addr_finder(TaskNetwork::new("10.0.0.7").with_port("http", 23100).addr_finder());
    syncer.set_services("web", vec![ServiceDefinition::new("api", "http")]);

    syncer.sync_services().await.expect("first pass");

    // Someone deregisters our service out from under us
    state
        .services
        .lock()
        .expect("services lock")
        .remove("selkie-web:api");

    syncer.sync_services().await.expect("repair pass");
    assert!(state
        .services
        .lock()
        .expect("services lock")
        .contains_key("selkie-web:api"));
}

#[tokio::test]
async fn test_require_agent_probe() {
    // Unreachable agent: construction fails when required
    let config = SyncerConfig {
        agent: selkie_core::config::AgentConfig {
            address: "127.0.0.1:1".into(),
            timeout_ms: 500,
            require_agent: true,
        },
        ..SyncerConfig::for_testing()
    };
    let agent = ConsulAgent::new(&config.agent).expect("adapter");
    assert!(Syncer::new(config, agent).await.is_err());

    // Reachable agent: probe succeeds
    let (_state, mut agent_config) = spawn_mock_agent().await;
    agent_config.require_agent = true;
    let config = SyncerConfig {
        agent: agent_config,
        ..SyncerConfig::for_testing()
    };
    let agent = ConsulAgent::new(&config.agent).expect("adapter");
    let syncer = Syncer::new(config, agent).await.expect("syncer");

    // Adapter listings work end to end even with nothing registered
    assert!(syncer.agent().list_services().await.expect("list").is_empty());
}
