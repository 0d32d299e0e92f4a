use super::loading::parse_endpoint;
use super::*;
use crate::transport::Transport;

#[test]
fn defaults_cover_every_endpoint() {
    let cfg = FunkwerkConfig::local();
    let topo = cfg.topology().unwrap();

    assert_eq!(
        topo.broker_frontend.endpoint(),
        "ipc:///tmp/vigil/broker-frontend.sock"
    );
    assert_eq!(
        topo.registration_requests.endpoint(),
        "ipc:///tmp/vigil/sd-instance-registration-requests.sock"
    );
    assert_eq!(
        topo.fulfillment_check_results.endpoint(),
        "ipc:///tmp/vigil/kpi-fulfillment-check-results.sock"
    );
}

#[test]
fn parses_full_toml() {
    let toml_str = r#"
        [broker]
        frontend = "tcp://10.0.0.5:5555"
        backend = "tcp://10.0.0.5:5556"
        health = "tcp://10.0.0.5:5557"

        [queues]
        registration_requests = "tcp://10.0.0.5:5558"
        fulfillment_check_requests = "tcp://10.0.0.5:5559"
        fulfillment_check_results = "tcp://10.0.0.5:5560"
    "#;

    let cfg = FunkwerkConfig::from_toml(toml_str).unwrap();
    let topo = cfg.topology().unwrap();
    assert_eq!(topo.broker_frontend, Transport::tcp("10.0.0.5", 5555));
    assert_eq!(
        topo.fulfillment_check_requests,
        Transport::tcp("10.0.0.5", 5559)
    );
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg = FunkwerkConfig::from_toml("").unwrap();
    assert_eq!(cfg.broker.backend, "ipc:///tmp/vigil/broker-backend.sock");
    assert!(cfg
        .queues
        .fulfillment_check_requests
        .contains("kpi-fulfillment-check-requests"));
}

#[test]
fn distributed_lays_out_consecutive_ports() {
    let cfg = FunkwerkConfig::distributed("bus.internal", 6000);
    let topo = cfg.topology().unwrap();
    assert_eq!(topo.broker_frontend, Transport::tcp("bus.internal", 6000));
    assert_eq!(topo.broker_health, Transport::tcp("bus.internal", 6002));
    assert_eq!(
        topo.fulfillment_check_results,
        Transport::tcp("bus.internal", 6005)
    );
}

#[test]
fn rejects_unknown_scheme() {
    let toml_str = r#"
        [broker]
        frontend = "amqp://guest@localhost"
    "#;
    assert!(FunkwerkConfig::from_toml(toml_str).is_err());
}

#[test]
fn rejects_tcp_without_port() {
    assert!(parse_endpoint("tcp://no-port-here").is_err());
}

#[test]
fn parse_endpoint_ipc() {
    let t = parse_endpoint("ipc:///tmp/vigil/broker-frontend.sock").unwrap();
    assert_eq!(t, Transport::ipc("broker-frontend"));
}

#[test]
fn loads_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[broker]\nfrontend = \"tcp://127.0.0.1:7000\"\nbackend = \"tcp://127.0.0.1:7001\"\nhealth = \"tcp://127.0.0.1:7002\""
    )
    .unwrap();

    let cfg = FunkwerkConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.broker.frontend, "tcp://127.0.0.1:7000");
}
