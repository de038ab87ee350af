//! Helper functions for integration tests

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use netpulse::{
    DeviceId, DeviceStatus, MetricSample,
    alerts::AlertRuleEngine,
    snmp::{
        SnmpValue, VarBind,
        ber::{Message, Pdu, PduType, decode_message, encode_message},
    },
    storage::{InventoryAdmin, memory::MemoryBackend, schema::DeviceSeed},
    suppression::InMemorySuppressionStore,
};
use tokio::net::UdpSocket;

pub fn device_seed(name: &str, ip: &str) -> DeviceSeed {
    DeviceSeed {
        name: name.to_string(),
        management_ip: ip.parse().unwrap(),
        snmp_enabled: true,
        snmp_community: None,
        snmp_version: Default::default(),
    }
}

pub fn cpu_sample(device_id: DeviceId, cpu: f64, timestamp: DateTime<Utc>) -> MetricSample {
    let mut sample = MetricSample::new(device_id, DeviceStatus::Online, timestamp);
    sample.cpu_usage = Some(cpu);
    sample
}

/// Memory backend with the given `(name, ip)` devices; returns their ids in order
pub async fn memory_backend_with(devices: &[(&str, &str)]) -> (Arc<MemoryBackend>, Vec<DeviceId>) {
    let backend = Arc::new(MemoryBackend::new());
    let mut ids = Vec::with_capacity(devices.len());
    for (name, ip) in devices {
        ids.push(backend.upsert_device(&device_seed(name, ip)).await.unwrap());
    }
    (backend, ids)
}

pub fn engine_for(backend: &Arc<MemoryBackend>) -> Arc<AlertRuleEngine> {
    Arc::new(AlertRuleEngine::new(
        backend.clone(),
        backend.clone(),
        Arc::new(InMemorySuppressionStore::new()),
    ))
}

/// SNMP agent on a loopback port answering every GET from `values`
///
/// OIDs missing from the map are answered with `noSuchObject`.
pub async fn spawn_snmp_agent(values: HashMap<String, SnmpValue>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65_535];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = decode_message(&buf[..len]) else {
                continue;
            };

            let varbinds = request
                .pdu
                .varbinds
                .iter()
                .map(|vb| VarBind {
                    oid: vb.oid.clone(),
                    value: values
                        .get(&vb.oid.to_string())
                        .cloned()
                        .unwrap_or(SnmpValue::NoSuchObject),
                })
                .collect();

            let response = Message {
                version: request.version,
                community: request.community,
                pdu: Pdu {
                    pdu_type: PduType::Response,
                    request_id: request.pdu.request_id,
                    error_status: 0,
                    error_index: 0,
                    varbinds,
                },
            };
            let _ = socket.send_to(&encode_message(&response), peer).await;
        }
    });

    addr
}
