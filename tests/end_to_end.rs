use std::net::SocketAddr;
use std::sync::Arc;

use onionet::config::NetworkConfig;
use onionet::network::{call, MemoryTransport, TcpTransport};
use onionet::protocol::{Request, Response};
use onionet::server::NodeServer;
use onionet::{
    launch_network, CircuitBuilder, Destination, NodeIdentity, OnionError, Registry, RegistryClient,
    RegistryEntry, RelayForwarder, RemoteRegistry, UserNode,
};

struct MemoryNetwork {
    network: NetworkConfig,
    transport: Arc<MemoryTransport>,
    registry: Arc<Registry>,
    relays: Vec<Arc<RelayForwarder>>,
}

impl MemoryNetwork {
    fn new(relay_ids: &[u32]) -> Self {
        let network = NetworkConfig::default();
        let transport = Arc::new(MemoryTransport::new());
        let registry = Arc::new(Registry::new());
        transport.register(network.registry_addr(), registry.clone());

        let relays = relay_ids
            .iter()
            .map(|&node_id| {
                let identity = NodeIdentity::generate(node_id);
                registry.register(identity.registry_entry()).unwrap();
                let relay = Arc::new(RelayForwarder::new(identity, network.clone(), transport.clone()));
                transport.register(network.relay_addr(node_id).unwrap(), relay.clone());
                relay
            })
            .collect();

        Self {
            network,
            transport,
            registry,
            relays,
        }
    }

    fn relay(&self, node_id: u32) -> &RelayForwarder {
        self.relays
            .iter()
            .find(|relay| relay.node_id() == node_id)
            .unwrap()
    }

    fn add_user(&self, user_id: u32) -> Arc<UserNode> {
        let registry = Arc::new(RemoteRegistry::new(
            self.transport.clone(),
            self.network.registry_addr(),
        ));
        let user = Arc::new(UserNode::new(
            user_id,
            self.network.clone(),
            self.transport.clone(),
            registry,
        ));
        self.transport
            .register(self.network.user_addr(user_id).unwrap(), user.clone());
        user
    }

    fn entries(&self, ids: &[u32]) -> Vec<RegistryEntry> {
        let nodes = self.registry.nodes();
        ids.iter()
            .map(|id| nodes.iter().find(|entry| entry.node_id == *id).unwrap().clone())
            .collect()
    }
}

#[tokio::test]
async fn hello_travels_through_fixed_circuit() {
    let net = MemoryNetwork::new(&[1, 2, 3]);
    let recipient = net.add_user(7);

    let builder = CircuitBuilder::new(net.transport.clone(), net.network.clone());
    let path = net.entries(&[1, 3, 2]);
    let circuit = builder.build_message(&path, 7, "hello").await.unwrap();
    assert_eq!(circuit.hops, vec![1, 3, 2]);

    assert_eq!(net.relay(1).last_destination(), Some(Destination::Relay(3)));
    assert_eq!(net.relay(3).last_destination(), Some(Destination::Relay(2)));
    assert_eq!(net.relay(2).last_destination(), Some(Destination::User(7)));
    assert_eq!(net.relay(2).last_received_decrypted(), Some("hello".to_string()));

    // Each relay received exactly what its predecessor decrypted
    assert_eq!(
        net.relay(3).last_received_encrypted(),
        net.relay(1).last_received_decrypted()
    );
    assert_eq!(
        net.relay(2).last_received_encrypted(),
        net.relay(3).last_received_decrypted()
    );

    assert_eq!(recipient.last_received_message(), Some("hello".to_string()));
    let response = call(
        net.transport.as_ref(),
        net.network.user_addr(7).unwrap(),
        &Request::GetLastReceivedMessage,
    )
    .await
    .unwrap();
    assert_eq!(response, Response::Text { result: Some("hello".into()) });
}

#[tokio::test]
async fn user_sends_through_random_circuit() {
    let net = MemoryNetwork::new(&[1, 2, 3, 4, 5]);
    let sender = net.add_user(1);
    let recipient = net.add_user(2);

    let response = call(
        net.transport.as_ref(),
        net.network.user_addr(1).unwrap(),
        &Request::SendMessage {
            message: "over the onion".into(),
            destination_user_id: 2,
        },
    )
    .await
    .unwrap();
    assert_eq!(response, Response::Ok);

    assert_eq!(sender.last_sent_message(), Some("over the onion".to_string()));
    assert_eq!(recipient.last_received_message(), Some("over the onion".to_string()));

    let hops = sender.last_circuit();
    assert_eq!(hops.len(), net.network.path_length);
    let exit = net.relay(hops[hops.len() - 1]);
    assert_eq!(exit.last_destination(), Some(Destination::User(2)));
}

#[tokio::test]
async fn too_few_relays_means_no_traffic() {
    let net = MemoryNetwork::new(&[1, 2]);
    let network = NetworkConfig {
        path_length: 5,
        ..net.network.clone()
    };
    let builder = CircuitBuilder::new(net.transport.clone(), network);

    let before = net.transport.request_count();
    let result = builder.send(net.registry.as_ref(), 7, "hello").await;
    assert!(matches!(
        result,
        Err(OnionError::InsufficientNodes { requested: 5, available: 2 })
    ));
    assert_eq!(net.transport.request_count(), before);
    assert!(net.relays.iter().all(|relay| relay.last_received_encrypted().is_none()));
}

#[tokio::test]
async fn dead_middle_hop_reports_failure_one_hop_back() {
    let net = MemoryNetwork::new(&[1, 2, 3]);
    net.add_user(7);
    net.transport
        .unregister(&net.network.relay_addr(3).unwrap());

    let builder = CircuitBuilder::new(net.transport.clone(), net.network.clone());
    let result = builder.build_message(&net.entries(&[1, 3, 2]), 7, "hello").await;

    assert!(matches!(result, Err(OnionError::Remote { code: 502, .. })));
    assert_eq!(net.relay(1).last_destination(), Some(Destination::Relay(3)));
    assert!(net.relay(2).last_received_encrypted().is_none());
}

#[tokio::test]
async fn registry_round_trip_over_tcp() {
    let server = NodeServer::new(
        "registry",
        SocketAddr::from(([127, 0, 0, 1], 0)),
        Arc::new(Registry::new()),
    );
    let addr = server.start().await.unwrap();

    let remote = RemoteRegistry::new(Arc::new(TcpTransport::default()), addr);
    let entry = NodeIdentity::generate(3).registry_entry();
    remote.register(&entry).await.unwrap();
    assert_eq!(remote.list_nodes().await.unwrap(), vec![entry.clone()]);
    assert!(matches!(
        remote.register(&entry).await,
        Err(OnionError::Remote { code: 409, .. })
    ));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn launched_network_delivers_over_tcp() {
    let network = NetworkConfig {
        registry_port: 38080,
        base_relay_port: 38400,
        base_user_port: 38300,
        ..NetworkConfig::default()
    };
    let running = launch_network(network.clone(), 3, 2).await.unwrap();
    assert_eq!(running.registry.len(), 3);

    let transport = TcpTransport::default();
    let response = call(
        &transport,
        network.user_addr(0).unwrap(),
        &Request::SendMessage {
            message: "hello".into(),
            destination_user_id: 1,
        },
    )
    .await
    .unwrap();
    assert_eq!(response, Response::Ok);

    let recipient = running.user(1).unwrap();
    assert_eq!(recipient.node().last_received_message(), Some("hello".to_string()));

    running.shutdown().await.unwrap();
}
