use p2p_fetch::client::{with_bootstrap_peers, with_listen_addrs, with_routing, Client};
use p2p_fetch::{content, ClientError, ContentId, ContentReader, NodeError, RoutingMode};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

fn loopback_client(bootstrap: Vec<String>) -> Client {
    Client::new([
        with_bootstrap_peers(bootstrap),
        with_listen_addrs(["/ip4/127.0.0.1/tcp/0"]),
        with_routing(RoutingMode::None),
    ])
}

/// Loopback client on the default routing mode unless `routing` overrides it
fn dht_client(bootstrap: Vec<String>, routing: Option<RoutingMode>) -> Client {
    let mut options = vec![
        with_bootstrap_peers(bootstrap),
        with_listen_addrs(["/ip4/127.0.0.1/tcp/0"]),
    ];
    options.extend(routing.map(with_routing));
    Client::new(options)
}

async fn read_all(mut reader: ContentReader) -> Vec<u8> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    out
}

async fn dialable_addr(client: &Client) -> String {
    let node = client.node().expect("started");
    let addr = node.listen_addrs().await.into_iter().next().expect("listening");
    format!("{}/p2p/{}", addr, node.local_peer_id())
}

#[tokio::test]
async fn test_content_retrieved_from_bootstrap_peer() {
    let cancel = CancellationToken::new();

    let server = loopback_client(vec![]);
    server.start(cancel.clone()).await.unwrap();
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let id = content::add(server.node().unwrap().as_ref(), &data)
        .await
        .unwrap();

    let fetcher = loopback_client(vec![dialable_addr(&server).await]);
    fetcher.start(cancel.clone()).await.unwrap();
    assert!(fetcher.is_ready());

    let mut reader = tokio::time::timeout(
        Duration::from_secs(30),
        fetcher.retrieve(&cancel, &id.to_hex()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(reader.size(), data.len() as u64);

    let mut fetched = Vec::new();
    reader.read_to_end(&mut fetched).await.unwrap();
    assert_eq!(fetched, data);

    let repos = [
        server.repo_path().unwrap().to_path_buf(),
        fetcher.repo_path().unwrap().to_path_buf(),
    ];
    cancel.cancel();
    server.wait_for_cleanup().await;
    fetcher.wait_for_cleanup().await;
    assert!(repos.iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn test_unreachable_bootstrap_peer_still_starts() {
    let cancel = CancellationToken::new();

    // Right address, wrong peer id: the handshake fails and startup carries on
    let ghost = loopback_client(vec![]);
    ghost.start(cancel.clone()).await.unwrap();
    let ghost_addr = dialable_addr(&ghost).await;
    let ghost_peer = ghost.node().unwrap().local_peer_id();
    let unreachable = ghost_addr.replace(
        &format!("/p2p/{ghost_peer}"),
        &format!("/p2p/{}", libp2p::PeerId::random()),
    );

    let fetcher = loopback_client(vec![unreachable]);
    fetcher.start(cancel.clone()).await.unwrap();
    assert!(fetcher.is_ready());

    let missing = ContentId::from_data(b"nowhere");
    let result = fetcher.retrieve(&cancel, &missing.to_hex()).await;
    assert!(matches!(
        result,
        Err(ClientError::RetrievalFailed(NodeError::BlockNotFound(_)))
    ));

    cancel.cancel();
    ghost.wait_for_cleanup().await;
    fetcher.wait_for_cleanup().await;
}

#[tokio::test]
async fn test_default_routing_retrieves_from_bootstrap_peer() {
    let cancel = CancellationToken::new();

    let server = dht_client(vec![], None);
    server.start(cancel.clone()).await.unwrap();
    let data: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
    let id = content::add(server.node().unwrap().as_ref(), &data)
        .await
        .unwrap();

    let fetcher = dht_client(vec![dialable_addr(&server).await], None);
    fetcher.start(cancel.clone()).await.unwrap();

    let reader = tokio::time::timeout(
        Duration::from_secs(30),
        fetcher.retrieve(&cancel, &id.to_hex()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(read_all(reader).await, data);

    cancel.cancel();
    server.wait_for_cleanup().await;
    fetcher.wait_for_cleanup().await;
}

#[tokio::test]
async fn test_content_found_through_provider_record() {
    let cancel = CancellationToken::new();

    // DHT server that never holds the content
    let directory = dht_client(vec![], Some(RoutingMode::Dht));
    directory.start(cancel.clone()).await.unwrap();
    let directory_addr = dialable_addr(&directory).await;

    // Announces its blocks to the directory
    let server = dht_client(vec![directory_addr.clone()], Some(RoutingMode::Dht));
    server.start(cancel.clone()).await.unwrap();
    let data = b"reachable only through the routing table".to_vec();
    let id = content::add(server.node().unwrap().as_ref(), &data)
        .await
        .unwrap();

    // Never told about the server
    let fetcher = dht_client(vec![directory_addr], None);
    fetcher.start(cancel.clone()).await.unwrap();

    // The provider record reaches the directory asynchronously
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    let reader = loop {
        match fetcher.retrieve(&cancel, &id.to_hex()).await {
            Ok(reader) => break reader,
            Err(ClientError::RetrievalFailed(NodeError::BlockNotFound(_)))
                if tokio::time::Instant::now() < deadline =>
            {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(e) => panic!("retrieval failed: {e}"),
        }
    };
    assert_eq!(read_all(reader).await, data);

    let directory_blocks = directory.node().unwrap().blocks();
    assert!(!directory_blocks.has(&id).unwrap());

    cancel.cancel();
    for client in [&directory, &server, &fetcher] {
        client.wait_for_cleanup().await;
    }
}
