//! Async client façade scenarios, run over an in-memory duplex pipe so no
//! real socket is needed: each side of the pipe drives its own background
//! engine task exactly as a real `TcpStream` half would.

use amqp_engine::client::{Connection, Timeouts};
use tokio::io::duplex;

#[tokio::test]
async fn open_and_close_round_trip() {
    let (client_io, server_io) = duplex(64 * 1024);

    let client = tokio::spawn(Connection::open_with_transport(
        "client",
        client_io,
        None,
        Timeouts::default(),
    ));
    let server = tokio::spawn(Connection::open_with_transport(
        "server",
        server_io,
        None,
        Timeouts::default(),
    ));

    let mut client = client.await.unwrap().unwrap();
    let _server = server.await.unwrap().unwrap();

    client.close().await.unwrap();
}

#[tokio::test]
async fn attach_links_and_exchange_one_message() {
    let (client_io, server_io) = duplex(64 * 1024);

    let client = tokio::spawn(Connection::open_with_transport(
        "client",
        client_io,
        None,
        Timeouts::default(),
    ));
    let server = tokio::spawn(Connection::open_with_transport(
        "server",
        server_io,
        None,
        Timeouts::default(),
    ));

    let mut client = client.await.unwrap().unwrap();
    let mut server = server.await.unwrap().unwrap();

    let client_session = client.begin_session().await.unwrap();
    let server_session = server.begin_session().await.unwrap();

    let mut sender = client_session.attach_sender("L1", "q").await.unwrap();
    let mut receiver = server_session
        .attach_receiver("L1", "q", 1, false)
        .await
        .unwrap();

    sender.send(bytes::Bytes::from_static(b"hi")).await.unwrap();

    let delivery = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv())
        .await
        .expect("delivery should arrive before the timeout")
        .unwrap();
    assert_eq!(delivery.payload, bytes::Bytes::from_static(b"hi"));

    receiver.accept(&delivery).await.unwrap();
    receiver.detach().await.unwrap();
    sender.detach().await.unwrap();
}

#[tokio::test]
async fn auto_accept_settles_deliveries_and_replenishes_credit_without_manual_accept() {
    let (client_io, server_io) = duplex(64 * 1024);

    let client = tokio::spawn(Connection::open_with_transport(
        "client",
        client_io,
        None,
        Timeouts::default(),
    ));
    let server = tokio::spawn(Connection::open_with_transport(
        "server",
        server_io,
        None,
        Timeouts::default(),
    ));

    let mut client = client.await.unwrap().unwrap();
    let mut server = server.await.unwrap().unwrap();

    let client_session = client.begin_session().await.unwrap();
    let server_session = server.begin_session().await.unwrap();

    let mut sender = client_session.attach_sender("L1", "q").await.unwrap();
    let mut receiver = server_session
        .attach_receiver("L1", "q", 1, true)
        .await
        .unwrap();

    sender.send(bytes::Bytes::from_static(b"first")).await.unwrap();
    let first = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv())
        .await
        .expect("first delivery should arrive before the timeout")
        .unwrap();
    assert_eq!(first.payload, bytes::Bytes::from_static(b"first"));

    // Never call `receiver.accept` here: the receiver settled `first` itself
    // and restored its one-credit window, so a second send must succeed
    // without the sender ever being told to wait for more credit.
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            match sender.send(bytes::Bytes::from_static(b"second")).await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .expect("credit should be replenished automatically after the first delivery");

    let second = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv())
        .await
        .expect("second delivery should arrive before the timeout")
        .unwrap();
    assert_eq!(second.payload, bytes::Bytes::from_static(b"second"));

    receiver.detach().await.unwrap();
    sender.detach().await.unwrap();
}
