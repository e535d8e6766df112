// crates/gateway-client/tests/client_scenarios.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{config, MockGateway, Recorder, STEP};
use gateway_client::{
    Client, ClientError, Contract, HistoricalDataRequest, NoopHandler, TickEvent, MAX_DEPTH_ROWS,
    MAX_REDIRECTS,
};
use gateway_protocol::ProtocolError;
use rust_decimal_macros::dec;

fn aapl() -> Contract {
    Contract::stock("AAPL", "SMART", "USD")
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + STEP;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Connect sequence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_negotiates_and_seeds_ids() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        assert_eq!(peer.read_handshake().await, "v100..187 +PACEAPI");
        peer.send(&["176", "20240102 10:30:00 UTC"]).await;

        let start = peer.read_frame().await;
        assert_eq!(start, vec!["71", "2", "7", "caps"]);

        // Dropped: nothing is waiting for it yet.
        peer.send(&["49", "1", "1700000000"]).await;
        peer.send(&["9", "1", "42"]).await;
        peer
    });

    let recorder = Recorder::new();
    let cfg = config(&addr)
        .with_connect_options("+PACEAPI")
        .with_optional_capabilities("caps");
    let client = Client::connect(cfg, recorder.clone()).await.unwrap();
    client.ready().await;

    assert_eq!(client.server_version(), 176);
    assert_eq!(client.client_id(), 7);
    assert!(client.is_connected());
    assert_eq!(
        client.connection_time(),
        Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap())
    );

    let mut peer = server.await.unwrap();
    let contract = aapl();
    let (details, ()) = tokio::join!(client.contract_details(&contract), async {
        let req = peer.read_frame().await;
        assert_eq!(req[0], "9");
        assert_eq!(req[2], "42");
        peer.send(&[
            "10", "8", "42", "AAPL", "STK", "", "0", "", "SMART", "USD", "AAPL", "NMS", "NMS",
            "265598", "0.01", "", "SMART,ARCA", "APPLE INC", "NASDAQ", "US/Eastern",
        ])
        .await;
        peer.send(&["52", "1", "42"]).await;
    });

    let details = details.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].contract.con_id, 265598);
    assert_eq!(details[0].contract.primary_exchange, "NASDAQ");
    assert_eq!(details[0].long_name, "APPLE INC");
    assert_eq!(details[0].min_tick, 0.01);

    client.close().await;
    client.close().await;
    assert!(!client.is_connected());
    assert!(matches!(client.current_time().await, Err(ClientError::Closed)));
    assert!(recorder.closed.lock().is_empty());
}

#[tokio::test]
async fn redirect_is_followed_once() {
    let target = MockGateway::bind().await;
    let redirector = MockGateway::bind().await;
    let target_addr = target.addr.clone();
    let redirect_addr = redirector.addr.clone();

    tokio::spawn(async move {
        let mut peer = redirector.accept().await;
        peer.read_handshake().await;
        peer.send(&["-1", target_addr.as_str()]).await;
    });
    let server = tokio::spawn(async move {
        let mut peer = target.accept().await;
        peer.accept_session(176, 1).await;
        peer
    });

    let client = Client::connect(config(&redirect_addr), Arc::new(NoopHandler))
        .await
        .unwrap();
    let _peer = server.await.unwrap();

    assert_eq!(client.server_version(), 176);
    client.close().await;
}

#[tokio::test]
async fn eleventh_redirect_fails_the_connect() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();
    let self_addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut hops = 0usize;
        loop {
            let mut peer = gw.accept().await;
            peer.read_handshake().await;
            peer.send(&["-1", self_addr.as_str()]).await;
            hops += 1;
            if hops == MAX_REDIRECTS + 1 {
                return hops;
            }
        }
    });

    let err = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::TooManyRedirects(10)));
    assert_eq!(server.await.unwrap(), 11);
}

#[tokio::test]
async fn old_server_version_is_refused() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.read_handshake().await;
        peer.send(&["99", "20240102 10:30:00 UTC"]).await;
        peer
    });

    let err = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedServerVersion(99)));
}

#[tokio::test]
async fn unreachable_gateway_is_an_io_error() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();
    drop(gw);

    let err = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn without_id_replies_are_matched_in_issue_order() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        assert_eq!(peer.read_frame().await, vec!["49", "1"]);
        assert_eq!(peer.read_frame().await, vec!["49", "1"]);
        peer.send(&["49", "1", "100"]).await;
        peer.send(&["49", "1", "200"]).await;

        assert_eq!(peer.read_frame().await, vec!["17", "1"]);
        peer.send(&["15", "1", "DU1,DU2"]).await;

        assert_eq!(peer.read_frame().await, vec!["8", "1", "1"]);
        peer.send(&["9", "1", "500"]).await;
        peer
    });

    let client = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap();

    let (first, second) = tokio::join!(client.current_time(), client.current_time());
    assert_eq!(first.unwrap().timestamp(), 100);
    assert_eq!(second.unwrap().timestamp(), 200);

    assert_eq!(client.managed_accounts().await.unwrap(), vec!["DU1", "DU2"]);
    assert_eq!(client.next_valid_id().await.unwrap(), 500);

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn historical_bars_are_returned() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 5).await;

        let req = peer.read_frame().await;
        assert_eq!(req[0], "20");
        assert_eq!(req[1], "5");
        assert!(req.contains(&"1 hour".to_string()));

        peer.send(&[
            "17", "5", "", "", "2",
            "1700000000", "10", "11", "9.5", "10.5", "1200", "10.2", "31",
            "1700003600", "10.5", "10.75", "10.25", "10.5", "800", "10.5", "20",
        ])
        .await;
        peer
    });

    let client = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap();
    let bars = client
        .historical_data(&aapl(), &HistoricalDataRequest::default())
        .await
        .unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].high, 11.0);
    assert_eq!(bars[0].volume, dec!(1200));
    assert_eq!(bars[1].count, 20);

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn gateway_errors_reach_their_request_or_the_handler() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 3).await;

        let req = peer.read_frame().await;
        assert_eq!(req[2], "3");
        peer.send(&["4", "2", "-1", "2104", "Market data farm connection is OK"]).await;
        peer.send(&["4", "2", "-1", "10167", "Displaying delayed market data"]).await;
        peer.send(&["4", "2", "3", "200", "No security definition has been found"]).await;
        peer
    });

    let recorder = Recorder::new();
    let client = Client::connect(config(&addr), recorder.clone()).await.unwrap();

    let err = client.contract_details(&aapl()).await.unwrap_err();
    match err {
        ClientError::Api { code, message } => {
            assert_eq!(code, 200);
            assert!(message.starts_with("No security definition"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let errors = recorder.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, -1);
    assert_eq!(errors[0].1, 2104);
    assert!(client.is_connected());

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn unknown_and_unsolicited_messages_go_to_the_handler() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        assert_eq!(peer.read_frame().await, vec!["49", "1"]);
        peer.send(&["999", "whatever"]).await;
        peer.send(&["204", "2", "-1", "1", "x"]).await;
        peer.send(&["9", "1", "77"]).await;
        peer.send(&["49", "1", "1700000000"]).await;
        peer
    });

    let recorder = Recorder::new();
    let client = Client::connect(config(&addr), recorder.clone()).await.unwrap();
    client.current_time().await.unwrap();

    assert_eq!(*recorder.unknown.lock(), vec![999, 204]);
    assert_eq!(*recorder.next_ids.lock(), vec![77]);
    assert!(client.is_connected());

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn timed_out_request_sends_a_cancel() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 9).await;

        let req = peer.read_frame().await;
        assert_eq!(req[0], "20");
        assert_eq!(peer.read_frame().await, vec!["25", "1", "9"]);

        // A late answer for the abandoned id is ignored.
        peer.send(&["17", "9", "", "", "0"]).await;
        peer
    });

    let cfg = config(&addr).with_request_timeout(Duration::from_millis(200));
    let client = Client::connect(cfg, Arc::new(NoopHandler)).await.unwrap();

    let err = client
        .historical_data(&aapl(), &HistoricalDataRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout));

    let _peer = server.await.unwrap();
    assert!(client.is_connected());
    client.close().await;
}

#[tokio::test]
async fn unset_request_timeout_waits_for_a_slow_reply() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        assert_eq!(peer.read_frame().await, vec!["49", "1"]);
        tokio::time::sleep(Duration::from_millis(300)).await;
        peer.send(&["49", "1", "1700000000"]).await;
        peer
    });

    let cfg = config(&addr).without_request_timeout();
    let client = Client::connect(cfg, Arc::new(NoopHandler)).await.unwrap();

    assert_eq!(client.current_time().await.unwrap().timestamp(), 1_700_000_000);

    let _peer = server.await.unwrap();
    client.close().await;
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn depth_row_count_outside_limits_is_rejected_locally() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        // Nothing was sent for the rejected depth requests.
        assert_eq!(peer.read_frame().await, vec!["49", "1"]);
        peer.send(&["49", "1", "1700000000"]).await;
        peer
    });

    let client = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap();

    for rows in [0, MAX_DEPTH_ROWS + 1, i32::MAX as usize, usize::MAX] {
        assert!(matches!(
            client.market_depth(&aapl(), rows, false),
            Err(ClientError::Config(_))
        ));
    }
    client.current_time().await.unwrap();
    assert!(client.is_connected());

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn snapshot_stream_ends_cleanly() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 4).await;

        let req = peer.read_frame().await;
        assert_eq!(&req[..3], &["1", "11", "4"]);
        peer.send(&["1", "6", "4", "1", "187.5", "300", "0"]).await;
        peer.send(&["58", "1", "4", "3"]).await;
        peer.send(&["57", "1", "4"]).await;
        peer
    });

    let client = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap();
    let mut ticks = client.market_data(&aapl(), "", true).unwrap();
    assert_eq!(ticks.id(), 4);

    let first = tokio::time::timeout(STEP, ticks.next()).await.unwrap();
    assert!(matches!(first, Some(TickEvent::Price { price, .. }) if price == 187.5));
    let second = tokio::time::timeout(STEP, ticks.next()).await.unwrap();
    assert!(matches!(second, Some(TickEvent::MarketDataType(3))));
    assert!(tokio::time::timeout(STEP, ticks.next()).await.unwrap().is_none());
    assert!(ticks.last_error().is_none());

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn depth_stream_maintains_the_book_and_cancels() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 2).await;

        let req = peer.read_frame().await;
        assert_eq!(&req[..3], &["10", "5", "2"]);

        peer.send(&["12", "1", "2", "0", "0", "1", "100", "10"]).await;
        peer.send(&["12", "1", "2", "0", "0", "1", "101", "5"]).await;
        peer.send(&["12", "1", "2", "2", "0", "1", "99", "1"]).await;
        // Row 7 is outside a 3-row book: skipped, stream stays up.
        peer.send(&["12", "1", "2", "7", "0", "1", "98", "1"]).await;
        peer.send(&["13", "1", "2", "0", "MM", "0", "0", "102", "3", "0"]).await;

        assert_eq!(peer.read_frame().await, vec!["11", "1", "2", "0"]);
        peer
    });

    let client = Client::connect(config(&addr), Arc::new(NoopHandler))
        .await
        .unwrap();
    let mut depth = client.market_depth(&aapl(), 3, false).unwrap();

    let mut last = None;
    for _ in 0..4 {
        last = tokio::time::timeout(STEP, depth.next()).await.unwrap();
    }
    let book = last.unwrap();

    let bids: Vec<(f64, _)> = book.bids.iter().map(|l| (l.price, l.size)).collect();
    assert_eq!(bids, vec![(101.0, dec!(5)), (100.0, dec!(10)), (99.0, dec!(1))]);
    assert_eq!(book.asks.len(), 1);
    assert_eq!(book.asks[0].market_maker, "MM");
    assert_eq!(book.top().spread(), Some(1.0));

    depth.cancel();
    depth.cancel();
    assert!(matches!(depth.last_error(), Some(ClientError::Cancelled)));
    assert!(depth.next().await.is_none());

    let _peer = server.await.unwrap();
    assert!(client.is_connected());
    client.close().await;
}

#[tokio::test]
async fn connection_failure_mid_stream_reaches_every_pending_request() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    let server = tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        let ticks = peer.read_frame().await;
        assert_eq!(&ticks[..3], &["1", "11", "1"]);
        let details = peer.read_frame().await;
        assert_eq!(&details[..3], &["9", "8", "2"]);

        for size in ["100", "200", "300"] {
            peer.send(&["2", "6", "1", "0", size]).await;
        }
        peer.send_raw(&[0, 0, 0, 0]).await;
        peer
    });

    let recorder = Recorder::new();
    let client = Client::connect(config(&addr), recorder.clone()).await.unwrap();
    let contract = aapl();
    let mut ticks = client.market_data(&contract, "", false).unwrap();

    let (details, received) = tokio::join!(client.contract_details(&contract), async {
        let mut received = Vec::new();
        while let Some(event) = tokio::time::timeout(STEP, ticks.next()).await.unwrap() {
            received.push(event);
        }
        received
    });

    assert_eq!(received.len(), 3);
    assert!(matches!(
        received[2],
        TickEvent::Size { tick_type: 0, size } if size == dec!(300)
    ));
    assert!(matches!(
        ticks.last_error(),
        Some(ClientError::Protocol(ProtocolError::EmptyFrame))
    ));
    assert!(matches!(
        details,
        Err(ClientError::Protocol(ProtocolError::EmptyFrame))
    ));

    tokio::time::timeout(STEP, client.disconnected()).await.unwrap();
    assert!(!client.is_connected());
    assert!(matches!(
        client.last_error(),
        Some(ClientError::Protocol(ProtocolError::EmptyFrame))
    ));
    eventually(|| !recorder.closed.lock().is_empty()).await;
    assert!(matches!(
        recorder.closed.lock()[0],
        ClientError::Protocol(ProtocolError::EmptyFrame)
    ));

    // Nothing new is admitted on a dead connection.
    assert!(matches!(
        client.current_time().await,
        Err(ClientError::Protocol(ProtocolError::EmptyFrame))
    ));

    let _peer = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn peer_dropping_mid_frame_closes_streams_and_calls() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;

        peer.read_frame().await;
        let details = peer.read_frame().await;
        assert_eq!(&details[..3], &["9", "8", "2"]);

        peer.send(&["2", "6", "1", "0", "100"]).await;
        peer.send(&["2", "6", "1", "0", "200"]).await;
        // Header promises 20 bytes; the socket closes after 2.
        peer.send_raw(&[0, 0, 0, 20, b'2', 0]).await;
        drop(peer);
    });

    let recorder = Recorder::new();
    let client = Client::connect(config(&addr), recorder.clone()).await.unwrap();
    let contract = aapl();
    let mut ticks = client.market_data(&contract, "", false).unwrap();

    let (details, received) = tokio::join!(client.contract_details(&contract), async {
        let mut received = Vec::new();
        while let Some(event) = tokio::time::timeout(STEP, ticks.next()).await.unwrap() {
            received.push(event);
        }
        received
    });

    assert_eq!(received.len(), 2);
    assert!(matches!(ticks.last_error(), Some(ClientError::Closed)));
    assert!(matches!(details, Err(ClientError::Closed)));

    tokio::time::timeout(STEP, client.disconnected()).await.unwrap();
    assert!(matches!(client.last_error(), Some(ClientError::Closed)));
    eventually(|| !recorder.closed.lock().is_empty()).await;
    assert!(matches!(recorder.closed.lock()[0], ClientError::Closed));

    client.close().await;
}

#[tokio::test]
async fn peer_hangup_is_reported_as_closed() {
    let gw = MockGateway::bind().await;
    let addr = gw.addr.clone();

    tokio::spawn(async move {
        let mut peer = gw.accept().await;
        peer.accept_session(176, 1).await;
        drop(peer);
    });

    let recorder = Recorder::new();
    let client = Client::connect(config(&addr), recorder.clone()).await.unwrap();

    tokio::time::timeout(STEP, client.disconnected()).await.unwrap();
    assert!(matches!(client.last_error(), Some(ClientError::Closed)));
    eventually(|| !recorder.closed.lock().is_empty()).await;
    assert!(matches!(recorder.closed.lock()[0], ClientError::Closed));

    client.close().await;
}
