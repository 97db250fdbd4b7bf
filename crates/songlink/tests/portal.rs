use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use pretty_assertions_sorted::assert_eq_sorted;
use serde_json::json;
use songlink_common::{Chain, LogEntry};
use songlink_ethereum::test_utils::{encode_waves, mined, new_playlist_log, wave, FakeWallet};
use songlink_ethereum::{Confirmation, Wallet};
use songlink_lib::portal::{Portal, PortalConfig};
use songlink_lib::render::render_entries;
use songlink_lib::session::{ConnectOutcome, SessionManager, SessionState, NO_WALLET_ALERT};
use songlink_link_check::LinkValidator;

const ACCOUNT: Address = Address::repeat_byte(0xac);
const A: Address = Address::repeat_byte(0x0a);
const B: Address = Address::repeat_byte(0x0b);
const C: Address = Address::repeat_byte(0x0c);

fn portal(wallet: Wallet) -> Portal {
    Portal::new(
        SessionManager::new(wallet),
        LinkValidator::local(),
        PortalConfig {
            contract: songlink_ethereum::contract::DEFAULT_ADDRESS,
            confirmation: Confirmation::default(),
            events_poll_interval: Duration::from_millis(100),
        },
    )
}

fn entry(sender: Address, timestamp: i64, url: &str) -> LogEntry {
    LogEntry::from_unix(sender, timestamp, url.to_owned()).unwrap()
}

#[test_log::test(tokio::test(start_paused = true))]
async fn live_event_lands_on_top_of_bulk_read() {
    let fake = Arc::new(FakeWallet::default());
    fake.respond("eth_accounts", Ok(json!([ACCOUNT])));
    fake.respond("eth_blockNumber", Ok(json!("0x10")));
    fake.respond(
        "eth_call",
        Ok(encode_waves(vec![wave(A, 100, "a"), wave(B, 200, "b")])),
    );
    fake.respond("eth_newFilter", Ok(json!("0x1")));
    fake.respond("eth_getLogs", Ok(json!([])));
    fake.respond_once(
        "eth_getFilterChanges",
        Ok(serde_json::to_value(vec![new_playlist_log(C, 300, "c")]).unwrap()),
    );
    fake.respond("eth_getFilterChanges", Ok(json!([])));
    fake.respond("eth_uninstallFilter", Ok(json!(true)));

    let mut portal = portal(fake.wallet());
    assert!(portal.start().await);
    assert_eq!(
        portal.session().status(),
        format!("Found an authorized account: {ACCOUNT}")
    );

    let subscription = portal.subscribe().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    subscription.unsubscribe().await.unwrap();

    let view = portal.view().snapshot();
    assert_eq_sorted!(
        view,
        vec![entry(A, 100, "a"), entry(B, 200, "b"), entry(C, 300, "c")]
    );

    let rendered = render_entries(&view, &Chain::Rinkeby);
    let urls: Vec<&str> = rendered
        .lines()
        .filter(|l| matches!(*l, "a" | "b" | "c"))
        .collect();
    assert_eq!(urls, vec!["c", "b", "a"]);
    assert!(rendered.starts_with("Total Number of Playlist: 3"));
    assert!(rendered.contains(&format!("https://rinkeby.etherscan.io/address/{C}")));

    assert_eq!(fake.calls("eth_uninstallFilter"), vec![json!(["0x1"])]);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn event_between_load_and_subscribe_is_delivered_once() {
    let fake = Arc::new(FakeWallet::default());
    fake.respond("eth_accounts", Ok(json!([ACCOUNT])));
    fake.respond("eth_blockNumber", Ok(json!("0x10")));
    fake.respond("eth_call", Ok(encode_waves(vec![wave(A, 100, "a")])));
    fake.respond("eth_newFilter", Ok(json!("0x1")));
    fake.respond("eth_uninstallFilter", Ok(json!(true)));

    let mut portal = portal(fake.wallet());
    assert!(portal.start().await);

    // B is mined in block 0x11, after the load and before the filter exists.
    let b = mined(new_playlist_log(B, 200, "b"), 0x11, 0);
    fake.respond("eth_getLogs", Ok(serde_json::to_value(vec![b.clone()]).unwrap()));
    fake.respond_once(
        "eth_getFilterChanges",
        Ok(serde_json::to_value(vec![b, mined(new_playlist_log(C, 300, "c"), 0x12, 0)]).unwrap()),
    );
    fake.respond("eth_getFilterChanges", Ok(json!([])));

    let subscription = portal.subscribe().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    subscription.unsubscribe().await.unwrap();

    assert_eq_sorted!(
        portal.view().snapshot(),
        vec![entry(A, 100, "a"), entry(B, 200, "b"), entry(C, 300, "c")]
    );
    assert_eq!(fake.calls("eth_call")[0][1], json!("0x10"));
    assert_eq!(fake.calls("eth_newFilter")[0][0]["fromBlock"], json!("0x11"));
}

#[tokio::test]
async fn connect_without_wallet_alerts() {
    let mut portal = portal(Wallet::unavailable());

    assert!(!portal.start().await);
    assert_eq!(portal.connect().await, ConnectOutcome::Alert(NO_WALLET_ALERT));

    assert_eq!(portal.session().snapshot(), SessionState::default());
    assert!(portal.gateway().is_none());
    portal.subscribe().await.unwrap_err();
}

#[tokio::test]
async fn connect_then_list() {
    let fake = Arc::new(FakeWallet::default());
    fake.respond_once("eth_accounts", Ok(json!([])));
    fake.respond("eth_requestAccounts", Ok(json!([ACCOUNT])));
    fake.respond("eth_accounts", Ok(json!([ACCOUNT])));
    fake.respond("eth_blockNumber", Ok(json!("0x10")));
    fake.respond("eth_call", Ok(encode_waves(vec![wave(A, 100, "a")])));

    let mut portal = portal(fake.wallet());
    assert!(!portal.start().await);
    assert!(portal.view().is_empty());

    assert_eq!(portal.connect().await, ConnectOutcome::Connected(ACCOUNT));

    assert_eq!(portal.session().status(), "Connected :D");
    assert_eq!(portal.view().snapshot(), vec![entry(A, 100, "a")]);
}
