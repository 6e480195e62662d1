// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-location relay, arrival detection, idle expiry and restart recovery.

use std::sync::Arc;

use chrono::Duration;
use dormbite_core::Store;
use dormbite_core::types::{EventKind, GeoPoint, InboundEvent, OrderStatus, UserId};
use dormbite_engine::{Engine, ordering};
use dormbite_test_utils::harness::DORM;
use dormbite_test_utils::{DISPATCH_CHAT, TestHarness};

const CUSTOMER: UserId = UserId(1001);
const DELIVERER: UserId = UserId(2002);

/// Roughly 1.1 km north of the dorm.
const FAR: GeoPoint = GeoPoint {
    lat: 6.0753,
    lon: 37.5601,
};

async fn claimed_order() -> (TestHarness, dormbite_core::OrderId) {
    let h = TestHarness::new().await.unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();
    h.register(DELIVERER, "Kebede Alemu").await.unwrap();
    let id = h.place_order(CUSTOMER).await.unwrap();
    h.press(DISPATCH_CHAT, DELIVERER, &format!("acc:{}", id.0))
        .await;
    (h, id)
}

async fn arrival_notices(h: &TestHarness) -> usize {
    h.messenger
        .texts_to(CUSTOMER.chat())
        .await
        .iter()
        .filter(|t| t.starts_with("Your food has arrived!"))
        .count()
}

#[tokio::test]
async fn updates_within_the_interval_forward_once_but_record_both() {
    let (h, _) = claimed_order().await;
    let second = GeoPoint::new(6.0740, 37.5601);

    h.live_location(DISPATCH_CHAT, DELIVERER, FAR).await;
    h.advance(3);
    h.live_location(DISPATCH_CHAT, DELIVERER, second).await;

    assert_eq!(h.messenger.location_updates_to(CUSTOMER.chat()).await, 1);
    let latest = h.store.latest_position(DELIVERER).await.unwrap().unwrap();
    assert_eq!(latest.point, second);

    h.advance(5);
    h.live_location(DISPATCH_CHAT, DELIVERER, FAR).await;
    assert_eq!(h.messenger.location_updates_to(CUSTOMER.chat()).await, 2);
    // The second forward edits the live message instead of sending a new one.
    assert_eq!(h.messenger.locations_to(CUSTOMER.chat()).await.len(), 1);
}

#[tokio::test]
async fn expired_live_message_is_replaced() {
    let (h, _) = claimed_order().await;
    h.live_location(DISPATCH_CHAT, DELIVERER, FAR).await;
    h.messenger.fail_live_edits(true);
    h.advance(6);
    h.live_location(DISPATCH_CHAT, DELIVERER, FAR).await;
    assert_eq!(h.messenger.locations_to(CUSTOMER.chat()).await.len(), 2);
}

#[tokio::test]
async fn oscillating_near_the_radius_fires_arrival_once() {
    let (h, id) = claimed_order().await;

    for point in [FAR, DORM, FAR, DORM, DORM] {
        h.live_location(DISPATCH_CHAT, DELIVERER, point).await;
        h.advance(6);
    }
    assert_eq!(arrival_notices(&h).await, 1);
    assert!(
        h.messenger
            .texts_to(DISPATCH_CHAT)
            .await
            .iter()
            .any(|t| t.contains("0911223344"))
    );

    let ack = h
        .press(DISPATCH_CHAT, DELIVERER, &format!("arr:{}", id.0))
        .await;
    assert_eq!(ack.text.as_deref(), Some("Arrival was already announced"));
    assert_eq!(arrival_notices(&h).await, 1);
}

#[tokio::test]
async fn forced_arrival_blocks_proximity_arrival() {
    let (h, id) = claimed_order().await;
    h.press(DISPATCH_CHAT, DELIVERER, &format!("arr:{}", id.0))
        .await;
    h.live_location(DISPATCH_CHAT, DELIVERER, DORM).await;
    assert_eq!(arrival_notices(&h).await, 1);
}

#[tokio::test]
async fn customer_location_updates_order_and_status() {
    let (h, id) = claimed_order().await;
    let moved = GeoPoint::new(6.0660, 37.5610);

    h.live_location(CUSTOMER.chat(), CUSTOMER, moved).await;
    let order = h.store.get_order(id).await.unwrap().unwrap();
    assert_eq!(order.delivery, Some(moved));
    let status: Vec<String> = h
        .messenger
        .texts_to(DISPATCH_CHAT)
        .await
        .into_iter()
        .filter(|t| t.contains("is sharing location"))
        .collect();
    assert_eq!(status.len(), 1);
    assert!(status[0].contains("Kebede Alemu") || status[0].contains("User 2002"));

    // Inside the status interval the message is not refreshed.
    h.advance(10);
    h.live_location(CUSTOMER.chat(), CUSTOMER, moved).await;
    let count = h
        .messenger
        .texts_to(DISPATCH_CHAT)
        .await
        .iter()
        .filter(|t| t.contains("is sharing location"))
        .count();
    assert_eq!(count, 1);

    // The deliverer now arrives relative to the moved point.
    h.advance(10);
    h.live_location(DISPATCH_CHAT, DELIVERER, moved).await;
    assert_eq!(arrival_notices(&h).await, 1);
}

#[tokio::test]
async fn lingering_share_warns_dispatch_once_per_interval() {
    let h = TestHarness::new().await.unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();

    for _ in 0..3 {
        h.live_location(CUSTOMER.chat(), CUSTOMER, DORM).await;
        h.advance(60);
    }
    let warnings = h
        .messenger
        .texts_to(DISPATCH_CHAT)
        .await
        .iter()
        .filter(|t| t.contains("still sharing live location"))
        .count();
    assert_eq!(warnings, 1);
}

#[tokio::test]
async fn deliverer_sharing_in_dispatch_between_orders_is_not_warned() {
    let h = TestHarness::new().await.unwrap();
    h.register(DELIVERER, "Kebede Alemu").await.unwrap();

    for _ in 0..3 {
        h.live_location(DISPATCH_CHAT, DELIVERER, DORM).await;
        h.advance(60);
    }
    assert!(
        !h.messenger
            .texts_to(DISPATCH_CHAT)
            .await
            .iter()
            .any(|t| t.contains("still sharing live location"))
    );
}

async fn submit_pin(h: &TestHarness) {
    h.command(CUSTOMER.chat(), CUSTOMER, "order", "").await;
    h.text(CUSTOMER, "Fle").await;
    h.text(CUSTOMER, "Shiro - 50 ETB").await;
    h.text(CUSTOMER, ordering::DONE).await;
    h.inject(
        CUSTOMER.chat(),
        CUSTOMER,
        EventKind::Location {
            point: FAR,
            live: false,
            edited: false,
        },
    )
    .await;
}

#[tokio::test]
async fn closed_carts_withdraw_their_pins() {
    let h = TestHarness::new().await.unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();

    submit_pin(&h).await;
    assert_eq!(h.engine.pending_pins().await, 1);
    assert_eq!(
        h.engine.expire_idle(h.now() + Duration::seconds(1800)).await,
        1
    );
    assert_eq!(h.engine.pending_pins().await, 0);
    assert!(
        h.messenger
            .texts_to(DISPATCH_CHAT)
            .await
            .iter()
            .any(|t| t.contains("withdrawn"))
    );

    // Starting over replaces the unanswered pin.
    submit_pin(&h).await;
    submit_pin(&h).await;
    assert_eq!(h.engine.pending_pins().await, 1);
    h.command(CUSTOMER.chat(), CUSTOMER, "cancel", "").await;
    assert_eq!(h.engine.pending_pins().await, 0);
}

#[tokio::test]
async fn only_dispatch_chat_names_are_remembered() {
    let h = TestHarness::new().await.unwrap();
    for id in 5000..5020 {
        h.text(UserId(id), "hello").await;
    }
    assert_eq!(h.engine.known_sender_count(), 0);
    h.command(DISPATCH_CHAT, DELIVERER, "testmode", "off").await;
    assert_eq!(h.engine.known_sender_count(), 1);
}

#[tokio::test]
async fn idle_conversations_expire() {
    let h = TestHarness::new().await.unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();
    h.command(CUSTOMER.chat(), CUSTOMER, "order", "").await;

    assert_eq!(h.engine.expire_idle(h.now() + Duration::seconds(60)).await, 0);
    assert_eq!(
        h.engine.expire_idle(h.now() + Duration::seconds(1800)).await,
        1
    );
    assert!(
        h.messenger
            .texts_to(CUSTOMER.chat())
            .await
            .iter()
            .any(|t| t.contains("closed after a period of inactivity"))
    );
    assert_eq!(
        h.engine.expire_idle(h.now() + Duration::seconds(3600)).await,
        0
    );
}

#[tokio::test]
async fn zero_timeout_disables_expiry() {
    let h = TestHarness::builder()
        .with_config(|c| c.dispatch.conversation_idle_timeout_secs = 0)
        .build()
        .await
        .unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();
    h.command(CUSTOMER.chat(), CUSTOMER, "order", "").await;
    assert_eq!(
        h.engine.expire_idle(h.now() + Duration::days(2)).await,
        0
    );
}

async fn press_on(engine: &Engine, h: &TestHarness, token: &str) {
    engine
        .handle(InboundEvent {
            chat: DISPATCH_CHAT,
            sender: TestHarness::sender(DELIVERER),
            kind: EventKind::Callback {
                id: "restart".to_string(),
                data: token.to_string(),
                message: None,
            },
            at: h.now(),
        })
        .await;
}

#[tokio::test]
async fn restart_resume_rebinds_relay_on_next_position() {
    let (h, id) = claimed_order().await;
    h.press(DISPATCH_CHAT, DELIVERER, &format!("pay:{}", id.0))
        .await;
    h.press(CUSTOMER.chat(), CUSTOMER, &format!("cfm:{}", id.0))
        .await;

    let restarted = Engine::new(h.store.clone(), h.messenger.clone(), h.config.clone());
    assert_eq!(restarted.announce_restart().await.unwrap(), 1);
    press_on(&restarted, &h, "rst:resume").await;
    assert_eq!(restarted.session_stage(id).await, Some("locked"));

    let before = h.messenger.location_updates_to(CUSTOMER.chat()).await;
    restarted
        .handle(InboundEvent {
            chat: DISPATCH_CHAT,
            sender: TestHarness::sender(DELIVERER),
            kind: EventKind::Location {
                point: FAR,
                live: true,
                edited: true,
            },
            at: h.now(),
        })
        .await;
    assert_eq!(
        h.messenger.location_updates_to(CUSTOMER.chat()).await,
        before + 1
    );
}

#[tokio::test]
async fn restart_reset_cancels_in_flight_orders() {
    let (h, id) = claimed_order().await;
    let restarted = Arc::new(Engine::new(
        h.store.clone(),
        h.messenger.clone(),
        h.config.clone(),
    ));
    restarted.announce_restart().await.unwrap();
    press_on(&restarted, &h, "rst:reset").await;
    assert_eq!(
        h.store.get_order(id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );
    assert_eq!(restarted.active_sessions().await, 0);

    // The prompt is answered only once.
    press_on(&restarted, &h, "rst:resume").await;
    assert_eq!(restarted.active_sessions().await, 0);
}

#[tokio::test]
async fn admin_reset_cancels_and_notifies() {
    let (h, id) = claimed_order().await;
    h.command(DISPATCH_CHAT, DELIVERER, "clearorders", "").await;
    assert_eq!(
        h.store.get_order(id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );
    assert_eq!(h.engine.active_sessions().await, 0);
    assert!(
        h.messenger
            .texts_to(CUSTOMER.chat())
            .await
            .contains(&"Your order has been interrupted and cancelled by the admin.".to_string())
    );
}

#[tokio::test]
async fn admin_commands_only_work_in_dispatch_chat() {
    let h = TestHarness::new().await.unwrap();
    h.register(CUSTOMER, "Abebe Kebede").await.unwrap();

    h.command(CUSTOMER.chat(), CUSTOMER, "testmode", "on").await;
    assert!(!h.engine.test_mode());
    h.command(DISPATCH_CHAT, DELIVERER, "testmode", "on").await;
    assert!(h.engine.test_mode());

    h.command(DISPATCH_CHAT, DELIVERER, "soldout", "Fle | Firfir").await;
    assert_eq!(
        h.store.unavailable_items("Fle").await.unwrap(),
        vec!["Firfir".to_string()]
    );

    h.command(DISPATCH_CHAT, DELIVERER, "contract", "1001 Fle 300").await;
    let contract = h.store.get_contract(CUSTOMER, "Fle").await.unwrap().unwrap();
    assert_eq!(contract.balance, 300.0);

    h.command(DISPATCH_CHAT, DELIVERER, "ban", "1001").await;
    h.command(CUSTOMER.chat(), CUSTOMER, "order", "").await;
    assert!(
        h.messenger
            .texts_to(CUSTOMER.chat())
            .await
            .iter()
            .any(|t| t.contains("banned"))
    );
}
