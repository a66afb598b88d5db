use futures_util::StreamExt;
use kameo::Actor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use flashsale_query::actors::CorrelationRegistry;
use flashsale_query::domain::flashsale::{Flashsale, QueryFilter};
use flashsale_query::event_sourcing::{Action, Event, KafkaResponse};
use flashsale_query::identifiers::{DeviceId, FlashId, ItemId, ObjectId};
use flashsale_query::messaging::{InMemoryBus, MessageBus, Subscription};
use flashsale_query::query::{DispatchError, QueryDispatcher, ResponseListener};

const EVENTS: &str = "flashsale-events";
const RESPONSES: &str = "flashsale-responses";

type Store = Arc<Mutex<HashMap<ObjectId, Flashsale>>>;

/// Stands in for the write/read store behind the bus: persists inserts with
/// a fresh ObjectId and answers queries by matching filter keys against the
/// JSON encoding of each stored aggregate.
async fn spawn_executor(bus: Arc<InMemoryBus>, store: Store) {
    let mut events = bus
        .subscribe(&Subscription::new(EVENTS, "executor"))
        .await
        .unwrap();

    tokio::spawn(async move {
        while let Some(Ok(message)) = events.next().await {
            let event = Event::from_bytes(&message.payload).unwrap();

            match event.action {
                Action::Insert => {
                    let sale = Flashsale::decode_json(&event.data).unwrap();
                    let id = ObjectId::new();
                    store.lock().await.insert(id, sale.with_document_id(id));
                }
                Action::Query => {
                    let response = match QueryFilter::decode(&event.data) {
                        Ok(filter) => {
                            let store = store.lock().await;
                            let found: Vec<Flashsale> = store
                                .values()
                                .filter(|sale| filter_matches(sale, &filter))
                                .cloned()
                                .collect();
                            KafkaResponse::success_for(&event, &found).unwrap()
                        }
                        Err(e) => KafkaResponse::failure_for(&event, e.to_string(), 1),
                    };
                    bus.publish(RESPONSES, &response.to_bytes().unwrap())
                        .await
                        .unwrap();
                }
                Action::Update | Action::Delete => {
                    let response = KafkaResponse::failure_for(&event, "unsupported action", 2);
                    bus.publish(RESPONSES, &response.to_bytes().unwrap())
                        .await
                        .unwrap();
                }
            }
        }
    });
}

fn filter_matches(sale: &Flashsale, filter: &QueryFilter) -> bool {
    let document = sale.to_json_value();
    filter
        .iter()
        .all(|(field, expected)| document.get(field.key()) == Some(expected))
}

async fn setup(timeout: Duration) -> (QueryDispatcher<InMemoryBus>, Store) {
    let bus = Arc::new(InMemoryBus::new());
    let store = Store::default();
    spawn_executor(bus.clone(), store.clone()).await;

    let registry = CorrelationRegistry::spawn(CorrelationRegistry::new());
    ResponseListener::new(
        bus.clone(),
        Subscription::new(RESPONSES, "flashsale-query"),
        registry.clone(),
    )
    .spawn()
    .await
    .unwrap();

    let dispatcher = QueryDispatcher::new(bus, registry, EVENTS).with_timeout(timeout);
    (dispatcher, store)
}

fn bananas() -> Flashsale {
    Flashsale {
        upc: 4011,
        sku: "BAN-001".to_string(),
        name: "Bananas".to_string(),
        origin: "Ecuador".to_string(),
        price: 0.69,
        sale_price: 0.49,
        timestamp: 1_760_000_000,
        ethylene: 1.5,
        status: "active".to_string(),
        total_weight: 1200.0,
        sold_weight: 150.5,
        lot: "L-42".to_string(),
        ..Flashsale::new(FlashId::new_v4(), ItemId::new_v4(), DeviceId::new_v4())
    }
}

async fn wait_for_store(store: &Store, len: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while store.lock().await.len() < len {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_insert_then_query_by_flash_id() {
    let (dispatcher, store) = setup(Duration::from_secs(5)).await;

    let sale = Flashsale {
        price: 13.4,
        sale_price: 12.23,
        total_weight: 300.0,
        sold_weight: 12.0,
        ..Flashsale::new(FlashId::new_v4(), ItemId::new_v4(), DeviceId::new_v4())
    };
    let other = bananas();
    dispatcher.insert(&sale).await.unwrap();
    dispatcher.insert(&other).await.unwrap();
    wait_for_store(&store, 2).await;

    let found = dispatcher
        .query(&QueryFilter::new().flash_id(sale.flash_id))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    let stored = &found[0];
    assert!(stored.is_persisted());
    assert_eq!(
        stored,
        &sale.clone().with_document_id(stored.id.unwrap())
    );
}

#[tokio::test]
async fn test_query_by_document_id_and_no_match() {
    let (dispatcher, store) = setup(Duration::from_secs(5)).await;

    dispatcher.insert(&bananas()).await.unwrap();
    wait_for_store(&store, 1).await;
    let id = *store.lock().await.keys().next().unwrap();

    let found = dispatcher
        .query(&QueryFilter::new().document_id(id))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Some(id));

    let none = dispatcher
        .query(&QueryFilter::new().sku("does-not-exist"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unsupported_action_surfaces_remote_error() {
    let (dispatcher, _store) = setup(Duration::from_secs(5)).await;

    let event = Event::new(Action::Delete, Vec::new());
    let response = dispatcher.dispatch(event).await.unwrap();
    assert!(response.is_failure());
    assert_eq!(response.error_code, 2);
}

#[tokio::test]
async fn test_concurrent_queries_each_get_their_own_answer() {
    let (dispatcher, store) = setup(Duration::from_secs(5)).await;

    let sales: Vec<Flashsale> = (0..5).map(|_| bananas()).collect();
    for sale in &sales {
        dispatcher.insert(sale).await.unwrap();
    }
    wait_for_store(&store, sales.len()).await;

    let handles: Vec<_> = sales
        .iter()
        .map(|sale| {
            let dispatcher = dispatcher.clone();
            let filter = QueryFilter::new().flash_id(sale.flash_id);
            tokio::spawn(async move { dispatcher.query(&filter).await })
        })
        .collect();

    for (sale, handle) in sales.iter().zip(handles) {
        let found = handle.await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].flash_id, sale.flash_id);
    }
}

#[tokio::test]
async fn test_query_without_executor_times_out() {
    let bus = Arc::new(InMemoryBus::new());
    let registry = CorrelationRegistry::spawn(CorrelationRegistry::new());
    let dispatcher =
        QueryDispatcher::new(bus, registry, EVENTS).with_timeout(Duration::from_millis(50));

    let err = dispatcher.query(&QueryFilter::new()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Timeout { .. }));
}
