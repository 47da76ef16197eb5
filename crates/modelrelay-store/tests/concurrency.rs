use std::collections::HashSet;
use std::sync::Arc;

use modelrelay_common::Role;
use modelrelay_store::ConversationStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_distinct_ids() {
    let store = Arc::new(ConversationStore::new(50));
    let count = 200;

    let handles: Vec<_> = (0..count)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create("a") })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), count);
    assert_eq!(store.len(), count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clone_never_observes_half_an_exchange() {
    let store = Arc::new(ConversationStore::new(0));
    let source = store.create("a");

    let writer = {
        let store = Arc::clone(&store);
        let source = source.clone();
        tokio::spawn(async move {
            for i in 0..500 {
                store
                    .append_exchange(&source, format!("q{i}"), format!("a{i}"))
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let cloner = {
        let store = Arc::clone(&store);
        let source = source.clone();
        tokio::spawn(async move {
            let mut copies = Vec::new();
            for _ in 0..200 {
                copies.push(store.clone_conversation(&source, "b").unwrap());
                tokio::task::yield_now().await;
            }
            copies
        })
    };

    writer.await.unwrap();
    let copies = cloner.await.unwrap();

    for copy in copies {
        let messages = store.get(&copy).unwrap().messages;
        assert_eq!(messages.len() % 2, 0, "clone saw a torn exchange");
        for pair in messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }
    assert_eq!(store.get(&source).unwrap().messages.len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_to_one_conversation_are_all_kept() {
    let store = Arc::new(ConversationStore::new(0));
    let id = store.create("a");

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    store
                        .append(&id, Role::User, format!("w{worker}-{i}"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.history(&id).unwrap().len(), 400);
}
