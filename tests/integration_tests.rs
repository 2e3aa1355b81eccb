use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use bistro_gateway::Configuration;
use bistro_gateway::ConfigurationSource;
use bistro_gateway::Dish;
use bistro_gateway::GatewayError;
use bistro_gateway::GatewayHttpServer;
use bistro_gateway::MemoryStore;
use bistro_gateway::Review;
use bistro_gateway::ShutdownSource;
use bistro_gateway::StoreSource;
use bistro_gateway::User;
use maplit::hashmap;
use serde_json::json;
use serde_json::Value;
use test_log::test;

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_user(User {
        id: 1,
        name: "Ada".to_string(),
    });
    store.insert_user(User {
        id: 2,
        name: "Grace".to_string(),
    });
    store.insert_dish(Dish {
        id: 1,
        name: "Soup".to_string(),
        photo: "soup.jpg".to_string(),
        description: "A warm soup".to_string(),
        vegan: true,
        vegetarian: true,
        no_milk: true,
        no_gluten: true,
    });
    store.insert_review(Review {
        id: 1,
        content: "Lovely".to_string(),
        stars: 5,
        user_id: 1,
        dish_id: 1,
    });
    store
}

async fn start_gateway(store: Arc<MemoryStore>) -> (GatewayHttpServer, SocketAddr) {
    let configuration = Configuration::from_str("server:\n  listen: 127.0.0.1:0\n")
        .unwrap()
        .boxed();
    let server = GatewayHttpServer::builder()
        .configuration(ConfigurationSource::Static(configuration))
        .store(StoreSource::Handle(store))
        .shutdown(ShutdownSource::None)
        .start();
    let address = server
        .listen_address()
        .await
        .expect("gateway failed to start");
    (server, address)
}

async fn graphql_request(address: &SocketAddr, query: &str) -> Value {
    reqwest::Client::new()
        .post(format!("http://{address}/"))
        .json(&json!({ "query": query }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json response")
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn basic_queries() {
    let (mut server, address) = start_gateway(seeded_store()).await;

    let response = graphql_request(&address, r#"{ users { _id name } }"#).await;
    assert_eq!(
        response,
        json!({
            "data": {
                "users": [
                    { "_id": "1", "name": "Ada" },
                    { "_id": "2", "name": "Grace" },
                ]
            }
        })
    );

    let response = graphql_request(
        &address,
        r#"{ review(id: "1") { content stars user { name } dish { name vegan } } }"#,
    )
    .await;
    assert_eq!(
        response,
        json!({
            "data": {
                "review": {
                    "content": "Lovely",
                    "stars": 5,
                    "user": { "name": "Ada" },
                    "dish": { "name": "Soup", "vegan": true },
                }
            }
        })
    );

    server.shutdown().await.unwrap();
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn repeated_queries_are_idempotent() {
    let (mut server, address) = start_gateway(seeded_store()).await;

    let expected = hashmap! {
        "1" => "Ada",
        "2" => "Grace",
    };
    for _ in 0..3 {
        let response = graphql_request(&address, r#"{ users { _id name } }"#).await;
        let users = response["data"]["users"].as_array().unwrap();
        assert_eq!(users.len(), expected.len());
        for user in users {
            let id = user["_id"].as_str().unwrap();
            assert_eq!(user["name"].as_str().unwrap(), expected[id]);
        }
    }

    server.shutdown().await.unwrap();
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn non_numeric_id_is_a_field_error() {
    let (mut server, address) = start_gateway(seeded_store()).await;

    let response = graphql_request(&address, r#"{ user(id: "abc") { name } }"#).await;
    assert_eq!(response["data"]["user"], Value::Null);
    assert_eq!(
        response["errors"][0]["extensions"]["code"],
        json!("INVALID_IDENTIFIER")
    );

    server.shutdown().await.unwrap();
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn landing_page_on_get() {
    let (mut server, address) = start_gateway(seeded_store()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{address}/"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("<html"));

    server.shutdown().await.unwrap();
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn health_check_reflects_store_readiness() {
    let store = seeded_store();
    let (mut server, address) = start_gateway(store.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{address}/health"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({ "status": "UP" })
    );

    store.set_down(true);
    let response = client
        .get(format!("http://{address}/health"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 503);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({ "status": "DOWN" })
    );

    server.shutdown().await.unwrap();
}

#[test(tokio::test(flavor = "multi_thread"))]
async fn unreachable_store_prevents_startup() {
    let store = Arc::new(MemoryStore::new());
    store.set_down(true);
    let configuration = Configuration::from_str("server:\n  listen: 127.0.0.1:0\n")
        .unwrap()
        .boxed();
    let mut server = GatewayHttpServer::builder()
        .configuration(ConfigurationSource::Static(configuration))
        .store(StoreSource::Handle(store))
        .shutdown(ShutdownSource::None)
        .start();

    assert!(server.listen_address().await.is_none());
    assert!(matches!(
        server.shutdown().await,
        Err(GatewayError::StoreConnection(_))
    ));
}
