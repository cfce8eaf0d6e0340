//! End-to-end tests over real sockets
//!
//! Each test starts its own server on an ephemeral port and talks to it with
//! `reqwest` and `tokio-tungstenite`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use todos_rs::{ServerConfig, SharedStore, Todo, TodoServer};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn start_server(workers: usize) -> (SocketAddr, Arc<SharedStore>) {
    let store = Arc::new(SharedStore::new());
    let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
        .workers(workers)
        .disable_random();

    let running = TodoServer::with_shared_handler(config, Arc::clone(&store))
        .start()
        .unwrap();
    (running.local_addr(), store)
}

/// Fresh client per call so every request opens a new connection
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

async fn connect(addr: SocketAddr, query: &str) -> (Socket, usize) {
    let (mut socket, _) = connect_async(format!("ws://{addr}/{query}")).await.unwrap();

    let greeting = next_text(&mut socket).await;
    let worker = greeting
        .strip_prefix("Connected to worker ")
        .unwrap()
        .parse()
        .unwrap();
    (socket, worker)
}

async fn next_text(socket: &mut Socket) -> String {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .unwrap();
        if frame.is_text() {
            return frame.to_text().unwrap().to_string();
        }
    }
}

async fn next_event(socket: &mut Socket) -> Value {
    serde_json::from_str(&next_text(socket).await).unwrap()
}

async fn command(socket: &mut Socket, command: Value) -> String {
    socket
        .send(Message::text(command.to_string()))
        .await
        .unwrap();
    next_text(socket).await
}

async fn create(addr: SocketAddr, description: &str) -> Todo {
    let response = client()
        .post(format!("http://{addr}/todo"))
        .json(&json!({ "description": description, "completed": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_crud_with_mutation_stream() {
    let (addr, _store) = start_server(2);
    let (mut socket, _) = connect(addr, "").await;

    let ack = command(&mut socket, json!({"action": "subscribe", "topic": "mutation"})).await;
    assert_eq!(ack, "Subscribed to topic: mutation");

    let first = create(addr, "buy milk").await;
    let second = create(addr, "walk dog").await;
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "created");
    assert_eq!(event["todo"]["id"], 1);
    let event = next_event(&mut socket).await;
    assert_eq!(event["todo"]["id"], 2);

    let todos: Vec<Todo> = client()
        .get(format!("http://{addr}/todos"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(todos, vec![first.clone(), second]);

    let response = client()
        .delete(format!("http://{addr}/todo/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "deleted");
    assert_eq!(event["todo"]["id"], 1);

    let response = client()
        .get(format!("http://{addr}/todo/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "todo_id: 1 not found.");
}

#[tokio::test]
async fn test_update_merges_fields() {
    let (addr, store) = start_server(1);
    let created = create(addr, "draft").await;

    let response = client()
        .put(format!("http://{addr}/todo/{}", created.id))
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let updated: Todo = response.json().await.unwrap();
    assert_eq!(updated, Todo::new(created.id, "draft", true));
    assert_eq!(store.get(created.id), Some(updated));
}

#[tokio::test]
async fn test_invalid_body_is_rejected() {
    let (addr, store) = start_server(1);

    let response = client()
        .post(format!("http://{addr}/todo"))
        .body("{\"description\":")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(store.is_empty());

    let response = client()
        .get(format!("http://{addr}/todo/not-a-number"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscribe_all_lists_concrete_topics() {
    let (addr, _store) = start_server(1);
    let (mut socket, _) = connect(addr, "?token=opaque").await;

    let ack = command(&mut socket, json!({"action": "subscribe", "topic": "all"})).await;
    assert_eq!(ack, "Subscribed to all topics: query/mutation/random");

    let listing = command(&mut socket, json!({"action": "subscriptions"})).await;
    let topics: HashSet<String> =
        serde_json::from_str(listing.strip_prefix("Subscribed topics: ").unwrap()).unwrap();
    let expected: HashSet<String> = ["query", "mutation", "random"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(topics, expected);

    let ack = command(&mut socket, json!({"action": "unsubscribe", "topic": "all"})).await;
    assert_eq!(ack, "Unsubscribed to all topics: query/mutation/random");

    let listing = command(&mut socket, json!({"action": "subscriptions"})).await;
    assert_eq!(listing, "Subscribed topics: []");
}

#[tokio::test]
async fn test_bad_commands_get_error_replies() {
    let (addr, _store) = start_server(1);
    let (mut socket, _) = connect(addr, "").await;

    socket.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut socket).await, "Invalid message format");

    let reply = command(&mut socket, json!({"action": "publish", "topic": "x"})).await;
    assert_eq!(reply, "Invalid request or unsupported action");

    let reply = command(&mut socket, json!({"action": "subscribe"})).await;
    assert_eq!(reply, "Invalid request or unsupported action");
}

#[tokio::test]
async fn test_unsubscribed_topic_is_not_delivered() {
    let (addr, _store) = start_server(2);
    let (mut socket, _) = connect(addr, "").await;

    command(&mut socket, json!({"action": "subscribe", "topic": "mutation"})).await;
    command(&mut socket, json!({"action": "subscribe", "topic": "query"})).await;
    let ack = command(&mut socket, json!({"action": "unsubscribe", "topic": "mutation"})).await;
    assert_eq!(ack, "Unsubscribed to topic: mutation");

    create(addr, "silent").await;
    client()
        .get(format!("http://{addr}/todos"))
        .send()
        .await
        .unwrap();

    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "listed");
}

#[tokio::test]
async fn test_mutations_reach_subscribers_on_other_workers() {
    let (addr, _store) = start_server(2);
    let (mut socket, own_worker) = connect(addr, "").await;
    command(&mut socket, json!({"action": "subscribe", "topic": "mutation"})).await;

    // The kernel spreads new connections over both workers
    let mut foreign = false;
    for n in 0..64 {
        let todo = create(addr, &format!("todo {n}")).await;

        let event = next_event(&mut socket).await;
        assert_eq!(event["todo"]["id"], todo.id);
        if event["worker"] != own_worker {
            foreign = true;
            break;
        }
    }

    assert!(foreign, "no request was served by another worker");
}
