//! End-to-end tests over a real WebSocket connection: an axum server on an
//! ephemeral port, tokio-tungstenite clients, and the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use live_quiz_server::config::ServerTuning;
use live_quiz_server::protocol::{CorrectAnswer, Question, QuestionKind};
use live_quiz_server::server::QuizServer;
use live_quiz_server::store::memory::MemoryStore;
use live_quiz_server::websocket;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_user(
        "t1",
        serde_json::from_value(json!({"name": "Grace", "lastName": "Hopper", "isTeacher": true}))
            .unwrap(),
    );
    store.insert_user(
        "s1",
        serde_json::from_value(json!({"name": "Ada", "lastName": "Lovelace", "isTeacher": false}))
            .unwrap(),
    );
    store.insert_question(
        "q1",
        Question {
            question: "2+2".into(),
            kind: QuestionKind::Single,
            options: Some(vec!["3".into(), "4".into(), "5".into()]),
            correct: Some(CorrectAnswer::Index(1)),
            text_answer: None,
            point: 10,
            time_limit: 30,
            explanation: None,
        },
    );
    store.insert_quiz("quiz-1", "Arithmetic", &["q1"]);
    Arc::new(store)
}

async fn start_server(store: Arc<MemoryStore>) -> SocketAddr {
    let server = QuizServer::new(ServerTuning::default(), store);
    let app = websocket::create_router("*").with_state(server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    addr
}

struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

enum Received {
    Json(Value),
    Close(Option<u16>),
}

impl WsClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (stream, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("websocket connect");
        Self { stream }
    }

    async fn send_json(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("send frame");
    }

    async fn recv(&mut self) -> Received {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection ended unexpectedly")
                .expect("websocket error");
            match message {
                Message::Text(text) => {
                    return Received::Json(serde_json::from_str(&text).expect("frame is JSON"))
                }
                Message::Close(frame) => {
                    return Received::Close(frame.map(|f| f.code.into()));
                }
                _ => {}
            }
        }
    }

    /// Read frames until one satisfies the predicate.
    async fn recv_until<F: Fn(&Value) -> bool>(&mut self, predicate: F) -> Value {
        loop {
            match self.recv().await {
                Received::Json(value) => {
                    if predicate(&value) {
                        return value;
                    }
                }
                Received::Close(code) => panic!("connection closed early (code {code:?})"),
            }
        }
    }

    async fn recv_type(&mut self, frame_type: &str) -> Value {
        self.recv_until(|v| v["type"] == frame_type).await
    }

    async fn expect_close(&mut self, code: u16) {
        loop {
            match self.recv().await {
                Received::Json(_) => {}
                Received::Close(received) => {
                    assert_eq!(received, Some(code));
                    return;
                }
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_game_over_websocket() {
    let store = seeded_store();
    let addr = start_server(store.clone()).await;

    let mut host = WsClient::connect(addr).await;
    host.recv_type("welcome").await;
    host.send_json(json!({
        "user_id": "t1",
        "quiz": "quiz-1",
        "game_type": {"mode": "normal", "disable_copy": true}
    }))
    .await;
    host.recv_type("auth_success").await;
    let created = host.recv_type("game_created").await;
    let code = created["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    host.recv_type("quiz_info").await;

    let mut student = WsClient::connect(addr).await;
    student.recv_type("welcome").await;
    student.send_json(json!({"user_id": "s1"})).await;
    student.recv_type("auth_success").await;
    student.send_json(json!({"code": code})).await;
    let joined = student.recv_type("joined").await;
    assert_eq!(joined["mode"], "normal");
    assert_eq!(joined["disable_copy"], true);

    // Host sees the roster update.
    host.recv_until(|v| v["players"] == json!(["Ada Lovelace"]))
        .await;

    host.send_json(json!({"start": true})).await;
    let question = student
        .recv_until(|v| v.get("question").is_some() && v.get("options").is_some())
        .await;
    assert!(question.get("correct").is_none());
    assert_eq!(question["points"], 10);

    student.send_json(json!({"answer": 1})).await;
    student
        .recv_until(|v| v["correct"] == true && v["points_earned"] == 10)
        .await;
    student.recv_type("answer_saved").await;

    // Sole player answered, so the round closes immediately.
    let ended = student.recv_type("round_ended").await;
    assert_eq!(ended["correct"], true);
    let stats = host.recv_type("round_results").await;
    assert_eq!(stats["data"]["right"], 1);

    host.send_json(json!({"show_results": true})).await;
    let summary = student.recv_type("game_finished").await;
    assert_eq!(summary["placement"], 1);
    assert_eq!(summary["score"], 10);
    let host_summary = host.recv_type("game_finished").await;
    assert_eq!(host_summary["leaderboard"][0]["user_id"], "s1");

    let game_id = store.game_id_by_code(&code).unwrap();
    let game = store.game(&game_id).unwrap();
    assert!(game.game_finished);
    assert_eq!(game.results["s1"].score, 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_credentials_close_with_policy_code() {
    let addr = start_server(seeded_store()).await;

    let mut client = WsClient::connect(addr).await;
    client.recv_type("welcome").await;
    client.send_json(json!({"user_id": "ghost"})).await;
    client.expect_close(1008).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lockdown_violation_closes_offender_socket() {
    let store = seeded_store();
    let addr = start_server(store).await;

    let mut host = WsClient::connect(addr).await;
    host.recv_type("welcome").await;
    host.send_json(json!({
        "user_id": "t1",
        "quiz": "quiz-1",
        "game_type": {"mode": "lockdown"}
    }))
    .await;
    let created = host.recv_type("game_created").await;
    let code = created["code"].as_str().unwrap().to_string();

    let mut student = WsClient::connect(addr).await;
    student.recv_type("welcome").await;
    student.send_json(json!({"user_id": "s1"})).await;
    student.send_json(json!({"code": code})).await;
    student.recv_type("joined").await;

    student.send_json(json!({"report": "switched_tabs"})).await;
    let kicked = student.recv_type("kicked").await;
    assert_eq!(kicked["reason"], "lockdown_violation");
    student.expect_close(1008).await;

    let report = host.recv_type("player_kicked").await;
    assert_eq!(report["user_id"], "s1");
    host.recv_type("players_updated").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frames_get_an_error_without_disconnect() {
    let addr = start_server(seeded_store()).await;

    let mut client = WsClient::connect(addr).await;
    client.recv_type("welcome").await;
    client
        .stream
        .send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    let error = client.recv_type("error").await;
    assert!(error["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid message format"));

    // Connection is still usable.
    client.send_json(json!({"user_id": "s1"})).await;
    client.recv_type("auth_success").await;
}
