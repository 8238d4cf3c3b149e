use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use rigview_protocol::message::ReloadMessage;
use rigview_server::server::{websocket::WebSocketServer, Server};
use tokio::time::{sleep, timeout};
use tokio_serde::formats::Json;
use tokio_tungstenite::{connect_async, tungstenite::Message};

fn reload(tag: &str) -> ReloadMessage {
    ReloadMessage {
        model_data: format!("{{\"model\":\"{}\"}}", tag),
        action_data: "{\"actions\":{}}".to_string(),
    }
}

async fn next_text<S>(stream: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(10), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

#[tokio::test]
async fn state_request_then_broadcast() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = Arc::new(Server::new());
    let websocket_server = WebSocketServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let address = websocket_server.local_addr().unwrap();
    tokio::spawn(websocket_server.serve(server.clone(), Json::default));

    server.publish(reload("first")).await;

    let (mut socket, _) = connect_async(format!("ws://{}", address)).await.unwrap();
    socket
        .send(Message::text(r#"{"type":"requestState"}"#))
        .await
        .unwrap();

    let text = next_text(&mut socket).await;
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["modelData"], "{\"model\":\"first\"}");
    assert_eq!(value["actionData"], "{\"actions\":{}}");

    assert_eq!(server.publish(reload("second")).await, 1);
    let text = next_text(&mut socket).await;
    let message: ReloadMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(message, reload("second"));

    socket.close(None).await.unwrap();
    timeout(Duration::from_secs(10), async {
        while server.client_count().await > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
