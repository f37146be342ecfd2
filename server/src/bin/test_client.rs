use futures_util::{SinkExt, StreamExt};
use shared::{ClientMessage, ServerMessage};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:3000".to_string());

    println!("Connecting to {}", url);
    let (socket, _) = connect_async(&url).await?;
    let (mut sink, mut source) = socket.split();

    // Create a room and print everything the server tells us.
    let create = serde_json::to_string(&ClientMessage::CreateRoom)?;
    println!("Sending: {}", create);
    sink.send(Message::Text(create)).await?;

    let mut room_code = None;
    for _ in 0..2 {
        if let Some(Ok(Message::Text(text))) =
            timeout(Duration::from_secs(5), source.next()).await?
        {
            println!("Received: {}", text);
            if let Ok(ServerMessage::RoomCreated { room_code: code, .. }) =
                serde_json::from_str(&text)
            {
                room_code = Some(code);
            }
        }
    }

    match room_code {
        Some(code) => println!("Room created with code: {}", code),
        None => {
            println!("Expected room_created but never saw it");
            return Ok(());
        }
    }

    // Toggle ready and watch the broadcast come back.
    let ready = serde_json::to_string(&ClientMessage::ToggleReady)?;
    println!("Sending: {}", ready);
    sink.send(Message::Text(ready)).await?;

    // Print whatever arrives for a few seconds (a second client joining
    // from another terminal will show up here).
    loop {
        match timeout(Duration::from_secs(10), source.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => println!("Received: {}", text),
            Ok(Some(Ok(_))) => {}
            Ok(_) => break,
            Err(_) => {
                println!("No traffic for 10s, leaving");
                break;
            }
        }
    }

    let leave = serde_json::to_string(&ClientMessage::LeaveRoom)?;
    sink.send(Message::Text(leave)).await?;
    println!("Test client finished");

    Ok(())
}
