#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    task::JoinHandle,
};

pub const STATUS_BODY: &str = r#"{"temp":37.6,"humidity":58,"day":5,"days_left":16,"status":"Stable","turn_time":"01:12","mode":"Chicken"}"#;

#[derive(Clone)]
struct Reply {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    reply: Option<Reply>,
    targets: Vec<String>,
}

/// Incubator controller stand-in answering every GET with a scripted reply.
pub struct MockDevice {
    pub base_url: String,
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl MockDevice {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock device");
        let base_url = format!(
            "http://{}",
            listener.local_addr().expect("failed to get local address")
        );
        let shared = Arc::new(Mutex::new(Shared::default()));

        let task = tokio::spawn(serve(listener, shared.clone()));

        let device = MockDevice {
            base_url,
            shared,
            task,
        };
        device.reply(200, STATUS_BODY);
        device
    }

    pub fn reply(&self, status: u16, body: &str) {
        self.shared.lock().unwrap().reply = Some(Reply {
            status,
            body: body.to_string(),
            delay: None,
        });
    }

    pub fn reply_after(&self, delay: Duration, status: u16, body: &str) {
        self.shared.lock().unwrap().reply = Some(Reply {
            status,
            body: body.to_string(),
            delay: Some(delay),
        });
    }

    /// Request targets (path and query) in arrival order
    pub fn targets(&self) -> Vec<String> {
        self.shared.lock().unwrap().targets.clone()
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, shared: Arc<Mutex<Shared>>) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let shared = shared.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(&mut stream);
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).await.is_err() {
                return;
            }

            // Read HTTP headers
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) if line.trim().is_empty() => break,
                    Ok(_) => {}
                }
            }

            let reply = {
                let mut shared = shared.lock().unwrap();
                if let Some(target) = request_line.split_whitespace().nth(1) {
                    shared.targets.push(target.to_string());
                }
                shared.reply.clone()
            };
            let Some(reply) = reply else {
                return;
            };

            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }

            let response = format!(
                "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.status,
                reply.body.len(),
                reply.body
            );

            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}
