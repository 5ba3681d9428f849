#![allow(dead_code)]

use rusqlite::Connection;
use serde_json::Value;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

pub struct TestServer {
    child: Child,
    pub base: String,
    pub db_path: PathBuf,
    api_key: Option<String>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(self.db_path.with_extension("sqlite3-wal"));
        let _ = std::fs::remove_file(self.db_path.with_extension("sqlite3-shm"));
    }
}

impl TestServer {
    pub fn start(name: &str) -> Self {
        Self::start_with_key(name, None)
    }

    pub fn start_with_key(name: &str, api_key: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let db_path = std::env::temp_dir().join(format!("forum_test_{}_{}.sqlite3", name, port));
        if db_path.exists() {
            let _ = std::fs::remove_file(&db_path);
        }

        let mut command = Command::new(env!("CARGO_BIN_EXE_forum"));
        command
            .env("FORUM_HOST", "127.0.0.1")
            .env("FORUM_PORT", port.to_string())
            .env("FORUM_DB_PATH", &db_path)
            .env("RUST_LOG", "warn");
        match api_key {
            Some(key) => command.env("FORUM_API_KEY", key),
            None => command.env_remove("FORUM_API_KEY"),
        };
        let child = command.spawn().expect("failed to start server");

        let server = TestServer {
            child,
            base: format!("http://127.0.0.1:{}", port),
            db_path,
            api_key: api_key.map(str::to_string),
        };
        wait_for_port(SocketAddr::from(([127, 0, 0, 1], port)));
        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn request(&self, method: &str, path: &str, body: Option<&Value>) -> (u16, Value) {
        let mut builder = ureq::request(method, &self.url(path));
        if let Some(key) = &self.api_key {
            builder = builder.set("x-api-key", key);
        }
        let result = match body {
            Some(body) => builder
                .set("content-type", "application/json")
                .send_json(body),
            None => builder.call(),
        };
        read_response(result)
    }

    pub fn request_raw(&self, method: &str, path: &str, body: &str) -> (u16, Value) {
        let result = ureq::request(method, &self.url(path))
            .set("content-type", "application/json")
            .send_string(body);
        read_response(result)
    }

    pub fn request_plain(&self, method: &str, path: &str, body: &str) -> (u16, Value) {
        let result = ureq::request(method, &self.url(path))
            .set("content-type", "text/plain")
            .send_string(body);
        read_response(result)
    }

    /// Direct handle on the server's database, for setup the API cannot do.
    pub fn connection(&self) -> Connection {
        let conn = Connection::open(&self.db_path).expect("open test database");
        conn.busy_timeout(Duration::from_secs(5)).expect("busy timeout");
        conn
    }

    pub fn create_question(&self, title: &str, description: &str, category: &str) -> i64 {
        let (status, _) = self.request(
            "POST",
            "/questions",
            Some(&serde_json::json!({
                "title": title,
                "description": description,
                "category": category
            })),
        );
        assert_eq!(status, 201);
        self.question_id(title)
    }

    pub fn question_id(&self, title: &str) -> i64 {
        let (status, body) = self.request("GET", "/questions", None);
        assert_eq!(status, 200);
        body["data"]
            .as_array()
            .expect("data array")
            .iter()
            .find(|question| question["title"].as_str() == Some(title))
            .and_then(|question| question["id"].as_i64())
            .expect("question listed")
    }

    pub fn question_count(&self) -> usize {
        let (_, body) = self.request("GET", "/questions", None);
        body["data"].as_array().map(Vec::len).unwrap_or(0)
    }
}

fn read_response(result: Result<ureq::Response, ureq::Error>) -> (u16, Value) {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(error) => panic!("request failed: {}", error),
    };
    let status = response.status();
    let body: Value = response.into_json().unwrap_or(Value::Null);
    (status, body)
}

fn wait_for_port(addr: SocketAddr) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        if start.elapsed() > Duration::from_secs(5) {
            panic!("server did not start in time");
        }
        thread::sleep(Duration::from_millis(50));
    }
}
