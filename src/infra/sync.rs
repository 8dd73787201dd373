use crate::domain::{
    DayStat, DayStatRecord, SessionList, SessionQueryResult, SessionRecord, SyncAction,
    day_stats_from_records,
};
use crate::infra::{Config, ConfigError};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Request/response side of the remote session service.
#[derive(Clone)]
pub struct SyncClient {
    agent: ureq::Agent,
    config: Config,
}

impl SyncClient {
    pub fn new(config: &Config) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build();
        Self {
            agent: agent_config.into(),
            config: config.clone(),
        }
    }

    /// `/time`, `/start` or `/stop`; all three answer with the current state.
    pub fn send_action(&self, action: SyncAction) -> Result<SessionQueryResult, SyncError> {
        let url = self.config.endpoint_url(action.path())?;
        self.get_json(url)
    }

    /// Sessions of the day containing `day_start_ms`, or of today when absent.
    pub fn fetch_sessions(&self, day_start_ms: Option<i64>) -> Result<SessionList, SyncError> {
        let mut url = self.config.endpoint_url("sessions")?;
        if let Some(ms) = day_start_ms {
            url.query_pairs_mut().append_pair("time", &ms.to_string());
        }
        let records: Vec<SessionRecord> = self.get_json(url)?;
        Ok(SessionList::from_records(&records))
    }

    pub fn fetch_day_stats(&self) -> Result<Vec<DayStat>, SyncError> {
        let url = self.config.endpoint_url("stat")?;
        let records: Vec<DayStatRecord> = self.get_json(url)?;
        Ok(day_stats_from_records(&records))
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let mut response = self
            .agent
            .get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .call()
            .map_err(|error| SyncError::Request {
                url: url.to_string(),
                message: error.to_string(),
            })?;

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|error| SyncError::Decode {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;
    use std::time::Duration;

    /// Answers exactly one HTTP request with `status` and `body`; the handle
    /// yields the request line that was received.
    fn serve_once(status: &'static str, body: &'static str) -> (Config, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            request_line.trim_end().to_string()
        });

        let mut config = Config::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = port;
        config.http.href_prefix = "/sw".to_string();
        config.http.timeout_secs = 5;
        (config, handle)
    }

    #[test]
    fn start_action_hits_start_endpoint() {
        let (config, server) = serve_once("200 OK", r#"{"time":5000000,"running":true}"#);
        let client = SyncClient::new(&config);

        let result = client.send_action(SyncAction::Start).expect("start");
        assert_eq!(
            result,
            SessionQueryResult {
                time: 5_000_000,
                running: true
            }
        );
        assert_eq!(result.elapsed(), Duration::from_secs(5));
        assert_eq!(server.join().expect("server"), "GET /sw/start HTTP/1.1");
    }

    #[test]
    fn historical_sessions_carry_time_parameter() {
        let (config, server) = serve_once(
            "200 OK",
            r#"[{"start":1700000000000,"end":1700000060000},{"start":1700000100000,"end":0}]"#,
        );
        let client = SyncClient::new(&config);

        let list = client
            .fetch_sessions(Some(1_699_990_000_000))
            .expect("sessions");
        assert_eq!(list.sessions.len(), 2);
        assert!(list.sessions[1].is_open());
        assert_eq!(
            server.join().expect("server"),
            "GET /sw/sessions?time=1699990000000 HTTP/1.1"
        );
    }

    #[test]
    fn live_sessions_omit_time_parameter() {
        let (config, server) = serve_once("200 OK", "[]");
        let client = SyncClient::new(&config);
        let list = client.fetch_sessions(None).expect("sessions");
        assert!(list.sessions.is_empty());
        assert_eq!(server.join().expect("server"), "GET /sw/sessions HTTP/1.1");
    }

    #[test]
    fn server_error_is_a_request_failure() {
        let (config, server) = serve_once("500 Internal Server Error", "{}");
        let client = SyncClient::new(&config);
        let error = client.send_action(SyncAction::Query).expect_err("error");
        assert!(matches!(error, SyncError::Request { .. }));
        let _ = server.join();
    }

    #[test]
    fn malformed_body_is_a_decode_failure() {
        let (config, server) = serve_once("200 OK", r#"{"time":-4,"running":true}"#);
        let client = SyncClient::new(&config);
        let error = client.send_action(SyncAction::Query).expect_err("error");
        assert!(matches!(error, SyncError::Decode { .. }));
        let _ = server.join();
    }

    #[test]
    fn day_stats_are_decoded() {
        let (config, server) = serve_once(
            "200 OK",
            r#"[{"date":"2024-05-02","time":3600000000},{"date":"2024-05-01","time":0}]"#,
        );
        let client = SyncClient::new(&config);
        let stats = client.fetch_day_stats().expect("stats");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].elapsed, Duration::from_secs(3600));
        assert_eq!(server.join().expect("server"), "GET /sw/stat HTTP/1.1");
    }

    #[test]
    fn unreachable_server_is_a_request_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let mut config = Config::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = port;
        config.http.timeout_secs = 2;
        let error = SyncClient::new(&config)
            .send_action(SyncAction::Query)
            .expect_err("error");
        assert!(matches!(error, SyncError::Request { .. }));
    }
}
