use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use super::*;
use crate::supervisor::test_helpers::CountingLauncher;
use crate::{Error, RetryPolicy, ServerLauncher, ServerSpec};

type Handler = fn(&Request) -> String;

fn answer(request: &Request) -> String {
	match &request.op {
		Operation::Ping => "ready".to_string(),
		Operation::Resolve => "file:/w/lib.cs\nline:3".to_string(),
		other => format!("<error> unsupported {}", other.name()),
	}
}

async fn serve(listener: TcpListener, handler: Handler) {
	while let Ok((mut stream, _)) = listener.accept().await {
		let mut text = String::new();
		if stream.read_to_string(&mut text).await.is_err() {
			continue;
		}
		let Ok(request) = Request::decode(&text) else {
			continue;
		};
		if request.op == Operation::Exit {
			return;
		}
		let _ = framing::write_response(&mut stream, &handler(&request)).await;
	}
}

/// Binds the configured port when launched, standing in for the real server process.
struct BindingLauncher {
	launches: AtomicUsize,
	handler: Handler,
}

#[async_trait]
impl ServerLauncher for BindingLauncher {
	async fn launch(&self, spec: &ServerSpec) -> std::io::Result<()> {
		self.launches.fetch_add(1, Ordering::SeqCst);
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, spec.port)).await?;
		tokio::spawn(serve(listener, self.handler));
		Ok(())
	}
}

async fn free_port() -> u16 {
	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
	listener.local_addr().unwrap().port()
}

struct Fixture {
	_dir: tempfile::TempDir,
	client: AnalysisClient,
}

fn fixture(port: u16, launcher: Arc<dyn ServerLauncher>, policy: RetryPolicy) -> Fixture {
	let dir = tempfile::tempdir().unwrap();
	let server_path = dir.path().join("syntaxer.dll");
	std::fs::write(&server_path, b"").unwrap();
	let spec = ServerSpec {
		server_path,
		host: None,
		port,
		client: 77,
		idle_timeout: Duration::from_secs(60),
		engine_path: PathBuf::from("cscs.dll"),
	};
	Fixture {
		_dir: dir,
		client: AnalysisClient::new(Arc::new(Supervisor::new(spec, launcher, policy))),
	}
}

#[tokio::test]
async fn request_reaches_running_server() {
	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	tokio::spawn(serve(listener, answer));

	let launcher = Arc::new(CountingLauncher::default());
	let fx = fixture(port, launcher.clone(), RetryPolicy::default());
	let request = Request::new(fx.client.client_id(), Operation::Resolve).script("/tmp/x.$temp$.cs").position(4);
	let response = fx.client.send(&request).await.unwrap().unwrap();

	assert_eq!(response.payload(), Some("file:/w/lib.cs\nline:3"));
	assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn refused_connection_respawns_once_then_recovers() {
	let port = free_port().await;
	let launcher = Arc::new(BindingLauncher {
		launches: AtomicUsize::new(0),
		handler: answer,
	});
	let fx = fixture(port, launcher.clone(), RetryPolicy::default());
	let request = Request::new(fx.client.client_id(), Operation::Resolve).script("/tmp/x.$temp$.cs").position(0);

	assert_eq!(fx.client.send(&request).await.unwrap(), None);
	assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
	assert_eq!(fx.client.supervisor().attempts(), 1);

	let response = fx.client.send(&request).await.unwrap().unwrap();
	assert_eq!(response.payload(), Some("file:/w/lib.cs\nline:3"));
	assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
	assert_eq!(fx.client.supervisor().attempts(), 0);
}

#[tokio::test]
async fn unreachable_server_exhausts_retry_budget() {
	let port = free_port().await;
	let launcher = Arc::new(CountingLauncher::default());
	let policy = RetryPolicy {
		max_attempts: 1,
		backoff: Duration::ZERO,
	};
	let fx = fixture(port, launcher.clone(), policy);
	let request = Request::new(fx.client.client_id(), Operation::Completion);

	assert_eq!(fx.client.send(&request).await.unwrap(), None);
	assert!(matches!(fx.client.send(&request).await, Err(Error::RetriesExhausted { attempts: 1 })));
	assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn ping_reports_readiness() {
	let port = free_port().await;
	let fx = fixture(port, Arc::new(CountingLauncher::default()), RetryPolicy::default());
	assert_eq!(fx.client.ping().await, PingStatus::Error);
	assert!(!fx.client.wait_until_ready(Duration::from_millis(100), Duration::from_millis(20)).await);

	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.unwrap();
	tokio::spawn(serve(listener, answer));
	assert_eq!(fx.client.ping().await, PingStatus::Ready);
	assert!(fx.client.wait_until_ready(Duration::from_secs(2), Duration::from_millis(20)).await);
}

#[tokio::test]
async fn stop_is_fire_and_forget() {
	let port = free_port().await;
	let fx = fixture(port, Arc::new(CountingLauncher::default()), RetryPolicy::default());
	fx.client.send_stop().await;

	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.unwrap();
	let server = tokio::spawn(serve(listener, answer));
	fx.client.send_stop().await;
	tokio::time::timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
}
