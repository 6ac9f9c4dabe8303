//! One-connection-per-request client for the analysis server.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use cside_proto::{Operation, PingStatus, Request, Response, framing};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::{Result, Supervisor};

/// Sends requests to the analysis server on `127.0.0.1:<port>`.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
	addr: SocketAddr,
	client: u32,
	supervisor: Arc<Supervisor>,
}

impl AnalysisClient {
	/// Creates a client for the server described by the supervisor's spec.
	pub fn new(supervisor: Arc<Supervisor>) -> Self {
		let spec = supervisor.spec();
		Self {
			addr: SocketAddr::from((Ipv4Addr::LOCALHOST, spec.port)),
			client: spec.client,
			supervisor,
		}
	}

	/// Identity forwarded in every request.
	pub fn client_id(&self) -> u32 {
		self.client
	}

	/// Returns the supervisor owning the server lifecycle.
	pub fn supervisor(&self) -> &Arc<Supervisor> {
		&self.supervisor
	}

	/// Sends one request and reads its response.
	///
	/// A refused connection asks the supervisor for a respawn and yields `Ok(None)`; the
	/// caller simply gets no result this time. Only an exhausted retry budget is reported as
	/// an error from the connect path.
	pub async fn send(&self, request: &Request) -> Result<Option<Response>> {
		let stream = match TcpStream::connect(self.addr).await {
			Ok(stream) => stream,
			Err(e) => {
				tracing::debug!(addr = %self.addr, op = request.op.name(), error = %e, "Analysis server unreachable");
				self.supervisor.ensure_running().await?;
				return Ok(None);
			}
		};
		self.supervisor.record_success();

		let response = exchange(stream, request).await?;
		tracing::trace!(op = request.op.name(), len = response.raw().len(), "Analysis response");
		Ok(Some(response))
	}

	/// Checks readiness. Never spawns.
	pub async fn ping(&self) -> PingStatus {
		let Ok(stream) = TcpStream::connect(self.addr).await else {
			return PingStatus::Error;
		};
		self.supervisor.record_success();
		match exchange(stream, &Request::new(self.client, Operation::Ping)).await {
			Ok(response) => match response.payload() {
				Some(payload) => PingStatus::from_payload(payload),
				None => PingStatus::NotReady(response.raw().to_string()),
			},
			Err(e) => {
				tracing::debug!(error = %e, "Analysis server ping failed");
				PingStatus::Error
			}
		}
	}

	/// Polls [`AnalysisClient::ping`] until the server reports ready or `timeout` elapses.
	pub async fn wait_until_ready(&self, timeout: Duration, interval: Duration) -> bool {
		let poll = async {
			loop {
				if self.ping().await == PingStatus::Ready {
					return;
				}
				tokio::time::sleep(interval).await;
			}
		};
		tokio::time::timeout(timeout, poll).await.is_ok()
	}

	/// Asks the server to exit. Fire and forget: every failure is ignored.
	pub async fn send_stop(&self) {
		let Ok(mut stream) = TcpStream::connect(self.addr).await else {
			return;
		};
		let request = Request::new(self.client, Operation::Exit);
		if let Err(e) = framing::write_request(&mut stream, &request).await {
			tracing::debug!(error = %e, "Failed to send exit to analysis server");
		}
		let _ = stream.shutdown().await;
	}
}

async fn exchange(stream: TcpStream, request: &Request) -> Result<Response> {
	let (reader, mut writer) = stream.into_split();
	framing::write_request(&mut writer, request).await?;
	writer.shutdown().await?;
	let mut reader = BufReader::new(reader);
	Ok(framing::read_response(&mut reader).await?)
}

#[cfg(test)]
mod tests;
