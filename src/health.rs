//! Liveness endpoint for process supervisors.
//!
//! Returns a bare HTTP 200 to any request on `/health`, matching the
//! teacher's hand-rolled `httparse` based health checker rather than
//! pulling in a full HTTP server framework for a single endpoint.

use anyhow::Context;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
};
use tracing::{info, info_span, warn};

use crate::settings;

pub struct HealthChecker {
	listener: TcpListener,
}

impl HealthChecker {
	pub async fn new(settings: &settings::HealthCheck) -> anyhow::Result<Self> {
		let bind_address = format!("{}:{}", settings.hostname, settings.port);
		let span = info_span!("health-check", bind_address = %bind_address);
		let _enter = span.enter();
		info!("starting");

		Ok(Self {
			listener: TcpListener::bind(&bind_address)
				.await
				.with_context(|| format!("could not bind TCP listener to {bind_address}"))?,
		})
	}

	pub async fn run(self) -> anyhow::Result<()> {
		loop {
			match self.listener.accept().await {
				Ok((mut stream, _addr)) => {
					let mut buffer = [0u8; 1024];
					if stream.read(&mut buffer).await.is_err() {
						continue;
					}

					let mut headers = [httparse::EMPTY_HEADER; 16];
					let mut request = httparse::Request::new(&mut headers);

					match request.parse(&buffer) {
						Ok(_) if request.path == Some("/health") => {
							let _ = stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
							let _ = stream.flush().await;
						},
						Ok(_) => {
							warn!(path = ?request.path, "requested health at invalid path");
						},
						Err(error) => {
							warn!(%error, "invalid health check request");
						},
					}
				},
				Err(error) => {
					warn!(%error, "could not accept health check connection");
				},
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn health_endpoint_returns_200() {
		let settings = settings::HealthCheck { hostname: "127.0.0.1".into(), port: 0 };
		let checker = HealthChecker::new(&settings).await.unwrap();
		let bound_port = checker.listener.local_addr().unwrap().port();
		tokio::spawn(checker.run());

		let response = reqwest::get(format!("http://127.0.0.1:{bound_port}/health"))
			.await
			.unwrap();
		assert_eq!(response.status(), reqwest::StatusCode::OK);

		let not_found = reqwest::get(format!("http://127.0.0.1:{bound_port}/nope")).await;
		assert!(not_found.is_err() || !not_found.unwrap().status().is_success());
	}
}
