//! Coordinator binary entrypoint.
//!
//! Wires every component in the order the off-chain coordinator is
//! specified to start in: settings, logging, the persisted store, the
//! two chain clients, the Test-Mode Controller's initial sync, the
//! Event Listener, the Persister's handlers, the Dispatcher and
//! Settlement Coordinator, and finally the health endpoint, before
//! optionally starting to listen and waiting for a shutdown signal.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use liquidot_coordinator::{
	chain_proxy::ProxyClient,
	chain_vault::VaultClient,
	dispatcher::Dispatcher,
	health::HealthChecker,
	listener::EventListener,
	logging,
	persister::{Persister, Repository},
	retry::RetryPolicy,
	settings::{CommandLineOptions, Settings},
	settlement::SettlementCoordinator,
	testmode::TestModeController,
};

#[tokio::main]
async fn main() {
	let command_line_opts = CommandLineOptions::parse();

	let settings = match Settings::new(&command_line_opts) {
		Ok(settings) => settings,
		Err(error) => {
			eprintln!("error reading settings: {error}");
			std::process::exit(1);
		},
	};

	logging::init(command_line_opts.log_json);
	info!("starting coordinator");

	let cancellation = CancellationToken::new();
	let retry_policy = RetryPolicy::from(&settings.retry);

	let repository = match Repository::connect(&settings.database_url).await {
		Ok(repository) => repository,
		Err(error) => {
			error!(%error, "failed to connect to database");
			std::process::exit(1);
		},
	};
	if let Err(error) = repository.migrate().await {
		error!(%error, "failed to run database migrations");
		std::process::exit(1);
	}
	let repository = Arc::new(repository);

	let vault = match VaultClient::new(&settings.vault, retry_policy.clone(), cancellation.clone()) {
		Ok(vault) => Arc::new(vault),
		Err(error) => {
			error!(%error, "failed to construct vault client");
			std::process::exit(1);
		},
	};

	let proxy = match ProxyClient::new(&settings.proxy, retry_policy.clone(), cancellation.clone()) {
		Ok(proxy) => Arc::new(proxy),
		Err(error) => {
			error!(%error, "failed to construct proxy client");
			std::process::exit(1);
		},
	};

	let test_mode = Arc::new(TestModeController::new(settings.effective_test_mode()));
	let initial_sync = test_mode.sync(&vault, &proxy).await;
	if !initial_sync.success {
		error!(errors = ?initial_sync.errors, "initial test-mode sync reported failures, continuing anyway");
	}

	let listener = Arc::new(EventListener::new(vault.clone(), proxy.clone()));

	let persister = Arc::new(Persister::new(repository.clone()));
	let settlement = Arc::new(SettlementCoordinator::new(
		vault.clone(),
		proxy.clone(),
		test_mode.clone(),
		settings.vault.contract_address.clone(),
		settings.vault.custodial_para_id,
		settings.enable_passethub_transact_settlement,
		!settings.proxy.xcm_transactor_address.is_empty(),
	));
	listener.register_handlers(persister.handlers_with_settlement(&settlement)).await;

	// The Dispatcher is the entry point an embedding API layer invokes on
	// operator-issued deposit/withdraw requests; it holds no background
	// task of its own and is exposed for that embedding, not called here.
	let dispatcher = Dispatcher::new(vault.clone(), &settings.vault, &settings.proxy);
	let _ = &dispatcher;

	let health_checker = match HealthChecker::new(&settings.health_check).await {
		Ok(checker) => checker,
		Err(error) => {
			error!(%error, "failed to start health endpoint");
			std::process::exit(1);
		},
	};
	tokio::spawn(async move {
		if let Err(error) = health_checker.run().await {
			error!(%error, "health endpoint stopped unexpectedly");
		}
	});

	if settings.blockchain_events_auto_start {
		listener.start_listening().await;
	}

	wait_for_shutdown_signal().await;
	info!("shutdown signal received, stopping");

	cancellation.cancel();
	listener.stop_listening().await;
	repository.close().await;

	info!("coordinator stopped");
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
