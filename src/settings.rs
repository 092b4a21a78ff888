//! Settings for the coordinator, loaded from a config file and overridden by
//! environment variables and CLI flags, mirroring the `config` + `clap`
//! layering the teacher uses for its own `Settings`/`CommandLineOptions`.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Vault {
	pub rpc_url: String,
	pub signer_seed: String,
	pub contract_address: String,
	#[serde(default = "default_custodial_para_id")]
	pub custodial_para_id: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Proxy {
	pub rpc_url: String,
	pub signer_key: String,
	pub contract_address: String,
	pub xtokens_address: String,
	pub xcm_transactor_address: String,
	pub xcm_address: String,
	#[serde(default = "default_execution_para_id")]
	pub execution_para_id: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryPolicySettings {
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_base_delay_ms")]
	pub base_delay_ms: u64,
	#[serde(default = "default_backoff_multiplier")]
	pub backoff_multiplier: u32,
	#[serde(default = "default_max_delay_ms")]
	pub max_delay_ms: u64,
}

impl Default for RetryPolicySettings {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			base_delay_ms: default_base_delay_ms(),
			backoff_multiplier: default_backoff_multiplier(),
			max_delay_ms: default_max_delay_ms(),
		}
	}
}

fn default_max_attempts() -> u32 {
	3
}
fn default_base_delay_ms() -> u64 {
	1000
}
fn default_backoff_multiplier() -> u32 {
	2
}
fn default_max_delay_ms() -> u64 {
	30_000
}
fn default_execution_para_id() -> u32 {
	2004
}
fn default_custodial_para_id() -> u32 {
	1000
}
fn default_true() -> bool {
	true
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthCheck {
	#[serde(default = "default_health_hostname")]
	pub hostname: String,
	#[serde(default = "default_health_port")]
	pub port: u16,
}

fn default_health_hostname() -> String {
	"0.0.0.0".to_string()
}
fn default_health_port() -> u16 {
	5555
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
	pub vault: Vault,
	pub proxy: Proxy,
	pub database_url: String,

	#[serde(default = "default_true")]
	pub blockchain_events_auto_start: bool,

	#[serde(default)]
	pub test_mode: bool,

	#[serde(default = "default_environment")]
	pub environment: String,

	#[serde(default)]
	pub enable_passethub_transact_settlement: bool,

	#[serde(default)]
	pub retry: RetryPolicySettings,

	#[serde(default = "default_health_check")]
	pub health_check: HealthCheck,
}

fn default_environment() -> String {
	"production".to_string()
}

fn default_health_check() -> HealthCheck {
	HealthCheck { hostname: default_health_hostname(), port: default_health_port() }
}

impl Settings {
	/// Derives the effective test-mode flag the way the Test-Mode
	/// Controller is specified to: an explicit flag OR a development/test
	/// environment.
	pub fn effective_test_mode(&self) -> bool {
		self.test_mode || matches!(self.environment.as_str(), "development" | "test")
	}

	pub fn new(command_line_opts: &CommandLineOptions) -> Result<Self, ConfigError> {
		let mut builder = Config::builder();

		if let Some(path) = &command_line_opts.config_path {
			builder = builder.add_source(File::with_name(path));
		} else {
			builder = builder.add_source(File::with_name("config/default").required(false));
		}

		builder = builder.add_source(
			Environment::default().separator("__").try_parsing(true).prefix_separator("_"),
		);

		let config = builder.build()?;
		config.try_deserialize()
	}

	#[cfg(test)]
	pub fn new_test() -> Self {
		Settings {
			vault: Vault {
				rpc_url: "ws://localhost:9944".into(),
				signer_seed: "//Alice".into(),
				contract_address: "0x0000000000000000000000000000000000000000".into(),
				custodial_para_id: default_custodial_para_id(),
			},
			proxy: Proxy {
				rpc_url: "ws://localhost:9933".into(),
				signer_key: "0x0000000000000000000000000000000000000000000000000000000000000001"
					.into(),
				contract_address: "0x1111111111111111111111111111111111111111".into(),
				xtokens_address: "0x2222222222222222222222222222222222222222".into(),
				xcm_transactor_address: "0x3333333333333333333333333333333333333333".into(),
				xcm_address: "0x4444444444444444444444444444444444444444".into(),
				execution_para_id: default_execution_para_id(),
			},
			database_url: "sqlite::memory:".into(),
			blockchain_events_auto_start: true,
			test_mode: true,
			environment: "test".into(),
			enable_passethub_transact_settlement: false,
			retry: RetryPolicySettings::default(),
			health_check: default_health_check(),
		}
	}
}

/// Command line overrides layered on top of the config file, matching the
/// teacher's `CommandLineOptions` + `clap`/`env` pattern.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct CommandLineOptions {
	#[clap(long = "config-path", env = "CONFIG_PATH")]
	pub config_path: Option<String>,

	#[clap(long = "log-json", env = "LOG_JSON")]
	pub log_json: bool,
}
