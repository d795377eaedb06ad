use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use schemagate::{
	Hook, HookConfig, HookContext, HookError, JsonSchemaEngine, ProviderAbsent, RegistryStore, Violation,
	schema_validator, validate_schema_and_set_defaults,
};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run one hook invocation through the configured validation pipeline
#[derive(Parser, Debug)]
#[command(name = "schemagate", version, about)]
struct Args {
	/// Hook configuration (YAML or JSON)
	#[arg(short, long, value_name = "FILE")]
	config: PathBuf,

	/// Invocation context as JSON, `-` for stdin
	#[arg(long, value_name = "FILE", default_value = "-")]
	context: String,

	/// Validate only, skip default injection
	#[arg(long)]
	validate_only: bool,

	/// Treat calls without a transport provider as trusted
	#[arg(long)]
	trust_internal: bool,

	/// Emit logs as JSON
	#[arg(long)]
	log_json: bool,
}

/// Result of one invocation as the CLI reports it
#[derive(Debug)]
enum Outcome {
	Accepted(HookContext),
	Rejected(Vec<Violation>),
}

impl Outcome {
	fn exit_code(&self) -> ExitCode {
		match self {
			Outcome::Accepted(_) => ExitCode::SUCCESS,
			Outcome::Rejected(_) => ExitCode::FAILURE,
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();
	init_tracing(args.log_json);

	let config = HookConfig::from_file(&args.config)?;
	let ctx = read_context(&args.context).await?;
	info!(resource = %config.resource, method = %ctx.method, phase = %ctx.phase, "running hooks");

	let hook = build_hook(&args, &config)?;
	let outcome = run(hook.as_ref(), ctx).await?;
	match &outcome {
		Outcome::Accepted(ctx) => println!("{}", serde_json::to_string_pretty(ctx)?),
		Outcome::Rejected(violations) => eprintln!("{}", serde_json::to_string_pretty(violations)?),
	}
	Ok(outcome.exit_code())
}

/// Register the configured declaration and assemble the stage the flags ask for
fn build_hook(args: &Args, config: &HookConfig) -> Result<Box<dyn Hook>, HookError> {
	let store = RegistryStore::new();
	let engine = JsonSchemaEngine::new(config.engine.clone());
	let declaration = config.declaration()?;

	let hook: Box<dyn Hook> = if args.validate_only {
		let validator = schema_validator(&store, declaration, &config.resource, engine)?;
		if args.trust_internal {
			Box::new(validator.with_trusted_source(ProviderAbsent))
		} else {
			Box::new(validator)
		}
	} else {
		let pipeline =
			validate_schema_and_set_defaults(&store, declaration, config.default_declaration(), &config.resource, engine)?;
		if args.trust_internal {
			Box::new(pipeline.with_trusted_source(ProviderAbsent))
		} else {
			Box::new(pipeline)
		}
	};
	Ok(hook)
}

/// Rejections become an outcome; every other failure stays an error
async fn run(hook: &dyn Hook, ctx: HookContext) -> Result<Outcome, HookError> {
	match hook.call(ctx).await {
		Ok(ctx) => Ok(Outcome::Accepted(ctx)),
		Err(HookError::Validation { violations }) => Ok(Outcome::Rejected(violations)),
		Err(e) => Err(e),
	}
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
	if json {
		builder.json().init();
	} else {
		builder.init();
	}
}

async fn read_context(source: &str) -> anyhow::Result<HookContext> {
	let content = if source == "-" {
		let mut content = String::new();
		tokio::io::stdin()
			.read_to_string(&mut content)
			.await
			.context("reading context from stdin")?;
		content
	} else {
		fs_err::tokio::read_to_string(source).await?
	};
	serde_json::from_str(&content).context("parsing invocation context")
}
