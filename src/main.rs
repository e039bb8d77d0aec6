use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::error;

use noco_odoo_sync::config;
use noco_odoo_sync::model::{
    ContactFields, CustomerInput, ProductFields, ProductUpsert, RecordKind,
};
use noco_odoo_sync::service::{ServiceResult, SyncService};

/// Exit code when a batch ran but some records failed.
const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Parser)]
#[command(author, version, about = "Push NocoDB products and contacts into Odoo")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Service(ServiceCommand),
    /// Print an example config file
    ExampleConfig,
}

/// Commands that talk to Odoo, NocoDB or Gemini.
#[derive(Debug, Subcommand)]
enum ServiceCommand {
    /// Sync a table (or both) from NocoDB into Odoo
    Sync {
        #[arg(value_enum)]
        target: SyncTarget,
        /// Only rows whose sync_status is empty or pending
        #[arg(long)]
        only_pending: bool,
    },
    /// Single product operations
    #[command(subcommand)]
    Product(RecordCommand),
    /// Single contact operations
    #[command(subcommand)]
    Contact(RecordCommand),
    /// Batch create-or-update keyed by business codes
    #[command(subcommand)]
    Upsert(UpsertCommand),
    /// Reference data from Odoo
    Reference {
        #[arg(value_enum)]
        kind: ReferenceKind,
    },
    /// Product copy generation
    #[command(subcommand)]
    Ai(AiCommand),
    /// Check Odoo and NocoDB connectivity
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SyncTarget {
    Products,
    Contacts,
    All,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReferenceKind {
    Categories,
    Taxes,
    Countries,
}

#[derive(Debug, Subcommand)]
enum RecordCommand {
    /// Create directly in Odoo from JSON fields
    Create(JsonInput),
    /// Read one record by Odoo id
    Get { id: i64 },
}

#[derive(Debug, Subcommand)]
enum UpsertCommand {
    /// Products matched on internal reference
    Products {
        #[command(flatten)]
        input: JsonInput,
        /// Generate missing product names
        #[arg(long)]
        generate_ai: bool,
    },
    /// Customers matched on GST number
    Customers {
        #[command(flatten)]
        input: JsonInput,
    },
}

#[derive(Debug, Subcommand)]
enum AiCommand {
    Name {
        #[arg(long)]
        code: String,
        #[arg(long)]
        machine: String,
        #[arg(long)]
        size: Option<String>,
    },
    Description {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        specs: Option<String>,
    },
}

#[derive(Debug, ClapArgs)]
struct JsonInput {
    /// Inline JSON
    #[arg(long, conflicts_with = "file")]
    data: Option<String>,
    /// Path to a JSON file
    #[arg(long)]
    file: Option<PathBuf>,
}

impl JsonInput {
    fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        match (&self.data, &self.file) {
            (Some(data), _) => serde_json::from_str(data).context("invalid --data JSON"),
            (None, Some(path)) => read_json(path),
            (None, None) => bail!("one of --data or --file is required"),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the result and pick the exit code.
fn finish<T: Serialize>(result: ServiceResult<T>) -> Result<i32> {
    match result {
        Ok(value) => {
            emit(&value)?;
            Ok(0)
        }
        Err(err) => {
            error!(%err, "operation failed");
            emit(&json!({"success": false, "error": err.to_string()}))?;
            Ok(err.exit_code())
        }
    }
}

fn batch_code(success: bool) -> i32 {
    if success {
        0
    } else {
        EXIT_PARTIAL
    }
}

async fn run(service: &SyncService, command: ServiceCommand) -> Result<i32> {
    match command {
        ServiceCommand::Sync {
            target,
            only_pending,
        } => {
            let kind = match target {
                SyncTarget::Products => RecordKind::Product,
                SyncTarget::Contacts => RecordKind::Contact,
                SyncTarget::All => {
                    let summary = service.sync_all(only_pending).await;
                    emit(&summary)?;
                    return Ok(batch_code(summary.success));
                }
            };
            let summary = service.sync(kind, only_pending).await;
            emit(&summary)?;
            Ok(batch_code(summary.success))
        }
        ServiceCommand::Product(RecordCommand::Create(input)) => {
            let fields: ProductFields = input.parse()?;
            finish(service.create_product(&fields).await)
        }
        ServiceCommand::Product(RecordCommand::Get { id }) => {
            finish(service.get_product(id).await)
        }
        ServiceCommand::Contact(RecordCommand::Create(input)) => {
            let fields: ContactFields = input.parse()?;
            finish(service.create_contact(&fields).await)
        }
        ServiceCommand::Contact(RecordCommand::Get { id }) => {
            finish(service.get_contact(id).await)
        }
        ServiceCommand::Upsert(UpsertCommand::Products { input, generate_ai }) => {
            let items: Vec<ProductUpsert> = input.parse()?;
            let response = service.upsert_products(&items, generate_ai).await;
            match response {
                Ok(ref r) if !r.success => {
                    emit(r)?;
                    Ok(EXIT_PARTIAL)
                }
                other => finish(other),
            }
        }
        ServiceCommand::Upsert(UpsertCommand::Customers { input }) => {
            let items: Vec<CustomerInput> = input.parse()?;
            let response = service.upsert_customers(&items).await;
            match response {
                Ok(ref r) if !r.success => {
                    emit(r)?;
                    Ok(EXIT_PARTIAL)
                }
                other => finish(other),
            }
        }
        ServiceCommand::Reference { kind } => match kind {
            ReferenceKind::Categories => finish(service.categories().await),
            ReferenceKind::Taxes => finish(service.taxes().await),
            ReferenceKind::Countries => finish(service.countries().await),
        },
        ServiceCommand::Ai(AiCommand::Name {
            code,
            machine,
            size,
        }) => {
            let name = service
                .ai()
                .generate_product_name(&code, &machine, size.as_deref())
                .await;
            emit(&json!({"success": true, "name": name}))?;
            Ok(0)
        }
        ServiceCommand::Ai(AiCommand::Description {
            name,
            category,
            specs,
        }) => {
            let description = service
                .ai()
                .generate_product_description(&name, category.as_deref(), specs.as_deref())
                .await;
            emit(&json!({"success": true, "description": description}))?;
            Ok(0)
        }
        ServiceCommand::Health => {
            let report = service.health().await;
            emit(&report)?;
            Ok(batch_code(report.odoo && report.nocodb))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let command = match args.command {
        Command::ExampleConfig => {
            print!("{}", config::example());
            return Ok(());
        }
        Command::Service(command) => command,
    };

    let cfg = config::load(Some(&args.config))?;
    let service = noco_odoo_sync::build_service(&cfg)?;
    let code = run(&service, command).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
