//! tenant-forge - run one SQL script against a fleet of PostgreSQL databases.

use std::path::{Path, PathBuf};

use tenant_forge::cli::{CheckArgs, Cli, Command, OutputFormat, ProjectCommand, RunArgs};
use tenant_forge::config::Config;
use tenant_forge::descriptor::{parse_connections, ConnectionDescriptor};
use tenant_forge::error::{ForgeError, Result};
use tenant_forge::exec::{ExecutionResult, FanoutExecutor};
use tenant_forge::persistence::{projects, StateDb};
use tracing::error;

#[tokio::main]
async fn main() {
    tenant_forge::logging::init_stderr_logging();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(2);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    let config = Config::load_from_file(&cli.config_path())?;

    match cli.command {
        Command::Run(args) => run_script(args, &config).await,
        Command::Check(args) => check_connections(&args),
        Command::Project(command) => {
            handle_project(command, &config).await?;
            Ok(0)
        }
    }
}

/// Executes the script against the selected targets and prints the results.
/// Exit code 0 when every target succeeded, 1 when any failed.
async fn run_script(args: RunArgs, config: &Config) -> Result<i32> {
    let format: OutputFormat = args
        .format
        .parse()
        .map_err(ForgeError::validation)?;

    let project = match &args.project {
        Some(name) => {
            let state_db = open_state_db(config).await?;
            let project = projects::get_project(state_db.pool(), name)
                .await?
                .ok_or_else(|| ForgeError::validation(format!("Project '{name}' not found")))?;
            state_db.close().await;
            Some(project)
        }
        None => None,
    };

    let script = resolve_script(&args, project.as_ref())?;
    let block = resolve_connection_block(&args, project.as_ref())?;

    let mut targets = parse_connections(&block)?;
    if let Some(only) = args.only_ids() {
        targets = filter_targets(targets, &only)?;
    }

    let mut options = config.executor.to_options();
    if let Some(secs) = args.connect_timeout_secs {
        options.connect_timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(secs) = args.timeout_secs {
        options.statement_timeout = std::time::Duration::from_secs(secs);
    }
    if args.max_concurrency.is_some() {
        options.max_concurrency = args.max_concurrency;
    }

    let executor = FanoutExecutor::postgres(options);
    let results = executor.execute(&script, &targets).await?;

    print_results(&results, format)?;

    let all_succeeded = results.iter().all(|r| r.success);
    Ok(if all_succeeded { 0 } else { 1 })
}

/// Resolves the SQL script from flags, falling back to the project's saved
/// script.
fn resolve_script(args: &RunArgs, project: Option<&projects::Project>) -> Result<String> {
    if let Some(sql) = &args.sql {
        return Ok(sql.clone());
    }
    if let Some(path) = &args.script {
        return read_file(path, "script");
    }
    if let Some(script) = project.and_then(|p| p.script.clone()) {
        return Ok(script);
    }
    Err(ForgeError::validation(
        "No SQL script provided. Use --script, --sql, or a project with a saved script.",
    ))
}

/// Resolves the connection block from flags, falling back to the project's
/// saved block.
fn resolve_connection_block(args: &RunArgs, project: Option<&projects::Project>) -> Result<String> {
    if let Some(path) = &args.env {
        return read_file(path, "connection block");
    }
    if let Some(block) = project.and_then(|p| p.connections.clone()) {
        return Ok(block);
    }
    Err(ForgeError::validation(
        "No connections provided. Use --env or a project with a saved connection block.",
    ))
}

/// Keeps only the targets named in `--only`, rejecting unknown ids so typos
/// fail loudly instead of silently shrinking the fleet.
fn filter_targets(
    targets: Vec<ConnectionDescriptor>,
    only: &[String],
) -> Result<Vec<ConnectionDescriptor>> {
    let unknown: Vec<&String> = only
        .iter()
        .filter(|id| !targets.iter().any(|t| &t.id == *id))
        .collect();
    if !unknown.is_empty() {
        let names: Vec<&str> = unknown.iter().map(|s| s.as_str()).collect();
        return Err(ForgeError::validation(format!(
            "Unknown connection id(s): {}",
            names.join(", ")
        )));
    }

    Ok(targets
        .into_iter()
        .filter(|t| only.contains(&t.id))
        .collect())
}

fn print_results(results: &[ExecutionResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(results)
                .map_err(|e| ForgeError::internal(format!("Failed to serialize results: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            for result in results {
                let marker = if result.success { "ok" } else { "FAILED" };
                let rows = result
                    .rows_affected
                    .map(|n| format!(", {n} row(s) affected"))
                    .unwrap_or_default();
                println!(
                    "[{marker}] {} ({} ms{rows}): {}",
                    result.connection_id,
                    result.elapsed.as_millis(),
                    result.message
                );
            }
            let successful = results.iter().filter(|r| r.success).count();
            println!(
                "{} target(s): {} succeeded, {} failed",
                results.len(),
                successful,
                results.len() - successful
            );
        }
    }
    Ok(())
}

/// Parses a connection block file and reports the targets without connecting.
fn check_connections(args: &CheckArgs) -> Result<i32> {
    let content = read_file(&args.env, "connection block")?;
    let targets = parse_connections(&content)?;

    if targets.is_empty() {
        println!("No connections found.");
        return Ok(0);
    }

    for target in &targets {
        println!("{}: {}", target.id, target.display_string());
    }
    println!("{} connection(s) parsed.", targets.len());
    Ok(0)
}

async fn handle_project(command: ProjectCommand, config: &Config) -> Result<()> {
    let state_db = open_state_db(config).await?;
    let result = dispatch_project(command, &state_db).await;
    state_db.close().await;
    result
}

async fn dispatch_project(command: ProjectCommand, state_db: &StateDb) -> Result<()> {
    match command {
        ProjectCommand::Create {
            name,
            description,
            tags,
        } => {
            let project =
                projects::create_project(state_db.pool(), &name, &description, &tags).await?;
            println!("Created project '{}'", project.name);
        }
        ProjectCommand::List => {
            let all = projects::list_projects(state_db.pool()).await?;
            if all.is_empty() {
                println!("No projects.");
            }
            for project in all {
                let tags = if project.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", project.tags.join(", "))
                };
                println!("{}{tags} - {}", project.name, project.description);
            }
        }
        ProjectCommand::Show { name } => {
            let project = projects::get_project(state_db.pool(), &name)
                .await?
                .ok_or_else(|| ForgeError::validation(format!("Project '{name}' not found")))?;
            println!("name: {}", project.name);
            println!("description: {}", project.description);
            println!("tags: {}", project.tags.join(", "));
            println!("updated: {}", project.updated_at);
            if let Some(block) = &project.connections {
                match parse_connections(block) {
                    Ok(targets) => {
                        println!("connections ({}):", targets.len());
                        for target in targets {
                            println!("  {}: {}", target.id, target.display_string());
                        }
                    }
                    Err(e) => println!("connections: invalid block ({e})"),
                }
            } else {
                println!("connections: none");
            }
            match &project.script {
                Some(script) => println!("script:\n{script}"),
                None => println!("script: none"),
            }
        }
        ProjectCommand::Save { name, env, script } => {
            let block = env
                .as_deref()
                .map(|path| read_file(path, "connection block"))
                .transpose()?;
            if let Some(block) = &block {
                // Reject unparseable blocks at save time, not at run time.
                parse_connections(block)?;
            }
            let script_text = script
                .as_deref()
                .map(|path| read_file(path, "script"))
                .transpose()?;
            if block.is_none() && script_text.is_none() {
                return Err(ForgeError::validation(
                    "Nothing to save. Provide --env and/or --script.",
                ));
            }
            projects::save_project(
                state_db.pool(),
                &name,
                block.as_deref(),
                script_text.as_deref(),
            )
            .await?;
            println!("Saved project '{name}'");
        }
        ProjectCommand::Delete { name } => {
            projects::delete_project(state_db.pool(), &name).await?;
            println!("Deleted project '{name}'");
        }
    }
    Ok(())
}

async fn open_state_db(config: &Config) -> Result<StateDb> {
    let path: PathBuf = match &config.state_db_path {
        Some(path) => path.clone(),
        None => StateDb::default_path()?,
    };
    StateDb::open(&path).await
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ForgeError::validation(format!("Failed to read {what} file {}: {e}", path.display()))
    })
}
