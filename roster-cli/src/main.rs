use clap::{Parser, Subcommand, ValueEnum};
use roster::{
    parse_config, FilterParams, FilterValue, ListViewController, MemoryBackend, OptionTree,
    Persistence, RecordingNotifier, RestClient, RosterConfig, RosterError, SortDirection,
    ViewConfig, SEARCH_FILTER,
};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;
use std::process;

/// roster: browse and prune school record lists from the command line
#[derive(Parser)]
#[command(name = "roster", version, about)]
struct Cli {
    /// Path to the view configuration
    #[arg(long, default_value = "roster.yaml")]
    config: PathBuf,

    /// Name of the view to open
    #[arg(long)]
    view: String,

    /// Override the REST base URL from the config
    #[arg(long, conflicts_with = "data_file")]
    base_url: Option<String>,

    /// Serve rows from a JSON array file instead of the REST backend.
    /// Deletes are written back to the file.
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Option tree JSON for cascading selects when using --data-file
    #[arg(long, requires = "data_file")]
    tree_file: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Show one page of the view
    List {
        /// Free-text search over the view's search fields
        #[arg(long)]
        search: Option<String>,
        /// Filter values (e.g. --filter day=Monday)
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Date range filters (e.g. --range due=2024-01-01..2024-03-31)
        #[arg(long = "range", value_parser = parse_key_value)]
        ranges: Vec<(String, String)>,
        /// Cascade selections, parent first (e.g. --select class=3)
        #[arg(long = "select", value_parser = parse_key_value)]
        selects: Vec<(String, String)>,
        /// Sort key from the view's sorts
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Rows per page (defaults to the view's page_size)
        #[arg(long)]
        page_size: Option<usize>,
        /// Server-side query parameters (e.g. --param school=2)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// Also print row counts per value of this field
        #[arg(long)]
        counts: Option<String>,
    },

    /// Delete one or more records by id
    Delete {
        /// Record ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show the cascading select options for the view
    Options {
        /// Cascade selections, parent first (e.g. --select class=3)
        #[arg(long = "select", value_parser = parse_key_value)]
        selects: Vec<(String, String)>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = parse_config(&cli.config)?;
    let view = config.view(&cli.view)?.clone();

    let (output, failure) = match &cli.data_file {
        Some(path) => {
            let mut backend = MemoryBackend::from_json_file(&view.resource, path)?;
            if let (Some(tree_file), Some(cascade)) = (&cli.tree_file, &view.cascade) {
                let content = std::fs::read_to_string(tree_file).map_err(|e| {
                    format!("Failed to read tree file '{}': {e}", tree_file.display())
                })?;
                let tree: OptionTree = serde_json::from_str(&content)?;
                backend = backend.with_tree(&cascade.tree, tree);
            }
            let output = execute(cli.command, &view, backend.clone()).await;
            backend.save_json_file(&view.resource, path)?;
            output?
        }
        None => {
            let client = rest_client(&config, cli.base_url.as_deref())?;
            execute(cli.command, &view, client).await?
        }
    };

    print_output(&output, &cli.format)?;
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn rest_client(
    config: &RosterConfig,
    base_url: Option<&str>,
) -> Result<RestClient, Box<dyn Error>> {
    let client = match (&config.rest, base_url) {
        (Some(rest), Some(url)) => {
            let mut rest = rest.clone();
            rest.base_url = url.to_string();
            RestClient::from_config(&rest)?
        }
        (Some(rest), None) => RestClient::from_config(rest)?,
        (None, Some(url)) => RestClient::new(url)?,
        (None, None) => {
            return Err("No backend: set rest.base_url or pass --base-url or --data-file".into());
        }
    };
    Ok(client)
}

/// Run one command against the view. A failed delete still yields its output
/// alongside the error so partial progress is shown.
async fn execute<P: Persistence>(
    command: Command,
    view: &ViewConfig,
    backend: P,
) -> Result<(Value, Option<RosterError>), Box<dyn Error>> {
    let notifier = RecordingNotifier::new();
    let mut controller = ListViewController::from_config(view, backend, notifier.clone())?;

    let mut failure = None;
    let result = match command {
        Command::List {
            search,
            filters,
            ranges,
            selects,
            sort,
            desc,
            page,
            page_size,
            params,
            counts,
        } => {
            let params: FilterParams = params.into_iter().collect();
            controller.refresh(&params).await?;

            if !selects.is_empty() {
                controller.load_cascade().await?;
                for (level, value) in &selects {
                    controller.select_option(level, Some(value.as_str()))?;
                }
            }
            if let Some(search) = search {
                controller.set_filter(SEARCH_FILTER, search)?;
            }
            for (key, value) in filters {
                controller.set_filter(&key, value)?;
            }
            for (key, range) in ranges {
                controller.set_filter(&key, FilterValue::parse_range(&range)?)?;
            }
            if let Some(sort) = sort {
                let direction = if desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                };
                controller.set_sort(&sort, direction)?;
            }
            if let Some(size) = page_size {
                controller.set_page_size(size)?;
            }
            controller.set_page(page);

            let mut output = serde_json::to_value(controller.snapshot())?;
            if let (Some(field), Some(map)) = (counts, output.as_object_mut()) {
                map.insert("counts".into(), json!(controller.status_counts(&field)));
            }
            output
        }

        Command::Delete { ids } => {
            controller.refresh(&FilterParams::new()).await?;
            let outcome = match ids.as_slice() {
                [id] => controller.request_delete_one(id).await?,
                _ => controller.request_delete_many(ids.as_slice()).await?,
            };
            failure = outcome.error;
            json!({
                "deleted": outcome.deleted,
                "failed": outcome.failed,
                "notifications": notifier.take(),
            })
        }

        Command::Options { selects } => {
            controller.load_cascade().await?;
            for (level, value) in &selects {
                controller.select_option(level, Some(value.as_str()))?;
            }
            let chain = controller
                .cascade()
                .ok_or("View has no cascading selects")?;
            let levels: Vec<Value> = chain
                .level_names()
                .map(|name| {
                    json!({
                        "level": name,
                        "value": chain.value(name),
                        "options": chain.options(name),
                    })
                })
                .collect();
            json!(levels)
        }
    };

    let notifications = notifier.take();
    for notification in &notifications {
        log::info!("{:?}: {}", notification.level, notification.message);
    }
    Ok((result, failure))
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
