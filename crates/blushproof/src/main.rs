//! `blushctl` - CLI for blushproof
//!
//! This binary checks and edits the blushproof state of a profile and builds
//! the lists and filters that ship with it.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use blushproof::cli::{
    BloomCommand, CheckCommand, Cli, Command, ConfigCommand, MakeListCommand, WhitelistCommand,
};
use blushproof::telemetry::{ChannelSink, EventSink, NullSink, TelemetryEvent};
use blushproof::{
    build_shipped_list, init_logging, BloomFilter, Categorizer, Category, Config, ShippedLists,
    SqliteStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Check(cmd) => with_categorizer(&config, |c| handle_check(c, &cmd)),
        Command::Whitelist(cmd) => with_categorizer(&config, |c| {
            match &cmd {
                WhitelistCommand::Host { host } => {
                    c.whitelist_host(host)?;
                    println!("Whitelisted {host}");
                }
                WhitelistCommand::Query { query } => {
                    c.whitelist_query(query)?;
                    println!("Whitelisted query \"{query}\"");
                }
            }
            Ok(())
        }),
        Command::Blush(cmd) => with_categorizer(&config, |c| {
            c.add_to_blushlist(&cmd.host)?;
            println!("Added {} to the blushlist", cmd.host);
            Ok(())
        }),
        Command::Forget(cmd) => with_categorizer(&config, |c| {
            c.forget_site(&cmd.host)?;
            println!("Forgot {}", cmd.host);
            Ok(())
        }),
        Command::Consent(cmd) => with_categorizer(&config, |c| {
            c.resolve_consent(&cmd.host, cmd.query.as_deref(), cmd.choice.into())?;
            Ok(())
        }),
        Command::Status(cmd) => with_categorizer(&config, |c| handle_status(c, cmd.json)),
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::MakeList(cmd) => handle_make_list(&cmd),
        Command::Bloom(cmd) => handle_bloom(cmd),
    }
}

/// Open the profile's categorizer, run `f`, then log any telemetry events it
/// queued.
fn with_categorizer<F>(config: &Config, f: F) -> Result<()>
where
    F: FnOnce(&mut Categorizer<SqliteStore>) -> Result<()>,
{
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    let shipped = ShippedLists::from_config(&config.lists).context("failed to load lists")?;

    let (sink, rx) = if config.telemetry.enabled {
        let (sink, rx) = ChannelSink::channel(config.telemetry.queue_capacity);
        (Box::new(sink) as Box<dyn EventSink>, Some(rx))
    } else {
        (Box::new(NullSink) as Box<dyn EventSink>, None)
    };

    let mut categorizer = Categorizer::open(store, config, &shipped, sink)?;
    let result = f(&mut categorizer);

    if let Some(rx) = rx {
        drop(categorizer);
        report_events(rx);
    }
    result
}

fn report_events(mut rx: mpsc::Receiver<TelemetryEvent>) {
    while let Ok(event) = rx.try_recv() {
        info!(event = %event.event, hour = %event.timestamp, "Telemetry event");
    }
}

fn handle_check(categorizer: &Categorizer<SqliteStore>, cmd: &CheckCommand) -> Result<()> {
    let decision = categorizer.decide(&cmd.host, cmd.query.as_deref())?;

    if cmd.json {
        let output = serde_json::json!({
            "blushy": decision.blushy,
            "category": decision.category,
            "excused": decision.excused,
            "intercept": decision.should_intercept(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Host:      {}", cmd.host);
        if let Some(query) = &cmd.query {
            println!("Query:     {query}");
        }
        println!("Blushy:    {}", yes_no(decision.blushy));
        println!(
            "Category:  {}",
            decision.category.as_ref().map_or("-", Category::as_str)
        );
        println!("Excused:   {}", yes_no(decision.excused));
        println!("Intercept: {}", yes_no(decision.should_intercept()));
    }
    Ok(())
}

fn handle_status(categorizer: &Categorizer<SqliteStore>, json: bool) -> Result<()> {
    let stats = categorizer.stats();
    let store = categorizer.store();

    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "database_bytes": store.size_bytes(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("blushproof status");
        println!("-----------------");
        println!("Database:      {}", store.path().display());
        println!("Key mode:      {}", stats.key_mode);
        println!(
            "Blushlist:     v{} ({} entries)",
            stats.blushlist_version, stats.blushlist_entries
        );
        println!(
            "Searchterms:   v{} ({} entries)",
            stats.searchterms_version, stats.searchterms_entries
        );
        println!("Whitelisted:   {} sites, {} queries", stats.whitelisted_domains, stats.whitelisted_queries);
        for (category, count) in &stats.category_counts {
            let mark = if stats.whitelisted_categories.contains(category) {
                " (whitelisted)"
            } else {
                ""
            };
            println!("  {category:<28} {count}{mark}");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Keys]");
                println!("  Mode:               {}", config.keys.mode);
                println!();
                println!("[Lists]");
                println!(
                    "  Blushlist:          {}",
                    config
                        .lists
                        .blushlist_path
                        .as_ref()
                        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
                );
                println!(
                    "  Searchterms:        {}",
                    config
                        .lists
                        .searchterms_path
                        .as_ref()
                        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
                );
                println!();
                println!("[Telemetry]");
                println!("  Enabled:            {}", config.telemetry.enabled);
                println!("  Queue capacity:     {}", config.telemetry.queue_capacity);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn handle_make_list(cmd: &MakeListCommand) -> Result<()> {
    let pairs = cmd.pairs().map_err(anyhow::Error::msg)?;

    let mut inputs = Vec::with_capacity(pairs.len());
    for (path, label) in pairs {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("can't read {}", path.display()))?;
        let category = Category::parse(&label)?;
        inputs.push((text, category));
    }

    let list = build_shipped_list(
        &cmd.list_version,
        inputs.iter().map(|(text, category)| (text.as_str(), category)),
    )?;
    std::fs::write(&cmd.output, list.to_json_pretty()?)
        .with_context(|| format!("can't write {}", cmd.output.display()))?;

    println!(
        "Wrote {} entries to {} (version {})",
        list.len(),
        cmd.output.display(),
        list.version
    );
    Ok(())
}

fn handle_bloom(cmd: BloomCommand) -> Result<()> {
    match cmd {
        BloomCommand::Build {
            bits,
            input,
            output,
        } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("can't read {}", input.display()))?;
            let items: Vec<&str> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect();
            let filter = BloomFilter::from_items(bits, &items)?;
            std::fs::write(&output, serde_json::to_string(&filter)?)
                .with_context(|| format!("can't write {}", output.display()))?;
            println!(
                "Inserted {} items into {} ({} of {} bits set)",
                items.len(),
                output.display(),
                filter.count_ones(),
                filter.size_in_bits()
            );
        }
        BloomCommand::Probe { filter, items } => {
            let text = std::fs::read_to_string(&filter)
                .with_context(|| format!("can't read {}", filter.display()))?;
            let filter: BloomFilter = serde_json::from_str(&text).context("invalid filter file")?;
            for item in &items {
                let verdict = if filter.probe(item) { "maybe" } else { "no" };
                println!("{item}: {verdict}");
            }
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
