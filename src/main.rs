mod rules;
mod strategy;
mod stream;
mod utils;


use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};

use crate::rules::{BoolOp, EditError, NodePath, RuleNode, Timeframe};
use crate::strategy::{ApiClient, EditSession, Phase, StrategyDraft};
use crate::stream::{Feed, StreamClient, WsConnector, SCAN_RESULT_EVENT};
use crate::utils::Config;

#[derive(Parser)]
#[command(name = "tbot-console", version, about = "Operator console for the tbot scan backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List strategies
    Strategies,
    /// Create a strategy with empty scan rules
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        broker: String,
        #[arg(long)]
        market: String,
        #[arg(long)]
        description: Option<String>,
        /// Cron schedule, e.g. "*/5 * * * *"
        #[arg(long)]
        cron: Option<String>,
        #[arg(long)]
        active: bool,
    },
    /// Delete a strategy
    Delete { id: i64 },
    /// Show a strategy's rule trees
    Rules { id: i64 },
    /// Insert a condition into a rule group
    AddCondition {
        id: i64,
        #[arg(long, default_value = "first")]
        phase: String,
        /// Path of the target group; empty string is the root
        #[arg(long, default_value = "")]
        group: String,
        /// Insertion index; appends when omitted
        #[arg(long)]
        at: Option<usize>,
        #[arg(long)]
        value: String,
        /// One of: "", day, minute60, minute30, minute10, minute5
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Insert a nested group into a rule group
    AddGroup {
        id: i64,
        #[arg(long, default_value = "first")]
        phase: String,
        #[arg(long, default_value = "")]
        group: String,
        #[arg(long)]
        at: Option<usize>,
        #[arg(long, default_value = "AND")]
        operator: String,
    },
    /// Remove the node at a path (the root itself cannot be removed)
    Remove {
        id: i64,
        #[arg(long, default_value = "first")]
        phase: String,
        #[arg(long)]
        path: String,
    },
    /// Change the boolean operator of the group at a path
    SetOperator {
        id: i64,
        #[arg(long, default_value = "first")]
        phase: String,
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long)]
        operator: String,
    },
    /// Start scan execution
    Start { id: i64 },
    /// Stop scan execution
    Stop { id: i64 },
    /// Follow the live scan-result feed (Ctrl-C to quit)
    Watch {
        #[arg(long, default_value = SCAN_RESULT_EVENT)]
        event: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Strategies => {
            let client = ApiClient::new(&config)?;
            let strategies = client.list_strategies().await?;
            for s in &strategies {
                println!(
                    "{:>4}  {:<24} {:<10} {:<12} {}",
                    s.id,
                    s.name,
                    s.broker,
                    s.market,
                    if s.is_active { "active" } else { "inactive" }
                );
            }
            if strategies.is_empty() {
                println!("no strategies registered");
            }
        }
        Command::Create {
            name,
            broker,
            market,
            description,
            cron,
            active,
        } => {
            let client = ApiClient::new(&config)?;
            let mut draft = StrategyDraft::new(name, broker, market);
            draft.description = description;
            draft.cron_schedule = cron;
            draft.is_active = active;

            let session = EditSession::create(draft);
            session.validate()?;
            let created = client.create_strategy(&session.draft).await?;
            println!("created strategy {} ({})", created.id, created.name);
        }
        Command::Delete { id } => {
            let client = ApiClient::new(&config)?;
            let deleted = client.delete_strategy(id).await?;
            println!("deleted strategy {} ({})", deleted.id, deleted.name);
        }
        Command::Rules { id } => {
            let client = ApiClient::new(&config)?;
            let strategy = client.get_strategy(id).await?;
            println!("first_scan:");
            print!("{}", strategy.scan_rules.first_scan.render());
            println!("second_scan:");
            print!("{}", strategy.scan_rules.second_scan.render());
        }
        Command::AddCondition {
            id,
            phase,
            group,
            at,
            value,
            timeframe,
        } => {
            let phase = parse_phase(&phase)?;
            let group: NodePath = group.parse()?;
            let timeframe = timeframe
                .map(|t| t.parse::<Timeframe>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let node = RuleNode::Condition { value, timeframe };
            edit_rules(&config, id, phase, |tree| {
                tree.insert_child(&group, at, node)
            })
            .await?;
        }
        Command::AddGroup {
            id,
            phase,
            group,
            at,
            operator,
        } => {
            let phase = parse_phase(&phase)?;
            let group: NodePath = group.parse()?;
            let operator: BoolOp = operator.parse().map_err(|e: String| anyhow!(e))?;
            edit_rules(&config, id, phase, |tree| {
                tree.insert_child(&group, at, RuleNode::group(operator, vec![]))
            })
            .await?;
        }
        Command::Remove { id, phase, path } => {
            let phase = parse_phase(&phase)?;
            let path: NodePath = path.parse()?;
            let (parent, index) = path
                .split_last()
                .ok_or_else(|| anyhow!("the root group cannot be removed"))?;
            edit_rules(&config, id, phase, |tree| {
                tree.remove_at(&parent, index).map(|_| ())
            })
            .await?;
        }
        Command::SetOperator {
            id,
            phase,
            path,
            operator,
        } => {
            let phase = parse_phase(&phase)?;
            let path: NodePath = path.parse()?;
            let operator: BoolOp = operator.parse().map_err(|e: String| anyhow!(e))?;
            edit_rules(&config, id, phase, |tree| tree.set_operator(&path, operator)).await?;
        }
        Command::Start { id } => {
            let client = ApiClient::new(&config)?;
            let ack = client.start_scan(id).await?;
            println!("{}", ack.message);
        }
        Command::Stop { id } => {
            let client = ApiClient::new(&config)?;
            let ack = client.stop_scan(id).await?;
            println!("{}", ack.message);
        }
        Command::Watch { event } => watch(&config, event).await?,
    }

    Ok(())
}

fn parse_phase(s: &str) -> anyhow::Result<Phase> {
    match s {
        "first" | "first_scan" => Ok(Phase::First),
        "second" | "second_scan" => Ok(Phase::Second),
        other => Err(anyhow!("unknown phase '{other}', expected first or second")),
    }
}

/// Fetch, mutate the addressed tree, validate, put back.
async fn edit_rules<F>(config: &Config, id: i64, phase: Phase, mutate: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut RuleNode) -> Result<(), EditError>,
{
    let client = ApiClient::new(config)?;
    let strategy = client.get_strategy(id).await.context("fetching strategy")?;

    let mut session = EditSession::edit(strategy);
    mutate(session.phase_mut(phase))?;
    session.validate()?;

    let updated = client
        .update_strategy(id, &session.draft)
        .await
        .context("saving strategy")?;
    println!("{}:", phase.as_str());
    print!(
        "{}",
        match phase {
            Phase::First => updated.scan_rules.first_scan.render(),
            Phase::Second => updated.scan_rules.second_scan.render(),
        }
    );
    Ok(())
}

/// Live dashboard: one subscription, one feed, Ctrl-C tears both down.
async fn watch(config: &Config, event: String) -> anyhow::Result<()> {
    let client = StreamClient::new(config.stream_url(), Arc::new(WsConnector));
    let (handle, mut messages) = client.subscribe();
    let mut feed = Feed::with_retention(event, config.feed_retention);

    println!(
        "{:<20} {:<20} {:<12} {:>14} {:>12} {:>16}",
        "time", "strategy", "ticker", "price", "volume", "amount"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            message = messages.recv() => match message {
                Some(envelope) => {
                    if let Some(result) = feed.push(envelope) {
                        println!(
                            "{:<20} {:<20} {:<12} {:>14.2} {:>12.4} {:>16.0}",
                            result.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            result.strategy_name,
                            result.ticker,
                            result.details.price,
                            result.details.volume,
                            result.details.amount,
                        );
                    }
                }
                None => break,
            },
        }
    }

    tracing::info!(results = feed.scan_results().len(), "dashboard closing");
    handle.close().await;
    Ok(())
}
