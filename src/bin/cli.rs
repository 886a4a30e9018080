//! Tagsmith CLI
//!
//! Command-line interface over a snapshot-backed in-memory store.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tagsmith::{
    Atomicity, Conditions, Config, Engine, MemoryStore, QueryResult, Resource, ResourceKind,
    Result, TagError, Target,
};
use tracing_subscriber::{fmt, EnvFilter};

/// Tagsmith CLI
#[derive(Parser, Debug)]
#[command(name = "tagsmith-cli")]
#[command(about = "Tag items on behalf of users and query the associations")]
#[command(version)]
struct Args {
    /// Snapshot file holding the store between runs
    #[arg(short, long, default_value = "./tagsmith.snap")]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record that a user tagged an item
    Tag {
        /// User id
        user: String,

        /// Item id
        item: String,

        /// Tag name
        tag: String,
    },

    /// Remove a user's tagging of an item
    Untag {
        /// User id
        user: String,

        /// Item id
        item: String,

        /// Tag name
        tag: String,
    },

    /// Query associations
    Get {
        /// Kind to return: user, item or tag
        kind: String,

        /// Scope: `kind` or `kind:id[,kind:id...]`
        #[arg(long)]
        scope: Option<String>,

        /// Via: `kind` or `kind:id[,kind:id...]`
        #[arg(long)]
        via: Option<String>,

        /// Maximum results (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Leave popularity scores out of tag rankings
        #[arg(long)]
        no_scores: bool,

        /// Items similar to the item in scope
        #[arg(long)]
        similar: bool,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let store = MemoryStore::open_or_default(&args.snapshot)?;
    let config = Config::builder().atomicity(Atomicity::Serialized).build();
    let engine = Engine::new(config, store);

    match args.command {
        Commands::Tag { user, item, tag } => {
            engine.tag(&Resource::user(user), &Resource::item(item), &Resource::tag(tag))?;
            engine.store().save(&args.snapshot)?;
        }
        Commands::Untag { user, item, tag } => {
            engine.untag(&Resource::user(user), &Resource::item(item), &Resource::tag(tag))?;
            engine.store().save(&args.snapshot)?;
        }
        Commands::Get {
            kind,
            scope,
            via,
            limit,
            no_scores,
            similar,
        } => {
            let mut conditions = Conditions::new().limit(limit);
            if let Some(scope) = scope {
                conditions = conditions.scope(parse_target(&scope)?);
            }
            if let Some(via) = via {
                conditions = conditions.via(parse_target(&via)?);
            }
            if no_scores {
                conditions = conditions.without_scores();
            }
            if similar {
                conditions = conditions.similar();
            }

            print_result(engine.get_str(&kind, &conditions)?);
        }
    }

    Ok(())
}

/// Parse `kind` or `kind:id[,kind:id...]`
fn parse_target(input: &str) -> Result<Target> {
    if !input.contains(':') {
        return Ok(Target::Kind(input.parse::<ResourceKind>()?));
    }

    let mut resources = Vec::new();
    for part in input.split(',') {
        let (kind, id) = part
            .split_once(':')
            .ok_or_else(|| TagError::InvalidViaKind(format!("expected kind:id, got '{}'", part)))?;
        resources.push(Resource::new(kind.parse()?, id));
    }

    if resources.len() == 1 {
        Ok(Target::One(resources.remove(0)))
    } else {
        Ok(Target::Many(resources))
    }
}

fn print_result(result: QueryResult) {
    match result {
        QueryResult::Ids(ids) => {
            for id in ids {
                println!("{}", id);
            }
        }
        QueryResult::Scored(scored) => {
            for entry in scored {
                println!("{} {}", entry.member, entry.score);
            }
        }
    }
}
