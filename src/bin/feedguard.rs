//! feedguard: CLI tool for trying rule sets and inspecting a stored flagged log.

use clap::{Parser, Subcommand, ValueEnum};
use feedguard::dom::Document;
use feedguard::{
    Configuration, Effect, MemoryStore, ReplacementMarkup, RuleCompiler, TextRewriter,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "feedguard")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Try feed filtering rules against text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a rule set against text, one post per line
    Check {
        /// Rule configuration (.yaml, .yml or .json); defaults when omitted
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Text to check
        #[arg(short, long, conflicts_with = "input")]
        text: Option<String>,

        /// File with one post per line
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the default configuration
    Defaults {
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: Format,
    },

    /// Show counts from a persisted store
    Analytics {
        /// Store file written by the extension host
        #[arg(short, long)]
        store: PathBuf,

        /// Number of rules and users to list
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { rules, text, input } => check(rules, text, input),
        Commands::Defaults { format } => print_defaults(format),
        Commands::Analytics { store, top } => analytics(&store, top),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn check(
    rules: Option<PathBuf>,
    text: Option<String>,
    input: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match rules {
        Some(path) => Configuration::load(&path)?,
        None => Configuration::default(),
    };
    log::info!("Checking with {} rule(s)", config.rules.len());
    for rule in &config.rules {
        log::debug!(
            "  [{}] {} {} {:?}{}",
            rule.id,
            rule.kind,
            rule.effect,
            rule.pattern,
            if rule.enabled { "" } else { " (disabled)" }
        );
    }

    let lines: Vec<String> = match (text, input) {
        (Some(text), _) => vec![text],
        (None, Some(path)) => fs::read_to_string(&path)?
            .lines()
            .map(str::to_string)
            .collect(),
        (None, None) => return Err("either --text or --input is required".into()),
    };

    let compiler = RuleCompiler::new();
    for (number, line) in lines.iter().enumerate() {
        let hit = config.enabled_rules().find_map(|rule| {
            let matcher = compiler.compile(rule)?;
            matcher.is_match(line).then_some((rule, matcher))
        });

        let Some((rule, matcher)) = hit else {
            println!("{:>4}  no match", number + 1);
            continue;
        };

        match rule.effect {
            Effect::Hide => println!("{:>4}  [{}] hidden", number + 1, rule.id),
            Effect::Replace => {
                let mut doc = Document::new();
                let region = doc.create_element("div");
                let body = doc.body();
                doc.append_child(body, region);
                let node = doc.create_text(line);
                doc.append_child(region, node);

                let markup = ReplacementMarkup::parse(&rule.replacement_text);
                TextRewriter::apply(&mut doc, region, &matcher, &markup);
                println!("{:>4}  [{}] {}", number + 1, rule.id, doc.inner_html(region));
            }
        }
    }

    Ok(())
}

fn print_defaults(format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::default();
    let output = match format {
        Format::Yaml => serde_yaml::to_string(&config)?,
        Format::Json => serde_json::to_string_pretty(&config)?,
    };
    println!("{}", output);
    Ok(())
}

fn analytics(path: &PathBuf, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("store not found: {:?}", path).into());
    }
    let store = MemoryStore::open(path)?;
    let analytics = store.analytics();

    println!("Total flagged posts: {}", analytics.total_flags);
    println!("Top rules:");
    for (rule, count) in analytics.top_rules(top) {
        println!("  {:<32} {}", rule, count);
    }
    println!("Top users:");
    for (user, count) in analytics.top_users(top) {
        println!("  @{:<31} {}", user, count);
    }
    Ok(())
}
