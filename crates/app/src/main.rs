use chrono::Utc;
use clap::{Parser, Subcommand};
use content_search_core::{
    split_highlights, ConnectionDetails, ConnectionManager, FilterState, MeilisearchStore,
    RestConnectionSource, ResultHit, SearchContext, SortOption, StaticConnectionSource, TextSpan,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter, prelude::*};

#[derive(Parser)]
#[command(name = "content-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Search backend base URL
    #[arg(long, default_value = "http://localhost:7700")]
    search_url: String,

    /// Search index name
    #[arg(long, default_value = "studio_content")]
    index: String,

    /// Scoped API key for the search backend
    #[arg(long, default_value = "")]
    api_key: String,

    /// Connection-details endpoint; overrides the direct backend flags.
    #[arg(long)]
    connection_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Search indexed content and print merged pages of hits.
    Search {
        /// Free-text keywords
        #[arg(long, default_value = "")]
        query: String,
        /// Require any of these block types (repeatable).
        #[arg(long)]
        block_type: Vec<String>,
        /// Require any of these problem sub-types (repeatable).
        #[arg(long)]
        problem_type: Vec<String>,
        /// Require all of these full tag paths (repeatable).
        #[arg(long)]
        tag: Vec<String>,
        /// Sort directive, e.g. "created:desc"; empty keeps relevance.
        #[arg(long, default_value = "")]
        sort: String,
        /// Pin results to exactly one item.
        #[arg(long)]
        usage_key: Option<String>,
        /// Number of pages to fetch.
        #[arg(long, default_value = "1")]
        pages: usize,
        /// Print block-type and problem-type distribution counts.
        #[arg(long, default_value_t = false)]
        counts: bool,
    },
    /// List selectable tag facets beneath an optional parent path.
    Tags {
        /// Parent tag path, e.g. "Places > North America".
        #[arg(long)]
        parent: Option<String>,
        /// Keyword to match across tag paths.
        #[arg(long)]
        keyword: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut context = connect(&cli).await?;
    info!(
        version = app_version,
        index = %context.index_uid(),
        started_at = %Utc::now().to_rfc3339(),
        "content-search boot"
    );

    match cli.command {
        Command::Search {
            query,
            block_type,
            problem_type,
            tag,
            sort,
            usage_key,
            pages,
            counts,
        } => {
            context.set_fetch_distribution(counts);
            context.set_search_keywords(&query);
            context.set_block_types_filter(block_type);
            context.set_problem_types_filter(problem_type);
            context.set_tags_filter(tag);
            context.set_sort_order(SortOption::parse(&sort));
            if let Some(usage_key) = usage_key {
                context.set_usage_key(&usage_key);
            }

            for page in 0..pages.max(1) {
                if page > 0 && !context.has_next_page() {
                    break;
                }
                context
                    .fetch_next_page()
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            }

            println!(
                "{} of {} hits (more: {})",
                context.hits().len(),
                context.total_hits(),
                context.has_next_page()
            );

            for hit in context.hits() {
                print_hit(hit);
            }

            if counts {
                for (block_type, count) in context.block_type_counts() {
                    println!("block_type: {block_type}={count}");
                }
                for (problem_type, count) in context.problem_type_counts() {
                    println!("problem_type: {problem_type}={count}");
                }
            }

            if let Some(error) = context.search_error() {
                warn!(error = %error, "search degraded");
            }
        }
        Command::Tags { parent, keyword } => {
            let options = context
                .tag_options(parent.as_deref(), keyword.as_deref())
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for tag in &options.tags {
                println!(
                    "{} count={} children={}",
                    tag.tag_path, tag.tag_count, tag.has_children
                );
            }

            if options.may_be_missing_results {
                println!("... option list truncated at the facet cap");
            }
        }
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<SearchContext<MeilisearchStore>> {
    let context = match &cli.connection_url {
        Some(endpoint) => {
            let mut manager = ConnectionManager::new(RestConnectionSource::new(endpoint));
            SearchContext::connect(&mut manager, FilterState::in_memory(), Vec::new())
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?
        }
        None => {
            let mut manager = ConnectionManager::new(StaticConnectionSource::new(
                ConnectionDetails {
                    url: cli.search_url.clone(),
                    index_name: cli.index.clone(),
                    api_key: cli.api_key.clone(),
                },
            ));
            SearchContext::connect(&mut manager, FilterState::in_memory(), Vec::new())
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?
        }
    };
    Ok(context)
}

fn print_hit(hit: &ResultHit) {
    match hit {
        ResultHit::Content(content) => {
            println!(
                "[{}] {} ({})",
                content.block_type, content.display_name, content.usage_key
            );
            if !content.breadcrumbs.is_empty() {
                let trail: Vec<&str> = content
                    .breadcrumbs
                    .iter()
                    .map(|crumb| crumb.display_name.as_str())
                    .collect();
                println!("  in {}", trail.join(" / "));
            }
            if let Some(formatted) = &content.formatted.description {
                println!("  {}", render_highlights(formatted));
            }
        }
        ResultHit::Collection(collection) => {
            println!(
                "[collection] {} ({} children)",
                collection.display_name,
                collection.num_children.unwrap_or(0)
            );
            if !collection.description.is_empty() {
                println!("  {}", collection.description);
            }
        }
    }
}

fn render_highlights(formatted: &str) -> String {
    split_highlights(formatted)
        .into_iter()
        .map(|span| match span {
            TextSpan::Plain(text) => text,
            TextSpan::Emphasis(text) => format!("*{text}*"),
        })
        .collect()
}
