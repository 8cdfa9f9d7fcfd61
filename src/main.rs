use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info};

use repo_harvester::{
    Clock, Collection, CollectionAborted, CollectionLimits, CsvPersister, DEFAULT_CHAT_MODEL,
    DatasetMerger, DateWindow, FetcherRetrier, GITHUB_API_ENDPOINT, GITHUB_GRAPHQL_ENDPOINT,
    GitHubDetailEnricher, GitHubGraphQlFetcher, GitHubRateLimitSource, GitHubRestFetcher,
    GitHubSession, HarvestError, JsonPersister, KeywordGenerator, KeywordHarvester,
    OLLAMA_ENDPOINT, OllamaChat, PageFetcher, RateLimitCategory, RateLimitGuard,
    RateLimitPolicy, RateLimitedFetcher, Record, RecordCollector, RecordPersister,
    RepositoryResolver, SOFTWARE_HERITAGE_ENDPOINT, SearchQuery, SequentialCollector,
    SoftwareHeritageFetcher, StdResult, TokioClock, WindowedCollector, normalize_keywords,
    read_keywords, read_records_csv, timestamped_path, write_keywords,
};

const KEYWORDS_DATABASE: &str = "out/keywords_database.csv";

/// Command line arguments for the repository harvester
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// GitHub personal access token; requests are unauthenticated without it
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Directory receiving the output files
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Base URL of the GitHub REST API
    #[arg(long, default_value = GITHUB_API_ENDPOINT)]
    github_api_url: String,

    /// Endpoint of the GitHub GraphQL API
    #[arg(long, default_value = GITHUB_GRAPHQL_ENDPOINT)]
    github_graphql_url: String,

    /// Base URL of the Software Heritage API
    #[arg(long, default_value = SOFTWARE_HERITAGE_ENDPOINT)]
    heritage_api_url: String,

    /// Base URL of the Ollama server
    #[arg(long, default_value = OLLAMA_ENDPOINT)]
    ollama_url: String,

    /// Delay between two page requests, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pacing_ms: u64,

    /// Rate limit status polls before giving up
    #[arg(long, default_value_t = 5)]
    max_rate_limit_attempts: u32,

    /// Retries of a page request after a transport failure
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search GitHub repositories with the REST search API
    Search {
        /// Keywords searched one after the other; read from the keyword database when omitted
        keywords: Vec<String>,

        /// Keyword database used when no keyword is given
        #[arg(long, default_value = KEYWORDS_DATABASE)]
        database: PathBuf,

        /// Existing dataset extended and saved after every keyword
        #[arg(long)]
        append: Option<PathBuf>,

        /// Maximum number of repositories per keyword
        #[arg(long, default_value_t = 1000)]
        max_results: usize,

        /// Repositories per page
        #[arg(long, default_value_t = 100)]
        per_page: u16,

        /// Sort key of the search
        #[arg(long, default_value = "stars")]
        sort: String,

        /// Skip the contributors and commits counts
        #[arg(long)]
        no_enrich: bool,
    },

    /// Search GitHub repositories with the GraphQL API, one month at a time
    SearchGraphql {
        /// Keyword searched
        keyword: String,

        /// First day of the first month searched
        #[arg(long, default_value = "2014-01-01")]
        since: NaiveDate,

        /// Maximum number of repositories
        #[arg(long, default_value_t = 1000)]
        max_results: usize,

        /// Repositories per page
        #[arg(long, default_value_t = 100)]
        per_page: u16,
    },

    /// Search the Software Heritage archive metadata
    Heritage {
        /// Full text query
        query: String,

        /// Maximum number of origins
        #[arg(long, default_value_t = 2000)]
        max_results: usize,

        /// Origins per page
        #[arg(long, default_value_t = 50)]
        per_page: u16,
    },

    /// Merge a GitHub dataset with a Software Heritage dataset
    Merge {
        /// CSV file of GitHub repositories
        #[arg(long)]
        github: PathBuf,

        /// CSV file of Software Heritage origins
        #[arg(long)]
        heritage: PathBuf,

        /// Fetch the GitHub details of archived repositories missing from the GitHub dataset
        #[arg(long)]
        resolve: bool,
    },

    /// Generate search keywords with a local chat model
    Keywords {
        /// Seed keywords; the keywords of the database when omitted
        seeds: Vec<String>,

        /// Chat model name
        #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,

        /// Keyword database updated with the generated keywords
        #[arg(long, default_value = KEYWORDS_DATABASE)]
        database: PathBuf,
    },
}

#[tokio::main]
async fn main() -> StdResult<()> {
    env_logger::init();
    let args = Args::parse();

    match &args.command {
        Command::Search {
            keywords,
            database,
            append,
            max_results,
            per_page,
            sort,
            no_enrich,
        } => {
            let keywords = keywords_or_database(keywords, database)?;
            let limits = CollectionLimits::new(*max_results, *per_page);
            search(&args, &keywords, limits, sort, !no_enrich, append.as_deref()).await
        }
        Command::SearchGraphql {
            keyword,
            since,
            max_results,
            per_page,
        } => {
            let limits = CollectionLimits::new(*max_results, *per_page);
            search_graphql(&args, keyword, *since, limits).await
        }
        Command::Heritage {
            query,
            max_results,
            per_page,
        } => {
            let limits = CollectionLimits::new(*max_results, *per_page);
            heritage(&args, query, limits).await
        }
        Command::Merge {
            github,
            heritage,
            resolve,
        } => merge_datasets(&args, github, heritage, *resolve).await,
        Command::Keywords {
            seeds,
            model,
            database,
        } => keywords(&args, seeds, model, database).await,
    }
}

/// The shared resources of a GitHub run.
struct GitHubContext {
    session: Arc<GitHubSession>,
    clock: Arc<dyn Clock>,
    guard: Arc<RateLimitGuard>,
}

impl GitHubContext {
    fn try_new(args: &Args) -> StdResult<Self> {
        let session = Arc::new(GitHubSession::try_new(
            &args.github_api_url,
            args.github_token.clone(),
        )?);
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let policy = RateLimitPolicy {
            max_attempts: args.max_rate_limit_attempts,
            ..RateLimitPolicy::default()
        };
        let guard = Arc::new(RateLimitGuard::new(
            Arc::new(GitHubRateLimitSource::new(session.clone())),
            clock.clone(),
            policy,
        ));

        Ok(Self {
            session,
            clock,
            guard,
        })
    }

    /// Wraps a fetcher with transport retries and the rate limit guard of its quota.
    fn guarded_fetcher(
        &self,
        args: &Args,
        fetcher: Arc<dyn PageFetcher>,
        category: RateLimitCategory,
    ) -> Arc<dyn PageFetcher> {
        let retrier = Arc::new(FetcherRetrier::new(
            fetcher,
            args.max_retries,
            Duration::from_secs(1),
        ));

        Arc::new(RateLimitedFetcher::new(retrier, self.guard.clone(), category))
    }

    fn collector(&self, args: &Args, fetcher: Arc<dyn PageFetcher>) -> Arc<dyn RecordCollector> {
        Arc::new(SequentialCollector::new(
            fetcher,
            self.clock.clone(),
            Duration::from_millis(args.pacing_ms),
        ))
    }
}

async fn search(
    args: &Args,
    keywords: &[String],
    limits: CollectionLimits,
    sort: &str,
    enrich: bool,
    append: Option<&Path>,
) -> StdResult<()> {
    let context = GitHubContext::try_new(args)?;
    let fetcher = context.guarded_fetcher(
        args,
        Arc::new(GitHubRestFetcher::new(context.session.clone())),
        RateLimitCategory::Search,
    );
    let mut harvester = KeywordHarvester::new(context.collector(args, fetcher));
    if enrich {
        harvester = harvester.with_enricher(Arc::new(GitHubDetailEnricher::new(
            context.session.clone(),
            context.guard.clone(),
        )));
    }
    let mut dataset = vec![];
    if let Some(path) = append {
        if path.exists() {
            dataset = read_records_csv(path)?;
            info!("Extending {} with {} records", path.display(), dataset.len());
        }
        harvester = harvester.with_checkpoint(Arc::new(CsvPersister::new(path)));
    }

    info!("Searching {} keywords", keywords.len());
    match harvester.harvest(keywords, Some(sort), limits, dataset).await {
        Ok(records) => {
            info!("{} unique repositories", records.len());
            save_records(&args.out_dir, "github_repositories", &records).await
        }
        Err(HarvestError::Aborted { records, source }) => {
            error!("Search aborted with {} repositories: {source}", records.len());
            save_records(&args.out_dir, "github_repositories", &records).await?;
            Err(source.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn search_graphql(
    args: &Args,
    keyword: &str,
    since: NaiveDate,
    limits: CollectionLimits,
) -> StdResult<()> {
    let context = GitHubContext::try_new(args)?;
    let fetcher = context.guarded_fetcher(
        args,
        Arc::new(GitHubGraphQlFetcher::new(
            &args.github_graphql_url,
            context.session.token(),
            &args.github_api_url,
        )),
        RateLimitCategory::GraphQl,
    );
    let collector = WindowedCollector::new(
        context.collector(args, fetcher),
        DateWindow::month_of(since),
        context.clock.clone(),
    );

    let query = SearchQuery::new(keyword, None);
    let (collection, aborted) = split_outcome(collector.collect(&query, limits).await);
    save_records(&args.out_dir, "graphql_repositories", collection.records()).await?;

    match aborted {
        Some(aborted) => Err(aborted.into()),
        None => Ok(()),
    }
}

async fn heritage(args: &Args, query: &str, limits: CollectionLimits) -> StdResult<()> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let fetcher = Arc::new(FetcherRetrier::new(
        Arc::new(SoftwareHeritageFetcher::try_new(&args.heritage_api_url)?),
        args.max_retries,
        Duration::from_secs(1),
    ));
    let collector =
        SequentialCollector::new(fetcher, clock, Duration::from_millis(args.pacing_ms));

    let query = SearchQuery::new(query, None);
    let (collection, aborted) = split_outcome(collector.collect(&query, limits).await);
    save_records(&args.out_dir, "heritage_repositories", collection.records()).await?;

    match aborted {
        Some(aborted) => Err(aborted.into()),
        None => Ok(()),
    }
}

async fn merge_datasets(
    args: &Args,
    github_path: &Path,
    heritage_path: &Path,
    resolve: bool,
) -> StdResult<()> {
    let github = read_records_csv(github_path)?;
    let heritage = read_records_csv(heritage_path)?;
    info!(
        "Merging {} GitHub repositories with {} archived origins",
        github.len(),
        heritage.len()
    );
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let resolver = match resolve {
        true => {
            let context = GitHubContext::try_new(args)?;
            let enricher = GitHubDetailEnricher::new(context.session, context.guard);
            Some(Arc::new(enricher) as Arc<dyn RepositoryResolver>)
        }
        false => None,
    };
    let datasets = DatasetMerger::new(resolver).merge(&github, &heritage).await;

    CsvPersister::new(&args.out_dir.join("duplicate_repositories.csv"))
        .persist(&datasets.duplicates)
        .await?;
    if resolve {
        CsvPersister::new(&args.out_dir.join("new_repositories.csv"))
            .persist(&datasets.resolved)
            .await?;
    }
    CsvPersister::new(&args.out_dir.join("merged_repositories.csv"))
        .persist(&datasets.merged)
        .await?;

    match datasets.aborted {
        Some(source) => Err(source.into()),
        None => Ok(()),
    }
}

async fn keywords(args: &Args, seeds: &[String], model: &str, database: &Path) -> StdResult<()> {
    let chat = Arc::new(OllamaChat::try_new(&args.ollama_url, model)?);
    let generator = KeywordGenerator::new(chat);

    let existing = read_keywords(database)?;
    let seeds = match seeds.is_empty() {
        true => existing.clone(),
        false => seeds.to_vec(),
    };
    if seeds.is_empty() {
        return Err(anyhow!("No seed given and {} is empty", database.display()));
    }
    let generated = generator.generate(&seeds).await?;
    let keywords = normalize_keywords(&existing, &generated);
    write_keywords(database, &keywords)?;
    info!(
        "Keyword database {} holds {} keywords ({} new)",
        database.display(),
        keywords.len(),
        keywords.len().saturating_sub(existing.len())
    );

    Ok(())
}

/// Returns the given keywords, or the ones of the keyword database when none is given.
fn keywords_or_database(keywords: &[String], database: &Path) -> StdResult<Vec<String>> {
    if !keywords.is_empty() {
        return Ok(keywords.to_vec());
    }
    let keywords = read_keywords(database)?;
    if keywords.is_empty() {
        return Err(anyhow!(
            "No keyword given and {} holds none",
            database.display()
        ));
    }
    info!("Read {} keywords from {}", keywords.len(), database.display());

    Ok(keywords)
}

/// Splits a collection outcome into the records to keep and the abort to report.
fn split_outcome(
    outcome: Result<Collection, CollectionAborted>,
) -> (Collection, Option<CollectionAborted>) {
    match outcome {
        Ok(collection) => (collection, None),
        Err(aborted) => {
            error!("{aborted}");
            let partial = aborted.partial.clone();

            (partial, Some(aborted))
        }
    }
}

/// Writes the records to timestamped CSV and JSON files.
async fn save_records(out_dir: &Path, prefix: &str, records: &[Record]) -> StdResult<()> {
    let now = TokioClock.now();
    let persisters: [Arc<dyn RecordPersister>; 2] = [
        Arc::new(CsvPersister::new(&timestamped_path(out_dir, prefix, "csv", now)?)),
        Arc::new(JsonPersister::new(&timestamped_path(out_dir, prefix, "json", now)?)),
    ];
    for persister in persisters {
        persister.persist(records).await?;
    }

    Ok(())
}
