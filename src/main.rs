use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tweetsync::background::BackgroundService;
use tweetsync::config::Config;
use tweetsync::db::{self, PostQueue};
use tweetsync::extract::{self, ExtractOptions};
use tweetsync::locator::{SourceLocators, TwitterLocators};
use tweetsync::page::memory::MemoryPage;
use tweetsync::page::Page;
use tweetsync::rewrite::{paragraphs, rewrite};

/// TweetSync: migrate X/Twitter posts and threads into the Bluesky composer.
///
/// Posts are queued from the timeline (or a saved page), then replayed into
/// the Bluesky web composer for you to review and publish.
#[derive(Parser)]
#[command(name = "tweetsync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Extract a post from a saved X/Twitter page and queue it
    Extract {
        /// Saved page HTML
        #[arg(long)]
        html: PathBuf,

        /// URL the page was saved from (a /status/ URL enables thread extraction)
        #[arg(long)]
        url: String,

        /// Which post on the page, in document order
        #[arg(long, default_value = "0")]
        index: usize,

        /// Skip the author's follow-up posts
        #[arg(long)]
        no_replies: bool,

        /// Print the extracted post without queueing it
        #[arg(long)]
        dry_run: bool,
    },

    /// List the pending queue
    Queue {
        /// Print raw JSON instead of the formatted listing
        #[arg(long)]
        json: bool,
    },

    /// Show the editor content a queued post would be published with
    Preview {
        /// Queue position
        index: usize,
    },

    /// Remove a queued post
    Remove {
        /// Queue position
        #[arg(long, conflicts_with = "tweet_id", required_unless_present = "tweet_id")]
        index: Option<usize>,

        /// Tweet id (first match is removed)
        #[arg(long)]
        tweet_id: Option<String>,
    },

    /// Remove one reply from a queued thread
    DeleteReply {
        /// Queue position of the thread
        #[arg(long)]
        post: usize,

        /// Position of the reply within the thread
        #[arg(long)]
        reply: usize,
    },

    /// Empty the pending queue
    Clear,

    /// Check a queued post against the configured Bluesky account
    Sync {
        /// Queue position
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Show system status (DB stats, queue size, configuration)
    Status,

    /// Fill the Bluesky composer in a running browser with a queued post
    #[cfg(feature = "cdp")]
    Publish {
        /// Queue position
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Add sync controls to your posts in a running browser's X/Twitter tab
    #[cfg(feature = "cdp")]
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tweetsync=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing TweetSync database...");
            let config = Config::load()?;
            let queue = db::initialize(&config.db_path)?;
            let table_count = queue.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nTweetSync is ready. Next step: set up your .env file");
            println!("  (see .env.example for the variables)");
        }

        Commands::Extract {
            html,
            url,
            index,
            no_replies,
            dry_run,
        } => {
            let config = Config::load()?;
            let source = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;
            let page = MemoryPage::from_html(&source, &url);
            let locators = TwitterLocators;

            let articles = page.query_all(None, locators.post_article()).await?;
            let Some(&article) = articles.get(index) else {
                anyhow::bail!(
                    "No post at index {} ({} posts found in {})",
                    index,
                    articles.len(),
                    html.display()
                );
            };
            let post = extract::extract(
                &page,
                &locators,
                article,
                ExtractOptions {
                    include_replies: !no_replies,
                },
            )
            .await;

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&post)?);
            } else {
                let queue = db::initialize(&config.db_path)?;
                let settings = config.settings();
                let len = BackgroundService::new(queue, settings).enqueue(post.clone()).await?;
                println!(
                    "Queued {} ({} replies). Queue now holds {} posts.",
                    post.tweet_id.bold(),
                    post.replies.len(),
                    len
                );
            }
        }

        Commands::Queue { json } => {
            let config = Config::load()?;
            let queue = db::open(&config.db_path)?;
            let posts = queue.load().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else {
                tweetsync::output::terminal::display_queue(&posts);
            }
        }

        Commands::Preview { index } => {
            let config = Config::load()?;
            let queue = db::open(&config.db_path)?;
            let post = queued_post(&queue, index).await?;
            let editors = std::iter::once(&post).chain(post.replies.iter());
            for (i, item) in editors.enumerate() {
                println!("{}", format!("--- editor {i} ---").dimmed());
                println!("{}", paragraphs(&rewrite(&item.text, &item.links)));
                if !item.images.is_empty() {
                    println!("{} {} image(s) dropped", "+".yellow(), item.images.len());
                }
            }
        }

        Commands::Remove { index, tweet_id } => {
            let config = Config::load()?;
            let queue = db::open(&config.db_path)?;
            let removed = match (index, tweet_id) {
                (Some(i), _) => Some(queue.remove_at(i).await?),
                (None, Some(id)) => queue.remove_by_tweet_id(&id).await?,
                (None, None) => None,
            };
            match removed {
                Some(post) => println!("Removed {}", post.tweet_id),
                None => println!("Nothing matched; queue unchanged."),
            }
        }

        Commands::DeleteReply { post, reply } => {
            let config = Config::load()?;
            let queue = db::open(&config.db_path)?;
            let removed = queue.remove_reply(post, reply).await?;
            println!("Reply deleted ({})", removed.tweet_id);
        }

        Commands::Clear => {
            let config = Config::load()?;
            let queue = db::open(&config.db_path)?;
            let count = queue.clear().await?;
            println!("Cleared {count} queued posts.");
        }

        Commands::Sync { index } => {
            let config = Config::load()?;
            config.require_credentials()?;
            let queue = db::open(&config.db_path)?;
            let post = queued_post(&queue, index).await?;
            let service = BackgroundService::new(queue, config.settings());
            let data = service.sync(&post).await?;
            println!(
                "{}",
                data["message"].as_str().unwrap_or("Sync succeeded").green()
            );
        }

        Commands::Status => {
            let config = Config::load()?;
            tweetsync::status::show(&config).await?;
        }

        #[cfg(feature = "cdp")]
        Commands::Publish { index } => {
            let config = Config::load()?;
            config.require_enabled()?;
            publish_in_browser(&config, index).await?;
        }

        #[cfg(feature = "cdp")]
        Commands::Watch => {
            let config = Config::load()?;
            config.require_enabled()?;
            watch_in_browser(&config).await?;
        }
    }

    Ok(())
}

async fn queued_post(queue: &Arc<dyn PostQueue>, index: usize) -> Result<tweetsync::Post> {
    let posts = queue.load().await?;
    let count = posts.len();
    posts.into_iter().nth(index).with_context(|| {
        format!("No queued post at index {index} (queue has {count} posts). Run `tweetsync queue` to list them.")
    })
}

#[cfg(feature = "cdp")]
async fn publish_in_browser(config: &Config, index: usize) -> Result<()> {
    use tweetsync::bridge::{self, Message, Router};
    use tweetsync::locator::BlueskyLocators;
    use tweetsync::page::cdp::CdpSession;
    use tweetsync::publish::handler::PublishHandler;
    use tweetsync::publish::images::HttpImageFetcher;
    use tweetsync::publish::{PublishTimings, ThreadPublisher};

    let ws_url = config.require_browser()?;
    let queue = db::open(&config.db_path)?;
    let post = queued_post(&queue, index).await?;

    let session = CdpSession::connect(ws_url).await?;
    let page: Arc<dyn Page> = Arc::new(session.page_matching("bsky.app").await?);

    let (client, rx) = bridge::channel(bridge::DEFAULT_REQUEST_TIMEOUT);
    let publisher = ThreadPublisher::new(
        page,
        Arc::new(BlueskyLocators::default()),
        Arc::new(HttpImageFetcher::new()?),
        client.clone(),
    )
    .with_timings(PublishTimings {
        wait_timeout: config.wait_timeout,
        ..PublishTimings::default()
    });
    let handler = Arc::new(PublishHandler::new(Arc::new(publisher), config.enabled));
    let background = Arc::new(BackgroundService::new(queue, config.settings()));
    tokio::spawn(Router::new(background).with_content(handler.clone()).serve(rx));

    client.call(Message::PostToBsky(post)).await?;
    let run = handler
        .take_last_run()
        .await
        .context("Publisher did not start")?;
    let outcome = run.await?;
    if let Some(e) = outcome.error {
        return Err(e.into());
    }

    println!(
        "{} editors filled. {}",
        outcome.editors_filled,
        "Review the composer and click Publish in the browser.".bold()
    );
    if let Some(completion) = outcome.completion {
        completion.await?;
        println!("{}", "Published; removed from the queue.".green());
    }
    Ok(())
}

#[cfg(feature = "cdp")]
async fn watch_in_browser(config: &Config) -> Result<()> {
    use tweetsync::bridge::{self, Router};
    use tweetsync::extract::watcher::SourceWatcher;
    use tweetsync::page::cdp::CdpSession;

    let ws_url = config.require_browser()?;
    let queue = db::initialize(&config.db_path)?;

    let session = CdpSession::connect(ws_url).await?;
    let page: Arc<dyn Page> = Arc::new(session.page_matching("x.com").await?);

    let (client, rx) = bridge::channel(bridge::DEFAULT_REQUEST_TIMEOUT);
    let background = Arc::new(BackgroundService::new(queue, config.settings()));
    tokio::spawn(Router::new(background).serve(rx));

    println!("Watching for your posts. Press Ctrl-C to stop.");
    SourceWatcher::new(page, Arc::new(TwitterLocators), client)
        .run()
        .await?;
    Ok(())
}
