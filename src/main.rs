use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bracket_stats::aggregate::{self, KeyMode};
use bracket_stats::config::AppConfig;
use bracket_stats::identity::IdentityResolver;
use bracket_stats::models::{BestOf, MatchResult, PlayerStatistics, Score, TimeWindow};
use bracket_stats::normalize::normalize_events;
use bracket_stats::query::{
    filtered_view, find_player, merge_by_identity, query_head_to_head, query_players, Bounds,
    EventRanking, HeadToHeadFilter, MatchFilter, Pagination, PlayerFilter, PlayerSort, SortField,
    SortOrder, TimePeriod,
};
use bracket_stats::storage::{self, StorageConfig};

#[derive(Parser)]
#[command(name = "bracket-stats")]
#[command(about = "Player and head-to-head statistics from bracket set results")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert raw fetched events into the normalized match log
    Normalize {
        /// Raw events file (default: <data_dir>/raw/events.json)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Match log to write, .jsonl or .json (default: <data_dir>/normalized/matches.jsonl)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Rebuild player and head-to-head statistics from the match log
    Derive {
        /// Match log to read (default: <data_dir>/normalized/matches.jsonl)
        #[arg(long)]
        matches: Option<PathBuf>,

        /// Reference time for time buckets, RFC 3339 (default: config or now)
        #[arg(long)]
        reference_time: Option<String>,

        /// Key statistics by "canonical" identity or "raw" display name
        #[arg(long)]
        key_mode: Option<KeyMode>,
    },

    /// Filter, sort and list players
    Players {
        #[arg(long)]
        min_sets: Option<u32>,

        #[arg(long)]
        max_sets: Option<u32>,

        /// Minimum win rate (0-100)
        #[arg(long)]
        min_win_rate: Option<f64>,

        /// Maximum win rate (0-100)
        #[arg(long)]
        max_win_rate: Option<f64>,

        /// Keep players with any opponent at or above this win rate
        #[arg(long)]
        min_opponent_win_rate: Option<f64>,

        /// Keep players with any opponent at or below this win rate
        #[arg(long)]
        max_opponent_win_rate: Option<f64>,

        /// Minimum current win streak
        #[arg(long)]
        min_streak: Option<u32>,

        /// Maximum current win streak
        #[arg(long)]
        max_streak: Option<u32>,

        /// Active in a rolling window: 6m, 3m, 1m or 10d
        #[arg(long, conflicts_with_all = ["from", "to"])]
        period: Option<TimeWindow>,

        /// Active on or after this date (YYYY-MM-DD), requires --to
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Active on or before this date (YYYY-MM-DD), requires --from
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Played at least one set of this format: bo3 or bo5
        #[arg(long)]
        format: Option<BestOf>,

        /// Sort field: sets-played, win-rate or win-streak
        #[arg(long)]
        sort: Option<SortField>,

        /// Sort order: asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Rows to show (default: config query.default_limit)
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Show one player's statistics, optionally over a subset of sets
    Player {
        name: String,

        /// Only count sets of this format: bo3 or bo5
        #[arg(long)]
        format: Option<BestOf>,

        /// Only count wins or losses
        #[arg(long)]
        result: Option<MatchResult>,

        /// Only count sets with these scores, e.g. --score 3-0 --score 3-1
        #[arg(long)]
        score: Vec<Score>,
    },

    /// List the sets between two players
    HeadToHead {
        player: String,

        opponent: String,

        /// Only sets of this format: bo3 or bo5
        #[arg(long)]
        format: Option<BestOf>,

        /// Keep the last N sets after other filters
        #[arg(long)]
        last_matches: Option<usize>,

        /// Keep sets from the N most recent events
        #[arg(long)]
        last_events: Option<usize>,

        /// Rank events by "event-id" or "event-start" (default: config)
        #[arg(long)]
        ranking: Option<EventRanking>,

        /// Sets completed on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Sets completed on or before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,
    },

    /// Win-rate leaderboard with aliases merged into one entry
    Leaderboard {
        /// Minimum merged sets (default: config query.leaderboard_min_sets)
        #[arg(long)]
        min_sets: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("Failed to load config {:?}", cli.config))?
    } else {
        AppConfig::default()
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting bracket-stats v{}", env!("CARGO_PKG_VERSION"));

    let storage = config.storage();

    match cli.command {
        Commands::Normalize { input, output } => {
            let input = input.unwrap_or_else(|| storage.raw_events_path());
            let output = output.unwrap_or_else(|| storage.matches_path());

            let events = storage::load_raw_events(&input)
                .with_context(|| format!("Failed to read raw events from {:?}", input))?;
            let report = normalize_events(&events);
            storage::save_matches(&output, &report.matches)?;

            println!("\n=== Normalization Results ===");
            println!("Events:           {}", events.len());
            println!("Sets seen:        {}", report.sets_seen());
            println!("Matches written:  {}", report.matches.len());
            println!("Sets skipped:     {}", report.skipped_sets.len());
            println!("Events skipped:   {}", report.skipped_events.len());
            println!("Output:           {:?}", output);
        }
        Commands::Derive {
            matches,
            reference_time,
            key_mode,
        } => {
            let path = matches.unwrap_or_else(|| storage.matches_path());
            let matches = storage::load_matches(&path)
                .with_context(|| format!("Failed to read matches from {:?}", path))?;
            let aliases = storage::load_alias_table(&config.alias_table_path())?;

            let mut options = config.aggregation.options(Utc::now());
            if let Some(raw) = reference_time {
                options.reference_time = DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("Invalid --reference-time: {}", raw))?
                    .with_timezone(&Utc);
            }
            if let Some(mode) = key_mode {
                options.key_mode = mode;
            }

            let aggregation = aggregate::run(&matches, &aliases, &options);
            storage::save_aggregation(&storage, &aggregation)?;

            println!("\n=== Derive Results ===");
            println!("Matches:          {}", matches.len());
            println!("Players:          {}", aggregation.players.len());
            println!("Reference time:   {}", options.reference_time.to_rfc3339());
            println!("Key mode:         {}", options.key_mode);
        }
        Commands::Players {
            min_sets,
            max_sets,
            min_win_rate,
            max_win_rate,
            min_opponent_win_rate,
            max_opponent_win_rate,
            min_streak,
            max_streak,
            period,
            from,
            to,
            format,
            sort,
            order,
            limit,
            page,
        } => {
            let aggregation = load_derived(&storage)?;

            let mut filters = Vec::new();
            if min_sets.is_some() || max_sets.is_some() {
                filters.push(PlayerFilter::SetsPlayed(Bounds::new(min_sets, max_sets)));
            }
            if min_win_rate.is_some() || max_win_rate.is_some() {
                filters.push(PlayerFilter::WinRate(Bounds::new(min_win_rate, max_win_rate)));
            }
            if min_opponent_win_rate.is_some() || max_opponent_win_rate.is_some() {
                filters.push(PlayerFilter::OpponentWinRate(Bounds::new(
                    min_opponent_win_rate,
                    max_opponent_win_rate,
                )));
            }
            if min_streak.is_some() || max_streak.is_some() {
                filters.push(PlayerFilter::WinStreak(Bounds::new(min_streak, max_streak)));
            }
            if let Some(window) = period {
                filters.push(PlayerFilter::ActiveIn(TimePeriod::Window(window)));
            }
            if let (Some(from), Some(to)) = (from, to) {
                filters.push(PlayerFilter::ActiveIn(TimePeriod::Custom {
                    start: parse_date(&from)?,
                    end: parse_date(&to)?,
                }));
            }
            if let Some(best_of) = format {
                filters.push(PlayerFilter::MatchFormat(best_of));
            }

            let pagination = Pagination {
                page,
                page_size: limit.unwrap_or(config.query.default_limit),
            };
            let sort = sort.map(|field| PlayerSort::new(field, order));
            let players = query_players(&aggregation.players, &filters, sort, &pagination)?;

            print_player_table(&players, pagination.offset());
        }
        Commands::Player {
            name,
            format,
            result,
            score,
        } => {
            let aggregation = load_derived(&storage)?;
            let aliases = storage::load_alias_table(&config.alias_table_path())?;
            let resolver = IdentityResolver::new(&aliases);

            let Some(stats) = find_player(&aggregation.players, &resolver, &name) else {
                println!("No statistics found for player {}", name);
                return Ok(());
            };

            let mut filters = Vec::new();
            if let Some(best_of) = format {
                filters.push(MatchFilter::BestOf(best_of));
            }
            if let Some(result) = result {
                filters.push(MatchFilter::Result(result));
            }
            if !score.is_empty() {
                filters.push(MatchFilter::Scores(score));
            }

            let view = filtered_view(stats, &filters);
            print_player(&view);
        }
        Commands::HeadToHead {
            player,
            opponent,
            format,
            last_matches,
            last_events,
            ranking,
            since,
            before,
        } => {
            let aggregation = load_derived(&storage)?;
            let aliases = storage::load_alias_table(&config.alias_table_path())?;
            let resolver = IdentityResolver::new(&aliases);

            let filter = HeadToHeadFilter {
                best_of: format,
                last_n_matches: last_matches,
                last_n_events: last_events,
                since: since
                    .as_deref()
                    .map(|s| day_bounds(s).map(|(start, _)| start))
                    .transpose()?,
                before: before
                    .as_deref()
                    .map(|s| day_bounds(s).map(|(_, end)| end))
                    .transpose()?,
                event_ranking: ranking.unwrap_or(config.aggregation.event_ranking),
            };

            let entries = query_head_to_head(
                &aggregation.head_to_head,
                &resolver,
                &player,
                &opponent,
                &filter,
            )?;

            if entries.is_empty() {
                println!("No matches found between {} and {}", player, opponent);
                return Ok(());
            }

            let wins = entries.iter().filter(|e| e.result.is_win()).count();
            println!(
                "=== {} vs {}: {}-{} ===\n",
                resolver.resolve_canonical(&player),
                resolver.resolve_canonical(&opponent),
                wins,
                entries.len() - wins
            );
            for entry in &entries {
                println!(
                    "{}  {:<4}  {:<5}  {:<9}  {} / {}",
                    bracket_stats::calculate::format_date(entry.completed_at),
                    entry.result.to_string(),
                    entry.score.to_string(),
                    entry.best_of.to_string(),
                    entry.tournament_name,
                    entry.event_name
                );
            }
        }
        Commands::Leaderboard { min_sets } => {
            let aggregation = load_derived(&storage)?;
            let aliases = storage::load_alias_table(&config.alias_table_path())?;
            let resolver = IdentityResolver::new(&aliases);

            let min_sets = min_sets.unwrap_or(config.query.leaderboard_min_sets);
            let leaderboard = merge_by_identity(&aggregation.players, &resolver, min_sets);
            let rows: Vec<&PlayerStatistics> = leaderboard.iter().collect();

            print_player_table(&rows, 0);
            println!("\nTotal players with {} or more sets: {}", min_sets, rows.len());
        }
    }

    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_derived(storage: &StorageConfig) -> Result<aggregate::Aggregation> {
    storage::load_aggregation(storage).with_context(|| {
        format!(
            "Failed to load statistics from {:?}; run `derive` first",
            storage.derived_dir()
        )
    })
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", s))
}

/// First and last second of a UTC calendar day, as epoch seconds.
fn day_bounds(s: &str) -> Result<(i64, i64)> {
    let date = parse_date(s)?;
    let (Some(start), Some(end)) = (date.and_hms_opt(0, 0, 0), date.and_hms_opt(23, 59, 59))
    else {
        bail!("Date out of range: {}", s);
    };
    Ok((start.and_utc().timestamp(), end.and_utc().timestamp()))
}

fn print_player_table(players: &[&PlayerStatistics], offset: usize) {
    if players.is_empty() {
        println!("No players match the given filters.");
        return;
    }

    let width = players
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0)
        .max("Player".len());

    println!(
        "{:>4} | {:<width$} | {:>4} | {:>8} | {:>6}",
        "Rank", "Player", "Sets", "Win Rate", "Streak"
    );
    println!("{}", "-".repeat(width + 35));
    for (i, p) in players.iter().enumerate() {
        println!(
            "{:>4} | {:<width$} | {:>4} | {:>7.2}% | {:>6}",
            offset + i + 1,
            p.name,
            p.matches_played,
            p.win_rate,
            p.current_win_streak
        );
    }
}

fn print_player(stats: &PlayerStatistics) {
    println!("=== {} ===\n", stats.name);
    if stats.display_names.len() > 1 {
        println!("Also seen as:     {}", stats.display_names.join(", "));
    }
    println!(
        "Sets:             {} ({}-{}, {:.2}%)",
        stats.matches_played, stats.wins, stats.losses, stats.win_rate
    );
    println!(
        "Games:            {}-{} ({:.2}%)",
        stats.total_games_won, stats.total_games_lost, stats.game_win_rate
    );
    println!(
        "Straight games:   {}-{} ({:.2}%)",
        stats.straight_game_wins, stats.straight_game_losses, stats.straight_game_win_rate
    );
    println!(
        "Deciding games:   {}-{} ({:.2}%)",
        stats.deciding_game_wins, stats.deciding_game_losses, stats.deciding_game_win_rate
    );
    println!(
        "Best of 3 / 5:    {:.2}% / {:.2}%",
        stats.best_of_3.win_rate, stats.best_of_5.win_rate
    );
    println!(
        "Streaks:          current W{} L{}, longest W{} L{}",
        stats.current_win_streak,
        stats.current_losing_streak,
        stats.longest_win_streak,
        stats.longest_losing_streak
    );
    println!("Trend:            {}", stats.performance_trend);
    for window in TimeWindow::ALL {
        let bucket = stats.time_based_stats.get(window);
        println!(
            "{:<17} {} sets, {:.2}%",
            format!("{}:", window),
            bucket.matches_played,
            bucket.win_rate
        );
    }
    if let Some(opponent) = &stats.most_common_opponent {
        println!(
            "Most common opp:  {} ({:.2}%)",
            opponent, stats.win_rate_against_most_common_opponent
        );
    }

    if !stats.head_to_head.is_empty() {
        println!("\nHead-to-head:");
        for summary in stats.head_to_head.values() {
            println!(
                "  {:<20} {}-{}  last {} ({})  margin {:+.2}  {}",
                summary.opponent_name,
                summary.wins,
                summary.losses,
                summary.last_match_date,
                summary.last_match_event,
                summary.average_margin,
                summary.performance_trend
            );
        }
    }
}
