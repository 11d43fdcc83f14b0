use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use crate::aggregator::{valid_chart_days, MarketAggregator, CHART_DAYS};
use crate::coingecko::CoinGeckoClient;
use crate::coinmarketcap::CoinMarketCapClient;
use crate::config::Settings;
use crate::poll::{next_period_start, period_label, period_start, PollService, SubmitOutcome};
use crate::providers::{Candle, CoinStats, MarketProvider, ProviderKind};
use crate::resolver::SymbolResolver;
use crate::store::SqliteStore;
use crate::telegram::TelegramClient;

const KEYCAP_DIGITS: [&str; 10] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟"];

#[derive(Debug, PartialEq)]
enum Command {
    Price { symbol: String },
    Trending,
    Chart { symbol: String, days: String },
    Submit {
        token_name: String,
        symbol: String,
        description: String,
    },
    Draw,
    Help,
}

struct CommandCtx<'a> {
    resolver: &'a SymbolResolver,
    aggregator: &'a MarketAggregator,
    poll: &'a PollService,
    admin_id: Option<i64>,
}

pub async fn run(settings: Settings, store: SqliteStore) -> Result<()> {
    let gecko = Arc::new(CoinGeckoClient::new(&settings)?);
    let cmc = Arc::new(CoinMarketCapClient::new(&settings)?);
    let providers: Vec<Arc<dyn MarketProvider>> = vec![gecko, cmc];

    let resolver = SymbolResolver::new(providers.clone());
    let aggregator = MarketAggregator::new(providers);
    let poll = PollService::new(store, settings.draw_sample_size);
    let telegram = TelegramClient::new(&settings)?;

    let ctx = CommandCtx {
        resolver: &resolver,
        aggregator: &aggregator,
        poll: &poll,
        admin_id: settings.telegram_admin_id,
    };

    log::info!(
        "bot.start poll_timeout={}s admin={}",
        settings.telegram_poll_timeout_secs,
        settings
            .telegram_admin_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unset".into())
    );

    let mut offset = 0i64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("bot.shutdown signal=ctrl_c");
                return Ok(());
            }
            polled = telegram.get_updates(offset, settings.telegram_poll_timeout_secs) => {
                let updates = match polled {
                    Ok(u) => u,
                    Err(e) => {
                        log::error!("bot.poll.error {e:#}");
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(message) = update.message else { continue };
                    let Some(text) = message.text.as_deref() else { continue };
                    let Some(command) = parse_command(text) else { continue };

                    let sender = message.from.as_ref().map(|u| u.id);
                    let reply = handle_command(&ctx, command, sender).await;
                    if let Err(e) = telegram.send_message(message.chat.id, &reply).await {
                        log::error!("bot.reply.error chat={} {e:#}", message.chat.id);
                    }
                }
            }
        }
    }
}

/// Slash command out of raw message text. Group chats suffix the command
/// with @botname; that part is dropped.
fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let name = head[1..].split('@').next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    match name.as_str() {
        "price" => Some(Command::Price {
            symbol: args.first()?.to_uppercase(),
        }),
        "trending" => Some(Command::Trending),
        "chart" => Some(Command::Chart {
            symbol: args.first()?.to_uppercase(),
            days: args.get(1)?.to_string(),
        }),
        "submit" => {
            if args.len() < 3 {
                return None;
            }
            Some(Command::Submit {
                token_name: args[0].to_string(),
                symbol: args[1].to_uppercase(),
                description: args[2..].join(" "),
            })
        }
        "draw" => Some(Command::Draw),
        "help" | "start" => Some(Command::Help),
        _ => None,
    }
}

async fn handle_command(ctx: &CommandCtx<'_>, command: Command, sender: Option<i64>) -> String {
    match command {
        Command::Price { symbol } => match price_reply(ctx, &symbol).await {
            Ok(Some(text)) => text,
            Ok(None) => format!("Data for ({symbol}) is not available"),
            Err(e) => {
                log::error!("bot.price.error symbol={symbol} {e:#}");
                format!("Unable to get data for ({symbol}) at this time")
            }
        },
        Command::Trending => match trending_reply(ctx).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("bot.trending.error {e:#}");
                "Unable to get trending tokens at this time".into()
            }
        },
        Command::Chart { symbol, days } => {
            if !valid_chart_days(&days) {
                return format!("Days must be one of: {}", CHART_DAYS.join(", "));
            }
            match chart_reply(ctx, &symbol, &days).await {
                Ok(Some(text)) => text,
                Ok(None) => format!("Data for ({symbol}) is not available"),
                Err(e) => {
                    log::error!("bot.chart.error symbol={symbol} {e:#}");
                    "Unable to gather charting data at this moment".into()
                }
            }
        }
        Command::Submit {
            token_name,
            symbol,
            description,
        } => {
            let today = Local::now().date_naive();
            match ctx.poll.submit(&token_name, &symbol, &description, today) {
                Ok(SubmitOutcome::Accepted(s)) => format!(
                    "Submitted *{s}* to the {} drawing",
                    period_label(today)
                ),
                Ok(SubmitOutcome::AlreadySubmitted) => format!(
                    "*{token_name} ({symbol})* was already submitted for the {} drawing. Submissions reopen in {}.",
                    period_label(today),
                    period_label(next_period_start(today)),
                ),
                Err(e) => {
                    log::error!("bot.submit.error token={token_name} {e:#}");
                    "Unable to submit token at this time. Try again later".into()
                }
            }
        }
        Command::Draw => {
            if ctx.admin_id.is_none() || sender != ctx.admin_id {
                return "The monthly draw can only be started by the admin".into();
            }
            let today = Local::now().date_naive();
            match ctx.poll.draw(period_start(today), today) {
                Ok(drawn) if drawn.is_empty() => {
                    format!("No submissions yet for the {} drawing", period_label(today))
                }
                Ok(drawn) => render_draw(&drawn),
                Err(e) => {
                    log::error!("bot.draw.error {e:#}");
                    "Unable to draw at this moment. Try again later".into()
                }
            }
        }
        Command::Help => "Commands:\n\
             /price SYMBOL — price data for a token\n\
             /trending — trending tokens on CoinGecko & CoinMarketCap\n\
             /chart SYMBOL DAYS — OHLC summary (1, 7, 14, 30, 90, 180, 365, max)\n\
             /submit NAME SYMBOL DESCRIPTION — enter the monthly poll\n\
             /draw — start the monthly poll (admin)"
            .into(),
    }
}

async fn price_reply(ctx: &CommandCtx<'_>, symbol: &str) -> Result<Option<String>> {
    let ids = ctx.resolver.resolve(symbol).await?;
    if ids.is_empty() {
        return Ok(None);
    }

    let mut sections = Vec::with_capacity(ids.len());
    for id in &ids {
        let stats = ctx.aggregator.coin_stats(id).await?;
        sections.push(render_stats(&stats));
    }
    Ok(Some(sections.join("\n\n")))
}

async fn trending_reply(ctx: &CommandCtx<'_>) -> Result<String> {
    let lists = ctx.aggregator.trending().await?;
    let mut out = String::from("Trending tokens 🔥");
    for (kind, entries) in lists {
        let title = match kind {
            ProviderKind::CoinGecko => "CoinGecko",
            ProviderKind::CoinMarketCap => "CoinMarketCap",
        };
        out.push_str(&format!("\n\n*{title}*\n"));
        if entries.is_empty() {
            out.push_str("(nothing listed)");
        } else {
            out.push_str(
                &entries
                    .iter()
                    .map(|e| format!("> {e}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
    }
    Ok(out)
}

async fn chart_reply(ctx: &CommandCtx<'_>, symbol: &str, days: &str) -> Result<Option<String>> {
    let ids = ctx.resolver.resolve(symbol).await?;
    if ids.is_empty() {
        return Ok(None);
    }

    let mut sections = Vec::with_capacity(ids.len());
    for id in &ids {
        let candles = ctx.aggregator.chart(id, days).await?;
        sections.push(render_candles(&id.name, symbol, days, &candles));
    }
    Ok(Some(sections.join("\n\n")))
}

fn change_icon(value: f64) -> &'static str {
    // Strictly positive gets the up icon; an exact 0% renders as down.
    if value > 0.0 {
        "📈"
    } else {
        "📉"
    }
}

fn render_stats(stats: &CoinStats) -> String {
    let mut lines = vec![format!("*{} ({})*", stats.name, stats.symbol)];
    if !stats.website.is_empty() {
        lines.push(stats.website.clone());
    }
    if !stats.explorers.is_empty() {
        lines.push(format!("Explorers 🔗: {}", stats.explorers.join(", ")));
    }
    lines.push(format!("Price 💸: {}", stats.price));
    lines.push(format!(
        "Market Cap Rank 🥇: {}",
        stats
            .market_cap_rank
            .map(|r| r.to_string())
            .unwrap_or_else(|| "n/a".into())
    ));
    lines.push(format!("Volume 💰: {}", stats.volume));
    lines.push(format!(
        "24H Change {}: {}%",
        change_icon(stats.percent_change_24h),
        stats.percent_change_24h
    ));
    lines.push(format!(
        "7D Change {}: {}%",
        change_icon(stats.percent_change_7d),
        stats.percent_change_7d
    ));
    lines.push(format!(
        "30D Change {}: {}%",
        change_icon(stats.percent_change_30d),
        stats.percent_change_30d
    ));
    if let Some(ath) = stats.percent_change_ath {
        lines.push(format!("ATH Change {}: {ath}%", change_icon(ath)));
    }
    lines.join("\n")
}

fn render_candles(name: &str, symbol: &str, days: &str, candles: &[Candle]) -> String {
    let Some(first) = candles.first() else {
        return format!("No chart data for {name} ({symbol}) over {days} days");
    };
    let last = candles.last().unwrap_or(first);

    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let change = if first.open != 0.0 {
        (last.close - first.open) / first.open * 100.0
    } else {
        0.0
    };

    format!(
        "*{name} ({symbol})* — {days} day window, {} candles\n\
         Open {} | High {} | Low {} | Close {}\n\
         Change {}: {change:.2}%",
        candles.len(),
        crate::utils::format_usd(first.open),
        crate::utils::format_usd(high),
        crate::utils::format_usd(low),
        crate::utils::format_usd(last.close),
        change_icon(change),
    )
}

fn render_draw(drawn: &[crate::store::Submission]) -> String {
    let mut out = String::from("Vote for the token of the month! 🗳️\n");
    for (i, submission) in drawn.iter().enumerate() {
        let keycap = KEYCAP_DIGITS.get(i).copied().unwrap_or("🔢");
        out.push_str(&format!(
            "\n{keycap} *{submission}* — {}",
            submission.description
        ));
    }
    out
}
