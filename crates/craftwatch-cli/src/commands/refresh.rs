use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use craftwatch_core::models::DashboardStats;
use craftwatch_core::scheduler::{DashboardView, NoticeKind, RefreshState};
use craftwatch_core::RefreshScheduler;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::ProfileAuth;
use crate::commands::common::{
    connect, format_server_lines, format_stats_lines, server_to_list_item, ServerListItem,
};
use crate::error::CliError;

/// How often `watch` checks whether the session needs refreshing.
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// One cycle in the foreground.
pub async fn run_refresh(as_json: bool, global_profile: Option<&str>) -> Result<(), CliError> {
    let backend = connect(global_profile).await?;
    let scheduler = RefreshScheduler::new(
        Arc::clone(&backend.probe),
        Arc::clone(&backend.store),
        backend.session.clone(),
    );
    let servers = scheduler.fetch_and_reconcile().await?;

    if as_json {
        let items = servers
            .iter()
            .map(server_to_list_item)
            .collect::<Vec<ServerListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_server_lines(&servers) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Mount the scheduler and redraw whenever it publishes, until Ctrl-C or `q`.
pub async fn run_watch(
    interval: Option<u64>,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let backend = connect(global_profile).await?;
    let interval = match interval {
        Some(0) => {
            return Err(CliError::Config(
                "--interval must be at least 1 second".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => backend.config.refresh_interval(),
    };

    let scheduler = RefreshScheduler::with_interval(
        Arc::clone(&backend.probe),
        Arc::clone(&backend.store),
        backend.session.clone(),
        interval,
    );
    let mut view = scheduler.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let refresher = tokio::spawn(keep_session_fresh(backend.auth.clone()));
    scheduler.mount();

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = view.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = view.borrow_and_update().clone();
                render(&snapshot);
            }
            line = input.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "r" | "refresh" => {
                        if !scheduler.refresh_now() {
                            println!("A refresh is already running.");
                        }
                    }
                    "q" | "quit" => break Ok(()),
                    "" => {}
                    other => println!("Unknown command '{other}'. Use r or q."),
                },
                // stdin closed; keep refreshing on the timer until Ctrl-C
                Ok(None) => stdin_open = false,
                Err(error) => break Err(CliError::Io(error)),
            },
        }
    };

    scheduler.teardown();
    refresher.abort();
    result
}

async fn keep_session_fresh(auth: ProfileAuth) {
    let mut ticker = tokio::time::interval(SESSION_CHECK_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(error) = auth.keep_fresh().await {
            tracing::warn!("Failed to refresh session: {}", error);
        }
    }
}

fn render(view: &DashboardView) {
    let status = match view.state {
        RefreshState::Loading => "loading".to_string(),
        RefreshState::Refreshing(trigger) => format!("refreshing ({trigger:?})").to_lowercase(),
        RefreshState::Idle => view.last_refreshed_at.map_or_else(
            || "idle".to_string(),
            |at| format!("updated {}", at.with_timezone(&Local).format("%H:%M:%S")),
        ),
        RefreshState::Stopped => return,
    };

    println!();
    println!("== craftwatch: {status} ==");
    if let Some(notice) = &view.notice {
        match notice.kind {
            NoticeKind::AuthRequired => {
                println!("! {} Run `craftwatch auth login`.", notice.message);
            }
            NoticeKind::Error => println!("! {}", notice.message),
        }
    }
    for line in format_stats_lines(&DashboardStats::from_servers(&view.servers)) {
        println!("{line}");
    }
    println!();
    for line in format_server_lines(&view.servers) {
        println!("{line}");
    }
}
