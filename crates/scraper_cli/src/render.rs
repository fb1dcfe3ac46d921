//! Terminal rendering for sessions, messages and source snapshots.

use chrono::{DateTime, Local, NaiveDate, Utc};

use scraper_chat::{ChatSession, ChatStorageManager, Message, MessageRole, SourceSnapshot, SourceStatus};

/// Sidebar-style date label: `Today`, `Yesterday` or the calendar date
pub fn date_label(at: DateTime<Utc>, today: NaiveDate) -> String {
    let day = at.with_timezone(&Local).date_naive();
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

fn status_icon(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Idle => "·",
        SourceStatus::Loading => "⏳",
        SourceStatus::Success => "✅",
        SourceStatus::Error => "❌",
    }
}

/// One line per source, prefixed with its status
pub fn snapshot_lines(snapshot: &SourceSnapshot) -> Vec<String> {
    snapshot
        .sources
        .iter()
        .map(|s| format!("   {} {} ({})", status_icon(s.status), s.title, s.url))
        .collect()
}

pub fn print_snapshot(snapshot: &SourceSnapshot) {
    if snapshot.sequence == 1 {
        println!("🔎 Searching {} sources...", snapshot.sources.len());
    }
    let done = snapshot.sources.iter().filter(|s| s.status.is_terminal()).count();
    println!("   [{}/{}]", done, snapshot.sources.len());
    for line in snapshot_lines(snapshot) {
        println!("{}", line);
    }
}

pub fn print_message(message: &Message) {
    let who = match message.role {
        MessageRole::User => "🧑 You",
        MessageRole::Assistant => "🤖 WebScraper AI",
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    println!("{} ({})", who, time);
    for line in message.content.lines() {
        println!("   {}", line);
    }
    if let Some(sources) = &message.sources {
        println!("   Sources:");
        for source in sources {
            println!("   {} {} ({})", status_icon(source.status), source.title, source.url);
        }
    }
    println!();
}

/// `id-prefix  label  title  (n messages)`
pub fn session_line(session: &ChatSession, current: bool, today: NaiveDate) -> String {
    let marker = if current { "*" } else { " " };
    let short_id: String = session.id.chars().take(8).collect();
    format!(
        "{} {}  {:<12} {}  ({} messages)",
        marker,
        short_id,
        date_label(session.updated_at, today),
        session.title,
        session.messages.len()
    )
}

/// Sessions matching `term`, newest first, with the current one marked
pub fn print_sessions(storage: &ChatStorageManager, term: &str) {
    let today = Local::now().date_naive();
    let current = storage.current_session_id();
    let sessions = storage.search(term);
    if sessions.is_empty() {
        println!("No sessions found");
    }
    for session in sessions {
        let is_current = current.as_deref() == Some(session.id.as_str());
        println!("{}", session_line(&session, is_current, today));
    }
}
