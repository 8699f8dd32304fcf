use chrono::{TimeZone, Utc};
use colored::*;
use dashnote_core::{DashboardModel, Notification, NotificationKind, SessionUser};
use dashnote_protocol::annotation::{AlertState, AnnotationEvent};
use tokio::sync::broadcast;

pub fn print_success(message: &str) {
    println!("{}", format!("✔ {}", message).green().bold());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠ {}", message).yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("✖ {}", message).red().bold());
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn print_event(event: &AnnotationEvent) {
    let id = event
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    let when = match event.time_end {
        Some(end) if event.spans_interval() => {
            format!("{} → {}", format_millis(event.time), format_millis(end))
        }
        _ => format_millis(event.time),
    };
    let source = event.source_datasource().unwrap_or("?");

    println!(
        "{} {} {} {}",
        format!("#{}", id).cyan().bold(),
        when.dimmed(),
        format!("[{}]", source).blue(),
        event.text
    );
    if !event.tags.is_empty() {
        println!("    tags: {}", event.tags.join(", ").yellow());
    }
    if let Some(login) = &event.login {
        println!("    by {}", login.dimmed());
    }
}

pub fn print_alert_state(state: &AlertState) {
    let label = if state.is_alerting() {
        state.state.red().bold()
    } else {
        state.state.green()
    };
    println!("Alert state for panel {}: {}", state.panel_id, label);
}

pub fn print_dashboard(dashboard: &DashboardModel) {
    println!("{}", dashboard.title().bold());
    if let Some(uid) = dashboard.uid() {
        println!("  uid:       {}", uid.cyan());
    }
    if let Some(id) = dashboard.id() {
        println!("  id:        {}", id);
    }
    println!("  panels:    {}", dashboard.panels().len());
    if dashboard.is_snapshot() {
        println!("  {}", "snapshot".magenta());
    }
    println!("  annotation sources:");
    for definition in dashboard.annotation_definitions() {
        let state = if definition.enable {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        let built_in = if definition.built_in { " (built-in)" } else { "" };
        println!(
            "    - {} [{}] {}{}",
            definition.name.bold(),
            definition.datasource.blue(),
            state,
            built_in
        );
    }
}

pub fn print_user(user: &SessionUser) {
    println!("{} {}", "Logged in as".bold(), user.login.cyan().bold());
    println!("  id:     {}", user.id);
    println!("  org:    {}", user.org_id);
    if !user.email.is_empty() {
        println!("  email:  {}", user.email);
    }
    if user.is_grafana_admin {
        println!("  {}", "server admin".magenta());
    }
}

/// Prints whatever the annotation layer reported while a command ran.
pub fn drain_notifications(receiver: &mut broadcast::Receiver<Notification>) {
    while let Ok(notification) = receiver.try_recv() {
        let line = match &notification.detail {
            Some(detail) => format!("{}: {}", notification.title, detail),
            None => notification.title.clone(),
        };
        match notification.kind {
            NotificationKind::Success => print_success(&line),
            NotificationKind::Warning => print_warning(&line),
            NotificationKind::Error => print_error(&line),
        }
    }
}
