use dashnote_core::SessionUser;
use dashnote_protocol::annotation::AnnotationEvent;

pub const MEASUREMENT: &str = "events";

/// Author attributes written alongside an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorFields {
    pub user_id: Option<i64>,
    pub login: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

impl AuthorFields {
    pub fn from_session(user: &SessionUser) -> Self {
        Self {
            user_id: Some(user.id),
            login: Some(user.login.clone()),
            avatar_url: Some(user.gravatar_url.clone()),
            email: Some(user.email.clone()),
        }
    }

    pub fn from_event(event: &AnnotationEvent) -> Self {
        Self {
            user_id: event.user_id,
            login: event.login.clone(),
            avatar_url: event.avatar_url.clone(),
            email: event.email.clone(),
        }
    }
}

/// Serializes one event into a line of the `events` measurement.
///
/// Numeric fields carry no type suffix so they land as floats, matching rows
/// already in the measurement.
pub fn encode_event_line(id: &str, event: &AnnotationEvent, author: &AuthorFields) -> String {
    let mut fields: Vec<String> = Vec::new();

    if let Some(user_id) = author.user_id {
        fields.push(format!("userId={}", user_id));
    }
    for (key, value) in [
        ("login", &author.login),
        ("avatarUrl", &author.avatar_url),
        ("email", &author.email),
    ] {
        if let Some(value) = value {
            fields.push(format!("{}={}", key, string_field(value)));
        }
    }
    if let Some(panel_id) = event.scoped_panel_id() {
        fields.push(format!("panelId={}", panel_id));
    }
    if let Some(dashboard_id) = event.dashboard_id {
        fields.push(format!("dashboardId={}", dashboard_id));
    }
    if let Some(time_end) = event.time_end {
        fields.push(format!("timeEnd={}", time_end));
    }
    fields.push(format!("tags={}", string_field(&event.tags.join(","))));
    fields.push(format!("text={}", string_field(&event.text)));

    format!(
        "{},id={} {} {}",
        MEASUREMENT,
        escape_tag(id),
        fields.join(","),
        event.time.saturating_mul(1_000_000)
    )
}

fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn string_field(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_session_author_on_create() {
        let user = SessionUser {
            id: 7,
            login: "ops".into(),
            gravatar_url: "/avatar/7".into(),
            email: "ops@example.com".into(),
            ..SessionUser::default()
        };
        let event = AnnotationEvent::new(100, "deploy \"v2\"")
            .with_panel(2)
            .with_dashboard(3)
            .with_time_end(150)
            .with_tags(["release", "prod"]);

        let line = encode_event_line("1700000000000", &event, &AuthorFields::from_session(&user));
        assert_eq!(
            line,
            "events,id=1700000000000 userId=7,login=\"ops\",avatarUrl=\"/avatar/7\",\
             email=\"ops@example.com\",panelId=2,dashboardId=3,timeEnd=150,tags=\"release,prod\",\
             text=\"deploy \\\"v2\\\"\" 100000000"
        );
    }

    #[test]
    fn omits_absent_scope_and_escapes_tag() {
        let event = AnnotationEvent::new(5, "note").with_panel(0);
        let line = encode_event_line("a b,c", &event, &AuthorFields::default());
        assert_eq!(line, "events,id=a\\ b\\,c tags=\"\",text=\"note\" 5000000");
    }
}
