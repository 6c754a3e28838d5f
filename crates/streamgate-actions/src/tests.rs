use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use streamgate_common::types::{
    ActionOn, ActionSnapshot, ActionType, DataPoint, FilterSnapshot, PointKind, StateSnapshot,
    TransitionSnapshot, TriggerOp, TriggerSnapshot,
};

use crate::handlers::custom::MemoryTopicPublisher;
use crate::handlers::report::{MemoryJobScheduler, ScheduledJob};
use crate::outbox::{Outbox, OutboundMessage};
use crate::recipients::{normalize, MemberDirectory, MemoryDirectory, RecipientToken};
use crate::registry::{ActionRegistry, HandlerDeps};
use crate::{ActionContext, ActionHandler, Environment};

struct Fixture {
    filter: FilterSnapshot,
    point: DataPoint,
    on: ActionOn,
}

impl Fixture {
    fn new(action_type: ActionType, on: ActionOn, payload: Option<serde_json::Value>) -> Self {
        let action = ActionSnapshot {
            id: 10,
            action_type,
            on,
            extra_payload: payload,
            state: 1,
        };
        let state = StateSnapshot {
            id: 1,
            label: "Too Hot".to_string(),
            slug: "too-hot".to_string(),
            actions: vec![action],
        };
        let trigger = TriggerSnapshot {
            id: 100,
            operator: TriggerOp::Ge,
            operator_display: TriggerOp::Ge.display().to_string(),
            threshold: Some(70.0),
            user_threshold: Some(70.0),
            user_output_unit: Some("F".to_string()),
            user_unit_full: Some("Fahrenheit".to_string()),
            transition: 20,
        };
        let transition = TransitionSnapshot {
            id: 20,
            src: None,
            dst: 1,
            triggers: vec![trigger],
        };
        let filter = FilterSnapshot {
            id: 1,
            slug: "f--0000-0001----5001".to_string(),
            name: "Water watch".to_string(),
            input_stream: None,
            project: "0000-0001".to_string(),
            variable: "5001".to_string(),
            device: None,
            active: true,
            states: vec![state],
            transitions: vec![transition],
        };
        let point = DataPoint {
            stream_slug: "s--0000-0001--0000-0000-0000-00ab--5001".to_string(),
            device_slug: "d--0000-0000-0000-00ab".to_string(),
            project_slug: "p--0000-0001".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
            streamer_local_id: Some(42),
            device_timestamp: None,
            value: Some(71.0),
            int_value: Some(71),
            kind: PointKind::Numeric,
        };
        Self { filter, point, on }
    }

    fn ctx(&self) -> ActionContext<'_> {
        ActionContext {
            filter: &self.filter,
            state: &self.filter.states[0],
            transition: &self.filter.transitions[0],
            action: &self.filter.states[0].actions[0],
            on: self.on,
            point: &self.point,
            units: None,
            user: None,
        }
    }
}

// ---- recipient normalization ----

#[test]
fn normalize_accepts_token_lists() {
    let tokens = normalize(&json!(["org:acme", "user:jdoe", "email:ops@example.com"]));
    assert_eq!(
        tokens,
        vec![
            RecipientToken::Org("acme".to_string()),
            RecipientToken::User("jdoe".to_string()),
            RecipientToken::Email("ops@example.com".to_string()),
        ]
    );
}

#[test]
fn normalize_folds_the_legacy_dict_shape() {
    let tokens = normalize(&json!({
        "org": "acme",
        "users": ["jdoe"],
        "emails": ["ops@example.com"],
    }));
    assert_eq!(
        tokens,
        vec![
            RecipientToken::Org("acme".to_string()),
            RecipientToken::User("jdoe".to_string()),
            RecipientToken::Email("ops@example.com".to_string()),
        ]
    );
}

#[test]
fn normalize_parses_a_stringified_dict() {
    let tokens = normalize(&json!("{\"emails\": [\"ops@example.com\"]}"));
    assert_eq!(
        tokens,
        vec![RecipientToken::Email("ops@example.com".to_string())]
    );
}

#[test]
fn normalize_skips_garbage() {
    assert!(normalize(&json!(42)).is_empty());
    assert_eq!(normalize(&json!(["email:a@b.c", "bogus"])).len(), 1);
}

#[test]
fn directory_resolves_and_dedups() {
    let directory = MemoryDirectory::new()
        .with_org("0000-0001", &["a@example.com", "b@example.com"])
        .with_user("jdoe", "a@example.com");
    let emails = directory.emails_for(
        &[
            RecipientToken::Org("0000-0001".to_string()),
            RecipientToken::User("jdoe".to_string()),
        ],
        "0000-0001",
    );
    assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
}

// ---- email ----

fn deps_with_directory(directory: MemoryDirectory) -> (HandlerDeps, tokio::sync::mpsc::Receiver<OutboundMessage>) {
    let (mut deps, rx) = HandlerDeps::in_memory();
    deps.directory = Arc::new(directory);
    (deps, rx)
}

#[test]
fn email_action_enqueues_a_message_per_dispatch() {
    let fixture = Fixture::new(
        ActionType::Email,
        ActionOn::Entry,
        Some(json!({
            "notification_recipient": ["email:ops@example.com"],
            "body": "{label} went {on} {state} at {value}",
        })),
    );
    let (deps, mut rx) = deps_with_directory(MemoryDirectory::new());
    let registry = ActionRegistry::with_defaults(deps);

    let result = registry.dispatch(&fixture.ctx());
    assert!(result.handled);
    assert!(result.derived.is_none());

    let OutboundMessage::Email {
        recipients, body, ..
    } = rx.try_recv().unwrap()
    else {
        panic!("expected an email message");
    };
    assert_eq!(recipients, vec!["ops@example.com"]);
    assert_eq!(body, "Water watch went into Too Hot at 71.00");
}

#[test]
fn email_exit_actions_use_the_word_from() {
    let fixture = Fixture::new(
        ActionType::Email,
        ActionOn::Exit,
        Some(json!({
            "notification_recipient": ["email:ops@example.com"],
            "body": "{on}",
        })),
    );
    let (deps, mut rx) = deps_with_directory(MemoryDirectory::new());
    let registry = ActionRegistry::with_defaults(deps);

    registry.dispatch(&fixture.ctx());
    let OutboundMessage::Email { body, .. } = rx.try_recv().unwrap() else {
        panic!("expected an email message");
    };
    assert_eq!(body, "from");
}

#[test]
fn email_with_no_resolvable_recipients_is_unhandled() {
    let fixture = Fixture::new(
        ActionType::Email,
        ActionOn::Entry,
        Some(json!({ "notification_recipient": ["user:nobody"] })),
    );
    let (deps, mut rx) = deps_with_directory(MemoryDirectory::new());
    let registry = ActionRegistry::with_defaults(deps);

    assert!(!registry.dispatch(&fixture.ctx()).handled);
    assert!(rx.try_recv().is_err());
}

#[test]
fn missing_extra_payload_is_caught_not_propagated() {
    let fixture = Fixture::new(ActionType::Email, ActionOn::Entry, None);
    let (deps, _rx) = HandlerDeps::in_memory();
    let registry = ActionRegistry::with_defaults(deps);

    assert!(!registry.dispatch(&fixture.ctx()).handled);
}

#[test]
fn bad_body_template_still_sends_the_error_message() {
    let fixture = Fixture::new(
        ActionType::Email,
        ActionOn::Entry,
        Some(json!({
            "notification_recipient": ["email:ops@example.com"],
            "body": "value is {valuee}",
        })),
    );
    let (deps, mut rx) = deps_with_directory(MemoryDirectory::new());
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    let OutboundMessage::Email { body, .. } = rx.try_recv().unwrap() else {
        panic!("expected an email message");
    };
    assert_eq!(
        body,
        "2026-08-01 10:00:00 UTC: Stream Filter \"Water watch\" Error: unknown placeholder '{valuee}'"
    );
}

// ---- sms ----

#[test]
fn sms_action_requires_number_and_body() {
    let fixture = Fixture::new(
        ActionType::Sms,
        ActionOn::Exit,
        Some(json!({ "number": "+15551230000" })),
    );
    let (deps, _rx) = HandlerDeps::in_memory();
    let registry = ActionRegistry::with_defaults(deps);
    assert!(!registry.dispatch(&fixture.ctx()).handled);

    let fixture = Fixture::new(
        ActionType::Sms,
        ActionOn::Exit,
        Some(json!({ "number": "+15551230000", "body": "{label} {on} {state}" })),
    );
    let (deps, mut rx) = HandlerDeps::in_memory();
    let registry = ActionRegistry::with_defaults(deps);
    assert!(registry.dispatch(&fixture.ctx()).handled);

    let OutboundMessage::Sms { number, body, .. } = rx.try_recv().unwrap() else {
        panic!("expected an sms message");
    };
    assert_eq!(number, "+15551230000");
    assert_eq!(body, "Water watch out of Too Hot");
}

// ---- slack ----

#[test]
fn slack_is_logged_not_sent_outside_live_environments() {
    let fixture = Fixture::new(
        ActionType::Slack,
        ActionOn::Entry,
        Some(json!({ "slack_webhook": "https://hooks.example.com/T1", "custom_note": "" })),
    );
    let (deps, mut rx) = HandlerDeps::in_memory();
    assert_eq!(deps.environment, Environment::Development);
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    assert!(rx.try_recv().is_err());
}

#[test]
fn slack_posts_the_default_body_in_production() {
    let fixture = Fixture::new(
        ActionType::Slack,
        ActionOn::Entry,
        Some(json!({ "slack_webhook": "https://hooks.example.com/T1", "custom_note": "" })),
    );
    let (mut deps, mut rx) = HandlerDeps::in_memory();
    deps.environment = Environment::Production;
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    let OutboundMessage::Slack {
        webhook_url, text, ..
    } = rx.try_recv().unwrap()
    else {
        panic!("expected a slack message");
    };
    assert_eq!(webhook_url, "https://hooks.example.com/T1");
    assert!(text.contains("*Stream Filter Water watch has transitioned into state Too Hot*"));
    assert!(text.contains("Greater or equal than (>=) 70 Fahrenheit"));
}

// ---- custom topic ----

#[test]
fn custom_action_publishes_the_transition_event() {
    let fixture = Fixture::new(
        ActionType::Custom,
        ActionOn::Entry,
        Some(json!({ "topic": "transitions/water" })),
    );
    let publisher = Arc::new(MemoryTopicPublisher::new());
    let (mut deps, _rx) = HandlerDeps::in_memory();
    deps.publisher = publisher.clone();
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "transitions/water");
    assert_eq!(published[0].1["state"], "too-hot");
    assert_eq!(published[0].1["on"], "entry");
}

// ---- derive ----

#[test]
fn derive_action_retargets_the_point() {
    let fixture = Fixture::new(
        ActionType::Derive,
        ActionOn::Entry,
        Some(json!({
            "output_stream": "s--0000-0001--0000-0000-0000-00ab--5900",
            "local_id": 7,
        })),
    );
    let (deps, _rx) = HandlerDeps::in_memory();
    let registry = ActionRegistry::with_defaults(deps);

    let result = registry.dispatch(&fixture.ctx());
    assert!(result.handled);
    let derived = result.derived.unwrap();
    assert_eq!(derived.stream_slug, "s--0000-0001--0000-0000-0000-00ab--5900");
    assert_eq!(derived.device_slug, "d--0000-0000-0000-00ab");
    assert_eq!(derived.project_slug, "p--0000-0001");
    assert_eq!(derived.streamer_local_id, Some(7));
    assert_eq!(derived.value, Some(71.0));
    assert_eq!(derived.timestamp, fixture.point.timestamp);
}

#[test]
fn derive_action_carries_the_local_id_forward() {
    let fixture = Fixture::new(
        ActionType::Derive,
        ActionOn::Entry,
        Some(json!({ "output_stream": "s--0000-0001--0000-0000-0000-00ab--5900" })),
    );
    let (deps, _rx) = HandlerDeps::in_memory();
    let registry = ActionRegistry::with_defaults(deps);

    let result = registry.dispatch(&fixture.ctx());
    let derived = result.derived.unwrap();
    assert_eq!(derived.streamer_local_id, Some(42));
    assert_eq!(derived.int_value, Some(71));
}

// ---- report & summary ----

#[test]
fn report_action_schedules_a_device_report() {
    let fixture = Fixture::new(ActionType::Report, ActionOn::Entry, None);
    let scheduler = Arc::new(MemoryJobScheduler::new());
    let (mut deps, _rx) = HandlerDeps::in_memory();
    deps.scheduler = scheduler.clone();
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    assert_eq!(
        scheduler.jobs(),
        vec![ScheduledJob::DeviceReport {
            device_slug: "d--0000-0000-0000-00ab".to_string(),
        }]
    );
}

#[test]
fn summary_action_schedules_the_generator() {
    let fixture = Fixture::new(
        ActionType::Summary,
        ActionOn::Entry,
        Some(json!({
            "notification_recipients": ["org:0000-0001"],
            "generator": "weekly-water",
        })),
    );
    let scheduler = Arc::new(MemoryJobScheduler::new());
    let (mut deps, _rx) = HandlerDeps::in_memory();
    deps.scheduler = scheduler.clone();
    let registry = ActionRegistry::with_defaults(deps);

    assert!(registry.dispatch(&fixture.ctx()).handled);
    assert_eq!(
        scheduler.jobs(),
        vec![ScheduledJob::Summary {
            generator: "weekly-water".to_string(),
            recipients: vec![RecipientToken::Org("0000-0001".to_string())],
        }]
    );
}

// ---- outbox ----

#[test]
fn full_outbox_is_an_error_not_a_block() {
    let (outbox, _rx) = Outbox::channel(1);
    outbox
        .enqueue(OutboundMessage::Sms {
            id: "1".to_string(),
            number: "+1".to_string(),
            body: "a".to_string(),
        })
        .unwrap();
    let err = outbox
        .enqueue(OutboundMessage::Sms {
            id: "2".to_string(),
            number: "+1".to_string(),
            body: "b".to_string(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("full"));
}
