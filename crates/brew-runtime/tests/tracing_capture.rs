//! Log output of a session, captured with a `tracing-subscriber` layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use brew_core::{BrewConfig, ProfileTable};
use brew_runtime::{NullAudio, Session};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Debug, Clone)]
struct Captured {
    target: String,
    message: String,
}

#[derive(Default)]
struct CaptureState {
    events: Vec<Captured>,
    dispatch_spans: Vec<String>,
}

struct Capture {
    state: Arc<Mutex<CaptureState>>,
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        if attrs.metadata().name() != "dispatch" {
            return;
        }
        struct ActionField(Option<String>);
        impl tracing::field::Visit for ActionField {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "action" {
                    self.0 = Some(value.to_string());
                }
            }

            fn record_debug(
                &mut self,
                _field: &tracing::field::Field,
                _value: &dyn std::fmt::Debug,
            ) {
            }
        }
        let mut v = ActionField(None);
        attrs.record(&mut v);
        if let Some(action) = v.0 {
            self.state.lock().expect("capture lock").dispatch_spans.push(action);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg(Option<String>);
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg(None);
        event.record(&mut msg);
        self.state.lock().expect("capture lock").events.push(Captured {
            target: event.metadata().target().to_string(),
            message: msg.0.unwrap_or_default(),
        });
    }
}

fn captured<F: FnOnce()>(f: F) -> CaptureState {
    let state = Arc::new(Mutex::new(CaptureState::default()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        state: Arc::clone(&state),
    });
    tracing::subscriber::with_default(subscriber, f);
    let mut guard = state.lock().expect("capture lock");
    std::mem::take(&mut *guard)
}

fn has(state: &CaptureState, target: &str, message: &str) -> bool {
    state
        .events
        .iter()
        .any(|e| e.target == target && e.message == message)
}

#[test]
fn full_pour_logs_each_stage() {
    let state = captured(|| {
        let mut s = Session::new(
            BrewConfig::default(),
            ProfileTable::builtin(),
            Box::new(NullAudio),
        );
        s.request_panel_transition("americano");
        s.advance(Duration::from_secs(30));
    });

    assert!(has(&state, "brew.panel", "transition started"));
    assert!(has(&state, "brew.audio", "pour trigger armed"));
    assert!(has(&state, "brew.pour", "pour started"));
    assert!(has(&state, "brew.pour", "pour finished"));
    for label in [
        "panel.swap_in",
        "panel.settle",
        "audio.pour_trigger",
        "pour.fill",
        "pour.finish",
    ] {
        assert!(
            state.dispatch_spans.iter().any(|s| s == label),
            "missing dispatch span {label}"
        );
    }
}

#[test]
fn cancellation_is_logged_with_scope() {
    let state = captured(|| {
        let mut s = Session::new(
            BrewConfig::default(),
            ProfileTable::builtin(),
            Box::new(NullAudio),
        );
        s.start_pour_sequence("latte");
        s.advance(Duration::from_millis(500));
        s.cancel_pour_sequence();
    });

    assert!(has(&state, "brew.timer", "timer scope cancelled"));
    assert!(has(&state, "brew.pour", "pour cancelled"));
    assert!(!has(&state, "brew.pour", "pour finished"));
}

#[test]
fn rejected_requests_are_debug_events() {
    let state = captured(|| {
        let mut s = Session::new(
            BrewConfig::default(),
            ProfileTable::builtin(),
            Box::new(NullAudio),
        );
        s.request_panel_transition("home");
    });
    assert!(has(&state, "brew.panel", "transition rejected"));
    assert!(state.dispatch_spans.is_empty());
}
