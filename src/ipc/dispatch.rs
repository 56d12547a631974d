//! IPC message dispatch — parse s-expressions and route to handlers.

use lexpr::Value;
use tracing::{debug, warn};

use crate::state::AirpointState;
use crate::tracking::skeleton::{Body, Joint, JointId, Position3, TrackingState};
use crate::tracking::InteractiveTarget;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(state: &mut AirpointState, client_id: u64, raw: &str) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    // The hello handshake must come before anything else.
    let is_authenticated = state
        .ipc_server
        .clients
        .get(&client_id)
        .map(|c| c.authenticated)
        .unwrap_or(false);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(state, client_id, msg_id, &value),
        _ if !is_authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(msg_id, &value),
        // Frame ingestor boundary
        Some("frame-inject") => handle_frame_inject(state, msg_id, &value),
        // UI layer boundary
        Some("target-register") => handle_target_register(state, msg_id, &value),
        Some("target-list") => handle_target_list(state, msg_id),
        Some("pointer-state") => handle_pointer_state(state, msg_id),
        Some("selection-state") => handle_selection_state(state, msg_id),
        // Action dispatcher boundary
        Some("trigger") => handle_trigger(state, msg_id),
        // Configuration and observability
        Some("pipeline-status") => handle_pipeline_status(state, msg_id),
        Some("frame-stats") => handle_frame_stats(state, msg_id),
        Some("set-canvas") => handle_set_canvas(state, msg_id, &value),
        Some("set-glyph") => handle_set_glyph(state, msg_id, &value),
        Some("set-smoothing") => handle_set_smoothing(state, msg_id, &value),
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_hello(
    state: &mut AirpointState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    // SO_PEERCRED: only the daemon's own user may connect.
    if let Some(client) = state.ipc_server.clients.get(&client_id) {
        if let Some(peer_uid) = client.peer_uid {
            let our_uid = unsafe { libc::getuid() };
            if peer_uid != our_uid {
                warn!(client_id, peer_uid, our_uid, "rejecting client: UID mismatch");
                return Some(error_response(msg_id, "authentication failed: UID mismatch"));
            }
        }
    }

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id, client_name, "hello handshake (authenticated)");

    let peer_pid = state
        .ipc_server
        .clients
        .get(&client_id)
        .and_then(|c| c.peer_pid);
    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.authenticated = true;
    }

    let pid_field = peer_pid
        .map(|p| format!(" :peer-pid {}", p))
        .unwrap_or_default();
    Some(format!(
        "(:type :hello :id {} :version 1 :server \"airpoint\" :features (:frame-inject t :trigger t){})",
        msg_id, pid_field
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Some(format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts
    ))
}

fn handle_frame_inject(state: &mut AirpointState, msg_id: i64, value: &Value) -> Option<String> {
    let bodies_value = match plist_value(value, "bodies") {
        Some(v) => v,
        None => return Some(error_response(msg_id, "missing :bodies")),
    };

    let mut bodies = Vec::new();
    for item in list_items(bodies_value) {
        match parse_body(item) {
            Ok(body) => bodies.push(body),
            Err(reason) => return Some(error_response(msg_id, &reason)),
        }
    }

    state.handle_frame(bodies);
    Some(format!(
        "(:type :response :id {} :status :ok :pointer {})",
        msg_id,
        state.pipeline.pointer().sexp()
    ))
}

fn handle_target_register(state: &mut AirpointState, msg_id: i64, value: &Value) -> Option<String> {
    let targets_value = match plist_value(value, "targets") {
        Some(v) => v,
        None => return Some(error_response(msg_id, "missing :targets")),
    };

    let mut targets = Vec::new();
    for item in list_items(targets_value) {
        match parse_target(item) {
            Ok(target) => targets.push(target),
            Err(reason) => return Some(error_response(msg_id, &reason)),
        }
    }

    let count = targets.len();
    state.registry.register(targets);
    Some(format!(
        "(:type :response :id {} :status :ok :count {})",
        msg_id, count
    ))
}

fn handle_target_list(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    let mut list = String::from("(");
    for target in state.registry.iter() {
        list.push_str(&target.sexp());
    }
    list.push(')');

    Some(format!(
        "(:type :response :id {} :status :ok :targets {})",
        msg_id, list
    ))
}

fn handle_pointer_state(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :pointer {})",
        msg_id,
        state.pipeline.pointer().sexp()
    ))
}

fn handle_selection_state(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :gate {})",
        msg_id,
        state.gate.status_sexp()
    ))
}

fn handle_trigger(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    let activated = state
        .trigger_activation()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "nil".to_string());
    Some(format!(
        "(:type :response :id {} :status :ok :activated {})",
        msg_id, activated
    ))
}

fn handle_pipeline_status(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :pipeline {} :pointer {} :gate {} :target-count {})",
        msg_id,
        state.pipeline.config_sexp(),
        state.pipeline.pointer().sexp(),
        state.gate.status_sexp(),
        state.registry.len(),
    ))
}

fn handle_frame_stats(state: &mut AirpointState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :stats {})",
        msg_id,
        state.pipeline.stats.stats_sexp()
    ))
}

fn handle_set_canvas(state: &mut AirpointState, msg_id: i64, value: &Value) -> Option<String> {
    let (w, h) = match (get_float(value, "w"), get_float(value, "h")) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w, h),
        _ => return Some(error_response(msg_id, "invalid :w/:h (positive numbers)")),
    };
    state.pipeline.set_canvas(w, h);
    Some(ok_response(msg_id))
}

fn handle_set_glyph(state: &mut AirpointState, msg_id: i64, value: &Value) -> Option<String> {
    let (w, h) = match (get_float(value, "w"), get_float(value, "h")) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w, h),
        _ => return Some(error_response(msg_id, "invalid :w/:h (positive numbers)")),
    };
    state.pipeline.set_glyph(w, h);
    Some(ok_response(msg_id))
}

fn handle_set_smoothing(state: &mut AirpointState, msg_id: i64, value: &Value) -> Option<String> {
    let alpha = match get_float(value, "alpha") {
        Some(a) if (0.0..=1.0).contains(&a) => a,
        _ => return Some(error_response(msg_id, "invalid :alpha (0.0 to 1.0)")),
    };
    state.pipeline.set_smoothing(alpha as f32);
    Some(ok_response(msg_id))
}

// ── Frame and target parsing ───────────────────────────────

/// Parse a position plist `(:x N :y N :z N)`; missing axes are zero.
fn parse_position(value: &Value) -> Position3 {
    Position3::new(
        get_float(value, "x").unwrap_or(0.0) as f32,
        get_float(value, "y").unwrap_or(0.0) as f32,
        get_float(value, "z").unwrap_or(0.0) as f32,
    )
}

/// Parse one joint plist `(:id :hand-right :x N :y N :z N :state :tracked)`.
/// Unknown joint identifiers are skipped by the caller (the sensor
/// adapter may deliver more landmarks than the pipeline consumes).
fn parse_joint(value: &Value) -> Result<Option<Joint>, String> {
    let id_str = get_keyword(value, "id").ok_or("joint missing :id")?;
    let Some(id) = JointId::from_str(&id_str) else {
        debug!(joint = %id_str, "skipping unrecognized joint");
        return Ok(None);
    };
    let state_str = get_keyword(value, "state").ok_or("joint missing :state")?;
    let state = TrackingState::from_str(&state_str)
        .ok_or_else(|| format!("invalid joint :state {state_str}"))?;
    Ok(Some(Joint::new(id, parse_position(value), state)))
}

/// Parse one body plist.
fn parse_body(value: &Value) -> Result<Body, String> {
    let state_str = get_keyword(value, "state").ok_or("body missing :state")?;
    let state = TrackingState::from_str(&state_str)
        .ok_or_else(|| format!("invalid body :state {state_str}"))?;

    let position = plist_value(value, "position")
        .map(parse_position)
        .unwrap_or(Position3::ZERO);

    let mut joints = Vec::new();
    if let Some(joints_value) = plist_value(value, "joints") {
        for item in list_items(joints_value) {
            if let Some(joint) = parse_joint(item)? {
                joints.push(joint);
            }
        }
    }

    Ok(Body::new(state, position, joints))
}

/// Parse one target plist `(:id N :x N :y N :w N :h N)`.
fn parse_target(value: &Value) -> Result<InteractiveTarget, String> {
    let id = get_int(value, "id").ok_or("target missing :id")? as u64;
    let x = get_float(value, "x").ok_or("target missing :x")?;
    let y = get_float(value, "y").ok_or("target missing :y")?;
    let w = get_float(value, "w").ok_or("target missing :w")?;
    let h = get_float(value, "h").ok_or("target missing :h")?;
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("target {id} has non-positive size"));
    }
    Ok(InteractiveTarget::new(id, x, y, w, h))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Walk a plist's cons pairs to find `:key` and return its value cell.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
fn plist_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            if let Value::Cons(next) = pair.cdr() {
                return Some(next.car());
            }
            return None;
        }
        current = pair.cdr();
    }
    None
}

/// Extract a keyword/string/number value from a plist, as a string.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = plist_value(value, key)?;
    match val {
        Value::Keyword(v) => Some(v.to_string()),
        Value::Symbol(v) => {
            let s = v.to_string();
            Some(s.strip_prefix(':').unwrap_or(&s).to_string())
        }
        Value::String(v) => Some(v.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "t" } else { "nil" }.to_string()),
        Value::Null => Some("nil".to_string()),
        _ => Some(val.to_string()),
    }
}

/// Extract an integer value from a plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from a plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a floating-point value from a plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Collect the elements of a proper list.
fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    items
}

/// Format an IPC event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response_format() {
        let r = ok_response(42);
        assert!(r.contains(":type :response"));
        assert!(r.contains(":id 42"));
        assert!(r.contains(":status :ok"));
    }

    #[test]
    fn test_error_response_escapes_quotes() {
        let r = error_response(1, "say \"hello\"");
        assert!(r.contains("say \\\"hello\\\""));
    }

    #[test]
    fn test_get_keyword_from_plist() {
        let v = lexpr::from_str("(:type :hello :version 1)").unwrap();
        assert_eq!(get_keyword(&v, "type"), Some("hello".to_string()));
        assert_eq!(get_keyword(&v, "version"), Some("1".to_string()));
        assert_eq!(get_keyword(&v, "missing"), None);
    }

    #[test]
    fn test_get_float() {
        let v = lexpr::from_str("(:x 12.5 :y 100)").unwrap();
        assert_eq!(get_float(&v, "x"), Some(12.5));
        assert_eq!(get_float(&v, "y"), Some(100.0));
    }

    #[test]
    fn test_plist_value_nested() {
        let v = lexpr::from_str("(:position (:x 1 :y 2 :z 3))").unwrap();
        let pos = plist_value(&v, "position").unwrap();
        assert_eq!(get_float(pos, "z"), Some(3.0));
    }

    #[test]
    fn test_list_items() {
        let v = lexpr::from_str("((:id 1) (:id 2) (:id 3))").unwrap();
        let items = list_items(&v);
        assert_eq!(items.len(), 3);
        assert_eq!(get_int(items[2], "id"), Some(3));
    }

    #[test]
    fn test_parse_target() {
        let v = lexpr::from_str("(:id 4 :x 100 :y 100 :w 50 :h 50)").unwrap();
        let target = parse_target(&v).unwrap();
        assert_eq!(target.id, 4);
        assert!((target.width - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_target_rejects_flat() {
        let v = lexpr::from_str("(:id 4 :x 0 :y 0 :w 0 :h 10)").unwrap();
        assert!(parse_target(&v).is_err());
        let v = lexpr::from_str("(:id 4 :x 0 :y 0 :w 10)").unwrap();
        assert!(parse_target(&v).is_err());
    }

    #[test]
    fn test_parse_body_full() {
        let v = lexpr::from_str(
            "(:state :tracked :position (:x 0.0 :y 0.0 :z 2.1) \
             :joints ((:id :hand-right :x 0.2 :y 0.1 :z 1.8 :state :tracked) \
                      (:id :hand-left :x -0.2 :y 0.0 :z 1.9 :state :not-tracked)))",
        )
        .unwrap();
        let body = parse_body(&v).unwrap();
        assert!(body.is_tracked());
        assert!((body.depth() - 2.1).abs() < 0.001);
        assert_eq!(body.joints().len(), 2);
        let right = body.joint(JointId::HandRight);
        assert!((right.position.z - 1.8).abs() < 0.001);
    }

    #[test]
    fn test_parse_body_skips_unknown_joints() {
        let v = lexpr::from_str(
            "(:state :tracked :joints ((:id :elbow-left :x 0 :y 0 :z 1 :state :tracked)))",
        )
        .unwrap();
        let body = parse_body(&v).unwrap();
        assert!(body.joints().is_empty());
    }

    #[test]
    fn test_parse_body_rejects_bad_state() {
        let v = lexpr::from_str("(:state :wobbly)").unwrap();
        assert!(parse_body(&v).is_err());
    }

    #[test]
    fn test_format_event() {
        let e = format_event("hover-started", &[("target-id", "3")]);
        assert_eq!(e, "(:type :event :event :hover-started :target-id 3)");
        let e = format_event("pointer-hidden", &[]);
        assert_eq!(e, "(:type :event :event :pointer-hidden)");
    }
}
