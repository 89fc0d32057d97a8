//! The sample managed object served by `sjmp-sample-server`.

use sjmp_core::{Action, CancellationToken, Limits, ManagedObject, ObjectBuilder, Property};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on waiting for the timer thread to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct Timer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Demo object with plain, limited and timer-driven properties.
pub struct SampleObject {
    boolean_field: AtomicBool,
    interval_seconds: Arc<AtomicI32>,
    timed_value: Arc<AtomicI32>,
    int_limits: AtomicI32,
    double_limits: Mutex<f64>,
    timer: Mutex<Option<Timer>>,
}

impl Default for SampleObject {
    fn default() -> Self {
        Self {
            boolean_field: AtomicBool::new(false),
            interval_seconds: Arc::new(AtomicI32::new(1)),
            timed_value: Arc::new(AtomicI32::new(0)),
            int_limits: AtomicI32::new(0),
            double_limits: Mutex::new(0.0),
            timer: Mutex::new(None),
        }
    }
}

impl SampleObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timed_value(&self) -> i32 {
        self.timed_value.load(Ordering::SeqCst)
    }

    /// Start the timer thread. Does nothing when already running.
    pub fn start_timer(&self) -> anyhow::Result<()> {
        let mut timer = self
            .timer
            .lock()
            .map_err(|_| anyhow::anyhow!("timer lock poisoned"))?;
        if timer.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let worker_token = token.clone();
        let value = self.timed_value.clone();
        let interval = self.interval_seconds.clone();
        let handle = thread::Builder::new()
            .name("sample-timer".to_string())
            .spawn(move || loop {
                value.fetch_add(1, Ordering::SeqCst);
                let seconds = interval.load(Ordering::SeqCst).max(1) as u64;
                if worker_token.sleep(Duration::from_secs(seconds)).is_err() {
                    break;
                }
            })?;

        debug!("Sample timer started");
        *timer = Some(Timer { token, handle });
        Ok(())
    }

    /// Stop the timer thread, waiting a bounded time for it to exit.
    pub fn stop_timer(&self) {
        let timer = match self.timer.lock() {
            Ok(mut timer) => timer.take(),
            Err(_) => return,
        };
        let Some(Timer { token, handle }) = timer else {
            return;
        };

        token.cancel();
        let deadline = Instant::now() + STOP_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            debug!("Sample timer stopped");
        } else {
            warn!("Sample timer did not stop within {:?}, detaching", STOP_TIMEOUT);
        }
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

impl ManagedObject for SampleObject {
    fn declare(builder: ObjectBuilder<Self>) -> ObjectBuilder<Self> {
        builder
            .property(
                Property::new("boolean_field", "boolean field", |s: &SampleObject| {
                    s.boolean_field.load(Ordering::SeqCst)
                })
                .setter(|s: &SampleObject, v| s.boolean_field.store(v, Ordering::SeqCst)),
            )
            .property(
                Property::new("interval_seconds", "timer interval", |s: &SampleObject| {
                    s.interval_seconds.load(Ordering::SeqCst)
                })
                .setter(|s: &SampleObject, v| s.interval_seconds.store(v, Ordering::SeqCst))
                .limits(Limits::int(1, 3600)),
            )
            .property(
                Property::new(
                    "timed_value",
                    "value being changed by timer",
                    |s: &SampleObject| s.timed_value(),
                )
                .show_graph(),
            )
            .property(
                Property::new("int_limits", "int property with limits", |s: &SampleObject| {
                    s.int_limits.load(Ordering::SeqCst)
                })
                .setter(|s: &SampleObject, v| s.int_limits.store(v, Ordering::SeqCst))
                .limits(Limits::int(-10, 5)),
            )
            .property(
                Property::new(
                    "double_limits",
                    "double property with limits",
                    |s: &SampleObject| s.double_limits.lock().map(|v| *v).unwrap_or(f64::NAN),
                )
                .setter(|s: &SampleObject, v| {
                    if let Ok(mut value) = s.double_limits.lock() {
                        *value = v;
                    }
                })
                .limits(Limits::float(-10.0, 5.0)),
            )
            .action(
                Action::new("start_timer", "Starts timer", |s: &SampleObject, _args| {
                    s.start_timer()
                })
                .require_confirm(),
            )
            .action(Action::new("stop_timer", "Stops timer", |s: &SampleObject, _args| {
                s.stop_timer();
                Ok(())
            }))
            .action(Action::new(
                "is_timer_running",
                "Returns true if the timer is currently running",
                |s: &SampleObject, _args| Ok(s.is_timer_running()),
            ))
            .action(
                Action::new(
                    "return_same",
                    "Returns same value that is passed as parameter",
                    |_s: &SampleObject, args| Ok(args.get_or_default::<String>(0)),
                )
                .documented_param::<String>("param", "parameter to be returned"),
            )
    }
}

impl Drop for SampleObject {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use sjmp_core::{Registry, ServerInfo, WireType, WireValue};

    fn registered() -> (Registry, Arc<SampleObject>) {
        let registry = Registry::new(ServerInfo::new("sample", "", ""));
        let sample = Arc::new(SampleObject::new());
        registry
            .register(&sample, "SampleObjectName1", "First SampleObject", "SampleObject Group")
            .unwrap();
        (registry, sample)
    }

    #[test]
    fn test_declaration() {
        let (registry, _sample) = registered();
        let schema = registry.describe("SampleObjectName1").unwrap();

        let timed = schema.property("timed_value").unwrap();
        assert!(timed.readonly);
        assert!(timed.show_graph);
        assert_eq!(timed.wire_type, WireType::Int32);

        assert_eq!(
            schema.property("double_limits").unwrap().limits,
            Some(Limits::float(-10.0, 5.0))
        );
        assert!(schema.action("start_timer").unwrap().require_confirm);
        assert_eq!(schema.action("is_timer_running").unwrap().result, WireType::Bool);

        let return_same = schema.action("return_same").unwrap();
        assert_eq!(return_same.parameters[0].name, "param");
        assert_eq!(
            return_same.parameters[0].description.as_deref(),
            Some("parameter to be returned")
        );
    }

    #[test]
    fn test_limits_enforced() {
        let (registry, _sample) = registered();
        let set = |property: &str, value: Value| {
            registry.set_property("SampleObjectName1", property, &value)
        };

        assert!(set("int_limits", json!(5)).is_ok());
        assert!(set("int_limits", json!(6)).is_err());
        assert!(set("double_limits", json!(-10.0)).is_ok());
        assert!(set("double_limits", json!(-10.5)).is_err());
        assert!(set("timed_value", json!(1)).is_err());
    }

    #[test]
    fn test_return_same() {
        let (registry, _sample) = registered();
        let mut params = Map::new();
        params.insert("param".into(), json!("hello"));
        assert_eq!(
            registry
                .execute("SampleObjectName1", "return_same", &params)
                .unwrap(),
            WireValue::String("hello".into())
        );
    }

    #[test]
    fn test_timer_start_stop() {
        let sample = SampleObject::new();
        assert!(!sample.is_timer_running());

        sample.start_timer().unwrap();
        sample.start_timer().unwrap();
        assert!(sample.is_timer_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while sample.timed_value() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(sample.timed_value() >= 1);

        let started = Instant::now();
        sample.stop_timer();
        assert!(started.elapsed() < STOP_TIMEOUT);
        assert!(!sample.is_timer_running());

        let frozen = sample.timed_value();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sample.timed_value(), frozen);
    }
}
