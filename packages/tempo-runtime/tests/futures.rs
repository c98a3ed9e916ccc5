use std::cell::Cell;
use std::rc::Rc;
use tempo_runtime::{
    Container, FutureState, HandlerResult, Resolution, Runtime, RuntimeError, SchedulerError, Step,
    Value, handler,
};

fn ok(value: impl Into<Value>) -> HandlerResult {
    Ok(Resolution::Value(value.into()))
}

fn emit(label: &'static str) -> impl FnOnce(&Runtime, Value) -> HandlerResult {
    move |rt, _| {
        rt.emit(label);
        ok(())
    }
}

#[test]
fn test_second_settlement_is_ignored() {
    let rt = Runtime::new();
    let p = rt.create_pending();

    assert!(rt.settle_fulfilled(p, 1).unwrap());
    assert!(!rt.settle_fulfilled(p, 2).unwrap());
    assert!(!rt.settle_rejected(p, Value::error("late")).unwrap());

    assert_eq!(rt.state(p).unwrap(), FutureState::Fulfilled(Value::Number(1.0)));
}

#[test]
fn test_handlers_never_run_synchronously() {
    let rt = Runtime::new();
    let p = rt.resolved("ready");

    rt.then(p, emit("then")).unwrap();
    rt.emit("sync");

    assert_eq!(rt.messages(), vec!["sync"]);
    rt.run().unwrap();
    assert_eq!(rt.messages(), vec!["sync", "then"]);
}

#[test]
fn test_chain_order_with_settled_source() {
    let rt = Runtime::new();
    let f = rt.resolved(0);

    let a = rt.then(f, emit("h1")).unwrap();
    rt.then(a, emit("h2")).unwrap();
    rt.run().unwrap();

    assert_eq!(rt.messages(), vec!["h1", "h2"]);
}

#[test]
fn test_chain_order_with_pending_source() {
    let rt = Runtime::new();
    let f = rt.create_pending();

    let a = rt.then(f, emit("h1")).unwrap();
    rt.then(a, emit("h2")).unwrap();
    rt.run().unwrap();
    assert!(rt.messages().is_empty());

    rt.settle_fulfilled(f, 0).unwrap();
    rt.run().unwrap();
    assert_eq!(rt.messages(), vec!["h1", "h2"]);
}

#[test]
fn test_independent_chains_interleave_by_microtask_fifo() {
    let rt = Runtime::new();
    let p1 = rt.resolved(1);
    let p2 = rt.resolved(2);

    let a1 = rt.then(p1, emit("a1")).unwrap();
    rt.then(a1, emit("a2")).unwrap();
    let b1 = rt.then(p2, emit("b1")).unwrap();
    rt.then(b1, emit("b2")).unwrap();

    rt.run().unwrap();
    assert_eq!(rt.messages(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn test_reactions_on_one_future_run_in_registration_order() {
    let rt = Runtime::new();
    let p = rt.create_pending();

    rt.then(p, emit("first")).unwrap();
    rt.then(p, emit("second")).unwrap();
    rt.catch(p, emit("never")).unwrap();
    rt.then(p, emit("third")).unwrap();

    rt.settle_fulfilled(p, "go").unwrap();
    rt.run().unwrap();

    assert_eq!(rt.messages(), vec!["first", "second", "third"]);
}

#[test]
fn test_handler_receives_settled_value() {
    let rt = Runtime::new();
    let p = rt.resolved(50);

    let doubled = rt
        .then(p, |_, value| ok(value.as_number().unwrap_or_default() * 2.0))
        .unwrap();
    rt.run().unwrap();

    assert_eq!(rt.state(doubled).unwrap(), FutureState::Fulfilled(Value::Number(100.0)));
}

#[test]
fn test_missing_handler_passes_settlement_through() {
    let rt = Runtime::new();
    let failed = rt.rejected(Value::error("boom"));

    let skipped = rt.then(failed, emit("skipped")).unwrap();
    let recovered = rt.catch(skipped, |_, reason| ok(reason)).unwrap();
    let untouched = rt.catch(rt.resolved("fine"), emit("unused")).unwrap();

    rt.run().unwrap();

    assert!(rt.messages().is_empty());
    assert_eq!(rt.state(skipped).unwrap(), FutureState::Rejected(Value::error("boom")));
    assert_eq!(rt.state(recovered).unwrap(), FutureState::Fulfilled(Value::error("boom")));
    assert_eq!(rt.state(untouched).unwrap(), FutureState::Fulfilled(Value::from("fine")));
}

#[test]
fn test_attach_with_both_handlers_runs_one_branch() {
    let rt = Runtime::new();
    let p = rt.rejected(Value::error("nope"));

    let derived = rt
        .attach(
            p,
            Some(handler(|rt, _| {
                rt.emit("fulfilled branch");
                ok(())
            })),
            Some(handler(|rt, reason| {
                rt.emit(format!("rejected branch: {reason}"));
                ok("handled")
            })),
        )
        .unwrap();
    rt.run().unwrap();

    assert_eq!(rt.messages(), vec!["rejected branch: Error: nope"]);
    assert_eq!(rt.state(derived).unwrap(), FutureState::Fulfilled(Value::from("handled")));
}

#[test]
fn test_handler_error_rejects_derived() {
    let rt = Runtime::new();
    let p = rt.resolved(());

    let derived = rt
        .then(p, |_, _| Err(Value::error("user does not exist")))
        .unwrap();
    rt.run().unwrap();

    assert_eq!(
        rt.state(derived).unwrap(),
        FutureState::Rejected(Value::error("user does not exist"))
    );
}

#[test]
fn test_handler_returning_future_flattens() {
    let rt = Runtime::new();
    let inner = rt.create_pending();

    let derived = rt.then(rt.resolved(1), move |_, _| Ok(inner.into())).unwrap();
    rt.run().unwrap();
    assert!(rt.state(derived).unwrap().is_pending());

    rt.settle_fulfilled(inner, 5).unwrap();
    rt.run().unwrap();
    assert_eq!(rt.state(derived).unwrap(), FutureState::Fulfilled(Value::Number(5.0)));
}

#[test]
fn test_flattening_mirrors_rejection() {
    let rt = Runtime::new();
    let inner = rt.rejected(Value::error("inner failed"));

    let derived = rt.then(rt.resolved(1), move |_, _| Ok(inner.into())).unwrap();
    let recovered = rt
        .catch(derived, |_, reason| ok(format!("recovered from {reason}")))
        .unwrap();
    rt.run().unwrap();

    assert_eq!(
        rt.state(derived).unwrap(),
        FutureState::Rejected(Value::error("inner failed"))
    );
    assert_eq!(
        rt.state(recovered).unwrap(),
        FutureState::Fulfilled(Value::from("recovered from Error: inner failed"))
    );
    // Adoption subscribed to `inner`, so it no longer counts as uncaught.
    assert!(rt.uncaught_rejections().is_empty());
}

#[test]
fn test_flattening_is_transitive() {
    let rt = Runtime::new();
    let deepest = rt.create_pending();
    let middle = rt.create_pending();
    assert!(rt.resolve(middle, deepest).unwrap());

    let derived = rt.then(rt.resolved(()), move |_, _| Ok(middle.into())).unwrap();
    rt.run().unwrap();
    assert!(rt.state(derived).unwrap().is_pending());

    rt.settle_fulfilled(deepest, "deep").unwrap();
    rt.run().unwrap();

    assert_eq!(rt.state(middle).unwrap(), FutureState::Fulfilled(Value::from("deep")));
    assert_eq!(rt.state(derived).unwrap(), FutureState::Fulfilled(Value::from("deep")));
}

#[test]
fn test_resolve_with_future_locks_out_later_settlement() {
    let rt = Runtime::new();
    let p = rt.create_pending();
    let source = rt.create_pending();

    assert!(rt.resolve(p, source).unwrap());
    assert!(!rt.settle_fulfilled(p, "late").unwrap());
    assert!(!rt.resolve(p, Value::from("later")).unwrap());
    assert!(rt.state(p).unwrap().is_pending());

    rt.settle_fulfilled(source, "from source").unwrap();
    rt.run().unwrap();
    assert_eq!(rt.state(p).unwrap(), FutureState::Fulfilled(Value::from("from source")));
}

#[test]
fn test_resolving_with_itself_rejects() {
    let rt = Runtime::new();
    let p = rt.create_pending();

    assert!(rt.resolve(p, p).unwrap());
    assert_eq!(
        rt.state(p).unwrap(),
        FutureState::Rejected(Value::type_error("Chaining cycle detected for future"))
    );
    assert_eq!(
        rt.state(p).unwrap().to_string(),
        "{<rejected>: TypeError: Chaining cycle detected for future}"
    );
}

#[test]
fn test_handler_returning_its_own_derived_future_rejects() {
    let rt = Runtime::new();
    let slot = Rc::new(Cell::new(None));

    let derived = {
        let slot = slot.clone();
        rt.then(rt.resolved(()), move |_, _| {
            let me = slot.get().expect("derived id recorded before run");
            Ok(Resolution::Future(me))
        })
        .unwrap()
    };
    slot.set(Some(derived));
    rt.run().unwrap();

    assert_eq!(
        rt.state(derived).unwrap(),
        FutureState::Rejected(Value::type_error("Chaining cycle detected for future"))
    );
}

#[test]
fn test_construct_runs_executor_synchronously() {
    let rt = Runtime::new();
    rt.emit("before");
    let p = rt.construct(|rt, _resolver| {
        rt.emit("constructed");
        Ok(())
    });
    rt.emit("after");

    assert_eq!(rt.messages(), vec!["before", "constructed", "after"]);
    rt.run().unwrap();
    // Never resolved, so it stays pending.
    assert!(rt.state(p).unwrap().is_pending());
}

#[test]
fn test_executor_error_rejects_unless_already_resolved() {
    let rt = Runtime::new();

    let failed = rt.construct(|_, _| Err(Value::error("executor threw")));
    let resolved_first = rt.construct(|rt, resolver| {
        resolver.resolve(rt, Value::from("kept"));
        Err(Value::error("ignored"))
    });

    assert_eq!(
        rt.state(failed).unwrap(),
        FutureState::Rejected(Value::error("executor threw"))
    );
    assert_eq!(
        rt.state(resolved_first).unwrap(),
        FutureState::Fulfilled(Value::from("kept"))
    );
}

#[test]
fn test_unknown_future_is_an_error() {
    let rt = Runtime::new();
    let foreign = Runtime::new().create_pending();

    assert_eq!(rt.state(foreign), Err(RuntimeError::UnknownFuture(foreign)));
    assert_eq!(
        rt.settle_fulfilled(foreign, 1),
        Err(RuntimeError::UnknownFuture(foreign))
    );
    assert!(matches!(
        rt.then(foreign, emit("never")),
        Err(RuntimeError::UnknownFuture(_))
    ));
}

#[test]
fn test_timer_delay_out_of_range_is_a_hard_fault() {
    let rt = Runtime::new();
    let err = rt.schedule_timer(u64::MAX, |_| {}).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Scheduler(SchedulerError::DelayOutOfRange { .. })
    ));
}

#[test]
fn test_nested_run_inside_handler_rejects_derived() {
    let rt = Runtime::new();

    let derived = rt
        .then(rt.resolved(()), |rt, _| {
            rt.run()?;
            ok(())
        })
        .unwrap();
    rt.run().unwrap();

    let state = rt.state(derived).unwrap();
    assert!(state.is_rejected());
    assert_eq!(
        state.value(),
        Some(&Value::error(
            "event loop is already draining; run/step/advance cannot be nested"
        ))
    );
}

#[test]
fn test_step_runs_one_reaction_at_a_time() {
    let rt = Runtime::new();
    let a = rt.then(rt.resolved(()), emit("one")).unwrap();
    rt.then(a, emit("two")).unwrap();

    assert_eq!(rt.step().unwrap(), Step::Microtask);
    assert_eq!(rt.messages(), vec!["one"]);
    assert_eq!(rt.step().unwrap(), Step::Microtask);
    assert_eq!(rt.messages(), vec!["one", "two"]);
    assert_eq!(rt.step().unwrap(), Step::Idle);
}

#[test]
fn test_microtasks_and_futures_share_one_queue() {
    let rt = Runtime::new();
    rt.then(rt.resolved(()), emit("reaction")).unwrap();
    rt.enqueue_microtask(|rt| rt.emit("microtask"));
    rt.schedule_timer(0, |rt| rt.emit("timer")).unwrap();

    rt.run().unwrap();
    assert_eq!(rt.messages(), vec!["reaction", "microtask", "timer"]);
}

#[test]
fn test_future_holding_self_containing_list_can_be_inspected() {
    let rt = Runtime::new();
    let list = Container::new();
    list.push("before");
    list.push(list.clone());

    let p = rt.resolved(list.clone());
    let passed = rt.then(p, |_, value| ok(value)).unwrap();
    rt.run().unwrap();

    assert_eq!(
        rt.state(passed).unwrap().to_string(),
        "{<fulfilled>: ['before', [Circular]]}"
    );
    assert!(format!("{:?}", rt.state(p).unwrap()).contains("[Circular]"));
    assert!(serde_json::to_string(&rt.state(passed).unwrap()).is_err());
}

#[test]
fn test_future_counts_track_settlement() {
    let rt = Runtime::new();
    let pending = rt.create_pending();
    let derived = rt.then(pending, emit("then")).unwrap();
    rt.resolved(());

    assert_eq!(rt.future_count(), 3);
    assert_eq!(rt.pending_futures(), 2);

    rt.settle_fulfilled(pending, ()).unwrap();
    rt.run().unwrap();

    assert!(rt.state(derived).unwrap().is_fulfilled());
    assert_eq!(rt.future_count(), 3);
    assert_eq!(rt.pending_futures(), 0);
}
