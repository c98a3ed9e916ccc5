use clap::ValueEnum;
use serde::Serialize;
use tempo_runtime::{
    Container, Diagnostic, FutureId, FutureState, HandlerResult, Resolution, Runtime,
    RuntimeError, Ticks, TraceEvent, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    /// Two timers with the same delay
    Timers,
    /// `then` after a timer-resolved future built with an executor
    Constructed,
    /// A raised error recovered by `catch`
    Recover,
    /// A side-effect-only handler, then one that returns the container
    SideEffect,
    /// Two chained `then` logs behind a timer
    ChainedLogs,
    /// A raised error nobody catches
    Unhandled,
}

impl ScenarioName {
    pub const ALL: [ScenarioName; 6] = [
        ScenarioName::Timers,
        ScenarioName::Constructed,
        ScenarioName::Recover,
        ScenarioName::SideEffect,
        ScenarioName::ChainedLogs,
        ScenarioName::Unhandled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::Timers => "timers",
            ScenarioName::Constructed => "constructed",
            ScenarioName::Recover => "recover",
            ScenarioName::SideEffect => "side-effect",
            ScenarioName::ChainedLogs => "chained-logs",
            ScenarioName::Unhandled => "unhandled",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Inspected {
    pub label: &'static str,
    pub state: FutureState,
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub trace: Vec<TraceEvent>,
    pub futures: Vec<Inspected>,
    pub diagnostics: Vec<Diagnostic>,
    pub microtasks: usize,
    pub timers: usize,
    pub final_tick: Ticks,
}

type Watched = Vec<(&'static str, FutureId)>;

fn ok(value: impl Into<Value>) -> HandlerResult {
    Ok(Resolution::Value(value.into()))
}

fn log(message: &'static str) -> impl FnOnce(&Runtime, Value) -> HandlerResult {
    move |rt, _| {
        rt.emit(message);
        ok(())
    }
}

/// A pending future resolved by a timer `delay` ticks from now.
fn after(rt: &Runtime, delay: Ticks, before_return: Option<&'static str>) -> FutureId {
    rt.construct(move |rt, resolver| {
        rt.schedule_timer(delay, move |rt| {
            resolver.resolve(rt, Value::Undefined);
        })?;
        if let Some(message) = before_return {
            rt.emit(message);
        }
        Ok(())
    })
}

fn timers(rt: &Runtime) -> Result<Watched, RuntimeError> {
    rt.schedule_timer(1000, |rt| rt.emit("T1"))?;
    rt.schedule_timer(1000, |rt| rt.emit("T2"))?;
    Ok(Vec::new())
}

fn constructed(rt: &Runtime) -> Result<Watched, RuntimeError> {
    rt.emit("before");
    let p = after(rt, 1000, Some("constructed"));
    let then = rt.then(p, log("then"))?;
    rt.emit("after");
    Ok(vec![("executor future", p), ("then", then)])
}

fn recover(rt: &Runtime) -> Result<Watched, RuntimeError> {
    let thrown = rt.then(rt.resolved(()), |_, _| {
        Err(Value::error("this will reject!"))
    })?;
    let caught = rt.catch(thrown, |_, _| ok("caught"))?;
    Ok(vec![("thrown", thrown), ("caught", caught)])
}

fn side_effect(rt: &Runtime) -> Result<Watched, RuntimeError> {
    let array = Container::new();
    array.push("before");

    let ignored = rt.resolved("this value is ignored");
    let pushed = {
        let array = array.clone();
        rt.then(ignored, move |_, _| {
            array.push("then");
            array.push("after");
            ok(())
        })?
    };
    let returned = rt.then(pushed, move |_, _| ok(array))?;
    Ok(vec![("side effect only", pushed), ("returns container", returned)])
}

fn chained_logs(rt: &Runtime) -> Result<Watched, RuntimeError> {
    rt.emit("before");
    let p = after(rt, 1000, None);
    let first = rt.then(p, log("first then"))?;
    let second = rt.then(first, log("second then"))?;
    rt.emit("after");
    Ok(vec![("second then", second)])
}

fn unhandled(rt: &Runtime) -> Result<Watched, RuntimeError> {
    let p = rt.then(rt.resolved(()), |_, _| {
        Err(Value::error("user does not exist"))
    })?;
    Ok(vec![("throwing then", p)])
}

pub fn run(name: ScenarioName) -> Result<ScenarioReport, RuntimeError> {
    let rt = Runtime::new();
    tracing::info!("Running scenario {}", name.as_str());

    let watched = match name {
        ScenarioName::Timers => timers(&rt)?,
        ScenarioName::Constructed => constructed(&rt)?,
        ScenarioName::Recover => recover(&rt)?,
        ScenarioName::SideEffect => side_effect(&rt)?,
        ScenarioName::ChainedLogs => chained_logs(&rt)?,
        ScenarioName::Unhandled => unhandled(&rt)?,
    };

    let stats = rt.run()?;

    let mut futures = Vec::with_capacity(watched.len());
    for (label, id) in watched {
        futures.push(Inspected {
            label,
            state: rt.state(id)?,
        });
    }

    Ok(ScenarioReport {
        name: name.as_str(),
        trace: rt.trace(),
        futures,
        diagnostics: rt.uncaught_rejections(),
        microtasks: stats.microtasks,
        timers: stats.timers,
        final_tick: rt.now(),
    })
}
