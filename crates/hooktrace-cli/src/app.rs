//! The demo component tree.
//!
//! `App` holds a toggle and renders two `Counter`s and, while the toggle is
//! on, a `Details` panel. The script clicks every counter a few times, hides
//! the panel and unmounts the tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use hooktrace_host::{
    Cleanup, DEFAULT_MAX_PASSES, Element, HookOptions, Host, HostResult, StateSetter,
};
use parking_lot::Mutex;

/// State setters the script drives the tree through.
#[derive(Default)]
pub struct Controls {
    counters: Mutex<BTreeMap<String, StateSetter<u32>>>,
    details: Mutex<Option<StateSetter<bool>>>,
}

impl Controls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn counters(&self) -> Vec<StateSetter<u32>> {
        self.counters.lock().values().cloned().collect()
    }
}

/// The root element.
pub fn app(controls: &Arc<Controls>) -> Element {
    let controls = Arc::clone(controls);
    Element::new("App", move |cx| {
        cx.use_tracer()?;
        let (show_details, set_details) = cx.use_state_with(
            || true,
            HookOptions::show_with(|shown: &bool| {
                if *shown { "shown" } else { "hidden" }.to_string()
            })
            .with_label("details"),
        )?;
        *controls.details.lock() = Some(set_details);

        let mut children = vec![
            counter(&controls, "left"),
            counter(&controls, "right"),
        ];
        if show_details {
            children.push(details());
        }
        Ok(children)
    })
}

fn counter(controls: &Arc<Controls>, title: &str) -> Element {
    let controls = Arc::clone(controls);
    Element::new("Counter", move |cx| {
        let trace = cx.use_tracer()?;
        let (count, set_count) = cx.use_state(|| 0_u32)?;
        let parity = cx.use_memo(count % 2, || {
            if count % 2 == 0 { "even" } else { "odd" }.to_string()
        })?;

        let renders = cx.use_ref_with(0_u32, HookOptions::json().with_label("renders"))?;
        renders.set(renders.get() + 1);

        cx.use_effect(count, move || {
            trace.trace(format!("count is {count} ({parity})"));
            None
        })?;

        if let Some(title) = cx.prop("title").and_then(|v| v.as_str()) {
            controls
                .counters
                .lock()
                .insert(title.to_string(), set_count);
        }
        Ok(vec![])
    })
    .with_prop("title", title)
}

fn details() -> Element {
    Element::new("Details", |cx| {
        let trace = cx.use_tracer()?;
        cx.use_effect((), move || {
            trace.trace("subscribed");
            Some(Box::new(|| {}) as Cleanup)
        })?;
        Ok(vec![])
    })
}

/// Mount the tree, click every counter `clicks` times, hide the details
/// panel and unmount.
pub fn run_script(host: &mut Host, controls: &Arc<Controls>, clicks: u32) -> HostResult<()> {
    host.mount(app(controls))?;
    host.run_until_stable(DEFAULT_MAX_PASSES)?;

    for _ in 0..clicks {
        for setter in controls.counters() {
            setter.update(|n| n + 1);
        }
        host.run_until_stable(DEFAULT_MAX_PASSES)?;
    }

    let details = controls.details.lock().clone();
    if let Some(set_details) = details {
        set_details.set(false);
        host.run_until_stable(DEFAULT_MAX_PASSES)?;
    }

    host.unmount()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooktrace::HookTrace;
    use hooktrace::hooktrace_observe::CollectingSink;
    use hooktrace_core::{OriginKind, Phase};

    #[test]
    fn test_script_trace() {
        let runtime = HookTrace::builder()
            .with_sink(Arc::new(CollectingSink::new()))
            .build();
        let controls = Controls::new();
        let mut host = runtime.host();

        run_script(&mut host, &controls, 2).unwrap();

        let log = runtime.tracer().log_entries();
        let mut labels: Vec<_> = log.iter().map(|e| e.component_label().to_string()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels, vec!["App-1", "Counter-1", "Counter-2", "Details-1"]);

        let unmounts = log
            .iter()
            .filter(|e| e.origin().kind() == OriginKind::Unmount)
            .count();
        assert_eq!(unmounts, 4);

        let memo_refreshes = log
            .iter()
            .filter(|e| e.origin().kind() == OriginKind::Memo && e.phase() == Some(Phase::Refresh))
            .count();
        assert_eq!(memo_refreshes, 4);

        assert!(runtime.tracer().traced_labels().is_empty());
    }
}
