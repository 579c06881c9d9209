//! Traced stateful call sites.
//!
//! Every wrapper checks [`RenderCx::is_traced`] first. A component that did
//! not call [`RenderCx::use_tracer`] gets the plain behavior with no
//! registry or tracer involvement. A traced component registers each call
//! site with the registry, keeps the site's display text current, and
//! records `init`/`set`/`update`/`run`/`cleanup`/`refresh` entries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hooktrace_core::{OriginKind, Payload, Phase, SharedOrigin, show_json, show_props_with};
use hooktrace_observe::SharedTracer;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::context::{Context, RenderCx};
use crate::error::HostResult;

/// Formatter for a traced value.
pub type Show<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Formatter for a single prop value.
pub type ShowProp = Arc<dyn Fn(&serde_json::Value) -> String + Send + Sync>;

/// Cleanup returned by an effect.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Reducer function of [`RenderCx::use_reducer`].
pub type Reducer<S, A> = Arc<dyn Fn(&S, A) -> S + Send + Sync>;

/// Label and formatter for a traced call site.
pub struct HookOptions<T> {
    label: Option<String>,
    show: Show<T>,
}

impl<T: Serialize + 'static> HookOptions<T> {
    /// Show values as JSON.
    pub fn json() -> Self {
        Self::show_with(|value: &T| show_json(value))
    }
}

impl<T: 'static> HookOptions<T> {
    /// Show values with a custom formatter.
    pub fn show_with(show: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            label: None,
            show: Arc::new(show),
        }
    }

    /// Attach a label to the call site.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<T> Clone for HookOptions<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            show: Arc::clone(&self.show),
        }
    }
}

impl<T> fmt::Debug for HookOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookOptions")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Options for [`RenderCx::use_tracer_with`].
#[derive(Clone, Default)]
pub struct TracerOptions {
    show_props: BTreeMap<String, ShowProp>,
}

impl TracerOptions {
    /// Create options that show every prop as JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom formatter for one prop.
    pub fn show_prop(
        mut self,
        key: impl Into<String>,
        show: impl Fn(&serde_json::Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.show_props.insert(key.into(), Arc::new(show));
        self
    }
}

impl fmt::Debug for TracerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerOptions")
            .field("show_props", &self.show_props.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Label and formatters for a traced reducer.
pub struct ReducerOptions<S, A> {
    label: Option<String>,
    show_state: Show<S>,
    show_action: Show<A>,
}

impl<S: Serialize + 'static, A: Serialize + 'static> ReducerOptions<S, A> {
    /// Show states and actions as JSON.
    pub fn json() -> Self {
        Self::show_with(|state: &S| show_json(state), |action: &A| show_json(action))
    }
}

impl<S: 'static, A: 'static> ReducerOptions<S, A> {
    /// Show states and actions with custom formatters.
    pub fn show_with(
        show_state: impl Fn(&S) -> String + Send + Sync + 'static,
        show_action: impl Fn(&A) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: None,
            show_state: Arc::new(show_state),
            show_action: Arc::new(show_action),
        }
    }

    /// Use a custom formatter for states.
    pub fn show_state(mut self, show: impl Fn(&S) -> String + Send + Sync + 'static) -> Self {
        self.show_state = Arc::new(show);
        self
    }

    /// Use a custom formatter for actions.
    pub fn show_action(mut self, show: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        self.show_action = Arc::new(show);
        self
    }

    /// Attach a label to the call site.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<S, A> fmt::Debug for ReducerOptions<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerOptions")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A registered call site of a traced component.
struct TracedSite<T> {
    tracer: SharedTracer,
    label: Arc<str>,
    origin: SharedOrigin,
    show: Show<T>,
}

impl<T> Clone for TracedSite<T> {
    fn clone(&self) -> Self {
        Self {
            tracer: Arc::clone(&self.tracer),
            label: Arc::clone(&self.label),
            origin: Arc::clone(&self.origin),
            show: Arc::clone(&self.show),
        }
    }
}

impl<T> TracedSite<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    /// Update the display and record an entry carrying the value.
    fn record(&self, phase: Phase, value: &T) {
        self.origin.set_display((self.show)(value));
        let show = Arc::clone(&self.show);
        self.tracer.trace(
            Arc::clone(&self.label),
            &self.origin,
            Some(phase),
            Payload::value(value.clone(), move |v| show(v)),
        );
    }

    /// Update the display and record an entry without payload.
    fn announce(&self, phase: Phase, value: &T) {
        self.origin.set_display((self.show)(value));
        self.mark(phase);
    }

    fn mark(&self, phase: Phase) {
        self.tracer
            .trace(Arc::clone(&self.label), &self.origin, Some(phase), Payload::Empty);
    }

    /// Record an entry carrying a value of another type, leaving the
    /// display alone.
    fn emit<U>(&self, phase: Phase, value: U, show: Show<U>)
    where
        U: fmt::Debug + Send + Sync + 'static,
    {
        self.tracer.trace(
            Arc::clone(&self.label),
            &self.origin,
            Some(phase),
            Payload::value(value, move |v| show(v)),
        );
    }
}

/// Handle returned by [`RenderCx::use_tracer`].
#[derive(Clone)]
pub struct TraceHandle {
    target: Option<TraceTarget>,
}

#[derive(Clone)]
struct TraceTarget {
    tracer: SharedTracer,
    label: Arc<str>,
    origin: SharedOrigin,
}

impl TraceHandle {
    fn disabled() -> Self {
        Self { target: None }
    }

    /// Record an explicit trace message for the component.
    pub fn trace(&self, message: impl Into<Payload>) {
        if let Some(target) = &self.target {
            target.tracer.trace(
                Arc::clone(&target.label),
                &target.origin,
                None,
                message.into(),
            );
        }
    }

    /// Component label, or `None` when tracing is disabled.
    pub fn label(&self) -> Option<&str> {
        self.target.as_ref().map(|target| &*target.label)
    }

    /// Check if traces are recorded.
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

impl fmt::Debug for TraceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHandle")
            .field("label", &self.label())
            .finish()
    }
}

/// Setter returned by [`RenderCx::use_state`].
pub struct StateSetter<T> {
    cell: Arc<Mutex<T>>,
    dirty: Arc<AtomicBool>,
    site: Option<TracedSite<T>>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            dirty: Arc::clone(&self.dirty),
            site: self.site.clone(),
        }
    }
}

impl<T> StateSetter<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    /// Replace the state and schedule a render pass.
    pub fn set(&self, value: T) {
        if let Some(site) = &self.site {
            site.record(Phase::Set, &value);
        }
        *self.cell.lock() = value;
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Compute the state from the previous one and schedule a render pass.
    pub fn update(&self, change: impl FnOnce(&T) -> T) {
        let value = {
            let mut cell = self.cell.lock();
            let value = change(&*cell);
            *cell = value.clone();
            value
        };
        if let Some(site) = &self.site {
            site.record(Phase::Update, &value);
        }
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Current state, including changes not yet rendered.
    pub fn get(&self) -> T {
        self.cell.lock().clone()
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("traced", &self.site.is_some())
            .finish()
    }
}

/// Mutable cell returned by [`RenderCx::use_ref`].
///
/// Changing the value never schedules a render pass.
pub struct TracedRef<T> {
    cell: Arc<Mutex<T>>,
    site: Option<TracedSite<T>>,
}

impl<T> Clone for TracedRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            site: self.site.clone(),
        }
    }
}

impl<T> TracedRef<T>
where
    T: fmt::Debug + PartialEq + Clone + Send + Sync + 'static,
{
    /// Current value.
    pub fn get(&self) -> T {
        self.cell.lock().clone()
    }

    /// Replace the value. Only a changed value is traced.
    pub fn set(&self, value: T) {
        let changed = {
            let mut cell = self.cell.lock();
            let changed = *cell != value;
            *cell = value.clone();
            changed
        };
        if let (true, Some(site)) = (changed, &self.site) {
            site.record(Phase::Set, &value);
        }
    }
}

impl<T> fmt::Debug for TracedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedRef")
            .field("traced", &self.site.is_some())
            .finish()
    }
}

struct ReducerCell<S, A> {
    state: Mutex<S>,
    reducer: RwLock<Reducer<S, A>>,
}

/// Dispatcher returned by [`RenderCx::use_reducer`].
pub struct Dispatch<S, A> {
    cell: Arc<ReducerCell<S, A>>,
    dirty: Arc<AtomicBool>,
    site: Option<TracedSite<S>>,
    show_action: Show<A>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            dirty: Arc::clone(&self.dirty),
            site: self.site.clone(),
            show_action: Arc::clone(&self.show_action),
        }
    }
}

impl<S, A> Dispatch<S, A>
where
    S: fmt::Debug + Clone + Send + Sync + 'static,
    A: fmt::Debug + Clone + Send + Sync + 'static,
{
    /// Reduce the state with `action` and schedule a render pass.
    ///
    /// A traced reducer records the action, then the resulting state.
    pub fn dispatch(&self, action: A) {
        if let Some(site) = &self.site {
            site.emit(Phase::Dispatch, action.clone(), Arc::clone(&self.show_action));
        }

        let reducer = Arc::clone(&*self.cell.reducer.read());
        let state = {
            let mut state = self.cell.state.lock();
            let next = reducer(&*state, action);
            *state = next.clone();
            next
        };

        if let Some(site) = &self.site {
            site.record(Phase::State, &state);
        }
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Current state, including changes not yet rendered.
    pub fn state(&self) -> S {
        self.cell.state.lock().clone()
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("traced", &self.site.is_some())
            .finish()
    }
}

/// Memoized callback returned by [`RenderCx::use_callback`].
pub struct TracedCallback<A, R> {
    callback: Arc<dyn Fn(A) -> R + Send + Sync>,
    site: Option<TracedSite<()>>,
}

impl<A, R> Clone for TracedCallback<A, R> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            site: self.site.clone(),
        }
    }
}

impl<A, R> TracedCallback<A, R> {
    /// Invoke the callback. A traced callback records a `run` entry.
    pub fn call(&self, args: A) -> R {
        if let Some(site) = &self.site {
            site.mark(Phase::Run);
        }
        (self.callback)(args)
    }

    /// Check if both handles hold the same memoized callback.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }
}

impl<A, R> fmt::Debug for TracedCallback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedCallback")
            .field("traced", &self.site.is_some())
            .finish()
    }
}

#[derive(Clone)]
struct TracerMarker;

/// Commit stage an effect runs in.
#[derive(Clone, Copy)]
enum EffectStage {
    Insertion,
    Layout,
    Passive,
}

impl EffectStage {
    fn kind(self) -> OriginKind {
        match self {
            EffectStage::Insertion => OriginKind::InsertionEffect,
            EffectStage::Layout => OriginKind::LayoutEffect,
            EffectStage::Passive => OriginKind::Effect,
        }
    }
}

struct EffectState<D> {
    deps: Option<D>,
    cleanup: Option<Cleanup>,
}

type EffectSlot<D> = Arc<Mutex<EffectState<D>>>;

type MemoSlot<D, T> = Arc<Mutex<Option<(D, T)>>>;

type CallbackSlot<D, A, R> = Arc<Mutex<Option<(D, TracedCallback<A, R>)>>>;

impl RenderCx<'_> {
    /// Register this component for tracing.
    ///
    /// Must run before any other hook of the component. Records the mount
    /// on the first render and the props on every render.
    pub fn use_tracer(&mut self) -> HostResult<TraceHandle> {
        self.use_tracer_with(TracerOptions::default())
    }

    /// [`use_tracer`](Self::use_tracer) with custom prop formatting.
    pub fn use_tracer_with(&mut self, options: TracerOptions) -> HostResult<TraceHandle> {
        let (_, first) = self.slot(|| TracerMarker)?;

        let tracer = Arc::clone(&self.shared.tracer);
        if !tracer.is_enabled() {
            return Ok(TraceHandle::disabled());
        }

        let identity = self.shared.registry.begin_render_pass(self.node);
        let label = identity.shared_label();
        let origins = identity.lifecycle().clone();

        if first {
            tracer.trace(Arc::clone(&label), &origins.mount, Some(Phase::Mounting), Payload::Empty);
            tracer.register_label(Arc::clone(&label));

            let (mounted_tracer, mounted_label, mount) =
                (Arc::clone(&tracer), Arc::clone(&label), Arc::clone(&origins.mount));
            self.schedule_layout(move || {
                mounted_tracer.trace(mounted_label, &mount, Some(Phase::Mounted), Payload::Empty);
            });

            let fallback = Arc::clone(&tracer);
            self.schedule_effect(move || {
                let queued = Arc::clone(&fallback);
                fallback.queue().schedule(move || {
                    queued.ensure_output();
                });
            });

            let (unmount_tracer, unmount_label, unmount) =
                (Arc::clone(&tracer), Arc::clone(&label), Arc::clone(&origins.unmount));
            self.on_unmount(move || {
                unmount_tracer.trace(Arc::clone(&unmount_label), &unmount, None, Payload::Empty);
                unmount_tracer.unregister_label(&unmount_label);
            });
        }

        let show_props = options.show_props;
        tracer.trace(
            Arc::clone(&label),
            &origins.render,
            Some(Phase::Props),
            Payload::value(self.props.clone(), move |props| {
                show_props_with(props, |key, value| match show_props.get(key) {
                    Some(show) => show(value),
                    None => show_json(value),
                })
            }),
        );

        Ok(TraceHandle {
            target: Some(TraceTarget {
                tracer,
                label,
                origin: origins.trace,
            }),
        })
    }

    /// State shown as JSON.
    pub fn use_state<T>(&mut self, init: impl FnOnce() -> T) -> HostResult<(T, StateSetter<T>)>
    where
        T: Serialize + fmt::Debug + Clone + Send + Sync + 'static,
    {
        self.use_state_with(init, HookOptions::json())
    }

    /// State that persists across render passes.
    ///
    /// Returns the current value and a setter that schedules a new pass.
    pub fn use_state_with<T>(
        &mut self,
        init: impl FnOnce() -> T,
        options: HookOptions<T>,
    ) -> HostResult<(T, StateSetter<T>)>
    where
        T: fmt::Debug + Clone + Send + Sync + 'static,
    {
        let site = self.traced_site(OriginKind::State, options)?;
        let (cell, first) = self.slot(|| Arc::new(Mutex::new(init())))?;
        let value = cell.lock().clone();

        if let (true, Some(site)) = (first, &site) {
            site.record(Phase::Init, &value);
        }

        let setter = StateSetter {
            cell,
            dirty: Arc::clone(&self.shared.dirty),
            site,
        };
        Ok((value, setter))
    }

    /// Side effect run at commit when `deps` change.
    ///
    /// The effect may return a cleanup, run before the next effect and on
    /// unmount.
    pub fn use_effect<D>(
        &mut self,
        deps: D,
        effect: impl FnOnce() -> Option<Cleanup> + Send + 'static,
    ) -> HostResult<()>
    where
        D: PartialEq + Clone + Send + 'static,
    {
        self.effect_site(EffectStage::Passive, deps, effect)
    }

    /// [`use_effect`](Self::use_effect) run before passive effects, right
    /// after the tree is committed.
    pub fn use_layout_effect<D>(
        &mut self,
        deps: D,
        effect: impl FnOnce() -> Option<Cleanup> + Send + 'static,
    ) -> HostResult<()>
    where
        D: PartialEq + Clone + Send + 'static,
    {
        self.effect_site(EffectStage::Layout, deps, effect)
    }

    /// [`use_effect`](Self::use_effect) run before layout effects.
    pub fn use_insertion_effect<D>(
        &mut self,
        deps: D,
        effect: impl FnOnce() -> Option<Cleanup> + Send + 'static,
    ) -> HostResult<()>
    where
        D: PartialEq + Clone + Send + 'static,
    {
        self.effect_site(EffectStage::Insertion, deps, effect)
    }

    fn effect_site<D>(
        &mut self,
        stage: EffectStage,
        deps: D,
        effect: impl FnOnce() -> Option<Cleanup> + Send + 'static,
    ) -> HostResult<()>
    where
        D: PartialEq + Clone + Send + 'static,
    {
        let site = self.traced_site(stage.kind(), HookOptions::show_with(|_: &()| String::new()))?;

        let (state, first): (EffectSlot<D>, bool) = self.slot(|| {
            Arc::new(Mutex::new(EffectState {
                deps: None,
                cleanup: None,
            }))
        })?;

        if first {
            if let Some(site) = &site {
                site.mark(Phase::Init);
            }
            let teardown = Arc::clone(&state);
            self.on_unmount(move || {
                let cleanup = teardown.lock().cleanup.take();
                if let Some(cleanup) = cleanup {
                    cleanup();
                }
            });
        }

        let changed = state.lock().deps.as_ref() != Some(&deps);
        if !changed {
            return Ok(());
        }

        let task = move || {
            let previous = {
                let mut state = state.lock();
                state.deps = Some(deps);
                state.cleanup.take()
            };
            if let Some(cleanup) = previous {
                cleanup();
            }

            if let Some(site) = &site {
                site.mark(Phase::Run);
            }
            let cleanup = effect().map(|cleanup| match site {
                Some(site) => Box::new(move || {
                    site.mark(Phase::Cleanup);
                    cleanup();
                }) as Cleanup,
                None => cleanup,
            });
            state.lock().cleanup = cleanup;
        };
        match stage {
            EffectStage::Insertion => self.schedule_insertion(task),
            EffectStage::Layout => self.schedule_layout(task),
            EffectStage::Passive => self.schedule_effect(task),
        }
        Ok(())
    }

    /// Mutable cell shown as JSON.
    pub fn use_ref<T>(&mut self, init: T) -> HostResult<TracedRef<T>>
    where
        T: Serialize + fmt::Debug + PartialEq + Clone + Send + Sync + 'static,
    {
        self.use_ref_with(init, HookOptions::json())
    }

    /// Mutable cell that persists across render passes.
    pub fn use_ref_with<T>(&mut self, init: T, options: HookOptions<T>) -> HostResult<TracedRef<T>>
    where
        T: fmt::Debug + PartialEq + Clone + Send + Sync + 'static,
    {
        let site = self.traced_site(OriginKind::Ref, options)?;
        let (cell, first) = self.slot(|| Arc::new(Mutex::new(init)))?;

        if let (true, Some(site)) = (first, &site) {
            let value = cell.lock().clone();
            site.record(Phase::Init, &value);
        }

        Ok(TracedRef { cell, site })
    }

    /// Memoized value shown as JSON.
    pub fn use_memo<D, T>(&mut self, deps: D, factory: impl FnOnce() -> T) -> HostResult<T>
    where
        D: PartialEq + Clone + Send + 'static,
        T: Serialize + fmt::Debug + Clone + Send + Sync + 'static,
    {
        self.use_memo_with(deps, factory, HookOptions::json())
    }

    /// Value recomputed only when `deps` change.
    pub fn use_memo_with<D, T>(
        &mut self,
        deps: D,
        factory: impl FnOnce() -> T,
        options: HookOptions<T>,
    ) -> HostResult<T>
    where
        D: PartialEq + Clone + Send + 'static,
        T: fmt::Debug + Clone + Send + Sync + 'static,
    {
        let site = self.traced_site(OriginKind::Memo, options)?;
        let (slot, _): (MemoSlot<D, T>, bool) = self.slot(|| Arc::new(Mutex::new(None)))?;

        let mut memo = slot.lock();
        let phase = match memo.as_ref() {
            Some((previous, value)) if *previous == deps => return Ok(value.clone()),
            Some(_) => Phase::Refresh,
            None => Phase::Init,
        };

        let value = factory();
        if let Some(site) = &site {
            site.announce(phase, &value);
        }
        *memo = Some((deps, value.clone()));
        Ok(value)
    }

    /// Reducer state with states and actions shown as JSON.
    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + Send + Sync + 'static,
        init: impl FnOnce() -> S,
    ) -> HostResult<(S, Dispatch<S, A>)>
    where
        S: Serialize + fmt::Debug + Clone + Send + Sync + 'static,
        A: Serialize + fmt::Debug + Clone + Send + Sync + 'static,
    {
        self.use_reducer_with(reducer, init, ReducerOptions::json())
    }

    /// State changed only by dispatching actions through `reducer`.
    ///
    /// The reducer of the latest render pass is the one applied.
    pub fn use_reducer_with<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + Send + Sync + 'static,
        init: impl FnOnce() -> S,
        options: ReducerOptions<S, A>,
    ) -> HostResult<(S, Dispatch<S, A>)>
    where
        S: fmt::Debug + Clone + Send + Sync + 'static,
        A: fmt::Debug + Clone + Send + Sync + 'static,
    {
        let ReducerOptions {
            label,
            show_state,
            show_action,
        } = options;
        let site = self.traced_site(
            OriginKind::Reducer,
            HookOptions {
                label,
                show: show_state,
            },
        )?;

        let reducer: Reducer<S, A> = Arc::new(reducer);
        let (cell, first) = self.slot(|| {
            Arc::new(ReducerCell {
                state: Mutex::new(init()),
                reducer: RwLock::new(Arc::clone(&reducer)),
            })
        })?;
        *cell.reducer.write() = reducer;
        let value = cell.state.lock().clone();

        if let (true, Some(site)) = (first, &site) {
            site.record(Phase::Init, &value);
        }

        let dispatch = Dispatch {
            cell,
            dirty: Arc::clone(&self.shared.dirty),
            site,
            show_action,
        };
        Ok((value, dispatch))
    }

    /// Callback kept across render passes until `deps` change.
    pub fn use_callback<D, A, R>(
        &mut self,
        deps: D,
        callback: impl Fn(A) -> R + Send + Sync + 'static,
    ) -> HostResult<TracedCallback<A, R>>
    where
        D: PartialEq + Clone + Send + 'static,
        A: 'static,
        R: 'static,
    {
        let site = self.traced_site(
            OriginKind::Callback,
            HookOptions::show_with(|_: &()| String::new()),
        )?;
        let (slot, _): (CallbackSlot<D, A, R>, bool) = self.slot(|| Arc::new(Mutex::new(None)))?;

        let mut memo = slot.lock();
        let phase = match memo.as_ref() {
            Some((previous, callback)) if *previous == deps => return Ok(callback.clone()),
            Some(_) => Phase::Refresh,
            None => Phase::Init,
        };

        if let Some(site) = &site {
            site.mark(phase);
        }
        let callback = TracedCallback {
            callback: Arc::new(callback),
            site,
        };
        *memo = Some((deps, callback.clone()));
        Ok(callback)
    }

    /// Context value shown as JSON.
    pub fn use_context<T>(&mut self, context: &Context<T>) -> HostResult<T>
    where
        T: Serialize + fmt::Debug + PartialEq + Clone + Send + Sync + 'static,
    {
        self.use_context_with(context, HookOptions::json())
    }

    /// Read the nearest provided value of `context`.
    ///
    /// A traced read records `init` on first render and `update` whenever
    /// the value differs from the previous pass.
    pub fn use_context_with<T>(
        &mut self,
        context: &Context<T>,
        options: HookOptions<T>,
    ) -> HostResult<T>
    where
        T: fmt::Debug + PartialEq + Clone + Send + Sync + 'static,
    {
        let site = self.traced_site(OriginKind::Context, options)?;
        let value = context.read(self.contexts);

        let (seen, _): (Arc<Mutex<Option<T>>>, bool) = self.slot(|| Arc::new(Mutex::new(None)))?;
        let previous = seen.lock().replace(value.clone());

        if let Some(site) = &site {
            match previous {
                None => site.record(Phase::Init, &value),
                Some(previous) if previous != value => site.record(Phase::Update, &value),
                Some(_) => {}
            }
        }
        Ok(value)
    }

    /// Register a call site when the component is traced.
    fn traced_site<T>(
        &mut self,
        kind: OriginKind,
        options: HookOptions<T>,
    ) -> HostResult<Option<TracedSite<T>>> {
        if !self.is_traced() {
            return Ok(None);
        }

        let registry = &self.shared.registry;
        let origin = registry.register_call_site(kind, options.label.as_deref())?;
        let label = registry.current_identity()?.shared_label();

        Ok(Some(TracedSite {
            tracer: Arc::clone(&self.shared.tracer),
            label,
            origin,
            show: options.show,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Element};
    use crate::host::Host;
    use hooktrace_core::{Props, TracerConfig, entry_line};
    use hooktrace_observe::{TaskQueue, Tracer};
    use hooktrace_registry::ComponentRegistry;

    fn host() -> Host {
        let tracer = Tracer::new(TracerConfig::default(), TaskQueue::new()).into_shared();
        tracer.register_log_viewer();
        Host::new(Arc::new(ComponentRegistry::new()), tracer)
    }

    fn lines(host: &Host) -> Vec<String> {
        host.tracer()
            .log_entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| entry_line(index, entry))
            .collect()
    }

    #[test]
    fn test_untraced_component_records_nothing() {
        let mut host = host();
        host.mount(Element::new("Plain", |cx| {
            let (count, _) = cx.use_state(|| 1)?;
            assert_eq!(count, 1);
            cx.use_effect((), || None)?;
            let (total, _) = cx.use_reducer(|n: &i32, d: i32| n + d, || 4)?;
            assert_eq!(total, 4);
            let double = cx.use_callback((), |n: i32| n * 2)?;
            assert_eq!(double.call(3), 6);
            Ok(vec![])
        }))
        .unwrap();

        assert!(host.tracer().is_empty());
        assert!(host.traced_components().is_empty());
    }

    #[test]
    fn test_state_init_and_set() {
        let mut host = host();
        let setter = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&setter);

        host.mount(Element::new("Counter", move |cx| {
            cx.use_tracer()?;
            let (count, set_count) = cx.use_state(|| 0_u32)?;
            *captured.lock() = Some(set_count);
            Ok(vec![Element::new("Leaf", |_| Ok(vec![])).with_prop("n", count)])
        }))
        .unwrap();

        let set_count = setter.lock().clone().unwrap();
        set_count.set(5);
        assert!(host.is_dirty());
        assert!(host.update().unwrap());

        let phases: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::State)
            .map(|entry| entry.phase())
            .collect();
        assert_eq!(phases, vec![Some(Phase::Init), Some(Phase::Set)]);

        let identity = &host.traced_components()[0];
        assert_eq!(identity.label(), "Counter-1");
        assert_eq!(identity.call_site(0).unwrap().display().as_deref(), Some("5"));
    }

    #[test]
    fn test_state_update_traces_new_value() {
        let mut host = host();
        let setter = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&setter);

        host.mount(Element::new("Counter", move |cx| {
            cx.use_tracer()?;
            let (_, set_count) = cx.use_state(|| 1_i32)?;
            *captured.lock() = Some(set_count);
            Ok(vec![])
        }))
        .unwrap();

        let set_count = setter.lock().clone().unwrap();
        set_count.update(|n| n * 10);
        host.update().unwrap();

        let last_state = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.phase() == Some(Phase::Update))
            .map(|entry| entry.payload().show())
            .collect::<Vec<_>>();
        assert_eq!(last_state, vec![Some("10".to_string())]);
        assert_eq!(set_count.get(), 10);
    }

    #[test]
    fn test_tracer_lifecycle_entries() {
        let mut host = host();
        host.mount(
            Element::new("Greeter", |cx| {
                let handle = cx.use_tracer()?;
                handle.trace("hello");
                Ok(vec![])
            })
            .with_prop("name", "Ada"),
        )
        .unwrap();
        host.unmount().unwrap();

        let lines = lines(&host);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("Greeter-1") && lines[0].contains("mounting"));
        assert!(lines[1].contains("props") && lines[1].contains("name=\"Ada\""));
        assert!(lines[2].contains("hello"));
        assert!(lines[3].contains("mounted"));
        assert!(lines[4].contains("unmount"));
        assert!(host.tracer().traced_labels().is_empty());
    }

    #[test]
    fn test_show_prop_override() {
        let mut host = host();
        host.mount(
            Element::new("Secret", |cx| {
                cx.use_tracer_with(TracerOptions::new().show_prop("token", |_| "***".into()))?;
                Ok(vec![])
            })
            .with_prop("token", "abc")
            .with_prop("id", 7),
        )
        .unwrap();

        let render = host.tracer().log_entries()[1].payload().show().unwrap();
        assert_eq!(render, "id=7 token=***");
    }

    #[test]
    fn test_effect_run_and_cleanup() {
        let mut host = host();
        let runs = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&runs);

        host.mount(
            Element::new("Poller", move |cx| {
                cx.use_tracer()?;
                let interval = cx.prop("interval").and_then(|v| v.as_u64());
                let log = Arc::clone(&log);
                cx.use_effect(interval, move || {
                    log.lock().push(format!("start {interval:?}"));
                    let log = Arc::clone(&log);
                    Some(Box::new(move || log.lock().push("stop".to_string())) as Cleanup)
                })?;
                Ok(vec![])
            })
            .with_prop("interval", 1),
        )
        .unwrap();

        host.set_root_props(Props::from([("interval".to_string(), 1.into())]))
            .unwrap();
        host.set_root_props(Props::from([("interval".to_string(), 2.into())]))
            .unwrap();
        host.unmount().unwrap();

        assert_eq!(
            *runs.lock(),
            vec!["start Some(1)", "stop", "start Some(2)", "stop"]
        );

        let phases: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Effect)
            .filter_map(|entry| entry.phase())
            .collect();
        assert_eq!(
            phases,
            vec![Phase::Init, Phase::Run, Phase::Cleanup, Phase::Run, Phase::Cleanup]
        );
    }

    #[test]
    fn test_ref_traces_only_changes() {
        let mut host = host();
        let slot = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&slot);

        host.mount(Element::new("Tracker", move |cx| {
            cx.use_tracer()?;
            let seen = cx.use_ref_with(
                0_u8,
                HookOptions::show_with(|n: &u8| format!("#{n}")).with_label("seen"),
            )?;
            *captured.lock() = Some(seen);
            Ok(vec![])
        }))
        .unwrap();

        let seen = slot.lock().clone().unwrap();
        seen.set(0);
        seen.set(3);
        seen.set(3);
        assert!(!host.is_dirty());
        assert_eq!(seen.get(), 3);

        let payloads: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Ref)
            .map(|entry| (entry.phase(), entry.payload().show()))
            .collect();
        assert_eq!(
            payloads,
            vec![
                (Some(Phase::Init), Some("#0".to_string())),
                (Some(Phase::Set), Some("#3".to_string())),
            ]
        );
    }

    #[test]
    fn test_memo_init_and_refresh() {
        let mut host = host();
        host.mount(
            Element::new("Doubler", |cx| {
                cx.use_tracer()?;
                let n = cx.prop("n").and_then(|v| v.as_u64()).unwrap_or(0);
                let doubled = cx.use_memo(n, || n * 2)?;
                assert_eq!(doubled, n * 2);
                Ok(vec![])
            })
            .with_prop("n", 2),
        )
        .unwrap();

        host.set_root_props(Props::from([("n".to_string(), 2.into())]))
            .unwrap();
        host.set_root_props(Props::from([("n".to_string(), 4.into())]))
            .unwrap();

        let phases: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Memo)
            .filter_map(|entry| entry.phase())
            .collect();
        assert_eq!(phases, vec![Phase::Init, Phase::Refresh]);

        let memo = host.traced_components()[0].call_site(0).unwrap();
        assert_eq!(memo.display().as_deref(), Some("8"));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Add(i32),
        Reset,
    }

    #[test]
    fn test_reducer_dispatch_and_state() {
        let mut host = host();
        let slot = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&slot);
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&rendered);

        host.mount(Element::new("Tally", move |cx| {
            cx.use_tracer()?;
            let (total, dispatch) = cx.use_reducer_with(
                |total: &i32, step: Step| match step {
                    Step::Add(n) => total + n,
                    Step::Reset => 0,
                },
                || 1,
                ReducerOptions::show_with(
                    |total: &i32| format!("={total}"),
                    |step: &Step| format!("{step:?}"),
                )
                .with_label("total"),
            )?;
            seen.lock().push(total);
            *captured.lock() = Some(dispatch);
            Ok(vec![])
        }))
        .unwrap();

        let dispatch = slot.lock().clone().unwrap();
        dispatch.dispatch(Step::Add(2));
        assert_eq!(dispatch.state(), 3);
        assert!(host.update().unwrap());
        dispatch.dispatch(Step::Reset);
        assert!(host.update().unwrap());

        assert_eq!(*rendered.lock(), vec![1, 3, 0]);

        let entries: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Reducer)
            .map(|entry| (entry.phase(), entry.payload().show()))
            .collect();
        assert_eq!(
            entries,
            vec![
                (Some(Phase::Init), Some("=1".to_string())),
                (Some(Phase::Dispatch), Some("Add(2)".to_string())),
                (Some(Phase::State), Some("=3".to_string())),
                (Some(Phase::Dispatch), Some("Reset".to_string())),
                (Some(Phase::State), Some("=0".to_string())),
            ]
        );

        let site = host.traced_components()[0].call_site(0).unwrap();
        assert_eq!(site.label(), Some("total"));
        assert_eq!(site.display().as_deref(), Some("=0"));
    }

    #[test]
    fn test_callback_kept_until_deps_change() {
        let mut host = host();
        let handles = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&handles);

        host.mount(
            Element::new("Button", move |cx| {
                cx.use_tracer()?;
                let step = cx.prop("step").and_then(|v| v.as_i64()).unwrap_or(1);
                let on_click = cx.use_callback(step, move |base: i64| base + step)?;
                captured.lock().push(on_click);
                Ok(vec![])
            })
            .with_prop("step", 1),
        )
        .unwrap();

        host.set_root_props(Props::from([("step".to_string(), 1.into())]))
            .unwrap();
        host.set_root_props(Props::from([("step".to_string(), 2.into())]))
            .unwrap();

        let handles = handles.lock().clone();
        assert!(handles[0].ptr_eq(&handles[1]));
        assert!(!handles[1].ptr_eq(&handles[2]));
        assert_eq!(handles[2].call(10), 12);

        let phases: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Callback)
            .filter_map(|entry| entry.phase())
            .collect();
        assert_eq!(phases, vec![Phase::Init, Phase::Refresh, Phase::Run]);
    }

    #[test]
    fn test_context_init_and_update() {
        let theme = Context::new("system".to_string());
        let reads = Arc::new(Mutex::new(Vec::new()));

        let label = {
            let theme = theme.clone();
            let reads = Arc::clone(&reads);
            move || {
                let theme = theme.clone();
                let reads = Arc::clone(&reads);
                Element::new("Label", move |cx| {
                    cx.use_tracer()?;
                    let value = cx.use_context(&theme)?;
                    reads.lock().push(value);
                    Ok(vec![])
                })
            }
        };

        let mut host = host();
        host.mount(
            Element::new("App", move |cx| {
                let provided = cx.prop("theme").and_then(|v| v.as_str()).map(str::to_string);
                if let Some(value) = provided {
                    cx.provide(&theme, value);
                }
                Ok(vec![label()])
            })
            .with_prop("theme", "dark"),
        )
        .unwrap();

        host.set_root_props(Props::from([("theme".to_string(), "dark".into())]))
            .unwrap();
        host.set_root_props(Props::from([("theme".to_string(), "light".into())]))
            .unwrap();
        host.set_root_props(Props::new()).unwrap();

        assert_eq!(*reads.lock(), vec!["dark", "dark", "light", "system"]);

        let entries: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.origin().kind() == OriginKind::Context)
            .map(|entry| (entry.phase(), entry.payload().show()))
            .collect();
        assert_eq!(
            entries,
            vec![
                (Some(Phase::Init), Some("\"dark\"".to_string())),
                (Some(Phase::Update), Some("\"light\"".to_string())),
                (Some(Phase::Update), Some("\"system\"".to_string())),
            ]
        );
    }

    #[test]
    fn test_effect_stages_run_in_commit_order() {
        let mut host = host();
        let order = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&order);

        host.mount(Element::new("Staged", move |cx| {
            cx.use_tracer()?;
            let passive = Arc::clone(&log);
            cx.use_effect((), move || {
                passive.lock().push("passive");
                None
            })?;
            let layout = Arc::clone(&log);
            cx.use_layout_effect((), move || {
                layout.lock().push("layout");
                None
            })?;
            let insertion = Arc::clone(&log);
            cx.use_insertion_effect((), move || {
                insertion.lock().push("insertion");
                None
            })?;
            Ok(vec![])
        }))
        .unwrap();

        assert_eq!(*order.lock(), vec!["insertion", "layout", "passive"]);

        let identity = &host.traced_components()[0];
        let kinds: Vec<_> = (0..3)
            .filter_map(|index| identity.call_site(index))
            .map(|origin| origin.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                OriginKind::Effect,
                OriginKind::LayoutEffect,
                OriginKind::InsertionEffect
            ]
        );

        let runs = host
            .tracer()
            .log_entries()
            .iter()
            .filter(|entry| entry.phase() == Some(Phase::Run))
            .count();
        assert_eq!(runs, 3);
    }

    #[test]
    fn test_disabled_tracer_is_pass_through() {
        let tracer = Tracer::new(TracerConfig::disabled(), TaskQueue::new()).into_shared();
        let mut host = Host::new(Arc::new(ComponentRegistry::new()), tracer);

        host.mount(Element::new("Quiet", |cx| {
            let handle = cx.use_tracer()?;
            assert!(!handle.is_enabled());
            handle.trace("ignored");
            cx.use_state(|| "x".to_string())?;
            Ok(vec![])
        }))
        .unwrap();

        assert!(host.tracer().is_empty());
    }
}
