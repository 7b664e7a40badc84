//! Middleware: step-to-step transformations and their composition.
//!
//! A [`Middleware`] turns an inner step into an outer step. Applying `A`
//! and then `B` yields `B(A(core))`: `B`'s pre-processing runs before
//! `A`'s, and `A`'s post-processing runs before `B`'s. Static chains are
//! built with [`StepExt::with`]; dynamic chains with [`Stack`] or
//! [`compose`]. Both produce the same nesting.
//!
//! Recommended layering is stability controls outermost, local per-field
//! fixups in the middle, and global conservation adjustments innermost.
//! Nothing enforces this.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use stratus_core::{Backend, StepError};

use crate::step::{BoxStep, Step, StepContext, StepOutput};

/// A step transformer.
///
/// Takes `&self` so one configured middleware can wrap several steps.
pub trait Middleware<B: Backend, S> {
    /// The step produced by wrapping `S`.
    type Wrapped: Step<B>;

    /// Wrap `inner`.
    fn wrap(&self, inner: S) -> Self::Wrapped;
}

/// Method-call syntax for static middleware chains.
pub trait StepExt<B: Backend>: Step<B> + Sized {
    /// Wrap `self` in `middleware`.
    ///
    /// `core.with(a).with(b)` is `b.wrap(a.wrap(core))`.
    fn with<M: Middleware<B, Self>>(self, middleware: M) -> M::Wrapped {
        middleware.wrap(self)
    }

    /// Erase the concrete type.
    fn boxed(self) -> BoxStep<B>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<B: Backend, S: Step<B>> StepExt<B> for S {}

// ── Dynamic composition ─────────────────────────────────────────

/// Object-safe middleware over boxed steps.
///
/// Implemented for every [`Middleware`] whose wrapped step is `'static`.
pub trait Layer<B: Backend> {
    /// Wrap a boxed step.
    fn layer(&self, inner: BoxStep<B>) -> BoxStep<B>;
}

impl<B, M> Layer<B> for M
where
    B: Backend,
    M: Middleware<B, BoxStep<B>>,
    M::Wrapped: 'static,
{
    fn layer(&self, inner: BoxStep<B>) -> BoxStep<B> {
        Box::new(self.wrap(inner))
    }
}

/// An ordered list of middleware applied first to last.
pub struct Stack<B: Backend> {
    layers: Vec<Box<dyn Layer<B>>>,
}

impl<B: Backend> Stack<B> {
    /// An empty stack. Applying it returns the core unchanged.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a middleware. It will wrap everything pushed before it.
    pub fn push<L: Layer<B> + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the stack has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wrap `core` in every layer, first pushed innermost.
    pub fn apply(&self, core: BoxStep<B>) -> BoxStep<B> {
        self.layers
            .iter()
            .fold(core, |inner, layer| layer.layer(inner))
    }
}

impl<B: Backend> Default for Stack<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> FromIterator<Box<dyn Layer<B>>> for Stack<B> {
    fn from_iter<I: IntoIterator<Item = Box<dyn Layer<B>>>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

impl<B: Backend> fmt::Debug for Stack<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Apply `layers` to `core` in order: `compose(core, [a, b])` is `b(a(core))`.
pub fn compose<B, S>(core: S, layers: Vec<Box<dyn Layer<B>>>) -> BoxStep<B>
where
    B: Backend,
    S: Step<B> + 'static,
{
    layers.into_iter().collect::<Stack<B>>().apply(Box::new(core))
}

// ── Closure middleware ──────────────────────────────────────────

/// Middleware from a closure that receives the inner step and the
/// context. Built with [`around`].
pub struct Around<B, F> {
    name: Arc<str>,
    f: Arc<F>,
    _backend: PhantomData<fn() -> B>,
}

/// Build middleware from a closure.
///
/// The closure decides whether and how to call the inner step; it can
/// rewrite the context, post-process the output, or record metadata.
pub fn around<B, F>(name: &str, f: F) -> Around<B, F>
where
    B: Backend,
    F: Fn(&dyn Step<B>, &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError>
        + Send
        + Sync,
{
    Around {
        name: Arc::from(name),
        f: Arc::new(f),
        _backend: PhantomData,
    }
}

impl<B, F> Clone for Around<B, F> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            f: Arc::clone(&self.f),
            _backend: PhantomData,
        }
    }
}

/// The step produced by [`Around`].
pub struct AroundStep<B, S, F> {
    name: Arc<str>,
    inner: S,
    f: Arc<F>,
    _backend: PhantomData<fn() -> B>,
}

impl<B, S, F> Middleware<B, S> for Around<B, F>
where
    B: Backend,
    S: Step<B>,
    F: Fn(&dyn Step<B>, &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError>
        + Send
        + Sync,
{
    type Wrapped = AroundStep<B, S, F>;

    fn wrap(&self, inner: S) -> Self::Wrapped {
        AroundStep {
            name: Arc::clone(&self.name),
            inner,
            f: Arc::clone(&self.f),
            _backend: PhantomData,
        }
    }
}

impl<B, S, F> Step<B> for AroundStep<B, S, F>
where
    B: Backend,
    S: Step<B>,
    F: Fn(&dyn Step<B>, &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn wrapped(&self) -> Option<&dyn Step<B>> {
        Some(&self.inner)
    }

    fn step(&self, ctx: &StepContext<'_, B>) -> Result<StepOutput<B::Array>, StepError> {
        (self.f)(&self.inner, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_fn;
    use serde_json::json;
    use stratus_core::{Record, State, Value};
    use stratus_test_utils::{field, VecArray, VecBackend};

    /// Records `{name, order}` where `order` is how many records were
    /// already present, and appends `name` to a trace field in state.
    fn tag(name: &'static str) -> Around<VecBackend, impl TagFn> {
        around(name, move |inner: &dyn Step<VecBackend>, ctx: &StepContext<'_, VecBackend>| {
            let mut pre = ctx.state().clone();
            push_trace(&mut pre, &format!("{name}:pre"));
            let mut out = inner.step(&ctx.with_state(&pre))?;
            push_trace(&mut out.state, &format!("{name}:post"));
            let order = out.diag.middleware.len();
            out.diag.record_middleware(name, json!({ "order": order }));
            Ok(out)
        })
    }

    trait TagFn:
        Fn(&dyn Step<VecBackend>, &StepContext<'_, VecBackend>) -> Result<StepOutput<VecArray>, StepError>
        + Send
        + Sync
        + 'static
    {
    }

    impl<F> TagFn for F where
        F: Fn(&dyn Step<VecBackend>, &StepContext<'_, VecBackend>) -> Result<StepOutput<VecArray>, StepError>
            + Send
            + Sync
            + 'static
    {
    }

    fn push_trace(state: &mut State<VecArray>, entry: &str) {
        let trace = state
            .entry("trace".to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(items) = trace {
            items.push(Value::Str(entry.to_string()));
        }
    }

    fn core() -> impl Step<VecBackend> + 'static {
        step_fn("core", |ctx: &StepContext<'_, VecBackend>| {
            let mut s = ctx.state().clone();
            push_trace(&mut s, "core");
            Ok(StepOutput::new(s))
        })
    }

    fn trace_of(state: &State<VecArray>) -> Vec<String> {
        match state.get("trace") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn run_once(step: &dyn Step<VecBackend>) -> StepOutput<VecArray> {
        let mut state = Record::new();
        state.insert("T".into(), field(&[1.0]));
        let empty = Record::new();
        let ctx = StepContext::new(&state, &empty, &empty, 1.0, &VecBackend);
        step.step(&ctx).unwrap()
    }

    #[test]
    fn later_middleware_is_outermost() {
        let chain = core().with(tag("a")).with(tag("b"));
        let out = run_once(&chain);
        assert_eq!(
            trace_of(&out.state),
            vec!["b:pre", "a:pre", "core", "a:post", "b:post"]
        );
        assert_eq!(out.diag.middleware_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(Step::<VecBackend>::name(&chain), "b");
    }

    #[test]
    fn compose_matches_manual_nesting() {
        let manual = tag("b").wrap(tag("a").wrap(core()));
        let layers: Vec<Box<dyn Layer<VecBackend>>> = vec![Box::new(tag("a")), Box::new(tag("b"))];
        let composed = compose(core(), layers);

        let m = run_once(&manual);
        let c = run_once(&*composed);
        assert_eq!(m.state, c.state);
        assert_eq!(m.diag, c.diag);
    }

    #[test]
    fn empty_stack_is_identity_wrapper() {
        let stack: Stack<VecBackend> = Stack::new();
        assert!(stack.is_empty());
        let step = stack.apply(core().boxed());
        assert_eq!(step.name(), "core");
        assert_eq!(trace_of(&run_once(&*step).state), vec!["core"]);
    }

    #[test]
    fn wrapped_chain_reaches_core() {
        let chain = core().with(tag("a")).with(tag("b"));
        let mut names = Vec::new();
        let mut cur: Option<&dyn Step<VecBackend>> = Some(&chain);
        while let Some(s) = cur {
            names.push(s.name().to_string());
            cur = s.wrapped();
        }
        assert_eq!(names, vec!["b", "a", "core"]);
    }
}
