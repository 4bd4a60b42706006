//! The result of dispatching one event.

use herald_core::Action;

/// What happened to an event after it went through the pipeline.
///
/// Whatever the variant, the [`actions`](Outcome::actions) it carries are
/// handed to the transport once the chain completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A route matched and its handler ran.
    Handled {
        /// Name of the route that handled the event.
        route: String,
        /// Actions produced by the handler.
        actions: Vec<Action>,
    },
    /// A middleware short-circuited the chain.
    Rejected {
        /// Name of the rejecting middleware.
        middleware: &'static str,
        /// Actions the middleware asked for (e.g. a throttle notice).
        actions: Vec<Action>,
    },
    /// No route matched; the event is dropped.
    Unmatched,
    /// The handler (or a middleware) failed or panicked.
    Failed {
        /// Rendered error.
        error: String,
    },
}

impl Outcome {
    pub fn handled(route: impl Into<String>, actions: Vec<Action>) -> Self {
        Self::Handled {
            route: route.into(),
            actions,
        }
    }

    /// A rejection carrying actions.
    pub fn rejected(middleware: &'static str, actions: Vec<Action>) -> Self {
        Self::Rejected {
            middleware,
            actions,
        }
    }

    /// A silent rejection.
    pub fn dropped(middleware: &'static str) -> Self {
        Self::rejected(middleware, Vec::new())
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            Self::Handled { actions, .. } | Self::Rejected { actions, .. } => actions,
            Self::Unmatched | Self::Failed { .. } => &[],
        }
    }

    /// Appends an action, e.g. from a middleware post-processing the result.
    pub fn push_action(&mut self, action: Action) {
        match self {
            Self::Handled { actions, .. } | Self::Rejected { actions, .. } => actions.push(action),
            Self::Unmatched | Self::Failed { .. } => {}
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }

    /// Name of the route that handled the event.
    pub fn route(&self) -> Option<&str> {
        match self {
            Self::Handled { route, .. } => Some(route),
            _ => None,
        }
    }
}
