// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error boundaries for component trees.
//!
//! An [`ErrorBoundary`] wraps a [`Component`]. When rendering the component
//! fails, by returning an error or by panicking, the boundary reports the
//! failure with its component stack, switches to the failed state and renders
//! a [`Fallback`] until [`ErrorBoundary::reset`] is called.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::capture::{BoundaryScope, CapturedError, ErrorTracker};

/// Anything failures can be reported to.
pub trait ReportErrors {
	fn report_error(&self, error: CapturedError, component_stack: Option<&str>);

	/// Link offered by fallbacks for filing an issue.
	fn issue_tracker_url(&self) -> Option<String> {
		None
	}
}

impl ReportErrors for ErrorTracker {
	fn report_error(&self, error: CapturedError, component_stack: Option<&str>) {
		ErrorTracker::report_error(self, error, component_stack);
	}

	fn issue_tracker_url(&self) -> Option<String> {
		ErrorTracker::issue_tracker_url(self)
	}
}

impl<T: ReportErrors + ?Sized> ReportErrors for &T {
	fn report_error(&self, error: CapturedError, component_stack: Option<&str>) {
		(**self).report_error(error, component_stack);
	}

	fn issue_tracker_url(&self) -> Option<String> {
		(**self).issue_tracker_url()
	}
}

/// A renderable subtree.
pub trait Component {
	type View;

	/// Name shown in component stacks.
	fn name(&self) -> &str;

	fn render(&mut self) -> Result<Self::View, CapturedError>;
}

/// What a boundary knows about the failure it caught.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFailure {
	pub error: CapturedError,
	pub component_stack: String,
}

/// Produces the view shown while a boundary is failed.
pub trait Fallback<V> {
	fn render_fallback(&self, failure: &BoundaryFailure, issue_tracker_url: Option<&str>) -> V;
}

impl<V, F> Fallback<V> for F
where
	F: Fn(&BoundaryFailure, Option<&str>) -> V,
{
	fn render_fallback(&self, failure: &BoundaryFailure, issue_tracker_url: Option<&str>) -> V {
		self(failure, issue_tracker_url)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
	Ok,
	Failed(BoundaryFailure),
}

pub struct ErrorBoundary<C, F, R> {
	child: C,
	fallback: F,
	reporter: R,
	ancestors: Vec<String>,
	state: BoundaryState,
}

impl<C, F, R> ErrorBoundary<C, F, R>
where
	C: Component,
	F: Fallback<C::View>,
	R: ReportErrors,
{
	pub fn new(child: C, fallback: F, reporter: R) -> Self {
		Self {
			child,
			fallback,
			reporter,
			ancestors: Vec::new(),
			state: BoundaryState::Ok,
		}
	}

	/// Names the components enclosing this boundary, innermost first, for
	/// the reported component stack.
	#[must_use]
	pub fn within(mut self, ancestors: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.ancestors = ancestors.into_iter().map(Into::into).collect();
		self
	}

	pub fn state(&self) -> &BoundaryState {
		&self.state
	}

	pub fn is_failed(&self) -> bool {
		matches!(self.state, BoundaryState::Failed(_))
	}

	pub fn child_mut(&mut self) -> &mut C {
		&mut self.child
	}

	/// Renders the child, or the fallback if the boundary is failed.
	pub fn render(&mut self) -> C::View {
		if let BoundaryState::Failed(failure) = &self.state {
			return self.render_fallback(failure);
		}

		let outcome = {
			let _scope = BoundaryScope::enter();
			let child = &mut self.child;
			panic::catch_unwind(AssertUnwindSafe(|| child.render()))
		};

		let error = match outcome {
			Ok(Ok(view)) => return view,
			Ok(Err(error)) => error,
			Err(payload) => CapturedError::from_panic(payload.as_ref(), None),
		};

		let failure = BoundaryFailure {
			error,
			component_stack: self.component_stack(),
		};
		warn!(
			component = %self.child.name(),
			error = %failure.error.message,
			"Error boundary caught a render failure"
		);
		self.reporter
			.report_error(failure.error.clone(), Some(&failure.component_stack));

		let view = self.render_fallback(&failure);
		self.state = BoundaryState::Failed(failure);
		view
	}

	/// Returns to normal rendering. Only ever triggered by the user.
	pub fn reset(&mut self) {
		self.state = BoundaryState::Ok;
	}

	fn render_fallback(&self, failure: &BoundaryFailure) -> C::View {
		let url = self.reporter.issue_tracker_url();
		self.fallback.render_fallback(failure, url.as_deref())
	}

	fn component_stack(&self) -> String {
		std::iter::once(self.child.name())
			.chain(self.ancestors.iter().map(String::as_str))
			.map(|name| format!("    at {name}"))
			.collect::<Vec<_>>()
			.join("\n")
	}
}
