// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Hook pairs around driver calls
//!
//! A [`Hooks`] implementation is called before and after every exec and
//! query that passes through a [`ProxyDriver`](crate::proxy::ProxyDriver).
//! The value returned by the before-hook is handed to the matching
//! after-hook of the same call and nowhere else.
//!
//! Hooks observe; they cannot fail the call or change its outcome.

use std::sync::Arc;

use isutrace_driver::{DriverError, DriverResult, ExecResult, NamedValue, Rows};

use crate::query::extract;
use crate::record::TimingRecord;
use crate::tracer::Tracer;

/// Callbacks run around exec and query calls
pub trait Hooks: Send + Sync + 'static {
    /// Per-call state passed from a before-hook to its after-hook
    type Context: Send + 'static;

    fn pre_exec(&self, query: &str, args: &[NamedValue]) -> Self::Context;

    fn post_exec(
        &self,
        ctx: Self::Context,
        query: &str,
        args: &[NamedValue],
        outcome: &DriverResult<ExecResult>,
    );

    fn pre_query(&self, query: &str, args: &[NamedValue]) -> Self::Context;

    fn post_query(
        &self,
        ctx: Self::Context,
        query: &str,
        args: &[NamedValue],
        outcome: &DriverResult<Rows>,
    );
}

/// State captured by the before-hook of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub start_nanos: i64,
}

/// Hooks that write one SQL log record per completed statement
#[derive(Debug, Clone)]
pub struct SqlTimingHooks {
    tracer: Arc<Tracer>,
}

impl SqlTimingHooks {
    pub fn new(tracer: Arc<Tracer>) -> Self {
        Self { tracer }
    }

    fn before(&self) -> CallContext {
        CallContext {
            start_nanos: self.tracer.clock().now_nanos(),
        }
    }

    fn after<T>(&self, ctx: CallContext, query: &str, outcome: &DriverResult<T>) {
        // The fallback path will run the hooks again for the same statement
        if matches!(outcome, Err(DriverError::Skip)) {
            return;
        }

        let Some(sink) = self.tracer.sql_sink() else {
            return;
        };

        let elapsed = self.tracer.clock().now_nanos() - ctx.start_nanos;
        let extracted = extract(query);
        sink.append(&TimingRecord::new(
            ctx.start_nanos,
            elapsed,
            &extracted.tag,
            &extracted.query,
        ));
    }
}

impl Hooks for SqlTimingHooks {
    type Context = CallContext;

    fn pre_exec(&self, _query: &str, _args: &[NamedValue]) -> CallContext {
        self.before()
    }

    fn post_exec(
        &self,
        ctx: CallContext,
        query: &str,
        _args: &[NamedValue],
        outcome: &DriverResult<ExecResult>,
    ) {
        self.after(ctx, query, outcome);
    }

    fn pre_query(&self, _query: &str, _args: &[NamedValue]) -> CallContext {
        self.before()
    }

    fn post_query(
        &self,
        ctx: CallContext,
        query: &str,
        _args: &[NamedValue],
        outcome: &DriverResult<Rows>,
    ) {
        self.after(ctx, query, outcome);
    }
}
