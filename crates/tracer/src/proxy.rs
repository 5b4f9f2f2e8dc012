// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Proxy driver
//!
//! [`ProxyDriver`] decorates any [`Driver`] with a [`Hooks`] pair. Exec and
//! query calls, on connections and on prepared statements alike, run between
//! the hooks. Every other operation is forwarded untouched, and every
//! outcome, including errors, is returned to the caller exactly as the
//! wrapped driver produced it.

use std::sync::Arc;

use async_trait::async_trait;
use isutrace_driver::{
    Connection, Driver, DriverResult, ExecResult, NamedValue, Rows, Statement,
};

use crate::hooks::Hooks;

/// A driver that runs hooks around another driver's exec and query calls
pub struct ProxyDriver<H: Hooks> {
    inner: Arc<dyn Driver>,
    hooks: Arc<H>,
}

impl<H: Hooks> ProxyDriver<H> {
    pub fn new(inner: Arc<dyn Driver>, hooks: Arc<H>) -> Self {
        Self { inner, hooks }
    }
}

#[async_trait]
impl<H: Hooks> Driver for ProxyDriver<H> {
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>> {
        let inner = self.inner.open(dsn).await?;
        Ok(Box::new(ProxyConnection {
            inner,
            hooks: self.hooks.clone(),
        }))
    }
}

struct ProxyConnection<H: Hooks> {
    inner: Box<dyn Connection>,
    hooks: Arc<H>,
}

#[async_trait]
impl<H: Hooks> Connection for ProxyConnection<H> {
    async fn exec(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult> {
        let ctx = self.hooks.pre_exec(query, args);
        let outcome = self.inner.exec(query, args).await;
        self.hooks.post_exec(ctx, query, args, &outcome);
        outcome
    }

    async fn query(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<Rows> {
        let ctx = self.hooks.pre_query(query, args);
        let outcome = self.inner.query(query, args).await;
        self.hooks.post_query(ctx, query, args, &outcome);
        outcome
    }

    async fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Statement>> {
        let inner = self.inner.prepare(query).await?;
        Ok(Box::new(ProxyStatement {
            inner,
            hooks: self.hooks.clone(),
        }))
    }

    async fn ping(&mut self) -> DriverResult<()> {
        self.inner.ping().await
    }

    async fn begin(&mut self) -> DriverResult<()> {
        self.inner.begin().await
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.inner.rollback().await
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.inner.close().await
    }
}

struct ProxyStatement<H: Hooks> {
    inner: Box<dyn Statement>,
    hooks: Arc<H>,
}

#[async_trait]
impl<H: Hooks> Statement for ProxyStatement<H> {
    fn query_text(&self) -> &str {
        self.inner.query_text()
    }

    async fn exec(&mut self, args: &[NamedValue]) -> DriverResult<ExecResult> {
        let ctx = self.hooks.pre_exec(self.inner.query_text(), args);
        let outcome = self.inner.exec(args).await;
        self.hooks
            .post_exec(ctx, self.inner.query_text(), args, &outcome);
        outcome
    }

    async fn query(&mut self, args: &[NamedValue]) -> DriverResult<Rows> {
        let ctx = self.hooks.pre_query(self.inner.query_text(), args);
        let outcome = self.inner.query(args).await;
        self.hooks
            .post_query(ctx, self.inner.query_text(), args, &outcome);
        outcome
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.inner.close().await
    }
}
