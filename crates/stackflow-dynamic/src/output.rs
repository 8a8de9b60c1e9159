//! Pending values produced by one resource and consumed by another
//!
//! An [`Output`] is a cloneable shared future. It is created when a resource
//! is declared and resolves once the engine has registered that resource.
//! Secretness is carried alongside the value and survives `apply`/`zip`.

use crate::error::DynamicError;
use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Error a pending value resolves to when its producer failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct OutputError(String);

impl OutputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<DynamicError> for OutputError {
    fn from(err: DynamicError) -> Self {
        Self(err.to_string())
    }
}

impl From<OutputError> for DynamicError {
    fn from(err: OutputError) -> Self {
        DynamicError::OutputUnavailable(err.0)
    }
}

#[derive(Debug, Clone)]
struct Resolved<T> {
    value: T,
    secret: bool,
}

type SharedResolution<T> = Shared<BoxFuture<'static, Result<Resolved<T>, OutputError>>>;

/// A value that becomes available once its producing resource is registered
pub struct Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: SharedResolution<T>,
}

impl<T> Clone for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Output(..)")
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_resolution<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Resolved<T>, OutputError>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// An already known value
    pub fn new(value: T) -> Self {
        Self::from_resolution(async move {
            Ok(Resolved {
                value,
                secret: false,
            })
        })
    }

    /// An already known secret value
    pub fn secret(value: T) -> Self {
        Self::from_resolution(async move {
            Ok(Resolved {
                value,
                secret: true,
            })
        })
    }

    /// A value that never resolves successfully
    pub fn failed(error: OutputError) -> Self {
        Self::from_resolution(async move { Err(error) })
    }

    /// A value produced by a future
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, OutputError>> + Send + 'static,
    {
        Self::from_resolution(async move {
            let value = fut.await?;
            Ok(Resolved {
                value,
                secret: false,
            })
        })
    }

    /// Mark the value as secret
    pub fn into_secret(self) -> Self {
        let inner = self.inner;
        Self::from_resolution(async move {
            let resolved = inner.await?;
            Ok(Resolved {
                value: resolved.value,
                secret: true,
            })
        })
    }

    /// Wait for the value
    pub async fn resolve(&self) -> Result<T, OutputError> {
        self.inner.clone().await.map(|r| r.value)
    }

    /// Wait for the value and its secret flag
    pub async fn resolve_with_secret(&self) -> Result<(T, bool), OutputError> {
        self.inner.clone().await.map(|r| (r.value, r.secret))
    }

    /// Derive a new pending value; secretness is preserved
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::from_resolution(async move {
            let resolved = inner.await?;
            Ok(Resolved {
                value: f(resolved.value),
                secret: resolved.secret,
            })
        })
    }

    /// Like [`Output::apply`], but the mapping may fail or mark the result secret
    pub fn try_apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<(U, bool), OutputError> + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::from_resolution(async move {
            let resolved = inner.await?;
            let (value, secret) = f(resolved.value)?;
            Ok(Resolved {
                value,
                secret: secret || resolved.secret,
            })
        })
    }

    /// Combine two pending values; the result is secret if either input is
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.inner.clone();
        let right = other.inner.clone();
        Output::from_resolution(async move {
            let l = left.await?;
            let r = right.await?;
            Ok(Resolved {
                value: (l.value, r.value),
                secret: l.secret || r.secret,
            })
        })
    }

    /// Wait for all values; the result is secret if any input is
    pub fn all(outputs: Vec<Output<T>>) -> Output<Vec<T>> {
        Output::from_resolution(async move {
            let resolved = join_all(outputs.into_iter().map(|o| o.inner)).await;
            let mut values = Vec::with_capacity(resolved.len());
            let mut secret = false;
            for r in resolved {
                let r = r?;
                secret |= r.secret;
                values.push(r.value);
            }
            Ok(Resolved { value: values, secret })
        })
    }
}
