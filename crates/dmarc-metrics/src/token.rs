// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};
use tokio::sync::OnceCell;

pub type TokenResolverFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> + Send + Sync>;

/// Source of the credential used to authenticate pushes.
///
/// A dynamic factory defers resolution until the first flush and caches the
/// token for the lifetime of the process. Failed resolutions are not cached.
#[derive(Clone)]
pub enum TokenFactory {
    Static(String),
    Dynamic {
        resolver_fn: TokenResolverFn,
        token: Arc<OnceCell<String>>,
    },
}

impl TokenFactory {
    pub fn new_from_resolver(resolver_fn: TokenResolverFn) -> Self {
        Self::Dynamic {
            resolver_fn,
            token: Arc::new(OnceCell::new()),
        }
    }

    pub fn new_from_static_token(token: &str) -> Self {
        Self::Static(token.to_string())
    }

    pub async fn get_token(&self) -> Result<&str, String> {
        match self {
            Self::Static(token) => Ok(token.as_str()),
            Self::Dynamic { resolver_fn, token } => token
                .get_or_try_init(|| (resolver_fn)())
                .await
                .map(String::as_str),
        }
    }
}

impl Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenFactory")
    }
}
