// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Typed request descriptors and URL templates
//!
//! A provider lists its supported requests as an enum implementing [`Endpoint`].
//! Each variant carries the typed values for its URL template, and
//! [`render_template`] substitutes them into `{placeholder}` slots. Rendering is
//! strict: a missing value, an argument nobody asked for and an unbalanced brace
//! are all errors.
//!
//! Values are percent-encoded as a single path segment, so a value can never
//! add segments, climb out of its slot with `..`, or start a query or fragment.

use std::{collections::HashMap, fmt};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;

use crate::ApiError;

/// A named request with a URL template
pub trait Endpoint: fmt::Debug + Send + Sync {
    /// Stable name used in logs and error messages
    fn name(&self) -> &'static str;

    /// URL template, relative to the provider's base URL unless absolute
    fn template(&self) -> &'static str;

    /// Values for the template's placeholders
    fn args(&self) -> Vec<(&'static str, String)>;
}

/// Characters escaped in a substituted value
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Substitute `args` into the `{name}` placeholders of `template`
///
/// Each value is percent-encoded as one path segment.
///
/// # Errors
///
/// Returns [`ApiError::Template`] for a placeholder without a value, an
/// argument the template does not use, an unbalanced brace, or a value that is
/// a `.` or `..` segment
pub fn render_template(template: &str, args: &[(&str, String)]) -> Result<String, ApiError> {
    let mut rendered = String::with_capacity(template.len());
    let mut used = vec![false; args.len()];
    let mut rest = template;

    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(ApiError::template(format!(
                "unbalanced `}}` in template `{template}`"
            )));
        }
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            ApiError::template(format!("unclosed placeholder in template `{template}`"))
        })?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(ApiError::template(format!(
                "malformed placeholder in template `{template}`"
            )));
        }
        let index = args
            .iter()
            .position(|(arg, _)| *arg == name)
            .ok_or_else(|| {
                ApiError::template(format!(
                    "missing value for `{{{name}}}` in template `{template}`"
                ))
            })?;
        used[index] = true;
        let value = args[index].1.as_str();
        if value == "." || value == ".." {
            return Err(ApiError::template(format!(
                "`{{{name}}}` cannot be the dot segment `{value}`"
            )));
        }
        rendered.extend(utf8_percent_encode(value, SEGMENT));
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);

    if let Some(index) = used.iter().position(|used| !used) {
        return Err(ApiError::template(format!(
            "argument `{}` is not used by template `{template}`",
            args[index].0
        )));
    }

    Ok(rendered)
}

/// Per-call headers, query parameters and adapter context
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the rendered URL
    pub params: Vec<(String, String)>,
    /// Adapter context copied into the resulting [`crate::FetchResult::extra`]
    pub extra: HashMap<String, Value>,
}

impl CallOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter when a value is present
    #[must_use]
    pub fn param_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Add adapter context
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
