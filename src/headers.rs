//! The header map and the hop-by-hop stripping / canonicalization helpers
//! that work on it.
//!
//! Headers are single-valued: inserting a name that is already present
//! overwrites the previous value. This is a deliberate simplification over
//! a multi-valued header model (see crate docs) — don't "upgrade" this map
//! without also updating the serializer and the hop-by-hop stripper below.

use std::collections::HashMap;

/// A case-insensitive, single-valued header map.
///
/// Keys are stored lowercased; lookups lowercase their argument. Insertion
/// order is not preserved and header emission order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers { entries: HashMap::new() }
    }

    /// Insert `name: value`, overwriting any previous value for `name`.
    /// `name` is lowercased on insertion; `value` is stored as given
    /// (the parser is responsible for trimming it first).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headers that apply only to a single transport hop and must be removed
/// by an intermediary before forwarding a message.
///
/// The literal strip set in the design this crate follows also lists
/// `transfer-encoding`. This crate deliberately does not strip it: the
/// body transfer for a chunked message is a byte-for-byte replay of the
/// on-wire framing (`BodyKind::ChunkedPassthrough`, see `body.rs`), not a
/// decode/re-encode, so the receiving side needs `Transfer-Encoding:
/// chunked` to know the bytes that follow are chunk-framed at all.
/// Stripping it would forward a body with no header announcing it — see
/// DESIGN.md for the adopted redesign.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
    "proxy-connection",
];

/// Remove the hop-by-hop strip set from `headers` in place.
///
/// Applied to the request by the exchange engine before forwarding
/// upstream, and — per this crate's adopted redesign (see DESIGN.md) — to
/// the response before forwarding it to the client.
pub fn strip_hop_by_hop(headers: &mut Headers) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Canonicalize a header name for serialization: uppercase the first
/// letter and every letter immediately following a `-`, leave everything
/// else untouched.
///
/// `content-length` -> `Content-Length`, `te` -> `Te`.
pub fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize_next = true;
    for ch in name.chars() {
        if capitalize_next && ch.is_ascii_alphabetic() {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
        if ch == '-' {
            capitalize_next = true;
        }
    }
    out
}
