//! Domain identifiers (strongly-typed IDs).
//!
//! Two kinds of identifiers live here:
//! - `QuoteId`: opaque id assigned by the upstream quote store. We never parse it.
//! - `Id<T>`: ULID-based ids generated by this service (currently only `SweepId`).
//!
//! ## Phantom Type パターン
//! `Id<T>` はジェネリック型で共通実装を提供しつつ、`T` はマーカー型として
//! コンパイル時の型安全性だけを提供します（実行時のメモリは消費しない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Opaque identifier of a quote, owned by the quote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(String);

impl QuoteId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for QuoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for QuoteId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"sweep-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let sweep_id: SweepId = Id::from(Ulid::new());
/// assert!(sweep_id.to_string().starts_with("sweep-"));
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// Reports carry the prefixed form so they can be grepped against logs.
impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sweep のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sweep {}

impl IdMarker for Sweep {
    fn prefix() -> &'static str {
        "sweep-"
    }
}

/// Identifies one sweep run in logs and reports.
pub type SweepId = Id<Sweep>;
