//! Structurally visible degradation for fallback-laden stages.
//!
//! Stages that must always hand a usable value downstream return
//! [`Recovered`] instead of `Result`, so a degraded value carries the tier
//! that failed rather than hiding it in error-handling control flow.

use std::fmt;

/// 劣化理由。フォールバックに落ちた段を記録する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// 入力が空、または小さすぎて処理できない。
    EmptyInput,
    /// 生成呼び出しが失敗した。
    CallFailed,
    /// 生成結果が空文字列だった。
    EmptyResponse,
    /// 生成結果が期待する JSON 形状にパースできなかった。
    UnparsableResponse,
    /// パースはできたが有効なアイテムが残らなかった。
    NoValidItems,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EmptyInput => "empty_input",
            Self::CallFailed => "call_failed",
            Self::EmptyResponse => "empty_response",
            Self::UnparsableResponse => "unparsable_response",
            Self::NoValidItems => "no_valid_items",
        };
        f.write_str(label)
    }
}

/// A value that is either the primary result or a fallback substituted for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T> {
    Ok(T),
    Degraded(T, DegradeReason),
}

impl<T> Recovered<T> {
    /// Resolve a fallback chain: the primary attempt, or the fixed fallback
    /// value tagged with the tier that failed.
    #[must_use]
    pub fn from_attempt(attempt: Result<T, DegradeReason>, fallback: impl FnOnce() -> T) -> Self {
        match attempt {
            Ok(value) => Self::Ok(value),
            Err(reason) => Self::Degraded(fallback(), reason),
        }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded(value, _) => value,
        }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Ok(value) | Self::Degraded(value, _) => value,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    #[must_use]
    pub fn reason(&self) -> Option<DegradeReason> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded(_, reason) => Some(*reason),
        }
    }
}
